// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::HashMap;
use std::sync::Arc;

use crate::traits::WorkUnit;

use super::units::{BailUnit, DelayUnit, FailUnit, NoopUnit, SetMetadataUnit};
use super::workflow_connect::WorkflowConnectUnit;

/// Resolves the work unit id a task model names to the unit that runs it.
#[derive(Clone, Default)]
pub struct WorkUnitRegistry {
    units: HashMap<String, Arc<dyn WorkUnit>>,
}

impl WorkUnitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in unit.
    ///
    /// - "noop" -> NoopUnit
    /// - "fail" -> FailUnit
    /// - "bail" -> BailUnit
    /// - "delay" -> DelayUnit
    /// - "set_metadata" -> SetMetadataUnit
    /// - "workflow_connect" -> WorkflowConnectUnit
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_unit(Arc::new(NoopUnit));
        registry.register_unit(Arc::new(FailUnit));
        registry.register_unit(Arc::new(BailUnit));
        registry.register_unit(Arc::new(DelayUnit));
        registry.register_unit(Arc::new(SetMetadataUnit));
        registry.register_unit(Arc::new(WorkflowConnectUnit));
        registry
    }

    /// Registers `unit` under `id`, replacing any unit already there.
    pub fn register(&mut self, id: impl Into<String>, unit: Arc<dyn WorkUnit>) {
        self.units.insert(id.into(), unit);
    }

    /// Registers `unit` under its own name.
    pub fn register_unit(&mut self, unit: Arc<dyn WorkUnit>) {
        self.register(unit.name(), unit);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn WorkUnit>> {
        self.units.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.units.contains_key(id)
    }

    /// Registered ids, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.units.keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for WorkUnitRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkUnitRegistry")
            .field("units", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_are_registered() {
        let registry = WorkUnitRegistry::with_builtins();
        assert_eq!(
            registry.names(),
            vec!["bail", "delay", "fail", "noop", "set_metadata", "workflow_connect"]
        );
        assert!(registry.get("noop").is_some());
        assert!(registry.get("unknown").is_none());
    }

    #[test]
    fn test_register_replaces_existing_id() {
        let mut registry = WorkUnitRegistry::new();
        registry.register("step", Arc::new(NoopUnit));
        registry.register("step", Arc::new(FailUnit));
        assert_eq!(registry.names(), vec!["step"]);
        assert_eq!(registry.get("step").unwrap().name(), "fail");
    }
}
