// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Layered metadata handed to a work unit while it runs.
//!
//! A work unit sees three layers: the task's static metadata, the dynamic
//! metadata flowing through the workflow, and a scratch `local` layer. Keys
//! written locally stay with the task instance unless they are marked as
//! workflow keys and committed, at which point they move into the dynamic
//! layer and travel on to the rest of the workflow.

use std::collections::{BTreeSet, HashMap};

use super::Metadata;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataLayer {
    Dynamic,
    Static,
    Local,
}

const QUERY_ORDER: [MetadataLayer; 3] = [
    MetadataLayer::Dynamic,
    MetadataLayer::Local,
    MetadataLayer::Static,
];

const COMBINE_ORDER: [MetadataLayer; 3] = [
    MetadataLayer::Static,
    MetadataLayer::Local,
    MetadataLayer::Dynamic,
];

#[derive(Debug, Clone, Default)]
pub struct ControlMetadata {
    static_metadata: Metadata,
    dynamic_metadata: Metadata,
    local_metadata: Metadata,
    key_links: HashMap<String, String>,
    workflow_keys: BTreeSet<String>,
}

impl ControlMetadata {
    pub fn new(static_metadata: Metadata, dynamic_metadata: Metadata) -> Self {
        Self {
            static_metadata,
            dynamic_metadata,
            ..Self::default()
        }
    }

    /// Follows key links until a concrete key is reached.
    pub fn resolve_key(&self, key: &str) -> String {
        let mut current = key;
        let mut hops = 0;
        while let Some(next) = self.key_links.get(current) {
            current = next;
            hops += 1;
            if hops > self.key_links.len() {
                break;
            }
        }
        current.to_string()
    }

    pub fn link_key(&mut self, key: impl Into<String>, target: impl Into<String>) {
        let key = key.into();
        self.local_metadata.remove(&key);
        self.key_links.insert(key, target.into());
    }

    pub fn unlink_key(&mut self, key: &str) {
        self.key_links.remove(key);
    }

    pub fn is_link(&self, key: &str) -> bool {
        self.key_links.contains_key(key)
    }

    pub fn get_all(&self, key: &str) -> Vec<String> {
        self.get_all_from(key, &QUERY_ORDER)
    }

    pub fn get_all_from(&self, key: &str, layers: &[MetadataLayer]) -> Vec<String> {
        let resolved = self.resolve_key(key);
        layers
            .iter()
            .map(|layer| self.layer(*layer))
            .find(|metadata| metadata.contains_key(&resolved))
            .map(|metadata| metadata.get_all(&resolved).to_vec())
            .unwrap_or_default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.get_all(key).into_iter().next()
    }

    /// Writes into the local layer, or through a link into an existing dynamic key.
    pub fn replace_local(&mut self, key: &str, values: Vec<String>) {
        let resolved = self.resolve_key(key);
        if self.key_links.contains_key(key) && self.dynamic_metadata.contains_key(&resolved) {
            self.dynamic_metadata.replace_all(resolved, values);
        } else {
            self.local_metadata.replace_all(resolved, values);
        }
    }

    pub fn replace_local_value(&mut self, key: &str, value: impl Into<String>) {
        self.replace_local(key, vec![value.into()]);
    }

    pub fn replace_dynamic(&mut self, key: impl Into<String>, values: Vec<String>) {
        self.dynamic_metadata.replace_all(key, values);
    }

    pub fn mark_workflow_key(&mut self, key: impl Into<String>) {
        self.workflow_keys.insert(key.into());
    }

    /// Moves the marked local keys into the dynamic layer.
    pub fn commit_workflow_keys(&mut self) {
        let keys = std::mem::take(&mut self.workflow_keys);
        for key in keys {
            let values = self
                .local_metadata
                .get_all(&self.resolve_key(&key))
                .to_vec();
            self.dynamic_metadata.replace_all(key.clone(), values);
            self.local_metadata.remove(&key);
        }
    }

    /// Flattens the layers, later layers overriding earlier ones.
    pub fn as_metadata(&self) -> Metadata {
        self.as_metadata_from(&COMBINE_ORDER)
    }

    pub fn as_metadata_from(&self, layers: &[MetadataLayer]) -> Metadata {
        let mut combined = Metadata::new();
        for layer in layers {
            combined.overlay(self.layer(*layer));
            if *layer == MetadataLayer::Local {
                for key in self.key_links.keys() {
                    combined.replace_all(key.clone(), self.get_all(key));
                }
            }
        }
        combined
    }

    pub fn dynamic_metadata(&self) -> &Metadata {
        &self.dynamic_metadata
    }

    pub fn static_metadata(&self) -> &Metadata {
        &self.static_metadata
    }

    pub fn local_metadata(&self) -> &Metadata {
        &self.local_metadata
    }

    fn layer(&self, layer: MetadataLayer) -> &Metadata {
        match layer {
            MetadataLayer::Dynamic => &self.dynamic_metadata,
            MetadataLayer::Static => &self.static_metadata,
            MetadataLayer::Local => &self.local_metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn md(pairs: &[(&str, &str)]) -> Metadata {
        pairs.iter().map(|(k, v)| (*k, *v)).collect()
    }

    #[test]
    fn test_query_prefers_dynamic_then_local_then_static() {
        let mut ctrl = ControlMetadata::new(md(&[("A", "static"), ("B", "static")]), md(&[("A", "dyn")]));
        ctrl.replace_local_value("B", "local");
        assert_eq!(ctrl.get("A").as_deref(), Some("dyn"));
        assert_eq!(ctrl.get("B").as_deref(), Some("local"));
        assert_eq!(ctrl.get("C"), None);
    }

    #[test]
    fn test_commit_moves_marked_local_keys_into_dynamic() {
        let mut ctrl = ControlMetadata::default();
        ctrl.replace_local_value("Output", "file.out");
        ctrl.replace_local_value("Scratch", "tmp");
        ctrl.mark_workflow_key("Output");
        ctrl.commit_workflow_keys();

        assert_eq!(ctrl.dynamic_metadata().get("Output"), Some("file.out"));
        assert!(!ctrl.local_metadata().contains_key("Output"));
        assert_eq!(ctrl.local_metadata().get("Scratch"), Some("tmp"));
    }

    #[test]
    fn test_linked_key_writes_through_to_dynamic() {
        let mut ctrl = ControlMetadata::new(Metadata::new(), md(&[("Real", "old")]));
        ctrl.link_key("Alias", "Real");
        ctrl.replace_local_value("Alias", "new");
        assert_eq!(ctrl.dynamic_metadata().get("Real"), Some("new"));
        assert_eq!(ctrl.resolve_key("Alias"), "Real");
        assert_eq!(ctrl.as_metadata().get("Alias"), Some("new"));
    }

    #[test]
    fn test_cyclic_links_terminate() {
        let mut ctrl = ControlMetadata::default();
        ctrl.link_key("A", "B");
        ctrl.link_key("B", "A");
        let resolved = ctrl.resolve_key("A");
        assert!(resolved == "A" || resolved == "B");
    }

    #[test]
    fn test_as_metadata_lets_dynamic_win() {
        let mut ctrl = ControlMetadata::new(md(&[("K", "static")]), md(&[("K", "dyn")]));
        ctrl.replace_local_value("K", "local");
        assert_eq!(ctrl.as_metadata().get("K"), Some("dyn"));
    }
}
