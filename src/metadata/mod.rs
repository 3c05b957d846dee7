// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Multi-valued, group-aware metadata.
//!
//! Keys may be grouped with `/` (for example `WorkflowProcessor/Local/Keys`
//! lives in the group `WorkflowProcessor/Local`). Every key maps to an ordered
//! list of values; most callers only care about the first one.

mod control;
pub mod keys;

pub use control::{ControlMetadata, MetadataLayer};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

pub const GROUP_SEPARATOR: char = '/';

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata(BTreeMap<String, Vec<String>>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// First value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|values| values.first()).map(String::as_str)
    }

    pub fn get_all(&self, key: &str) -> &[String] {
        self.0.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn replace(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), vec![value.into()]);
    }

    pub fn replace_all(&mut self, key: impl Into<String>, values: Vec<String>) {
        self.0.insert(key.into(), values);
    }

    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.entry(key.into()).or_default().push(value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Vec<String>> {
        self.0.remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Drops every key equal to `group` or nested below it.
    pub fn remove_group(&mut self, group: &str) {
        self.0.retain(|key, _| !in_group(key, group));
    }

    pub fn without_group(&self, group: &str) -> Metadata {
        let mut copy = self.clone();
        copy.remove_group(group);
        copy
    }

    /// Keys of `other` overwrite the same keys here.
    pub fn overlay(&mut self, other: &Metadata) {
        for (key, values) in &other.0 {
            self.0.insert(key.clone(), values.clone());
        }
    }

    /// Union of values per key, keeping first-seen order.
    pub fn merge(&mut self, other: &Metadata) {
        for (key, values) in &other.0 {
            let existing = self.0.entry(key.clone()).or_default();
            for value in values {
                if !existing.contains(value) {
                    existing.push(value.clone());
                }
            }
        }
    }

    /// True when every value in `values` is stored under `key`.
    pub fn matches(&self, key: &str, values: &[String]) -> bool {
        let stored = self.get_all(key);
        !stored.is_empty() && values.iter().all(|v| stored.contains(v))
    }
}

fn in_group(key: &str, group: &str) -> bool {
    key == group
        || key
            .strip_prefix(group)
            .is_some_and(|rest| rest.starts_with(GROUP_SEPARATOR))
}

impl Serialize for Metadata {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

/// Model files may write a single scalar where a list is expected.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawValues {
    Many(Vec<RawScalar>),
    One(RawScalar),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawScalar {
    Text(String),
    Integer(i64),
    Decimal(f64),
    Flag(bool),
}

impl RawScalar {
    fn into_string(self) -> String {
        match self {
            RawScalar::Text(text) => text,
            RawScalar::Integer(value) => value.to_string(),
            RawScalar::Decimal(value) => value.to_string(),
            RawScalar::Flag(value) => value.to_string(),
        }
    }
}

impl<'de> Deserialize<'de> for Metadata {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, RawValues>::deserialize(deserializer)?;
        Ok(Metadata(
            raw.into_iter()
                .map(|(key, values)| {
                    let values = match values {
                        RawValues::Many(many) => many.into_iter().map(RawScalar::into_string).collect(),
                        RawValues::One(one) => vec![one.into_string()],
                    };
                    (key, values)
                })
                .collect(),
        ))
    }
}

impl<K, V> FromIterator<(K, V)> for Metadata
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut metadata = Metadata::new();
        for (key, value) in iter {
            metadata.add(key, value);
        }
        metadata
    }
}
