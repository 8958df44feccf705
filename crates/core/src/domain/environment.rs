// Environment Variable Map

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Variable name -> value. Keys are unique, order is irrelevant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnvironmentMap(HashMap<String, String>);

impl EnvironmentMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Merge `overlay` into self; overlay wins on key collision
    pub fn merge(&mut self, overlay: &EnvironmentMap) {
        self.0.extend(overlay.0.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EnvironmentMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
