use serde::{Deserialize, Serialize};

use crate::KeyValue;

/// Environment variables handed explicitly to every command of a run.
///
/// Stored as an ordered list of key–value pairs; later entries override earlier ones.
/// Serialized as a plain array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Env(pub Vec<KeyValue>);

impl Env {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn single<K, V>(key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self(vec![KeyValue::new(key, value)])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeyValue> {
        self.0.iter()
    }

    /// Value for a key, last entry wins.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|kv| kv.key() == key)
            .map(|kv| kv.value())
    }

    pub fn push<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.0.push(KeyValue::new(key, value));
    }

    /// Prepend `dir` to a search-path variable (`PATH`-style, `:` separated).
    ///
    /// The current value is taken from this environment first, then from `fallback`.
    pub fn prepend_path(&mut self, key: &str, dir: &str, fallback: Option<&str>) {
        let current = self.get(key).map(str::to_owned).or(fallback.map(str::to_owned));
        let value = match current {
            Some(rest) if !rest.is_empty() => format!("{dir}:{rest}"),
            _ => dir.to_string(),
        };
        self.push(key, value);
    }

    /// Concatenate two environments, entries from `other` win.
    pub fn merged(&self, other: &Env) -> Env {
        let mut out = self.0.clone();
        out.extend(other.0.iter().cloned());
        Env(out)
    }

    /// Collapse overrides into one entry per key, in first-seen key order.
    pub fn resolved(&self) -> Vec<(String, String)> {
        let mut out: Vec<(String, String)> = Vec::with_capacity(self.0.len());
        for kv in &self.0 {
            match out.iter_mut().find(|(k, _)| k == kv.key()) {
                Some(slot) => slot.1 = kv.value().to_string(),
                None => out.push((kv.key().to_string(), kv.value().to_string())),
            }
        }
        out
    }
}
