use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Value of a single fact.
///
/// Serialized untagged so the JSON form is a plain scalar. There is no null
/// variant: a collector that has nothing to report omits the fact instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FactValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl FactValue {
    /// Borrow the value as a string slice if it is textual
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Boolean(_) | Self::Integer(_) | Self::Float(_) => None,
        }
    }
}

impl fmt::Display for FactValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<String> for FactValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for FactValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<bool> for FactValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for FactValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<u32> for FactValue {
    fn from(value: u32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<u64> for FactValue {
    fn from(value: u64) -> Self {
        // Values beyond i64 keep their exact digits as text
        i64::try_from(value).map_or_else(|_| Self::Text(value.to_string()), Self::Integer)
    }
}

impl From<usize> for FactValue {
    fn from(value: usize) -> Self {
        Self::from(u64::try_from(value).unwrap_or(u64::MAX))
    }
}

impl From<f64> for FactValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

/// Flat mapping from fact name to fact value.
///
/// Names are case-sensitive and unique. Entries are kept ordered by name so
/// two equal mappings always serialize to the same document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FactMapping {
    facts: BTreeMap<String, FactValue>,
}

impl FactMapping {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fact, returning the value it replaced
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FactValue>) -> Option<FactValue> {
        self.facts.insert(name.into(), value.into())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FactValue> {
        self.facts.get(name)
    }

    /// Textual value of a fact, `None` when absent or not a string
    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.facts.get(name).and_then(FactValue::as_str)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.facts.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<FactValue> {
        self.facts.remove(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.facts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FactValue)> {
        self.facts.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.facts.keys().map(String::as_str)
    }

    /// Keep only the facts whose name satisfies the predicate
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.facts.retain(|name, _| keep(name));
    }

    /// Merge another mapping into this one; entries from `other` win on collision
    pub fn merge(&mut self, other: Self) {
        self.facts.extend(other.facts);
    }
}

impl FromIterator<(String, FactValue)> for FactMapping {
    fn from_iter<I: IntoIterator<Item = (String, FactValue)>>(iter: I) -> Self {
        Self {
            facts: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for FactMapping {
    type Item = (String, FactValue);
    type IntoIter = std::collections::btree_map::IntoIter<String, FactValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.facts.into_iter()
    }
}
