//! Branch mappings: per-question routing from an answer key to the next
//! question reference.
//!
//! Targets are stored as the author typed them and parsed into a
//! [`BranchTarget`] on lookup.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::QuestionId;

/// Key consulted for free-text questions when no exact answer key matches.
pub const WILDCARD_KEY: &str = "*";

/// Target text that ends the survey.
pub const END_TARGET: &str = "END";

/// A parsed, non-empty branch target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum BranchTarget {
    End,
    Question { id: QuestionId },
    /// Neither `END` nor an integer. Navigates like [`BranchTarget::End`].
    Unresolvable { raw: String },
}

impl BranchTarget {
    /// Parses a stored target. Only empty text means "no override" and
    /// yields `None`; whitespace alone is an unresolvable target.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.is_empty() {
            return None;
        }
        let trimmed = raw.trim();
        if trimmed == END_TARGET {
            return Some(BranchTarget::End);
        }
        Some(match trimmed.parse::<QuestionId>() {
            Ok(id) => BranchTarget::Question { id },
            Err(_) => BranchTarget::Unresolvable { raw: raw.to_string() },
        })
    }

    /// The question this target leads to, or `None` when it finishes the survey.
    pub fn destination(&self) -> Option<QuestionId> {
        match self {
            BranchTarget::Question { id } => Some(*id),
            BranchTarget::End | BranchTarget::Unresolvable { .. } => None,
        }
    }
}

/// Answer key → target text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchMapping(BTreeMap<String, String>);

impl BranchMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn route(mut self, key: impl Into<String>, target: impl Into<String>) -> Self {
        self.0.insert(key.into(), target.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, target: impl Into<String>) {
        self.0.insert(key.into(), target.into());
    }

    /// The stored target text for `key`, exactly as authored.
    pub fn raw(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// The parsed target for `key`; absent and empty entries both yield `None`.
    pub fn target_for(&self, key: &str) -> Option<BranchTarget> {
        self.0.get(key).and_then(|raw| BranchTarget::parse(raw))
    }

    /// The parsed wildcard target, if configured and non-empty.
    pub fn wildcard(&self) -> Option<BranchTarget> {
        self.target_for(WILDCARD_KEY)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Builds a mapping from a decoded JSON object. Numbers are accepted as
    /// targets; nulls become empty ("no override") entries.
    fn from_json_object(object: serde_json::Map<String, serde_json::Value>) -> Self {
        let entries = object
            .into_iter()
            .map(|(key, value)| {
                let target = match value {
                    serde_json::Value::String(s) => s,
                    serde_json::Value::Null => String::new(),
                    other => other.to_string(),
                };
                (key, target)
            })
            .collect();
        Self(entries)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for BranchMapping {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Serde adapter for the question feed's `branch` field: a JSON-encoded
/// string on the wire, also accepting a plain object. Undecodable text is
/// treated as an absent mapping.
pub mod encoded {
    use serde::{Deserialize, Deserializer, Serializer};
    use tracing::warn;

    use super::BranchMapping;

    pub fn serialize<S>(mapping: &Option<BranchMapping>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match mapping {
            Some(mapping) if !mapping.is_empty() => {
                let text = serde_json::to_string(mapping).map_err(serde::ser::Error::custom)?;
                serializer.serialize_str(&text)
            }
            _ => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<BranchMapping>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
        Ok(match raw {
            Some(serde_json::Value::String(text)) => {
                if text.trim().is_empty() {
                    return Ok(None);
                }
                match serde_json::from_str::<serde_json::Value>(&text) {
                    Ok(serde_json::Value::Object(object)) => {
                        Some(BranchMapping::from_json_object(object))
                    }
                    _ => {
                        warn!(branch = %text, "Ignoring undecodable branch mapping");
                        None
                    }
                }
            }
            Some(serde_json::Value::Object(object)) => Some(BranchMapping::from_json_object(object)),
            _ => None,
        })
    }
}
