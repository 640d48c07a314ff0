//! Parameter values and ordered parameter sets.
//!
//! # Responsibility
//! - Define the scalar value shape shared by stores, messages and UI controls.
//! - Convert typed `serde` records to and from an ordered `ParameterSet`.
//!
//! # Invariants
//! - Keys are unique and are valid identifiers (see `model::identity`).
//! - Values are scalar: bool, integer or float. Discrete enums travel as
//!   integers.
//! - Entry order follows record field order; it only drives layout.

use crate::error::{SyncError, SyncResult};
use crate::model::identity::validate_identifier;
use crate::model::node::Atom;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// One scalar parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl ParamValue {
    /// Converts a JSON scalar, rejecting anything that is not bool or number.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(flag) => Some(Self::Bool(*flag)),
            Value::Number(number) => Some(
                number
                    .as_i64()
                    .map(Self::Int)
                    .unwrap_or_else(|| Self::Float(number.as_f64().unwrap_or_default())),
            ),
            _ => None,
        }
    }

    pub fn to_json(self) -> Value {
        match self {
            Self::Bool(flag) => Value::Bool(flag),
            Self::Int(value) => Value::Number(Number::from(value)),
            // Non-finite floats have no JSON form.
            Self::Float(value) => Number::from_f64(value).map_or(Value::Null, Value::Number),
        }
    }

    pub fn from_atom(atom: &Atom) -> Option<Self> {
        match atom {
            Atom::Bool(flag) => Some(Self::Bool(*flag)),
            Atom::Int(value) => Some(Self::Int(*value)),
            Atom::Float(value) => Some(Self::Float(*value)),
            Atom::Symbol(_) => None,
        }
    }
}

impl From<ParamValue> for Atom {
    fn from(value: ParamValue) -> Self {
        match value {
            ParamValue::Bool(flag) => Atom::Bool(flag),
            ParamValue::Int(value) => Atom::Int(value),
            ParamValue::Float(value) => Atom::Float(value),
        }
    }
}

/// Ordered mapping from parameter name to scalar value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSet {
    entries: Vec<(String, ParamValue)>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces `key`, keeping the original position on replace.
    pub fn insert(&mut self, key: impl Into<String>, value: ParamValue) {
        let key = key.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<ParamValue> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| *value)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ParamValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), *value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Flattens a typed record into an ordered parameter set.
    ///
    /// # Errors
    /// - `InvalidRecord` when the record is not a JSON object, a key is not a
    ///   valid identifier, or a value is not scalar.
    pub fn from_record<T: Serialize>(record: &T) -> SyncResult<Self> {
        Self::from_json_value(serde_json::to_value(record)?)
    }

    /// Rebuilds a typed record from this set.
    pub fn into_record<T: DeserializeOwned>(&self) -> SyncResult<T> {
        Ok(serde_json::from_value(self.to_json_value())?)
    }

    pub fn from_json_value(value: Value) -> SyncResult<Self> {
        let Value::Object(map) = value else {
            return Err(SyncError::InvalidRecord(format!(
                "expected an object, got `{value}`"
            )));
        };
        let mut set = Self::new();
        for (key, value) in map {
            validate_identifier(&key, "parameter key")
                .map_err(|err| SyncError::InvalidRecord(err.to_string()))?;
            let scalar = ParamValue::from_json(&value).ok_or_else(|| {
                SyncError::InvalidRecord(format!(
                    "parameter `{key}` must be a bool or number, got `{value}`"
                ))
            })?;
            set.entries.push((key, scalar));
        }
        Ok(set)
    }

    pub fn to_json_value(&self) -> Value {
        let map: Map<String, Value> = self
            .entries
            .iter()
            .map(|(key, value)| (key.clone(), value.to_json()))
            .collect();
        Value::Object(map)
    }

    /// Parses store text (a JSON object).
    pub fn from_json_text(text: &str) -> SyncResult<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(Self::new());
        }
        Self::from_json_value(serde_json::from_str(trimmed)?)
    }

    pub fn to_json_text(&self) -> String {
        self.to_json_value().to_string()
    }
}

impl<K: Into<String>> FromIterator<(K, ParamValue)> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = (K, ParamValue)>>(iter: I) -> Self {
        let mut set = Self::new();
        for (key, value) in iter {
            set.insert(key, value);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::{ParamValue, ParameterSet};
    use crate::error::SyncError;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Synth {
        cutoff: f64,
        voices: i64,
        mono: bool,
    }

    #[test]
    fn record_flattens_in_field_order() {
        let set = ParameterSet::from_record(&Synth {
            cutoff: 0.5,
            voices: 4,
            mono: true,
        })
        .expect("flat record");

        assert_eq!(set.keys().collect::<Vec<_>>(), vec!["cutoff", "voices", "mono"]);
        assert_eq!(set.get("cutoff"), Some(ParamValue::Float(0.5)));
        assert_eq!(set.get("voices"), Some(ParamValue::Int(4)));
        assert_eq!(set.get("mono"), Some(ParamValue::Bool(true)));
    }

    #[test]
    fn record_survives_json_text() {
        let record = Synth {
            cutoff: 1.25,
            voices: 2,
            mono: false,
        };
        let text = ParameterSet::from_record(&record).unwrap().to_json_text();
        let decoded: Synth = ParameterSet::from_json_text(&text)
            .unwrap()
            .into_record()
            .unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn nested_values_are_rejected() {
        let value = serde_json::json!({ "dial": { "nested": 1 } });
        let err = ParameterSet::from_json_value(value).unwrap_err();
        assert!(matches!(err, SyncError::InvalidRecord(_)), "{err}");

        let err = ParameterSet::from_json_value(serde_json::json!([1, 2])).unwrap_err();
        assert!(matches!(err, SyncError::InvalidRecord(_)), "{err}");
    }

    #[test]
    fn keys_with_whitespace_are_rejected() {
        let err = ParameterSet::from_json_value(serde_json::json!({ "my dial": 1 })).unwrap_err();
        assert!(err.to_string().contains("my dial"), "{err}");
    }

    #[test]
    fn insert_replaces_in_place() {
        let mut set: ParameterSet = [("a", ParamValue::Int(1)), ("b", ParamValue::Int(2))]
            .into_iter()
            .collect();
        set.insert("a", ParamValue::Int(9));
        assert_eq!(set.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(set.get("a"), Some(ParamValue::Int(9)));
    }

    #[test]
    fn empty_text_is_an_empty_set() {
        assert!(ParameterSet::from_json_text("  ").unwrap().is_empty());
        assert!(ParameterSet::from_json_text("{}").unwrap().is_empty());
    }
}
