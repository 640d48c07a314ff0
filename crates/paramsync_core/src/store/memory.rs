//! In-process store registry.

use crate::model::params::{ParamValue, ParameterSet};
use crate::store::{StoreError, StoreRegistry, StoreResult};
use std::collections::BTreeMap;

/// Store registry kept entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStores {
    stores: BTreeMap<String, ParameterSet>,
}

impl MemoryStores {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of stores that have been written at least once.
    pub fn names(&self) -> Vec<String> {
        self.stores.keys().cloned().collect()
    }

    pub fn snapshot(&self, name: &str) -> ParameterSet {
        self.stores.get(name).cloned().unwrap_or_default()
    }
}

impl StoreRegistry for MemoryStores {
    fn clear(&mut self, name: &str) -> StoreResult<()> {
        self.stores.insert(name.to_string(), ParameterSet::new());
        Ok(())
    }

    fn parse(&mut self, name: &str, text: &str) -> StoreResult<()> {
        let parsed = ParameterSet::from_json_text(text).map_err(|err| StoreError::Malformed {
            store: name.to_string(),
            message: err.to_string(),
        })?;
        self.stores.insert(name.to_string(), parsed);
        Ok(())
    }

    fn stringify(&self, name: &str) -> StoreResult<String> {
        Ok(self
            .stores
            .get(name)
            .map(ParameterSet::to_json_text)
            .unwrap_or_else(|| "{}".to_string()))
    }

    fn get_entry(&self, name: &str, key: &str) -> StoreResult<Option<ParamValue>> {
        Ok(self.stores.get(name).and_then(|store| store.get(key)))
    }

    fn set_entry(&mut self, name: &str, key: &str, value: ParamValue) -> StoreResult<()> {
        self.stores
            .entry(name.to_string())
            .or_default()
            .insert(key, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryStores;
    use crate::model::params::ParamValue;
    use crate::store::{StoreError, StoreRegistry};

    #[test]
    fn unknown_store_reads_as_empty_object() {
        let stores = MemoryStores::new();
        assert_eq!(stores.stringify("missing").unwrap(), "{}");
        assert_eq!(stores.get_entry("missing", "dial").unwrap(), None);
    }

    #[test]
    fn parse_replaces_previous_content() {
        let mut stores = MemoryStores::new();
        stores.parse("test", r#"{"a":1,"b":true}"#).unwrap();
        stores.parse("test", r#"{"c":2.5}"#).unwrap();
        assert_eq!(stores.stringify("test").unwrap(), r#"{"c":2.5}"#);
    }

    #[test]
    fn set_entry_keeps_insertion_order() {
        let mut stores = MemoryStores::new();
        stores.set_entry("test", "b", ParamValue::Int(1)).unwrap();
        stores.set_entry("test", "a", ParamValue::Int(2)).unwrap();
        stores.set_entry("test", "b", ParamValue::Int(3)).unwrap();
        assert_eq!(stores.stringify("test").unwrap(), r#"{"b":3,"a":2}"#);
    }

    #[test]
    fn malformed_text_names_the_store() {
        let mut stores = MemoryStores::new();
        let err = stores.parse("test", "not json").unwrap_err();
        assert!(matches!(err, StoreError::Malformed { ref store, .. } if store == "test"));
    }

    #[test]
    fn clear_empties_store() {
        let mut stores = MemoryStores::new();
        stores.parse("test", r#"{"a":1}"#).unwrap();
        stores.clear("test").unwrap();
        assert_eq!(stores.stringify("test").unwrap(), "{}");
    }
}
