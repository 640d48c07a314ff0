//! Store bridge between parameter sets and the two stores.
//!
//! # Responsibility
//! - Write a full parameter set into the recall store and trigger
//!   propagation through the chain graph.
//! - Read the params store back as a parameter set.
//!
//! # Invariants
//! - Every operation requires attached store references whose nodes are
//!   still in the graph; otherwise it reports `State` and touches nothing.
//! - `write` clears the recall store before writing, so stale keys never
//!   propagate.

use crate::error::{SyncError, SyncResult};
use crate::host::{Host, PatchGraph};
use crate::model::node::{Message, NodeId};
use crate::model::params::ParameterSet;
use crate::sync::probe::Infrastructure;
use log::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreBridge {
    recall_store: Option<String>,
    recall_node: Option<NodeId>,
    params_store: Option<String>,
    params_node: Option<NodeId>,
}

impl StoreBridge {
    /// Bridge with no store references; every operation fails with `State`.
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn attached(infrastructure: &Infrastructure) -> Self {
        let mut bridge = Self::detached();
        bridge.attach(infrastructure);
        bridge
    }

    /// Points the bridge at freshly probed or built infrastructure.
    pub fn attach(&mut self, infrastructure: &Infrastructure) {
        self.recall_store = Some(infrastructure.recall_store.clone());
        self.recall_node = Some(infrastructure.recall);
        self.params_store = Some(infrastructure.params_store.clone());
        self.params_node = Some(infrastructure.params);
    }

    pub fn detach(&mut self) {
        *self = Self::detached();
    }

    pub fn is_attached(&self) -> bool {
        self.recall_store.is_some()
            && self.recall_node.is_some()
            && self.params_store.is_some()
            && self.params_node.is_some()
    }

    /// Checks that both store nodes are attached and still live in `graph`.
    ///
    /// # Errors
    /// - `State` when the bridge is detached or a store node was removed or
    ///   replaced since it was attached.
    pub fn verify<G: PatchGraph + ?Sized>(&self, graph: &G) -> SyncResult<()> {
        if !self.is_attached() {
            return Err(SyncError::state("stores are not attached"));
        }
        live_store(graph, self.recall_node, self.recall_store.as_deref())?;
        live_store(graph, self.params_node, self.params_store.as_deref())
    }

    /// Reads the params store.
    ///
    /// # Errors
    /// - `State` when the stores are not attached or no longer live.
    /// - `Store` / `Codec` / `InvalidRecord` when the store content cannot be
    ///   read back as a parameter set.
    pub fn read<H: Host + ?Sized>(&self, host: &H) -> SyncResult<ParameterSet> {
        self.verify(host)?;
        let store = self
            .params_store
            .as_deref()
            .ok_or_else(|| SyncError::state("params store is not attached"))?;
        let text = host.stringify(store)?;
        debug!("event=bridge_read module=sync status=ok store={store}");
        ParameterSet::from_json_text(&text)
    }

    /// Replaces the recall store content with `values`; sends `bang` to the
    /// recall node when `notify` is set.
    ///
    /// # Errors
    /// - `State` when the stores are not attached or no longer live.
    /// - `Store` when the backend rejects the write.
    pub fn write<H: Host + ?Sized>(
        &self,
        host: &mut H,
        values: &ParameterSet,
        notify: bool,
    ) -> SyncResult<()> {
        self.verify(&*host)?;
        let (Some(store), Some(node)) = (self.recall_store.as_deref(), self.recall_node) else {
            return Err(SyncError::state("recall store is not attached"));
        };
        host.clear(store)?;
        host.parse(store, &values.to_json_text())?;
        if notify {
            host.send(node, Message::bang());
        }
        debug!(
            "event=bridge_write module=sync status=ok store={store} keys={} notify={notify}",
            values.len()
        );
        Ok(())
    }
}

fn live_store<G: PatchGraph + ?Sized>(
    graph: &G,
    node: Option<NodeId>,
    store: Option<&str>,
) -> SyncResult<()> {
    let (Some(node), Some(store)) = (node, store) else {
        return Err(SyncError::state("stores are not attached"));
    };
    match graph.node(node) {
        Some(found) if found.kind.store_name() == Some(store) => Ok(()),
        _ => Err(SyncError::state(format!(
            "store node `{store}` is no longer in the graph; re-run synchronization"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::StoreBridge;
    use crate::config::SyncOptions;
    use crate::host::{MemoryHost, PatchGraph};
    use crate::model::identity::InstanceIdentity;
    use crate::model::params::{ParamValue, ParameterSet};
    use crate::store::StoreRegistry;
    use crate::sync::infra::{clean_infrastructure, ensure_infrastructure};

    #[test]
    fn detached_bridge_reports_state_errors() {
        let mut host = MemoryHost::new();
        let bridge = StoreBridge::detached();
        assert!(!bridge.is_attached());
        assert!(bridge.read(&host).unwrap_err().is_state());
        assert!(bridge
            .write(&mut host, &ParameterSet::new(), true)
            .unwrap_err()
            .is_state());
    }

    #[test]
    fn write_replaces_recall_content_without_notify() {
        let mut host = MemoryHost::new();
        let root = host.root();
        let identity = InstanceIdentity::new("test").unwrap();
        let outcome = ensure_infrastructure(&mut host, root, &identity, &SyncOptions::default());
        let bridge = StoreBridge::attached(&outcome.infrastructure);

        host.set_entry("test_recall", "stale", ParamValue::Int(1)).unwrap();
        let values: ParameterSet = [("dial", ParamValue::Int(64))].into_iter().collect();
        bridge.write(&mut host, &values, false).unwrap();

        assert_eq!(host.stringify("test_recall").unwrap(), r#"{"dial":64}"#);
        assert!(host.broadcasts().is_empty());
        assert!(bridge.read(&host).unwrap().is_empty());
    }

    #[test]
    fn read_returns_params_store_content() {
        let mut host = MemoryHost::new();
        let root = host.root();
        let identity = InstanceIdentity::new("test").unwrap();
        let outcome = ensure_infrastructure(&mut host, root, &identity, &SyncOptions::default());
        let bridge = StoreBridge::attached(&outcome.infrastructure);

        host.parse("test", r#"{"menu": 2, "button": true}"#).unwrap();
        let values = bridge.read(&host).unwrap();
        assert_eq!(values.get("menu"), Some(ParamValue::Int(2)));
        assert_eq!(values.get("button"), Some(ParamValue::Bool(true)));
    }

    #[test]
    fn removed_store_node_is_a_state_error() {
        let mut host = MemoryHost::new();
        let root = host.root();
        let identity = InstanceIdentity::new("test").unwrap();
        let outcome = ensure_infrastructure(&mut host, root, &identity, &SyncOptions::default());
        let bridge = StoreBridge::attached(&outcome.infrastructure);
        host.set_entry("test_recall", "dial", ParamValue::Int(1)).unwrap();

        clean_infrastructure(&mut host, root);
        assert!(bridge.is_attached());
        assert!(bridge.verify(&host).unwrap_err().is_state());
        assert!(bridge.read(&host).unwrap_err().is_state());

        let values: ParameterSet = [("dial", ParamValue::Int(64))].into_iter().collect();
        assert!(bridge.write(&mut host, &values, true).unwrap_err().is_state());
        assert_eq!(host.get_entry("test_recall", "dial").unwrap(), Some(ParamValue::Int(1)));
    }
}
