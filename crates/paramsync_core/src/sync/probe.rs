//! Infrastructure probing.
//!
//! # Responsibility
//! - Classify a container's children by kind and role in one traversal.
//! - Capture live references to the recall store, params store, update
//!   emitter and update bridge.
//!
//! # Invariants
//! - Role tags are mandatory: a node with the right kind but no (or another)
//!   role never counts.
//! - Store nodes only count when their store name matches the instance.
//! - A role seen twice marks the infrastructure as incomplete.

use crate::host::PatchGraph;
use crate::model::identity::InstanceIdentity;
use crate::model::node::{ContainerId, NodeId, NodeKind, Role};

/// Fewest children a container can hold and still contain infrastructure.
pub const MIN_INFRASTRUCTURE_CHILDREN: usize = 3;

/// Complete, live infrastructure of one instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Infrastructure {
    pub recall: NodeId,
    pub params: NodeId,
    pub update: NodeId,
    pub update_bridge: NodeId,
    pub recall_store: String,
    pub params_store: String,
}

/// Outcome of one probe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeReport {
    pub recall: Option<NodeId>,
    pub params: Option<NodeId>,
    pub update: Option<NodeId>,
    pub update_bridge: Option<NodeId>,
    /// Roles found on more than one node.
    pub duplicated: Vec<Role>,
    pub child_count: usize,
    recall_store: Option<String>,
    params_store: Option<String>,
}

impl ProbeReport {
    pub fn has_recall(&self) -> bool {
        self.recall.is_some()
    }

    pub fn has_params(&self) -> bool {
        self.params.is_some()
    }

    pub fn has_update(&self) -> bool {
        self.update.is_some()
    }

    pub fn has_bridge(&self) -> bool {
        self.update_bridge.is_some()
    }

    pub fn is_complete(&self) -> bool {
        self.child_count >= MIN_INFRASTRUCTURE_CHILDREN
            && self.duplicated.is_empty()
            && self.has_recall()
            && self.has_params()
            && self.has_update()
            && self.has_bridge()
    }

    /// Live infrastructure, when the probe found every element.
    pub fn infrastructure(&self) -> Option<Infrastructure> {
        if !self.is_complete() {
            return None;
        }
        Some(Infrastructure {
            recall: self.recall?,
            params: self.params?,
            update: self.update?,
            update_bridge: self.update_bridge?,
            recall_store: self.recall_store.clone()?,
            params_store: self.params_store.clone()?,
        })
    }
}

/// Inspects `container` for the infrastructure of `identity`.
pub fn probe_infrastructure<G: PatchGraph + ?Sized>(
    graph: &G,
    container: ContainerId,
    identity: &InstanceIdentity,
) -> ProbeReport {
    let mut report = ProbeReport {
        child_count: graph.child_count(container),
        ..ProbeReport::default()
    };
    if report.child_count < MIN_INFRASTRUCTURE_CHILDREN {
        return report;
    }

    let recall_store = identity.recall_store_name();
    let params_store = identity.params_store_name();

    for node in graph.children(container) {
        let Some(role) = node.role else {
            continue;
        };
        let slot = match (&role, &node.kind) {
            (Role::Recall, NodeKind::Store { name }) if *name == recall_store => {
                // Re-open by name rather than trusting a cached handle.
                report.recall_store = Some(name.clone());
                &mut report.recall
            }
            (Role::Params, NodeKind::Store { name }) if *name == params_store => {
                report.params_store = Some(name.clone());
                &mut report.params
            }
            (Role::Update, NodeKind::Send { .. }) => &mut report.update,
            (Role::UpdateBridge, NodeKind::Prepend { .. }) => &mut report.update_bridge,
            _ => continue,
        };
        if slot.is_some() {
            report.duplicated.push(role);
        } else {
            *slot = Some(node.id);
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::{probe_infrastructure, MIN_INFRASTRUCTURE_CHILDREN};
    use crate::host::{MemoryHost, PatchGraph};
    use crate::model::identity::InstanceIdentity;
    use crate::model::node::{Atom, NodeKind, NodeSpec, Role};

    fn populate(host: &mut MemoryHost, roles: [Option<Role>; 4]) {
        let root = host.root();
        let [recall, params, update, bridge] = roles;
        let kinds = [
            (NodeKind::Store { name: "test_recall".into() }, recall),
            (NodeKind::Store { name: "test".into() }, params),
            (NodeKind::Send { target: "---update".into() }, update),
            (
                NodeKind::Prepend {
                    args: vec![Atom::symbol("test")],
                },
                bridge,
            ),
        ];
        for (kind, role) in kinds {
            let mut spec = NodeSpec::new(kind);
            if let Some(role) = role {
                spec = spec.with_role(role);
            }
            host.create_node(root, spec);
        }
    }

    #[test]
    fn complete_when_every_role_is_tagged() {
        let mut host = MemoryHost::new();
        populate(
            &mut host,
            [
                Some(Role::Recall),
                Some(Role::Params),
                Some(Role::Update),
                Some(Role::UpdateBridge),
            ],
        );
        let identity = InstanceIdentity::new("test").unwrap();
        let report = probe_infrastructure(&host, host.root(), &identity);
        assert!(report.is_complete());
        let infra = report.infrastructure().expect("infrastructure");
        assert_eq!(infra.recall_store, "test_recall");
        assert_eq!(infra.params_store, "test");
    }

    #[test]
    fn right_count_with_wrong_tags_is_incomplete() {
        let mut host = MemoryHost::new();
        populate(
            &mut host,
            [
                Some(Role::Params),
                Some(Role::Recall),
                None,
                Some(Role::Update),
            ],
        );
        let identity = InstanceIdentity::new("test").unwrap();
        let report = probe_infrastructure(&host, host.root(), &identity);
        assert!(!report.is_complete());
        assert!(!report.has_recall());
        assert!(!report.has_params());
        assert!(!report.has_update());
        assert!(!report.has_bridge());
        assert!(report.infrastructure().is_none());
    }

    #[test]
    fn stores_of_another_instance_do_not_count() {
        let mut host = MemoryHost::new();
        populate(
            &mut host,
            [
                Some(Role::Recall),
                Some(Role::Params),
                Some(Role::Update),
                Some(Role::UpdateBridge),
            ],
        );
        let identity = InstanceIdentity::new("other").unwrap();
        let report = probe_infrastructure(&host, host.root(), &identity);
        assert!(!report.has_recall());
        assert!(!report.is_complete());
    }

    #[test]
    fn duplicated_role_is_incomplete() {
        let mut host = MemoryHost::new();
        let all = [
            Some(Role::Recall),
            Some(Role::Params),
            Some(Role::Update),
            Some(Role::UpdateBridge),
        ];
        populate(&mut host, all.clone());
        populate(&mut host, all);
        let identity = InstanceIdentity::new("test").unwrap();
        let report = probe_infrastructure(&host, host.root(), &identity);
        assert_eq!(report.duplicated.len(), 4);
        assert!(!report.is_complete());
    }

    #[test]
    fn small_containers_short_circuit() {
        let host = MemoryHost::new();
        let identity = InstanceIdentity::new("test").unwrap();
        let report = probe_infrastructure(&host, host.root(), &identity);
        assert!(report.child_count < MIN_INFRASTRUCTURE_CHILDREN);
        assert!(!report.is_complete());
    }
}
