//! Infrastructure construction and teardown.
//!
//! # Responsibility
//! - Create recall store, params store, update bridge and update emitter for
//!   an instance when the probe reports them incomplete.
//! - Remove partially built infrastructure before rebuilding.
//!
//! # Invariants
//! - When the probe is complete, no graph mutation happens.
//! - Teardown removes every infrastructure-tagged child, whatever its kind.
//! - Creation order is recall, params, bridge, emitter.

use crate::config::SyncOptions;
use crate::host::PatchGraph;
use crate::model::identity::InstanceIdentity;
use crate::model::node::{
    Atom, ContainerId, Message, NodeKind, NodeSpec, Position, Role, IDENTITY_DISPLAY_NAME,
};
use crate::sync::probe::{probe_infrastructure, Infrastructure};
use log::{debug, info};

/// Result of `ensure_infrastructure`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfrastructureOutcome {
    pub infrastructure: Infrastructure,
    /// True when nodes were (re)created; chains wired to old nodes are stale.
    pub rebuilt: bool,
}

/// Removes every infrastructure-tagged child of `container`.
///
/// Returns the number of removed nodes.
pub fn clean_infrastructure<G: PatchGraph + ?Sized>(graph: &mut G, container: ContainerId) -> usize {
    let doomed: Vec<_> = graph
        .children(container)
        .into_iter()
        .filter(|node| node.role.as_ref().is_some_and(Role::is_infrastructure))
        .map(|node| node.id)
        .collect();
    for id in &doomed {
        graph.remove_node(container, *id);
    }
    if !doomed.is_empty() {
        info!(
            "event=infra_clean module=sync status=ok container={container} removed={}",
            doomed.len()
        );
    }
    doomed.len()
}

/// Ensures `container` holds complete infrastructure for `identity`.
pub fn ensure_infrastructure<G: PatchGraph + ?Sized>(
    graph: &mut G,
    container: ContainerId,
    identity: &InstanceIdentity,
    options: &SyncOptions,
) -> InfrastructureOutcome {
    let report = probe_infrastructure(&*graph, container, identity);
    if let Some(infrastructure) = report.infrastructure() {
        debug!("event=infra_ensure module=sync status=intact instance={identity}");
        return InfrastructureOutcome {
            infrastructure,
            rebuilt: false,
        };
    }

    info!(
        "event=infra_ensure module=sync status=rebuild instance={identity} has_recall={} has_params={} has_update={} has_bridge={} duplicated={}",
        report.has_recall(),
        report.has_params(),
        report.has_update(),
        report.has_bridge(),
        report.duplicated.len()
    );
    clean_infrastructure(graph, container);
    let infrastructure = build_infrastructure(graph, container, identity, options);
    InfrastructureOutcome {
        infrastructure,
        rebuilt: true,
    }
}

fn build_infrastructure<G: PatchGraph + ?Sized>(
    graph: &mut G,
    container: ContainerId,
    identity: &InstanceIdentity,
    options: &SyncOptions,
) -> Infrastructure {
    let layout = options.layout;
    let qualified = identity.qualified_name();
    let recall_store = identity.recall_store_name();
    let params_store = identity.params_store_name();
    let bottom = layout.origin_y + 6 * layout.row_height;

    if let Some(display) = graph.find_named(container, IDENTITY_DISPLAY_NAME) {
        graph.send(
            display,
            Message::with_selector("set", [Atom::symbol(qualified.as_str())]),
        );
    }

    let recall = graph.create_node(
        container,
        NodeSpec::new(NodeKind::Store {
            name: recall_store.clone(),
        })
        .with_role(Role::Recall)
        .at(Position::new(layout.origin_x, layout.origin_y)),
    );
    let params = graph.create_node(
        container,
        NodeSpec::new(NodeKind::Store {
            name: params_store.clone(),
        })
        .with_role(Role::Params)
        .at(Position::new(layout.origin_x + layout.column_width, bottom)),
    );
    let update_bridge = graph.create_node(
        container,
        NodeSpec::new(NodeKind::Prepend {
            args: vec![Atom::symbol(qualified.as_str())],
        })
        .with_role(Role::UpdateBridge)
        .at(Position::new(layout.origin_x, bottom - layout.row_height / 2)),
    );
    let update = graph.create_node(
        container,
        NodeSpec::new(NodeKind::Send {
            target: options.update_target.clone(),
        })
        .with_role(Role::Update)
        .at(Position::new(layout.origin_x, bottom)),
    );
    graph.connect(container, update_bridge, 0, update, 0);

    info!(
        "event=infra_build module=sync status=ok instance={identity} recall_store={recall_store} params_store={params_store}"
    );
    Infrastructure {
        recall,
        params,
        update,
        update_bridge,
        recall_store,
        params_store,
    }
}

#[cfg(test)]
mod tests {
    use super::{clean_infrastructure, ensure_infrastructure};
    use crate::config::SyncOptions;
    use crate::host::{MemoryHost, PatchGraph};
    use crate::model::identity::InstanceIdentity;
    use crate::model::node::{Atom, Role};

    #[test]
    fn builds_once_then_reuses() {
        let mut host = MemoryHost::new();
        let root = host.root();
        let identity = InstanceIdentity::new("test").unwrap();
        let options = SyncOptions::default();

        let first = ensure_infrastructure(&mut host, root, &identity, &options);
        assert!(first.rebuilt);
        assert_eq!(host.child_count(root), 4);
        assert!(host.is_connected(
            root,
            first.infrastructure.update_bridge,
            0,
            first.infrastructure.update,
            0
        ));

        let second = ensure_infrastructure(&mut host, root, &identity, &options);
        assert!(!second.rebuilt);
        assert_eq!(second.infrastructure, first.infrastructure);
        assert_eq!(host.child_count(root), 4);
    }

    #[test]
    fn partial_infrastructure_is_replaced() {
        let mut host = MemoryHost::new();
        let root = host.root();
        let identity = InstanceIdentity::new("test").unwrap();
        let options = SyncOptions::default();

        let first = ensure_infrastructure(&mut host, root, &identity, &options);
        host.remove_node(root, first.infrastructure.update);

        let second = ensure_infrastructure(&mut host, root, &identity, &options);
        assert!(second.rebuilt);
        assert_eq!(host.child_count(root), 4);
        assert!(host.node(first.infrastructure.recall).is_none());
    }

    #[test]
    fn identity_display_shows_qualified_name() {
        let mut host = MemoryHost::new();
        let root = host.root();
        let display = host.add_display(root, "id");
        let identity =
            InstanceIdentity::with_prefix("test", Some("ABCDEFGH_".to_string())).unwrap();

        ensure_infrastructure(&mut host, root, &identity, &SyncOptions::default());
        assert_eq!(
            host.display_text(display),
            Some(&[Atom::symbol("ABCDEFGH_test")][..])
        );
    }

    #[test]
    fn clean_leaves_untagged_nodes() {
        let mut host = MemoryHost::new();
        let root = host.root();
        let dial = host.add_control(root, "dial", "live.dial");
        let identity = InstanceIdentity::new("test").unwrap();
        ensure_infrastructure(&mut host, root, &identity, &SyncOptions::default());

        assert_eq!(clean_infrastructure(&mut host, root), 4);
        assert_eq!(clean_infrastructure(&mut host, root), 0);
        assert!(host.node(dial).is_some());
        assert!(host.find_role(root, &Role::Recall).is_none());
    }
}
