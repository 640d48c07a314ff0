//! Per-key chain synchronization.
//!
//! # Responsibility
//! - Detect whether every declared key has a complete, fully wired chain.
//! - Rebuild all chains of the key set when any one of them is not.
//!
//! # Invariants
//! - A key is satisfied only when all five chain links exist and every edge
//!   of the chain is present.
//! - Rebuild is all-or-nothing: chains of every key in the set are removed
//!   before any chain is created.
//! - Chain order (and thus layout) follows key order.
//!
//! # Wiring
//! recall store -> unpack -> bind -> tag prepend -> set prepend -> splitter;
//! splitter outlet 1 -> params store, splitter outlet 0 -> update bridge.

use crate::config::LayoutConfig;
use crate::host::PatchGraph;
use crate::model::node::{
    Atom, ChainLink, ContainerId, NodeId, NodeKind, NodeSpec, Position, Role, TriggerOutlet,
};
use crate::sync::probe::Infrastructure;
use log::{debug, info};

/// Splitter outlet wired to the update bridge.
const UPDATE_OUTLET: usize = 0;
/// Splitter outlet wired to the params store.
const PARAMS_OUTLET: usize = 1;

/// Chain links found for one key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainNodes {
    pub unpack: Option<NodeId>,
    pub bind: Option<NodeId>,
    pub tag_prepend: Option<NodeId>,
    pub set_prepend: Option<NodeId>,
    pub splitter: Option<NodeId>,
}

impl ChainNodes {
    /// Looks up every link of `key` by role.
    pub fn find<G: PatchGraph + ?Sized>(graph: &G, container: ContainerId, key: &str) -> Self {
        let lookup = |link| graph.find_role(container, &Role::chain(key, link));
        Self {
            unpack: lookup(ChainLink::Unpack),
            bind: lookup(ChainLink::Bind),
            tag_prepend: lookup(ChainLink::TagPrepend),
            set_prepend: lookup(ChainLink::SetPrepend),
            splitter: lookup(ChainLink::Splitter),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.bind.is_some()
            && self.unpack.is_some()
            && self.tag_prepend.is_some()
            && self.set_prepend.is_some()
            && self.splitter.is_some()
    }

    pub fn present(&self) -> impl Iterator<Item = NodeId> + '_ {
        [
            self.unpack,
            self.bind,
            self.tag_prepend,
            self.set_prepend,
            self.splitter,
        ]
        .into_iter()
        .flatten()
    }

    /// Every edge this chain must have, as `(source, outlet, target, inlet)`.
    fn expected_edges(&self, infra: &Infrastructure) -> Option<[(NodeId, usize, NodeId, usize); 7]> {
        let unpack = self.unpack?;
        let bind = self.bind?;
        let tag_prepend = self.tag_prepend?;
        let set_prepend = self.set_prepend?;
        let splitter = self.splitter?;
        Some([
            (infra.recall, 0, unpack, 0),
            (unpack, 0, bind, 0),
            (bind, 0, tag_prepend, 0),
            (tag_prepend, 0, set_prepend, 0),
            (set_prepend, 0, splitter, 0),
            (splitter, PARAMS_OUTLET, infra.params, 0),
            (splitter, UPDATE_OUTLET, infra.update_bridge, 0),
        ])
    }

    pub fn is_wired<G: PatchGraph + ?Sized>(
        &self,
        graph: &G,
        container: ContainerId,
        infra: &Infrastructure,
    ) -> bool {
        self.expected_edges(infra).is_some_and(|edges| {
            edges
                .iter()
                .all(|&(source, outlet, target, inlet)| {
                    graph.is_connected(container, source, outlet, target, inlet)
                })
        })
    }
}

/// Returns whether every key has a complete, wired chain.
pub fn parameters_exist<'a, G: PatchGraph + ?Sized>(
    graph: &G,
    container: ContainerId,
    keys: impl IntoIterator<Item = &'a str>,
    infra: &Infrastructure,
) -> bool {
    keys.into_iter().all(|key| {
        let chain = ChainNodes::find(graph, container, key);
        let satisfied = chain.is_complete() && chain.is_wired(graph, container, infra);
        if !satisfied {
            debug!("event=chain_check module=sync status=missing key={key}");
        }
        satisfied
    })
}

/// Removes every chain link of every key in `keys`.
///
/// Returns the number of removed nodes.
pub fn clean_parameters<'a, G: PatchGraph + ?Sized>(
    graph: &mut G,
    container: ContainerId,
    keys: impl IntoIterator<Item = &'a str>,
) -> usize {
    let mut removed = 0;
    for key in keys {
        // Duplicates left by an interrupted build are removed too.
        let doomed: Vec<NodeId> = graph
            .children(container)
            .into_iter()
            .filter(|node| matches!(&node.role, Some(Role::Chain { key: owner, .. }) if owner == key))
            .map(|node| node.id)
            .collect();
        for id in &doomed {
            graph.remove_node(container, *id);
        }
        removed += doomed.len();
    }
    if removed > 0 {
        info!("event=chain_clean module=sync status=ok container={container} removed={removed}");
    }
    removed
}

/// Creates and wires one chain per key, in order.
pub fn build_chains<'a, G: PatchGraph + ?Sized>(
    graph: &mut G,
    container: ContainerId,
    keys: impl IntoIterator<Item = &'a str>,
    infra: &Infrastructure,
    layout: &LayoutConfig,
) -> usize {
    let mut built = 0;
    for (column, key) in (0..).zip(keys) {
        build_chain(graph, container, key, infra, layout, column);
        built += 1;
    }
    info!("event=chain_build module=sync status=ok container={container} chains={built}");
    built
}

fn build_chain<G: PatchGraph + ?Sized>(
    graph: &mut G,
    container: ContainerId,
    key: &str,
    infra: &Infrastructure,
    layout: &LayoutConfig,
    column: i32,
) {
    let x = layout.origin_x + layout.column_width * column;
    let mut create = |link: ChainLink, kind: NodeKind| {
        graph.create_node(
            container,
            NodeSpec::new(kind)
                .with_role(Role::chain(key, link))
                .at(Position::new(x, layout.origin_y + layout.row_height * link.row())),
        )
    };

    let unpack = create(ChainLink::Unpack, NodeKind::Unpack { key: key.to_string() });
    let bind = create(ChainLink::Bind, NodeKind::Bind { key: key.to_string() });
    let tag_prepend = create(
        ChainLink::TagPrepend,
        NodeKind::Prepend {
            args: vec![Atom::symbol(key)],
        },
    );
    let set_prepend = create(
        ChainLink::SetPrepend,
        NodeKind::Prepend {
            args: vec![Atom::symbol("set")],
        },
    );
    let splitter = create(
        ChainLink::Splitter,
        NodeKind::Trigger {
            outlets: vec![TriggerOutlet::Bang, TriggerOutlet::List],
        },
    );

    graph.connect(container, infra.recall, 0, unpack, 0);
    graph.connect(container, unpack, 0, bind, 0);
    graph.connect(container, bind, 0, tag_prepend, 0);
    graph.connect(container, tag_prepend, 0, set_prepend, 0);
    graph.connect(container, set_prepend, 0, splitter, 0);
    graph.connect(container, splitter, PARAMS_OUTLET, infra.params, 0);
    graph.connect(container, splitter, UPDATE_OUTLET, infra.update_bridge, 0);
}

/// Ensures every key has a chain; rebuilds all of them when any is missing or
/// when `force` is set.
///
/// `stale_keys` are cleaned along with `keys` on rebuild, so chains of keys
/// dropped from the set do not linger. Returns whether a rebuild happened.
pub fn ensure_parameters<G: PatchGraph + ?Sized>(
    graph: &mut G,
    container: ContainerId,
    keys: &[String],
    stale_keys: &[String],
    infra: &Infrastructure,
    layout: &LayoutConfig,
    force: bool,
) -> bool {
    let key_iter = || keys.iter().map(String::as_str);
    if !force && parameters_exist(&*graph, container, key_iter(), infra) {
        debug!("event=chain_ensure module=sync status=intact keys={}", keys.len());
        return false;
    }

    info!(
        "event=chain_ensure module=sync status=rebuild keys={} forced={force}",
        keys.len()
    );
    clean_parameters(
        graph,
        container,
        key_iter().chain(
            stale_keys
                .iter()
                .map(String::as_str)
                .filter(|stale| !keys.iter().any(|key| key == stale)),
        ),
    );
    build_chains(graph, container, key_iter(), infra, layout);
    true
}
