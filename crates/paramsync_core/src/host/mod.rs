//! Host document boundary.
//!
//! # Responsibility
//! - Define the graph primitives the synchronizer consumes (`PatchGraph`).
//! - Combine graph and store primitives into one `Host` bound.
//! - Resolve container paths into container handles.
//!
//! # Invariants
//! - Graph primitives never fail; removing an absent node is a no-op.
//! - Message delivery is synchronous: when `send` returns, every downstream
//!   node reachable from the target has processed the message.

use crate::error::{SyncError, SyncResult};
use crate::model::identity::ContainerPath;
use crate::model::node::{ContainerId, Message, Node, NodeId, NodeSpec, Role};
use crate::store::StoreRegistry;

pub mod memory;

pub use memory::{Broadcast, ControlDescriptor, ControlState, MemoryHost};

/// Node/graph primitives of a host document.
pub trait PatchGraph {
    /// Top-level container of the document.
    fn root(&self) -> ContainerId;

    /// Container held by the sub-patcher node scripted as `name` in `parent`.
    fn subcontainer(&self, parent: ContainerId, name: &str) -> Option<ContainerId>;

    /// Direct children of `container`, in document order.
    fn children(&self, container: ContainerId) -> Vec<Node>;

    fn child_count(&self, container: ContainerId) -> usize {
        self.children(container).len()
    }

    fn node(&self, id: NodeId) -> Option<Node>;

    /// Child of `container` with scripting name `name`.
    fn find_named(&self, container: ContainerId, name: &str) -> Option<NodeId> {
        self.children(container)
            .into_iter()
            .find(|node| node.name.as_deref() == Some(name))
            .map(|node| node.id)
    }

    /// First child of `container` tagged with `role`.
    fn find_role(&self, container: ContainerId, role: &Role) -> Option<NodeId> {
        self.children(container)
            .into_iter()
            .find(|node| node.role.as_ref() == Some(role))
            .map(|node| node.id)
    }

    fn create_node(&mut self, container: ContainerId, spec: NodeSpec) -> NodeId;

    /// Removes `node` and its connections; absent nodes are ignored.
    fn remove_node(&mut self, container: ContainerId, node: NodeId);

    fn connect(
        &mut self,
        container: ContainerId,
        source: NodeId,
        outlet: usize,
        target: NodeId,
        inlet: usize,
    );

    fn is_connected(
        &self,
        container: ContainerId,
        source: NodeId,
        outlet: usize,
        target: NodeId,
        inlet: usize,
    ) -> bool;

    /// Fire-and-forget delivery to inlet 0 of `node`.
    fn send(&mut self, node: NodeId, message: Message);
}

/// Everything an instance needs from its host: graph plus stores.
pub trait Host: PatchGraph + StoreRegistry {}

impl<T: PatchGraph + StoreRegistry> Host for T {}

/// Walks `path` from the document root.
///
/// # Errors
/// - `Configuration` naming the first missing segment.
pub fn resolve_container<G: PatchGraph + ?Sized>(
    graph: &G,
    path: &ContainerPath,
) -> SyncResult<ContainerId> {
    let mut current = graph.root();
    let mut walked = ContainerPath::root();
    for segment in path.segments() {
        current = graph.subcontainer(current, segment).ok_or_else(|| {
            SyncError::configuration(format!(
                "sub-container `{segment}` not found under `{walked}` (path `{path}`)"
            ))
        })?;
        walked = walked.child(segment.as_str());
    }
    Ok(current)
}
