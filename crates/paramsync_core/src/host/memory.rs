//! In-memory host document.
//!
//! # Responsibility
//! - Own an explicit node table, ordered container membership and an edge
//!   list, and implement `PatchGraph` over them.
//! - Evaluate messages synchronously along connections, emulating the node
//!   classes the synchronizer generates (store, unpack, bind, prepend,
//!   trigger, send) plus UI controls and display boxes.
//! - Delegate store primitives to a pluggable `StoreRegistry`.
//!
//! # Invariants
//! - Every node belongs to exactly one container.
//! - Removing a node removes all of its connections; removing a sub-patcher
//!   removes everything inside it.
//! - Trigger outlets fire right to left.
//! - Message delivery depth is bounded; deeper cascades are dropped and logged.

use crate::host::PatchGraph;
use crate::model::node::{
    Atom, Connection, ContainerId, Message, Node, NodeId, NodeKind, NodeSpec, TriggerOutlet,
};
use crate::model::params::ParamValue;
use crate::store::{MemoryStores, StoreRegistry, StoreResult};
use log::{debug, warn};
use std::collections::HashMap;
use uuid::Uuid;

const MAX_DELIVERY_DEPTH: usize = 256;

/// Message broadcast by a send node.
#[derive(Debug, Clone, PartialEq)]
pub struct Broadcast {
    pub target: String,
    pub message: Message,
}

/// Parameter descriptor received by a UI control.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControlDescriptor {
    pub short_name: Option<String>,
    pub parameter_type: Option<i64>,
    pub range: Vec<Atom>,
    pub initial: Vec<Atom>,
}

/// Runtime state of one UI control.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControlState {
    pub value: Option<ParamValue>,
    pub descriptor: ControlDescriptor,
}

#[derive(Debug, Clone)]
struct Slot {
    node: Node,
    container: ContainerId,
}

/// Host document kept entirely in memory.
pub struct MemoryHost<S = MemoryStores> {
    root: ContainerId,
    containers: HashMap<ContainerId, Vec<NodeId>>,
    nodes: HashMap<NodeId, Slot>,
    connections: Vec<Connection>,
    controls: HashMap<NodeId, ControlState>,
    displays: HashMap<NodeId, Vec<Atom>>,
    broadcasts: Vec<Broadcast>,
    stores: S,
}

impl MemoryHost<MemoryStores> {
    pub fn new() -> Self {
        Self::with_stores(MemoryStores::new())
    }
}

impl Default for MemoryHost<MemoryStores> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: StoreRegistry> MemoryHost<S> {
    /// Creates an empty document whose store nodes use `stores`.
    pub fn with_stores(stores: S) -> Self {
        let root = Uuid::new_v4();
        Self {
            root,
            containers: HashMap::from([(root, Vec::new())]),
            nodes: HashMap::new(),
            connections: Vec::new(),
            controls: HashMap::new(),
            displays: HashMap::new(),
            broadcasts: Vec::new(),
            stores,
        }
    }

    /// Adds a sub-patcher node scripted as `name` and returns its container.
    pub fn add_subpatcher(&mut self, parent: ContainerId, name: &str) -> ContainerId {
        let container = Uuid::new_v4();
        self.containers.insert(container, Vec::new());
        self.create_node(
            parent,
            NodeSpec::new(NodeKind::Subpatcher { container }).named(name),
        );
        container
    }

    /// Adds a UI control scripted as `name`.
    pub fn add_control(&mut self, container: ContainerId, name: &str, class: &str) -> NodeId {
        self.create_node(
            container,
            NodeSpec::new(NodeKind::Control {
                class: class.to_string(),
            })
            .named(name),
        )
    }

    /// Adds a display box scripted as `name`.
    pub fn add_display(&mut self, container: ContainerId, name: &str) -> NodeId {
        self.create_node(container, NodeSpec::new(NodeKind::Display).named(name))
    }

    pub fn control(&self, id: NodeId) -> Option<&ControlState> {
        self.controls.get(&id)
    }

    pub fn control_named(&self, container: ContainerId, name: &str) -> Option<&ControlState> {
        self.find_control(container, name)
            .and_then(|id| self.controls.get(&id))
    }

    /// Text currently shown by a display box.
    pub fn display_text(&self, id: NodeId) -> Option<&[Atom]> {
        self.displays.get(&id).map(Vec::as_slice)
    }

    /// Emulates a user gesture on control `name`: the control takes `value`
    /// and every bind node for it in the same container emits it.
    pub fn touch_control(&mut self, container: ContainerId, name: &str, value: ParamValue) {
        let Some(control) = self.find_control(container, name) else {
            warn!("event=control_touch module=host status=skipped reason=missing name={name}");
            return;
        };
        if let Some(state) = self.controls.get_mut(&control) {
            state.value = Some(value);
        }
        let binds: Vec<NodeId> = self
            .children(container)
            .into_iter()
            .filter(|node| matches!(&node.kind, NodeKind::Bind { key } if key == name))
            .map(|node| node.id)
            .collect();
        for bind in binds {
            self.emit(bind, 0, Message::new(vec![value.into()]), 0);
        }
    }

    pub fn broadcasts(&self) -> &[Broadcast] {
        &self.broadcasts
    }

    pub fn take_broadcasts(&mut self) -> Vec<Broadcast> {
        std::mem::take(&mut self.broadcasts)
    }

    /// Connections whose endpoints both live in `container`.
    pub fn connections_in(&self, container: ContainerId) -> Vec<Connection> {
        self.connections
            .iter()
            .filter(|edge| {
                self.container_of(edge.source) == Some(container)
                    && self.container_of(edge.target) == Some(container)
            })
            .copied()
            .collect()
    }

    pub fn stores(&self) -> &S {
        &self.stores
    }

    pub fn stores_mut(&mut self) -> &mut S {
        &mut self.stores
    }

    fn container_of(&self, id: NodeId) -> Option<ContainerId> {
        self.nodes.get(&id).map(|slot| slot.container)
    }

    fn find_control(&self, container: ContainerId, name: &str) -> Option<NodeId> {
        self.containers.get(&container)?.iter().copied().find(|id| {
            self.nodes.get(id).is_some_and(|slot| {
                slot.node.name.as_deref() == Some(name)
                    && matches!(slot.node.kind, NodeKind::Control { .. })
            })
        })
    }

    fn emit(&mut self, source: NodeId, outlet: usize, message: Message, depth: usize) {
        let targets: Vec<(NodeId, usize)> = self
            .connections
            .iter()
            .filter(|edge| edge.source == source && edge.outlet == outlet)
            .map(|edge| (edge.target, edge.inlet))
            .collect();
        for (target, inlet) in targets {
            self.deliver(target, inlet, message.clone(), depth + 1);
        }
    }

    fn deliver(&mut self, target: NodeId, inlet: usize, message: Message, depth: usize) {
        if depth > MAX_DELIVERY_DEPTH {
            warn!("event=deliver module=host status=dropped reason=depth_exceeded node={target}");
            return;
        }
        let Some(slot) = self.nodes.get(&target) else {
            return;
        };
        let kind = slot.node.kind.clone();
        let container = slot.container;

        let outputs = self.react(target, container, kind, inlet, &message);
        for (outlet, output) in outputs {
            self.emit(target, outlet, output, depth);
        }
    }

    fn react(
        &mut self,
        id: NodeId,
        container: ContainerId,
        kind: NodeKind,
        inlet: usize,
        message: &Message,
    ) -> Vec<(usize, Message)> {
        match kind {
            NodeKind::Store { name } => self.react_store(&name, message),
            NodeKind::Unpack { key } => {
                let store = match (message.selector(), message.args().first()) {
                    (Some("dictionary"), Some(Atom::Symbol(store))) => store.clone(),
                    _ => return Vec::new(),
                };
                match self.stores.get_entry(&store, &key) {
                    Ok(Some(value)) => vec![(0, Message::new(vec![value.into()]))],
                    Ok(None) => Vec::new(),
                    Err(err) => {
                        log_store_error("unpack", &store, &err);
                        Vec::new()
                    }
                }
            }
            NodeKind::Bind { key } => {
                let Some(control) = self.find_control(container, &key) else {
                    debug!("event=deliver module=host status=skipped reason=unbound key={key}");
                    return Vec::new();
                };
                let Some(value) = message.atoms().first().and_then(ParamValue::from_atom) else {
                    return Vec::new();
                };
                if let Some(state) = self.controls.get_mut(&control) {
                    state.value = Some(value);
                }
                vec![(0, Message::new(vec![value.into()]))]
            }
            NodeKind::Prepend { args } => vec![(0, message.prepended(&args))],
            NodeKind::Trigger { outlets } => outlets
                .iter()
                .enumerate()
                .rev()
                .map(|(outlet, behavior)| match behavior {
                    TriggerOutlet::Bang => (outlet, Message::bang()),
                    TriggerOutlet::List => (outlet, message.clone()),
                })
                .collect(),
            NodeKind::Send { target } => {
                self.broadcasts.push(Broadcast {
                    target,
                    message: message.clone(),
                });
                Vec::new()
            }
            NodeKind::Control { .. } => self.react_control(id, message),
            NodeKind::Display => {
                if message.selector() == Some("set") {
                    self.displays.insert(id, message.args().to_vec());
                }
                Vec::new()
            }
            NodeKind::Subpatcher { .. } => {
                debug!("event=deliver module=host status=skipped reason=subpatcher inlet={inlet}");
                Vec::new()
            }
        }
    }

    fn react_store(&mut self, name: &str, message: &Message) -> Vec<(usize, Message)> {
        let result: StoreResult<Vec<(usize, Message)>> = match message.selector() {
            Some("bang") => Ok(vec![(
                0,
                Message::with_selector("dictionary", [Atom::symbol(name)]),
            )]),
            Some("set") => match message.args() {
                [Atom::Symbol(key), value, ..] => match ParamValue::from_atom(value) {
                    Some(value) => self.stores.set_entry(name, key, value).map(|_| Vec::new()),
                    None => Ok(Vec::new()),
                },
                _ => Ok(Vec::new()),
            },
            Some("clear") => self.stores.clear(name).map(|_| Vec::new()),
            _ => Ok(Vec::new()),
        };
        result.unwrap_or_else(|err| {
            log_store_error("store_node", name, &err);
            Vec::new()
        })
    }

    fn react_control(&mut self, id: NodeId, message: &Message) -> Vec<(usize, Message)> {
        let Some(state) = self.controls.get_mut(&id) else {
            return Vec::new();
        };
        let args = message.args();
        match message.selector() {
            Some("_parameter_shortname") => {
                state.descriptor.short_name =
                    args.first().and_then(Atom::as_symbol).map(str::to_string);
                Vec::new()
            }
            Some("_parameter_type") => {
                state.descriptor.parameter_type = match args.first() {
                    Some(Atom::Int(kind)) => Some(*kind),
                    _ => None,
                };
                Vec::new()
            }
            Some("_parameter_range") => {
                state.descriptor.range = args.to_vec();
                Vec::new()
            }
            Some("_parameter_initial") => {
                state.descriptor.initial = args.to_vec();
                Vec::new()
            }
            Some("set") => {
                state.value = args.first().and_then(ParamValue::from_atom);
                Vec::new()
            }
            Some(_) => Vec::new(),
            None => match message.atoms().first().and_then(ParamValue::from_atom) {
                Some(value) => {
                    state.value = Some(value);
                    vec![(0, Message::new(vec![value.into()]))]
                }
                None => Vec::new(),
            },
        }
    }
}

fn log_store_error(stage: &str, store: &str, err: &dyn std::error::Error) {
    warn!("event=deliver module=host status=error stage={stage} store={store} error={err}");
}

impl<S: StoreRegistry> PatchGraph for MemoryHost<S> {
    fn root(&self) -> ContainerId {
        self.root
    }

    fn subcontainer(&self, parent: ContainerId, name: &str) -> Option<ContainerId> {
        self.containers.get(&parent)?.iter().find_map(|id| {
            let slot = self.nodes.get(id)?;
            match slot.node.kind {
                NodeKind::Subpatcher { container } if slot.node.name.as_deref() == Some(name) => {
                    Some(container)
                }
                _ => None,
            }
        })
    }

    fn children(&self, container: ContainerId) -> Vec<Node> {
        self.containers
            .get(&container)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.nodes.get(id).map(|slot| slot.node.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn child_count(&self, container: ContainerId) -> usize {
        self.containers.get(&container).map_or(0, Vec::len)
    }

    fn node(&self, id: NodeId) -> Option<Node> {
        self.nodes.get(&id).map(|slot| slot.node.clone())
    }

    fn create_node(&mut self, container: ContainerId, spec: NodeSpec) -> NodeId {
        let id = Uuid::new_v4();
        let Some(members) = self.containers.get_mut(&container) else {
            warn!("event=node_create module=host status=skipped reason=unknown_container container={container}");
            return id;
        };
        members.push(id);
        match spec.kind {
            NodeKind::Control { .. } => {
                self.controls.insert(id, ControlState::default());
            }
            NodeKind::Display => {
                self.displays.insert(id, Vec::new());
            }
            _ => {}
        }
        self.nodes.insert(
            id,
            Slot {
                node: Node {
                    id,
                    kind: spec.kind,
                    role: spec.role,
                    name: spec.name,
                    position: spec.position,
                },
                container,
            },
        );
        id
    }

    fn remove_node(&mut self, container: ContainerId, node: NodeId) {
        let Some(slot) = self.nodes.remove(&node) else {
            return;
        };
        if slot.container != container {
            debug!("event=node_remove module=host status=ok note=container_mismatch node={node}");
        }
        if let Some(members) = self.containers.get_mut(&slot.container) {
            members.retain(|id| *id != node);
        }
        self.connections
            .retain(|edge| edge.source != node && edge.target != node);
        self.controls.remove(&node);
        self.displays.remove(&node);

        if let NodeKind::Subpatcher { container: inner } = slot.node.kind {
            for child in self.containers.get(&inner).cloned().unwrap_or_default() {
                self.remove_node(inner, child);
            }
            self.containers.remove(&inner);
        }
    }

    fn connect(
        &mut self,
        container: ContainerId,
        source: NodeId,
        outlet: usize,
        target: NodeId,
        inlet: usize,
    ) {
        if !self.nodes.contains_key(&source) || !self.nodes.contains_key(&target) {
            warn!("event=connect module=host status=skipped reason=missing_endpoint container={container}");
            return;
        }
        let edge = Connection {
            source,
            outlet,
            target,
            inlet,
        };
        if !self.connections.contains(&edge) {
            self.connections.push(edge);
        }
    }

    fn is_connected(
        &self,
        _container: ContainerId,
        source: NodeId,
        outlet: usize,
        target: NodeId,
        inlet: usize,
    ) -> bool {
        self.connections.contains(&Connection {
            source,
            outlet,
            target,
            inlet,
        })
    }

    fn send(&mut self, node: NodeId, message: Message) {
        self.deliver(node, 0, message, 0);
    }
}

impl<S: StoreRegistry> StoreRegistry for MemoryHost<S> {
    fn clear(&mut self, name: &str) -> StoreResult<()> {
        self.stores.clear(name)
    }

    fn parse(&mut self, name: &str, text: &str) -> StoreResult<()> {
        self.stores.parse(name, text)
    }

    fn stringify(&self, name: &str) -> StoreResult<String> {
        self.stores.stringify(name)
    }

    fn get_entry(&self, name: &str, key: &str) -> StoreResult<Option<ParamValue>> {
        self.stores.get_entry(name, key)
    }

    fn set_entry(&mut self, name: &str, key: &str, value: ParamValue) -> StoreResult<()> {
        self.stores.set_entry(name, key, value)
    }
}
