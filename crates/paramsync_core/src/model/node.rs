//! Patch graph node model.
//!
//! # Responsibility
//! - Describe the nodes, messages and connections the synchronizer reasons
//!   about, independent of any concrete host document.
//! - Attach an explicit `Role` to every node the synchronizer creates so later
//!   lookups never depend on parsing scripting names.
//!
//! # Invariants
//! - `NodeId` values are unique across the whole document, not per container.
//! - A node's `role` is assigned at creation time and never changes.
//! - Scripting names derived from roles are only used by host adapters.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for one node in the host document.
pub type NodeId = Uuid;

/// Stable identifier for one container (patcher or sub-patcher).
pub type ContainerId = Uuid;

/// Scripting name of the placeholder node that displays the instance name.
pub const IDENTITY_DISPLAY_NAME: &str = "id";

/// One element of a host message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Atom {
    Bool(bool),
    Int(i64),
    Float(f64),
    Symbol(String),
}

impl Atom {
    pub fn symbol(value: impl Into<String>) -> Self {
        Self::Symbol(value.into())
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Self::Symbol(value) => Some(value.as_str()),
            _ => None,
        }
    }
}

/// Host message: a flat list of atoms, optionally led by a selector symbol.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message(pub Vec<Atom>);

impl Message {
    pub fn new(atoms: Vec<Atom>) -> Self {
        Self(atoms)
    }

    /// The argument-less trigger message.
    pub fn bang() -> Self {
        Self(vec![Atom::symbol("bang")])
    }

    /// Builds `selector arg1 arg2 ...`.
    pub fn with_selector(selector: &str, args: impl IntoIterator<Item = Atom>) -> Self {
        let mut atoms = vec![Atom::symbol(selector)];
        atoms.extend(args);
        Self(atoms)
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.0
    }

    /// Leading symbol, when the message has one.
    pub fn selector(&self) -> Option<&str> {
        self.0.first().and_then(Atom::as_symbol)
    }

    /// Atoms after the leading selector.
    pub fn args(&self) -> &[Atom] {
        if self.selector().is_some() {
            &self.0[1..]
        } else {
            &self.0
        }
    }

    pub fn is_bang(&self) -> bool {
        self.0.len() == 1 && self.selector() == Some("bang")
    }

    /// Returns `prefix ++ self`.
    pub fn prepended(&self, prefix: &[Atom]) -> Self {
        let mut atoms = prefix.to_vec();
        atoms.extend(self.0.iter().cloned());
        Self(atoms)
    }
}

/// Output behavior of one trigger outlet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerOutlet {
    /// Emits `bang` regardless of input.
    Bang,
    /// Forwards the input message unchanged.
    List,
}

/// Node behavior classes the synchronizer creates or inspects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    /// Key-value store node bound to the store registry entry `name`.
    Store { name: String },
    /// Extracts one key from a store reference message.
    Unpack { key: String },
    /// Routes values into and out of the UI control named `key`.
    Bind { key: String },
    /// Prepends fixed atoms to every incoming message.
    Prepend { args: Vec<Atom> },
    /// Fans one input out to several outlets, right to left.
    Trigger { outlets: Vec<TriggerOutlet> },
    /// Broadcasts every incoming message to `target` listeners.
    Send { target: String },
    /// User-facing UI control (dial, slider, toggle, menu...).
    Control { class: String },
    /// Message box used to display text.
    Display,
    /// Nested container.
    Subpatcher { container: ContainerId },
}

impl NodeKind {
    /// Host class name used by adapters when instantiating the node.
    pub fn class_name(&self) -> &str {
        match self {
            Self::Store { .. } => "dict",
            Self::Unpack { .. } => "dict.unpack",
            Self::Bind { .. } => "pvar",
            Self::Prepend { .. } => "prepend",
            Self::Trigger { .. } => "t",
            Self::Send { .. } => "s",
            Self::Control { class } => class.as_str(),
            Self::Display => "message",
            Self::Subpatcher { .. } => "p",
        }
    }

    pub fn store_name(&self) -> Option<&str> {
        match self {
            Self::Store { name } => Some(name.as_str()),
            _ => None,
        }
    }
}

/// Position of one link inside a per-key chain, in signal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainLink {
    Unpack,
    Bind,
    TagPrepend,
    SetPrepend,
    Splitter,
}

impl ChainLink {
    pub const ALL: [ChainLink; 5] = [
        ChainLink::Unpack,
        ChainLink::Bind,
        ChainLink::TagPrepend,
        ChainLink::SetPrepend,
        ChainLink::Splitter,
    ];

    /// Scripting-name suffix appended to the parameter key.
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Unpack => "_unpack",
            Self::Bind => "_pvar",
            Self::TagPrepend => "_prepend",
            Self::SetPrepend => "_prependSet",
            Self::Splitter => "_tbl",
        }
    }

    /// Row used for cosmetic placement.
    pub fn row(self) -> i32 {
        match self {
            Self::Unpack => 1,
            Self::Bind => 2,
            Self::TagPrepend => 3,
            Self::SetPrepend => 4,
            Self::Splitter => 5,
        }
    }
}

/// Structural role of a node created by the synchronizer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Role {
    /// Write-side store node.
    Recall,
    /// Read-side store node.
    Params,
    /// Update emitter.
    Update,
    /// Tags update events with the instance name before the emitter.
    UpdateBridge,
    /// One link of the chain for `key`.
    Chain { key: String, link: ChainLink },
}

impl Role {
    pub fn chain(key: impl Into<String>, link: ChainLink) -> Self {
        Self::Chain {
            key: key.into(),
            link,
        }
    }

    pub fn is_infrastructure(&self) -> bool {
        !matches!(self, Self::Chain { .. })
    }

    /// Scripting name a host adapter should assign for this role.
    pub fn scripting_name(&self) -> String {
        match self {
            Self::Recall => "recall".to_string(),
            Self::Params => "params".to_string(),
            Self::Update => "update".to_string(),
            Self::UpdateBridge => "prependUpdate".to_string(),
            Self::Chain { key, link } => format!("{key}{}", link.suffix()),
        }
    }

    /// Recovers a role from a scripting name written by `scripting_name`.
    ///
    /// Chain names are ambiguous without the declared key set, so only keys in
    /// `keys` are recognized.
    pub fn from_scripting_name<'a>(
        name: &str,
        keys: impl IntoIterator<Item = &'a str>,
    ) -> Option<Self> {
        match name {
            "recall" => return Some(Self::Recall),
            "params" => return Some(Self::Params),
            "update" => return Some(Self::Update),
            "prependUpdate" => return Some(Self::UpdateBridge),
            _ => {}
        }
        let keys: Vec<&str> = keys.into_iter().collect();
        for link in ChainLink::ALL {
            if let Some(key) = name.strip_suffix(link.suffix()) {
                if keys.contains(&key) {
                    return Some(Self::chain(key, link));
                }
            }
        }
        None
    }
}

/// Cosmetic document coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Snapshot of one node in a container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub role: Option<Role>,
    /// Scripting name used for lookups by name (controls, display nodes).
    pub name: Option<String>,
    pub position: Position,
}

/// Creation request for one node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSpec {
    pub kind: NodeKind,
    pub role: Option<Role>,
    pub name: Option<String>,
    pub position: Position,
}

impl NodeSpec {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            role: None,
            name: None,
            position: Position::default(),
        }
    }

    /// Tags the node with `role`; the scripting name follows the role.
    pub fn with_role(mut self, role: Role) -> Self {
        self.name = Some(role.scripting_name());
        self.role = Some(role);
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn at(mut self, position: Position) -> Self {
        self.position = position;
        self
    }
}

/// Directed, port-indexed connection between two nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection {
    pub source: NodeId,
    pub outlet: usize,
    pub target: NodeId,
    pub inlet: usize,
}

#[cfg(test)]
mod tests {
    use super::{Atom, ChainLink, Message, Node, NodeKind, Position, Role};
    use uuid::Uuid;

    #[test]
    fn scripting_names_round_trip_for_declared_keys() {
        let keys = ["dial", "menu"];
        for link in ChainLink::ALL {
            let role = Role::chain("dial", link);
            let name = role.scripting_name();
            assert_eq!(
                Role::from_scripting_name(&name, keys),
                Some(role),
                "name `{name}` should map back"
            );
        }
        assert_eq!(
            Role::from_scripting_name("prependUpdate", keys),
            Some(Role::UpdateBridge)
        );
    }

    #[test]
    fn scripting_names_ignore_undeclared_keys() {
        assert_eq!(Role::from_scripting_name("other_pvar", ["dial"]), None);
        assert_eq!(Role::from_scripting_name("dial", ["dial"]), None);
    }

    #[test]
    fn message_splits_selector_and_args() {
        let message = Message::with_selector("set", [Atom::symbol("dial"), Atom::Int(3)]);
        assert_eq!(message.selector(), Some("set"));
        assert_eq!(message.args(), &[Atom::symbol("dial"), Atom::Int(3)]);
        assert!(!message.is_bang());
        assert!(Message::bang().is_bang());

        let bare = Message::new(vec![Atom::Int(7)]);
        assert_eq!(bare.selector(), None);
        assert_eq!(bare.args(), &[Atom::Int(7)]);
    }

    #[test]
    fn prepend_keeps_order() {
        let message = Message::new(vec![Atom::Int(1)]).prepended(&[Atom::symbol("dial")]);
        assert_eq!(message.atoms(), &[Atom::symbol("dial"), Atom::Int(1)]);
    }

    #[test]
    fn control_node_serializes_with_its_class() {
        let node = Node {
            id: Uuid::new_v4(),
            kind: NodeKind::Control {
                class: "live.dial".to_string(),
            },
            role: None,
            name: Some("dial".to_string()),
            position: Position::new(10, 20),
        };

        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(value["kind"]["type"], "control");
        assert_eq!(value["kind"]["class"], "live.dial");

        let back: Node = serde_json::from_value(value).unwrap();
        assert_eq!(back, node);
        assert_eq!(back.kind.class_name(), "live.dial");
    }

    #[test]
    fn chain_role_serializes_with_key_and_link() {
        let role = Role::chain("dial", ChainLink::Bind);
        let value = serde_json::to_value(&role).unwrap();
        assert_eq!(value["role"], "chain");
        assert_eq!(value["key"], "dial");
        let back: Role = serde_json::from_value(value).unwrap();
        assert_eq!(back, role);
    }
}
