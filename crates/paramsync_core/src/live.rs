//! Live parameter exposure for UI controls.
//!
//! # Responsibility
//! - Describe a control's automation metadata (short name, kind, range,
//!   initial value).
//! - Deliver it through the four descriptor messages controls understand.
//!
//! # Invariants
//! - Descriptors are validated and targets resolved before any message is
//!   sent; failures are `Configuration` errors.
//! - Messages go out in order: short name, type, range, initial.

use crate::error::{SyncError, SyncResult};
use crate::host::PatchGraph;
use crate::model::node::{Atom, ContainerId, Message, NodeId, NodeKind};
use log::info;
use serde::{Deserialize, Serialize};

pub const SHORT_NAME_SELECTOR: &str = "_parameter_shortname";
pub const TYPE_SELECTOR: &str = "_parameter_type";
pub const RANGE_SELECTOR: &str = "_parameter_range";
pub const INITIAL_SELECTOR: &str = "_parameter_initial";

/// Parameter kind understood by controls; the discriminant is the wire code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterMode {
    Int = 0,
    Float = 1,
    Enum = 2,
}

impl ParameterMode {
    pub fn code(self) -> i64 {
        self as i64
    }
}

/// Control to configure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlTarget {
    Node(NodeId),
    /// Child of `container` with scripting name `name`.
    Named { container: ContainerId, name: String },
}

impl ControlTarget {
    pub fn named(container: ContainerId, name: impl Into<String>) -> Self {
        Self::Named {
            container,
            name: name.into(),
        }
    }

    fn resolve<G: PatchGraph + ?Sized>(&self, graph: &G) -> SyncResult<NodeId> {
        let (id, label) = match self {
            Self::Node(id) => (Some(*id), id.to_string()),
            Self::Named { container, name } => (graph.find_named(*container, name), name.clone()),
        };
        let node = id
            .and_then(|id| graph.node(id))
            .ok_or_else(|| SyncError::configuration(format!("control `{label}` not found")))?;
        match node.kind {
            NodeKind::Control { .. } => Ok(node.id),
            other => Err(SyncError::configuration(format!(
                "`{label}` is a `{}`, not a UI control",
                other.class_name()
            ))),
        }
    }
}

/// Automation metadata for one control.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveParameter {
    pub name: String,
    pub min: f64,
    pub max: f64,
    /// Initial value; an index into `enums` in enum mode.
    pub default: f64,
    pub mode: ParameterMode,
    pub enums: Vec<String>,
}

impl LiveParameter {
    pub fn new(
        name: impl Into<String>,
        min: f64,
        max: f64,
        default: f64,
        mode: ParameterMode,
    ) -> Self {
        Self {
            name: name.into(),
            min,
            max,
            default,
            mode,
            enums: Vec::new(),
        }
    }

    /// Enum-mode descriptor over `labels`; `default` is a label index.
    pub fn with_enums<I, S>(name: impl Into<String>, labels: I, default: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let enums: Vec<String> = labels.into_iter().map(Into::into).collect();
        let max = enums.len().saturating_sub(1) as f64;
        Self {
            name: name.into(),
            min: 0.0,
            max,
            default: default as f64,
            mode: ParameterMode::Enum,
            enums,
        }
    }

    /// # Errors
    /// - `Configuration` for an empty name, a non-finite or inverted range,
    ///   enum mode without labels, or an enum default outside the labels.
    pub fn validate(&self) -> SyncResult<()> {
        if self.name.trim().is_empty() {
            return Err(SyncError::configuration("live parameter name cannot be empty"));
        }
        if ![self.min, self.max, self.default].iter().all(|value| value.is_finite()) {
            return Err(SyncError::configuration(format!(
                "live parameter `{}` has a non-finite bound or default",
                self.name
            )));
        }
        if self.mode == ParameterMode::Enum {
            if self.enums.is_empty() {
                return Err(SyncError::configuration(format!(
                    "enum parameter `{}` has no labels",
                    self.name
                )));
            }
            let index = self.default;
            if index < 0.0 || index.fract() != 0.0 || index as usize >= self.enums.len() {
                return Err(SyncError::configuration(format!(
                    "enum parameter `{}` default {} is outside its {} labels",
                    self.name,
                    self.default,
                    self.enums.len()
                )));
            }
            return Ok(());
        }
        if self.min > self.max {
            return Err(SyncError::configuration(format!(
                "live parameter `{}` has min {} above max {}",
                self.name, self.min, self.max
            )));
        }
        Ok(())
    }

    /// Descriptor messages in delivery order.
    pub fn messages(&self) -> [Message; 4] {
        let number = |value: f64| match self.mode {
            ParameterMode::Float => Atom::Float(value),
            ParameterMode::Int | ParameterMode::Enum => Atom::Int(value.round() as i64),
        };
        let range: Vec<Atom> = match self.mode {
            ParameterMode::Enum => self.enums.iter().map(|label| Atom::symbol(label.as_str())).collect(),
            _ => vec![number(self.min), number(self.max)],
        };
        [
            Message::with_selector(SHORT_NAME_SELECTOR, [Atom::symbol(self.name.as_str())]),
            Message::with_selector(TYPE_SELECTOR, [Atom::Int(self.mode.code())]),
            Message::with_selector(RANGE_SELECTOR, range),
            Message::with_selector(INITIAL_SELECTOR, [number(self.default)]),
        ]
    }
}

/// Configures the control at `target` with `parameter`.
///
/// Returns the configured control.
///
/// # Errors
/// - `Configuration` when the descriptor is inconsistent or the target does
///   not resolve to a UI control.
pub fn set_live_parameter<G: PatchGraph + ?Sized>(
    graph: &mut G,
    target: &ControlTarget,
    parameter: &LiveParameter,
) -> SyncResult<NodeId> {
    parameter.validate()?;
    let control = target.resolve(&*graph)?;
    for message in parameter.messages() {
        graph.send(control, message);
    }
    info!(
        "event=live_parameter module=live status=ok control={control} name={} mode={:?}",
        parameter.name, parameter.mode
    );
    Ok(control)
}
