//! Parameter synchronization core.
//!
//! Keeps a typed parameter record in sync with a recall store, a params store
//! and a generated per-key routing graph inside a host document.

pub mod config;
pub mod db;
pub mod error;
pub mod host;
pub mod live;
pub mod logging;
pub mod model;
pub mod service;
pub mod store;
pub mod sync;

pub use config::{LayoutConfig, LogConfig, SyncOptions, DEFAULT_UPDATE_TARGET};
pub use error::{SyncError, SyncResult};
pub use host::{resolve_container, Host, MemoryHost, PatchGraph};
pub use live::{set_live_parameter, ControlTarget, LiveParameter, ParameterMode};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::identity::{ContainerPath, InstanceIdentity};
pub use model::node::{
    Atom, ChainLink, ContainerId, Message, Node, NodeId, NodeKind, NodeSpec, Role,
};
pub use model::params::{ParamValue, ParameterSet};
pub use service::ParametersUi;
pub use store::{MemoryStores, SqliteStoreRegistry, StoreError, StoreRegistry, StoreResult};
pub use sync::{PrefixSource, RandomPrefixSource, SequencePrefixSource};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
