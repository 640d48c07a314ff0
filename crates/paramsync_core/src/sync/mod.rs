//! Graph synchronization for parameter instances.
//!
//! # Responsibility
//! - Negotiate namespaces (`namespace`).
//! - Probe, build and tear down per-instance infrastructure (`probe`,
//!   `infra`).
//! - Keep per-key chains complete (`chains`).
//! - Move parameter sets in and out of the stores (`bridge`).
//!
//! Construction order: namespace -> probe -> infra -> chains -> bridge.

pub mod bridge;
pub mod chains;
pub mod infra;
pub mod namespace;
pub mod probe;

pub use bridge::StoreBridge;
pub use chains::{
    build_chains, clean_parameters, ensure_parameters, parameters_exist, ChainNodes,
};
pub use infra::{clean_infrastructure, ensure_infrastructure, InfrastructureOutcome};
pub use namespace::{
    find_existing_prefix, generate_prefix, resolve_prefix, PrefixSource, RandomPrefixSource,
    SequencePrefixSource,
};
pub use probe::{probe_infrastructure, Infrastructure, ProbeReport, MIN_INFRASTRUCTURE_CHILDREN};
