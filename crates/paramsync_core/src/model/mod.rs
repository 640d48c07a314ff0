//! Domain model for parameter instances and the patch graph they live in.
//!
//! # Responsibility
//! - Define node, role and message shapes shared by host adapters and the
//!   synchronizer.
//! - Define scalar parameter values and the typed-record contract.
//! - Define instance naming and container addressing.
//!
//! # Invariants
//! - Every synchronizer-created node carries an explicit `Role`.
//! - Store names are derived from `InstanceIdentity` only.

pub mod identity;
pub mod node;
pub mod params;
