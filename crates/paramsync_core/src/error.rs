//! Error taxonomy for instance construction and store access.
//!
//! # Invariants
//! - `Configuration` is only raised while resolving targets (containers,
//!   identifiers, control descriptors), before any graph mutation.
//! - `State` is raised when an operation runs against an instance whose
//!   infrastructure references are absent.
//! - No variant is retried internally.

use crate::store::StoreError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug)]
pub enum SyncError {
    /// Target container, identifier or descriptor cannot be resolved.
    Configuration(String),
    /// Infrastructure references are absent.
    State(String),
    /// Record does not serialize to a flat object of scalar values.
    InvalidRecord(String),
    /// JSON encode/decode failure between a typed record and store text.
    Codec(serde_json::Error),
    /// Store backend failure.
    Store(StoreError),
}

impl SyncError {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub(crate) fn state(message: impl Into<String>) -> Self {
        Self::State(message.into())
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    pub fn is_state(&self) -> bool {
        matches!(self, Self::State(_))
    }
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration(message) => write!(f, "configuration error: {message}"),
            Self::State(message) => write!(f, "state error: {message}"),
            Self::InvalidRecord(message) => write!(f, "invalid parameter record: {message}"),
            Self::Codec(err) => write!(f, "parameter codec error: {err}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SyncError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Codec(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::Configuration(_) | Self::State(_) | Self::InvalidRecord(_) => None,
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(value: serde_json::Error) -> Self {
        Self::Codec(value)
    }
}

impl From<StoreError> for SyncError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}
