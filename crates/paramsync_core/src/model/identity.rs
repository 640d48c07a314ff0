//! Instance identity and container addressing.
//!
//! # Invariants
//! - Params store name is `prefix + base_id`; recall store name is
//!   `prefix + base_id + "_recall"`. Both always share one prefix.
//! - Generated prefixes are eight uppercase alphanumerics followed by `_`.

use crate::error::{SyncError, SyncResult};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::{Display, Formatter};

/// Suffix distinguishing the recall store from the params store.
pub const RECALL_SUFFIX: &str = "_recall";
/// Length of the random token in a generated prefix.
pub const PREFIX_TOKEN_LEN: usize = 8;
/// Separator appended after a generated token.
pub const PREFIX_SEPARATOR: char = '_';

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.\-]+$").expect("valid identifier regex"));
static GENERATED_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z0-9]{8}_$").expect("valid prefix regex"));

/// Checks that `value` can be used as a store name fragment or scripting name.
pub fn validate_identifier(value: &str, what: &str) -> SyncResult<()> {
    if IDENTIFIER_RE.is_match(value) {
        Ok(())
    } else {
        Err(SyncError::configuration(format!(
            "{what} `{value}` must be non-empty and use only [A-Za-z0-9_.-]"
        )))
    }
}

/// Returns whether `prefix` has the shape produced by prefix generation.
pub fn is_generated_prefix(prefix: &str) -> bool {
    GENERATED_PREFIX_RE.is_match(prefix)
}

/// Naming identity of one parameter instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceIdentity {
    base_id: String,
    unique_prefix: Option<String>,
}

impl InstanceIdentity {
    /// Creates an identity without a prefix.
    pub fn new(base_id: impl Into<String>) -> SyncResult<Self> {
        Self::with_prefix(base_id, None)
    }

    pub fn with_prefix(base_id: impl Into<String>, prefix: Option<String>) -> SyncResult<Self> {
        let base_id = base_id.into();
        validate_identifier(&base_id, "base id")?;
        if let Some(prefix) = prefix.as_deref().filter(|value| !value.is_empty()) {
            validate_identifier(prefix, "namespace prefix")?;
        }
        Ok(Self {
            base_id,
            unique_prefix: prefix,
        })
    }

    pub fn base_id(&self) -> &str {
        &self.base_id
    }

    pub fn unique_prefix(&self) -> Option<&str> {
        self.unique_prefix.as_deref()
    }

    /// Prefix text, empty when none was resolved.
    pub fn prefix(&self) -> &str {
        self.unique_prefix.as_deref().unwrap_or_default()
    }

    /// Fully-qualified instance name; equal to the params store name.
    pub fn qualified_name(&self) -> String {
        format!("{}{}", self.prefix(), self.base_id)
    }

    pub fn params_store_name(&self) -> String {
        self.qualified_name()
    }

    pub fn recall_store_name(&self) -> String {
        format!("{}{}{RECALL_SUFFIX}", self.prefix(), self.base_id)
    }
}

impl Display for InstanceIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.qualified_name())
    }
}

/// Path of named sub-containers, starting at the document root.
///
/// An empty path addresses the root container itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerPath {
    segments: Vec<String>,
}

impl ContainerPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn child(&self, name: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(name.into());
        Self { segments }
    }
}

impl From<&str> for ContainerPath {
    /// Splits on `/`, ignoring empty segments.
    fn from(value: &str) -> Self {
        Self::new(value.split('/').filter(|segment| !segment.is_empty()))
    }
}

impl Display for ContainerPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        f.write_str(&self.segments.join("/"))
    }
}
