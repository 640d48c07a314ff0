//! Namespace prefix negotiation.
//!
//! # Responsibility
//! - Recover the prefix an instance used previously by inspecting its
//!   container's store nodes.
//! - Generate a fresh prefix when uniqueness is requested and nothing can be
//!   recovered.
//!
//! # Invariants
//! - A recovered prefix always wins over generation.
//! - Generated prefixes are `PREFIX_TOKEN_LEN` characters from `[A-Z0-9]`
//!   followed by `PREFIX_SEPARATOR`.

use crate::host::PatchGraph;
use crate::model::identity::{PREFIX_SEPARATOR, PREFIX_TOKEN_LEN, RECALL_SUFFIX};
use crate::model::node::{ContainerId, Role};
use log::info;
use rand::rngs::ThreadRng;
use rand::Rng;
use std::collections::VecDeque;

const TOKEN_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Source of random prefix tokens.
pub trait PrefixSource {
    /// Returns `PREFIX_TOKEN_LEN` characters from `[A-Z0-9]`.
    fn next_token(&mut self) -> String;
}

/// Token source drawing from a `rand` generator.
pub struct RandomPrefixSource<R = ThreadRng> {
    rng: R,
}

impl RandomPrefixSource<ThreadRng> {
    pub fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
        }
    }
}

impl Default for RandomPrefixSource<ThreadRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> RandomPrefixSource<R> {
    /// Uses a caller-provided generator, e.g. a seeded `StdRng` in tests.
    pub fn from_rng(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: Rng> PrefixSource for RandomPrefixSource<R> {
    fn next_token(&mut self) -> String {
        (0..PREFIX_TOKEN_LEN)
            .map(|_| TOKEN_CHARSET[self.rng.gen_range(0..TOKEN_CHARSET.len())] as char)
            .collect()
    }
}

/// Deterministic token source replaying a fixed list, then counting up.
#[derive(Debug, Clone, Default)]
pub struct SequencePrefixSource {
    queued: VecDeque<String>,
    counter: u64,
}

impl SequencePrefixSource {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            queued: tokens.into_iter().map(Into::into).collect(),
            counter: 0,
        }
    }
}

impl PrefixSource for SequencePrefixSource {
    fn next_token(&mut self) -> String {
        if let Some(token) = self.queued.pop_front() {
            return token;
        }
        self.counter += 1;
        format!("{:0width$}", self.counter, width = PREFIX_TOKEN_LEN)
    }
}

/// Builds a full prefix (`token + separator`) from `source`.
pub fn generate_prefix(source: &mut dyn PrefixSource) -> String {
    let mut prefix = source.next_token();
    prefix.push(PREFIX_SEPARATOR);
    prefix
}

/// Scans direct children of `container` for a recall or params store whose
/// name ends with this instance's suffix and returns the leading text.
///
/// First match in document order wins; `None` when nothing matches.
pub fn find_existing_prefix<G: PatchGraph + ?Sized>(
    graph: &G,
    container: ContainerId,
    base_id: &str,
) -> Option<String> {
    let recall_suffix = format!("{base_id}{RECALL_SUFFIX}");
    graph.children(container).into_iter().find_map(|node| {
        let store = node.kind.store_name()?;
        match node.role? {
            Role::Recall => store.strip_suffix(recall_suffix.as_str()),
            Role::Params => store.strip_suffix(base_id),
            _ => None,
        }
        .map(str::to_string)
    })
}

/// Resolves the prefix for a new instance of `base_id` in `container`.
///
/// Returns `None` when no prefix applies (nothing recovered and uniqueness not
/// requested); `Some("")` when a prefix-less instance was recovered.
pub fn resolve_prefix<G: PatchGraph + ?Sized>(
    graph: &G,
    container: ContainerId,
    base_id: &str,
    unique: bool,
    source: &mut dyn PrefixSource,
) -> Option<String> {
    if let Some(prefix) = find_existing_prefix(graph, container, base_id) {
        info!("event=namespace_resolve module=sync status=recovered base_id={base_id} prefix={prefix}");
        return Some(prefix);
    }
    if unique {
        let prefix = generate_prefix(source);
        info!("event=namespace_resolve module=sync status=generated base_id={base_id} prefix={prefix}");
        return Some(prefix);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::{
        find_existing_prefix, generate_prefix, resolve_prefix, PrefixSource,
        RandomPrefixSource, SequencePrefixSource,
    };
    use crate::host::{MemoryHost, PatchGraph};
    use crate::model::identity::is_generated_prefix;
    use crate::model::node::{NodeKind, NodeSpec, Role};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn add_store(host: &mut MemoryHost, name: &str, role: Role) {
        let root = host.root();
        host.create_node(
            root,
            NodeSpec::new(NodeKind::Store {
                name: name.to_string(),
            })
            .with_role(role),
        );
    }

    #[test]
    fn random_tokens_have_expected_shape() {
        let mut source = RandomPrefixSource::from_rng(StdRng::seed_from_u64(7));
        for _ in 0..32 {
            assert!(is_generated_prefix(&generate_prefix(&mut source)));
        }
    }

    #[test]
    fn seeded_sources_are_reproducible() {
        let mut first = RandomPrefixSource::from_rng(StdRng::seed_from_u64(42));
        let mut second = RandomPrefixSource::from_rng(StdRng::seed_from_u64(42));
        assert_eq!(first.next_token(), second.next_token());
    }

    #[test]
    fn sequence_source_replays_then_counts() {
        let mut source = SequencePrefixSource::new(["AAAAAAAA"]);
        assert_eq!(source.next_token(), "AAAAAAAA");
        assert_eq!(source.next_token(), "00000001");
        assert_eq!(source.next_token(), "00000002");
    }

    #[test]
    fn recovers_prefix_from_recall_store() {
        let mut host = MemoryHost::new();
        add_store(&mut host, "QWERTY12_test_recall", Role::Recall);
        assert_eq!(
            find_existing_prefix(&host, host.root(), "test").as_deref(),
            Some("QWERTY12_")
        );
    }

    #[test]
    fn recovers_empty_prefix_from_params_store() {
        let mut host = MemoryHost::new();
        add_store(&mut host, "test", Role::Params);
        assert_eq!(
            find_existing_prefix(&host, host.root(), "test").as_deref(),
            Some("")
        );
    }

    #[test]
    fn ignores_untagged_and_foreign_stores() {
        let mut host = MemoryHost::new();
        let root = host.root();
        host.create_node(
            root,
            NodeSpec::new(NodeKind::Store {
                name: "X_test_recall".to_string(),
            }),
        );
        add_store(&mut host, "other_recall", Role::Recall);
        assert_eq!(find_existing_prefix(&host, root, "test"), None);
    }

    #[test]
    fn resolution_policy() {
        let host = MemoryHost::new();
        let mut source = SequencePrefixSource::new(["ZZZZZZZZ"]);
        assert_eq!(resolve_prefix(&host, host.root(), "test", false, &mut source), None);
        assert_eq!(
            resolve_prefix(&host, host.root(), "test", true, &mut source).as_deref(),
            Some("ZZZZZZZZ_")
        );
    }
}
