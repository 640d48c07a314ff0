//! Parameter instance use-case service.
//!
//! # Responsibility
//! - Construct an instance against a host container: namespace, probe,
//!   infrastructure, chains, priming.
//! - Expose typed `fetch` / `set` over the store bridge.
//! - Re-synchronize chains for a new record shape.
//!
//! # Invariants
//! - Construction validates identifiers, options and the record before any
//!   graph mutation; an unresolvable container fails with `Configuration`.
//! - A rebuilt infrastructure always forces a chain rebuild.
//! - A detached instance (no host) fails every store operation with `State`.

use crate::config::SyncOptions;
use crate::error::{SyncError, SyncResult};
use crate::host::{resolve_container, Host, PatchGraph};
use crate::model::identity::{validate_identifier, ContainerPath, InstanceIdentity};
use crate::model::node::ContainerId;
use crate::model::params::ParameterSet;
use crate::sync::bridge::StoreBridge;
use crate::sync::chains;
use crate::sync::infra;
use crate::sync::namespace::{resolve_prefix, PrefixSource, RandomPrefixSource};
use crate::sync::probe::{probe_infrastructure, Infrastructure};
use log::info;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// One parameter group synchronized with a host container.
#[derive(Debug, Clone)]
pub struct ParametersUi<T> {
    identity: InstanceIdentity,
    container: Option<ContainerId>,
    infrastructure: Option<Infrastructure>,
    bridge: StoreBridge,
    params: T,
    keys: Vec<String>,
    options: SyncOptions,
}

impl<T> ParametersUi<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    /// Constructs an instance with random namespace generation.
    pub fn create<H: Host + ?Sized>(
        host: &mut H,
        path: &ContainerPath,
        base_id: &str,
        params: T,
        options: SyncOptions,
    ) -> SyncResult<Self> {
        let mut source = RandomPrefixSource::new();
        Self::create_with_source(host, path, base_id, params, options, &mut source)
    }

    /// Constructs an instance drawing generated prefixes from `source`.
    ///
    /// # Errors
    /// - `Configuration` for invalid options, an invalid base id or an
    ///   unresolvable container path.
    /// - `InvalidRecord` when `params` is not a flat object of scalars.
    /// - `Store` / `Codec` when priming fails.
    pub fn create_with_source<H: Host + ?Sized>(
        host: &mut H,
        path: &ContainerPath,
        base_id: &str,
        params: T,
        options: SyncOptions,
        source: &mut dyn PrefixSource,
    ) -> SyncResult<Self> {
        options.validate()?;
        validate_identifier(base_id, "base id")?;
        let values = ParameterSet::from_record(&params)?;
        let container = resolve_container(&*host, path)?;

        let prefix = resolve_prefix(&*host, container, base_id, options.unique, source);
        let identity = InstanceIdentity::with_prefix(base_id, prefix)?;

        let mut instance = Self {
            identity,
            container: Some(container),
            infrastructure: None,
            bridge: StoreBridge::detached(),
            params,
            keys: values.keys().map(str::to_string).collect(),
            options,
        };
        instance.synchronize(host, &[])?;
        instance.prime(host, values)?;
        info!(
            "event=instance_create module=service status=ok instance={} container={path} keys={}",
            instance.identity,
            instance.keys.len()
        );
        Ok(instance)
    }

    /// Instance that never touched a host; store operations fail with `State`.
    pub fn detached(base_id: &str, params: T) -> SyncResult<Self> {
        let values = ParameterSet::from_record(&params)?;
        Ok(Self {
            identity: InstanceIdentity::new(base_id)?,
            container: None,
            infrastructure: None,
            bridge: StoreBridge::detached(),
            params,
            keys: values.keys().map(str::to_string).collect(),
            options: SyncOptions::default(),
        })
    }

    pub fn identity(&self) -> &InstanceIdentity {
        &self.identity
    }

    pub fn container(&self) -> Option<ContainerId> {
        self.container
    }

    /// Last record written with `set` or read with `fetch`.
    pub fn params(&self) -> &T {
        &self.params
    }

    /// Declared parameter keys, in chain order.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn infrastructure(&self) -> Option<&Infrastructure> {
        self.infrastructure.as_ref()
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Probes the container for complete infrastructure of this instance.
    pub fn infrastructure_exists<G: PatchGraph + ?Sized>(&self, graph: &G) -> bool {
        self.container.is_some_and(|container| {
            probe_infrastructure(graph, container, &self.identity).is_complete()
        })
    }

    /// Returns whether every declared key has a complete, wired chain.
    pub fn parameters_exist<G: PatchGraph + ?Sized>(&self, graph: &G) -> bool {
        let (Some(container), Some(infra)) = (self.container, self.infrastructure.as_ref()) else {
            return false;
        };
        chains::parameters_exist(graph, container, self.keys.iter().map(String::as_str), infra)
    }

    /// Re-runs infrastructure and chain synchronization; returns whether any
    /// chain was rebuilt.
    pub fn ensure_parameters<H: Host + ?Sized>(&mut self, host: &mut H) -> SyncResult<bool> {
        self.synchronize(host, &[])
    }

    /// Switches the instance to a new record shape, rebuilding chains when
    /// any key lacks one, then primes the stores with `params`.
    ///
    /// Chains of keys dropped from the record are removed on rebuild. When
    /// synchronization fails the previous keys and record are kept.
    pub fn replace_parameters<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        params: T,
    ) -> SyncResult<T> {
        let values = ParameterSet::from_record(&params)?;
        let previous = std::mem::replace(
            &mut self.keys,
            values.keys().map(str::to_string).collect(),
        );
        if let Err(err) = self.synchronize(host, &previous) {
            self.keys = previous;
            return Err(err);
        }
        self.params = params;
        self.prime(host, values)?;
        Ok(self.params.clone())
    }

    /// Removes this container's infrastructure and detaches the bridge.
    pub fn clean_infrastructure<G: PatchGraph + ?Sized>(
        &mut self,
        graph: &mut G,
    ) -> SyncResult<usize> {
        let container = self.require_container()?;
        self.infrastructure = None;
        self.bridge.detach();
        Ok(infra::clean_infrastructure(graph, container))
    }

    /// Removes the chains of every declared key.
    pub fn clean_parameters<G: PatchGraph + ?Sized>(
        &mut self,
        graph: &mut G,
    ) -> SyncResult<usize> {
        let container = self.require_container()?;
        Ok(chains::clean_parameters(
            graph,
            container,
            self.keys.iter().map(String::as_str),
        ))
    }

    /// Reads the params store into a record and caches it.
    ///
    /// Only keys of the cached record are read; keys the params store has not
    /// received yet keep their cached value.
    ///
    /// # Errors
    /// - `State` when the stores are not attached or were removed from the
    ///   graph since the last synchronization.
    /// - `Codec` / `InvalidRecord` when store content does not fit `T`.
    pub fn fetch<H: Host + ?Sized>(&mut self, host: &H) -> SyncResult<T> {
        let stored = self.bridge.read(host)?;
        let mut merged = ParameterSet::from_record(&self.params)?;
        for (key, value) in stored.iter() {
            if merged.get(key).is_some() {
                merged.insert(key, value);
            }
        }
        self.params = merged.into_record()?;
        Ok(self.params.clone())
    }

    /// Writes `values` into the recall store and, with `notify`, triggers
    /// propagation. Read the propagated result with `fetch`.
    ///
    /// # Errors
    /// - `State` when the stores are not attached or were removed from the
    ///   graph since the last synchronization.
    /// - `InvalidRecord` when `values` is not a flat object of scalars.
    pub fn set<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        values: T,
        notify: bool,
    ) -> SyncResult<()> {
        let set = ParameterSet::from_record(&values)?;
        self.bridge.verify(&*host)?;
        self.params = values;
        self.bridge.write(host, &set, notify)
    }

    fn require_container(&self) -> SyncResult<ContainerId> {
        self.container.ok_or_else(|| {
            SyncError::state(format!("instance `{}` is not bound to a container", self.identity))
        })
    }

    fn synchronize<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        stale_keys: &[String],
    ) -> SyncResult<bool> {
        let container = self.require_container()?;
        let outcome = infra::ensure_infrastructure(host, container, &self.identity, &self.options);
        self.bridge.attach(&outcome.infrastructure);
        let rebuilt = chains::ensure_parameters(
            host,
            container,
            &self.keys,
            stale_keys,
            &outcome.infrastructure,
            &self.options.layout,
            outcome.rebuilt,
        );
        self.infrastructure = Some(outcome.infrastructure);
        Ok(rebuilt)
    }

    fn prime<H: Host + ?Sized>(&mut self, host: &mut H, values: ParameterSet) -> SyncResult<()> {
        self.bridge.write(host, &values, true)?;
        self.fetch(&*host)?;
        Ok(())
    }
}
