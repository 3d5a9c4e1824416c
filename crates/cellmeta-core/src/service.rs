//! Service wiring: one host, one dirty set, one notifier, many tenants.

use std::sync::Arc;

use cellmeta_config::{Config, SchedulerConfig};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::dirty::DirtySet;
use crate::events::{DataListener, Notifier};
use crate::host::Host;
use crate::key::{KeyError, Namespace};
use crate::reconciler::Reconciler;
use crate::store::Tenant;

/// Owns the shared state behind every tenant handle.
pub struct CellDataService {
    host: Arc<dyn Host>,
    dirty: Arc<DirtySet>,
    notifier: Arc<Notifier>,
    reconcilers: DashMap<Namespace, Arc<Reconciler>>,
}

impl CellDataService {
    /// Creates a service with an empty dirty set. No tenant is reconciled yet.
    pub fn new(host: Arc<dyn Host>, scheduler: &SchedulerConfig) -> Self {
        tracing::info!(mode = ?scheduler.mode, "cell data service created");
        Self {
            host,
            dirty: Arc::new(DirtySet::new(scheduler.mode)),
            notifier: Arc::new(Notifier::new()),
            reconcilers: DashMap::new(),
        }
    }

    /// Creates the service and registers every namespace listed in
    /// `reconciler.auto_register`.
    ///
    /// Fails without registering anything if a listed namespace is invalid.
    pub fn start(host: Arc<dyn Host>, config: &Config) -> Result<Self, KeyError> {
        let namespaces = config
            .reconciler
            .auto_register
            .iter()
            .map(Namespace::new)
            .collect::<Result<Vec<_>, _>>()?;

        let service = Self::new(host, &config.scheduler);
        for namespace in &namespaces {
            service.register_reconciler(namespace);
        }
        Ok(service)
    }

    /// Handle for reading and writing `namespace`'s cell data.
    pub fn tenant(&self, namespace: Namespace) -> Tenant {
        Tenant::new(namespace, Arc::clone(&self.host), Arc::clone(&self.dirty))
    }

    /// Subscribes a reconciler for `namespace` to world events.
    ///
    /// Calling this again for the same namespace returns the existing
    /// reconciler without subscribing twice.
    pub fn register_reconciler(&self, namespace: &Namespace) -> Arc<Reconciler> {
        let reconciler = match self.reconcilers.entry(namespace.clone()) {
            Entry::Occupied(existing) => return Arc::clone(existing.get()),
            Entry::Vacant(slot) => {
                let reconciler = Arc::new(Reconciler::new(
                    self.tenant(namespace.clone()),
                    Arc::clone(&self.notifier),
                ));
                slot.insert(Arc::clone(&reconciler));
                reconciler
            }
        };

        self.host.subscribe(namespace, reconciler.clone());
        tracing::info!(tenant = %namespace, "registered reconciler");
        reconciler
    }

    /// Returns `true` if a reconciler is registered for `namespace`.
    pub fn is_registered(&self, namespace: &Namespace) -> bool {
        self.reconcilers.contains_key(namespace)
    }

    /// Adds a listener for removal and move notices of every tenant.
    pub fn subscribe_listener(&self, listener: Arc<dyn DataListener>) {
        self.notifier.subscribe(listener);
    }

    /// The notifier shared by all reconcilers.
    pub fn notifier(&self) -> &Arc<Notifier> {
        &self.notifier
    }

    /// The dirty set shared by all tenants.
    pub fn dirty(&self) -> &Arc<DirtySet> {
        &self.dirty
    }

    /// The host this service runs against.
    pub fn host(&self) -> &Arc<dyn Host> {
        &self.host
    }

    /// Unsubscribes every reconciler and drops all dirty markers. Stored data
    /// is untouched; tenants may be registered again afterwards.
    pub fn shutdown(&self) {
        let unsubscribed = self.unsubscribe_all();
        let pending = self.dirty.len();
        self.dirty.clear();
        tracing::info!(unsubscribed, pending, "cell data service shut down");
    }

    /// Removes every reconciler from the host. The host holds them by `Arc`
    /// and each one holds the host, so this is what lets both be freed.
    fn unsubscribe_all(&self) -> usize {
        let namespaces: Vec<Namespace> = self
            .reconcilers
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        for namespace in &namespaces {
            self.reconcilers.remove(namespace);
            self.host.unsubscribe(namespace);
        }
        namespaces.len()
    }
}

impl Drop for CellDataService {
    fn drop(&mut self) {
        self.unsubscribe_all();
    }
}

impl std::fmt::Debug for CellDataService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CellDataService")
            .field("dirty", &self.dirty)
            .field("listeners", &self.notifier.len())
            .field("reconcilers", &self.reconcilers.len())
            .finish()
    }
}
