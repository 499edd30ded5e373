//! Top-level facade tying the registry to the delta and reconciliation engines.

use crate::datastore::Datastore;
use crate::delta::{DeltaEngine, UnitOfWork};
use crate::error::Result;
use crate::reconcile::{FixOptions, Reconciler};
use crate::registry::CounterRegistry;
use crate::resolver::RelationResolver;
use crate::types::{Attributes, FixRecord, Record, ResolvedTarget};
use serde::Deserialize;
use std::sync::Arc;

/// Engine configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Targets per reconciliation page.
    pub batch_size: usize,
    /// Reconcile with outer joins so targets with no dependents are
    /// corrected to zero.
    pub zero_fill: bool,
    /// `chrono` format for timestamps written by touching counters.
    pub timestamp_format: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            zero_fill: true,
            timestamp_format: "%Y-%m-%d %H:%M:%S%.6f".to_string(),
        }
    }
}

/// Counter cache maintenance for one registry.
///
/// Cheap to clone; share one per process.
#[derive(Clone, Debug)]
pub struct CounterEngine {
    registry: Arc<CounterRegistry>,
    config: EngineConfig,
}

impl CounterEngine {
    pub fn new(registry: CounterRegistry) -> Self {
        Self::with_config(registry, EngineConfig::default())
    }

    pub fn with_config(registry: CounterRegistry, config: EngineConfig) -> Self {
        Self {
            registry: Arc::new(registry),
            config,
        }
    }

    pub fn registry(&self) -> &CounterRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn after_create<D: Datastore + ?Sized>(
        &self,
        uow: &mut UnitOfWork,
        store: &D,
        record: &Record,
    ) -> Result<()> {
        DeltaEngine::new(&self.registry).after_create(uow, store, record)
    }

    pub fn after_destroy<D: Datastore + ?Sized>(
        &self,
        uow: &mut UnitOfWork,
        store: &D,
        record: &Record,
    ) -> Result<()> {
        DeltaEngine::new(&self.registry).after_destroy(uow, store, record)
    }

    pub fn after_update<D: Datastore + ?Sized>(
        &self,
        uow: &mut UnitOfWork,
        store: &D,
        model: &str,
        before: &Attributes,
        after: &Attributes,
    ) -> Result<()> {
        DeltaEngine::new(&self.registry).after_update(uow, store, model, before, after)
    }

    /// Apply a committed transaction's counter updates.
    pub fn commit<D: Datastore + ?Sized>(&self, uow: UnitOfWork, store: &D) -> Result<usize> {
        let now = chrono::Utc::now()
            .format(&self.config.timestamp_format)
            .to_string();
        uow.apply(store, &now)
    }

    /// Recompute counters fed by `model` and correct the ones that drifted.
    pub fn fix_counts<D: Datastore + ?Sized>(
        &self,
        store: &D,
        model: &str,
        options: &FixOptions,
    ) -> Result<Vec<FixRecord>> {
        Reconciler::new(&self.registry, store)
            .batch_size(self.config.batch_size)
            .zero_fill(self.config.zero_fill)
            .fix_counts(model, options)
    }

    /// Target row of the counter at `index` on `model` for a record state.
    pub fn resolve<D: Datastore + ?Sized>(
        &self,
        store: &D,
        model: &str,
        index: usize,
        attributes: &Attributes,
    ) -> Result<Option<ResolvedTarget>> {
        let Some(def) = self.registry.counters_for(model).get(index) else {
            return Ok(None);
        };
        RelationResolver::new(self.registry.catalog(), store).resolve(def, model, attributes)
    }

    /// Every model the counter at `index` on `model` can reach.
    pub fn resolve_all_possible_types<D: Datastore + ?Sized>(
        &self,
        store: &D,
        model: &str,
        index: usize,
    ) -> Result<Vec<String>> {
        let Some(def) = self.registry.counters_for(model).get(index) else {
            return Ok(Vec::new());
        };
        RelationResolver::new(self.registry.catalog(), store).resolve_all_possible_types(def, model)
    }
}
