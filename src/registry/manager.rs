//! Registry of declared counters, built once at startup.

use super::definition::CounterDef;
use crate::catalog::{Catalog, RelationKind};
use crate::error::Result;
use std::collections::HashMap;
use std::sync::Arc;

/// Record lifecycle events that drive counter changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    AfterCreate,
    AfterDestroy,
    AfterUpdate,
}

impl LifecycleEvent {
    pub const ALL: [LifecycleEvent; 3] = [
        LifecycleEvent::AfterCreate,
        LifecycleEvent::AfterDestroy,
        LifecycleEvent::AfterUpdate,
    ];
}

/// Host side of hook registration: after this call the host must deliver
/// `event` for records of `model` to the delta engine.
pub trait LifecycleHost {
    fn register_hook(&self, model: &str, event: LifecycleEvent);
}

/// Collects counter declarations.
pub struct RegistryBuilder {
    catalog: Arc<Catalog>,
    counters: HashMap<String, Vec<CounterDef>>,
    /// Counted models in order of first declaration.
    order: Vec<String>,
}

impl RegistryBuilder {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            counters: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Declare a counter maintained by records of `model`.
    ///
    /// The chain is checked as far as it can be without data: every hop up
    /// to and including the first polymorphic one must exist.
    pub fn declare(&mut self, model: &str, def: CounterDef) -> Result<&mut Self> {
        def.validate_shape()?;
        let dependent = self.catalog.get(model)?;
        self.check_static_prefix(model, def.relation())?;

        let def = def.with_default_column(&dependent.table);
        if !self.counters.contains_key(model) {
            self.order.push(model.to_string());
        }
        self.counters.entry(model.to_string()).or_default().push(def);
        Ok(self)
    }

    /// Builder-style `declare`.
    pub fn counter(mut self, model: &str, def: CounterDef) -> Result<Self> {
        self.declare(model, def)?;
        Ok(self)
    }

    pub fn build(self) -> CounterRegistry {
        CounterRegistry {
            catalog: self.catalog,
            counters: self.counters,
            order: self.order,
        }
    }

    fn check_static_prefix(&self, model: &str, chain: &[String]) -> Result<()> {
        let mut current = model.to_string();
        for name in chain {
            let relation = self.catalog.relation(&current, name)?;
            match &relation.kind {
                RelationKind::BelongsTo { .. } => {
                    current = self.catalog.belongs_to_target(relation)?.name.clone();
                }
                RelationKind::Polymorphic { .. } => break,
            }
        }
        Ok(())
    }
}

/// Immutable per-model lists of counter definitions.
#[derive(Debug)]
pub struct CounterRegistry {
    catalog: Arc<Catalog>,
    counters: HashMap<String, Vec<CounterDef>>,
    order: Vec<String>,
}

impl CounterRegistry {
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Counters declared on `model`, in declaration order.
    pub fn counters_for(&self, model: &str) -> &[CounterDef] {
        self.counters.get(model).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_counted(&self, model: &str) -> bool {
        self.counters.contains_key(model)
    }

    pub fn counted_models(&self) -> &[String] {
        &self.order
    }

    /// Register the three lifecycle hooks once per counted model.
    pub fn install_hooks(&self, host: &dyn LifecycleHost) {
        for model in &self.order {
            for event in LifecycleEvent::ALL {
                host.register_hook(model, event);
            }
        }
    }
}
