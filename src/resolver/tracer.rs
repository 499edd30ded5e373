//! Live-record relation tracing.

use super::RelationResolver;
use crate::catalog::{ModelDef, RelationKind};
use crate::datastore::Datastore;
use crate::error::Result;
use crate::registry::CounterDef;
use crate::types::{Attributes, ResolvedTarget, Value};
use std::borrow::Cow;

/// Outcome of walking a chain for one record state.
///
/// `model` is set when the final hop's target type is known; `key` when
/// its foreign key is also non-null. Either can be missing without error.
#[derive(Clone, Debug, Default)]
pub struct Trace<'c> {
    pub model: Option<&'c ModelDef>,
    pub key: Option<Value>,
}

impl<'c> Trace<'c> {
    fn miss() -> Self {
        Self::default()
    }

    pub fn into_target(self) -> Option<ResolvedTarget> {
        match (self.model, self.key) {
            (Some(model), Some(key)) => Some(ResolvedTarget {
                model: model.name.clone(),
                key,
            }),
            _ => None,
        }
    }
}

impl<'a, D: Datastore + ?Sized> RelationResolver<'a, D> {
    /// Walk `def`'s chain starting from a record of `model` in the state
    /// described by `attributes`.
    ///
    /// Only the first hop reads `attributes`; pass the prior snapshot to
    /// find the old target of an update. Later hops read rows as they are
    /// now.
    pub fn trace(
        &self,
        def: &CounterDef,
        model: &str,
        attributes: &Attributes,
    ) -> Result<Trace<'a>> {
        let chain = def.relation();
        let mut current = self.catalog.get(model)?;
        let mut row = Cow::Borrowed(attributes);

        for (hop, name) in chain.iter().enumerate() {
            let relation = self.catalog.relation(&current.name, name)?;

            let target = match &relation.kind {
                RelationKind::BelongsTo { .. } => self.catalog.belongs_to_target(relation)?,
                RelationKind::Polymorphic { foreign_type } => {
                    let tag = row.get(foreign_type);
                    match tag.as_str().and_then(|t| self.catalog.model_for_tag(t)) {
                        Some(target) => target,
                        None => {
                            tracing::trace!(model = %current.name, relation = %name, tag = ?tag, "unresolvable type tag");
                            return Ok(Trace::miss());
                        }
                    }
                }
            };

            if !def.allows(hop, &target.name) {
                return Ok(Trace::miss());
            }

            let foreign_key = row.get(&relation.foreign_key).clone();
            if hop + 1 == chain.len() {
                return Ok(Trace {
                    model: Some(target),
                    key: (!foreign_key.is_null()).then_some(foreign_key),
                });
            }

            if foreign_key.is_null() {
                return Ok(Trace::miss());
            }
            match self
                .store
                .find(&target.table, &target.primary_key, &foreign_key)?
            {
                Some(next) => row = Cow::Owned(next),
                None => {
                    tracing::trace!(model = %target.name, key = ?foreign_key, "intermediate row missing");
                    return Ok(Trace::miss());
                }
            }
            current = target;
        }

        Ok(Trace::miss())
    }

    /// The target row for a record state, or `None` if any hop is unset.
    pub fn resolve(
        &self,
        def: &CounterDef,
        model: &str,
        attributes: &Attributes,
    ) -> Result<Option<ResolvedTarget>> {
        Ok(self.trace(def, model, attributes)?.into_target())
    }

    /// Whether the first hop's foreign key or type tag differs between two
    /// states of a record.
    pub fn first_hop_changed(
        &self,
        def: &CounterDef,
        model: &str,
        before: &Attributes,
        after: &Attributes,
    ) -> Result<bool> {
        let Some(first) = def.relation().first() else {
            return Ok(false);
        };
        let relation = self.catalog.relation(model, first)?;
        let key_changed = before.get(&relation.foreign_key) != after.get(&relation.foreign_key);
        let type_changed = relation
            .foreign_type()
            .is_some_and(|ft| before.get(ft) != after.get(ft));
        Ok(key_changed || type_changed)
    }
}
