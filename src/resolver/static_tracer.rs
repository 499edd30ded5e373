//! Relation tracing without a live record.

use super::RelationResolver;
use crate::catalog::{ModelDef, RelationDef, RelationKind};
use crate::datastore::Datastore;
use crate::error::{CounterError, Result};
use crate::registry::CounterDef;

/// One hop of a statically traced chain.
#[derive(Clone, Debug)]
pub struct StaticHop<'c> {
    /// Models the hop starts from, each with its copy of the relation.
    pub sources: Vec<(&'c ModelDef, &'c RelationDef)>,
    /// Models the hop can reach.
    pub targets: Vec<&'c ModelDef>,
}

impl<'c> StaticHop<'c> {
    pub fn is_polymorphic(&self) -> bool {
        self.sources
            .first()
            .is_some_and(|(_, relation)| relation.is_polymorphic())
    }
}

/// Every model reachable at each position of a chain.
#[derive(Clone, Debug)]
pub struct StaticTrace<'c> {
    pub hops: Vec<StaticHop<'c>>,
}

impl<'c> StaticTrace<'c> {
    /// Models the whole chain can end at.
    pub fn targets(&self) -> &[&'c ModelDef] {
        self.hops.last().map(|h| h.targets.as_slice()).unwrap_or(&[])
    }
}

impl<'a, D: Datastore + ?Sized> RelationResolver<'a, D> {
    /// Trace `def`'s chain from `model` without a record.
    ///
    /// Polymorphic hops reach whatever models the stored type tags name;
    /// tags naming no catalog model are skipped.
    pub fn trace_static(&self, def: &CounterDef, model: &str) -> Result<StaticTrace<'a>> {
        if def.relation().is_empty() {
            return Err(CounterError::EmptyChain);
        }

        let mut sources: Vec<&'a ModelDef> = vec![self.catalog.get(model)?];
        let mut hops = Vec::with_capacity(def.relation().len());

        for (hop, name) in def.relation().iter().enumerate() {
            let mut pairs = Vec::with_capacity(sources.len());
            for source in &sources {
                pairs.push((*source, self.catalog.relation(&source.name, name)?));
            }
            self.check_consistent(name, &pairs)?;

            let mut targets: Vec<&'a ModelDef> = Vec::new();
            for (source, relation) in &pairs {
                let reached = match &relation.kind {
                    RelationKind::BelongsTo { .. } => vec![self.catalog.belongs_to_target(relation)?],
                    RelationKind::Polymorphic { foreign_type } => {
                        self.stored_types(source, foreign_type)?
                    }
                };
                for target in reached {
                    if def.allows(hop, &target.name)
                        && !targets.iter().any(|t| t.name == target.name)
                    {
                        targets.push(target);
                    }
                }
            }
            targets.sort_by(|a, b| a.name.cmp(&b.name));

            sources = targets.clone();
            hops.push(StaticHop {
                sources: pairs,
                targets,
            });
        }

        Ok(StaticTrace { hops })
    }

    /// Names of every model the chain can end at.
    pub fn resolve_all_possible_types(&self, def: &CounterDef, model: &str) -> Result<Vec<String>> {
        Ok(self
            .trace_static(def, model)?
            .targets()
            .iter()
            .map(|m| m.name.clone())
            .collect())
    }

    fn check_consistent(&self, name: &str, pairs: &[(&ModelDef, &RelationDef)]) -> Result<()> {
        let Some((_, first)) = pairs.first() else {
            return Ok(());
        };
        let consistent = pairs.iter().all(|(_, r)| match (&first.kind, &r.kind) {
            (RelationKind::Polymorphic { .. }, RelationKind::Polymorphic { .. }) => true,
            (RelationKind::BelongsTo { target: a }, RelationKind::BelongsTo { target: b }) => a == b,
            _ => false,
        });
        if consistent {
            Ok(())
        } else {
            Err(CounterError::IncompatibleRelation {
                relation: name.to_string(),
                models: pairs.iter().map(|(m, _)| m.name.clone()).collect(),
            })
        }
    }

    fn stored_types(&self, source: &ModelDef, foreign_type: &str) -> Result<Vec<&'a ModelDef>> {
        let column = self.store.quote_identifier(foreign_type);
        let sql = format!(
            "SELECT DISTINCT {column} AS {alias} FROM {table} WHERE {column} IS NOT NULL",
            alias = self.store.quote_identifier("type_tag"),
            table = self.store.quote_identifier(&source.table),
        );

        let mut models = Vec::new();
        for row in self.store.select(&sql, &[])? {
            let tag = row.get("type_tag");
            match tag.as_str().and_then(|t| self.catalog.model_for_tag(t)) {
                Some(model) => models.push(model),
                None => tracing::warn!(
                    table = %source.table,
                    column = %foreign_type,
                    tag = ?tag,
                    "type tag names no known model; skipping"
                ),
            }
        }
        Ok(models)
    }
}
