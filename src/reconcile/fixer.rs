//! Batch recomputation of stored counters.

use super::join_builder::JoinBuilder;
use super::options::FixOptions;
use crate::catalog::ModelDef;
use crate::datastore::Datastore;
use crate::error::{CounterError, Result};
use crate::registry::{CounterDef, CounterRegistry};
use crate::resolver::{RelationResolver, StaticTrace};
use crate::types::{FixRecord, Value};

/// Recomputes counters fed by one dependent model and corrects drift.
pub struct Reconciler<'a, D: Datastore + ?Sized> {
    registry: &'a CounterRegistry,
    store: &'a D,
    batch_size: usize,
    zero_fill: bool,
}

impl<'a, D: Datastore + ?Sized> Reconciler<'a, D> {
    pub fn new(registry: &'a CounterRegistry, store: &'a D) -> Self {
        Self {
            registry,
            store,
            batch_size: 1000,
            zero_fill: true,
        }
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    pub fn zero_fill(mut self, zero_fill: bool) -> Self {
        self.zero_fill = zero_fill;
        self
    }

    /// Recompute every selected counter declared on `model` and overwrite
    /// stored values that differ. Returns one record per corrected value.
    ///
    /// Corrections bypass timestamp touching.
    pub fn fix_counts(&self, model: &str, options: &FixOptions) -> Result<Vec<FixRecord>> {
        let counters = self.registry.counters_for(model);
        if counters.is_empty() {
            return Err(CounterError::NoCounters(model.to_string()));
        }
        let dependent = self.registry.catalog().get(model)?;
        let resolver = RelationResolver::new(self.registry.catalog(), self.store);
        let batch_size = options.batch_size.unwrap_or(self.batch_size).max(1);
        let zero_fill = options.zero_fill.unwrap_or(self.zero_fill);

        let mut fixed = Vec::new();
        for def in counters {
            if !options.selects(def) {
                continue;
            }
            if !def.reconcilable() {
                if options.skip_unsupported {
                    tracing::debug!(model, relation = %def.chain_label(), "skipping unsupported counter");
                    continue;
                }
                if def.key_override().is_some() {
                    return Err(CounterError::UnsupportedOverride(def.chain_label()));
                }
            }
            let columns = def.reconcile_columns()?;
            let trace = resolver.trace_static(def, model)?;

            for target in trace.targets() {
                for (condition, column) in &columns {
                    let before = fixed.len();
                    self.fix_column(
                        &trace,
                        def,
                        dependent,
                        target,
                        condition.as_deref(),
                        column,
                        batch_size,
                        zero_fill,
                        &mut fixed,
                    )?;
                    tracing::info!(
                        model,
                        target = %target.name,
                        column = %column,
                        fixed = fixed.len() - before,
                        "counter cache reconciled"
                    );
                }
            }
        }
        Ok(fixed)
    }

    #[allow(clippy::too_many_arguments)]
    fn fix_column(
        &self,
        trace: &StaticTrace<'_>,
        def: &CounterDef,
        dependent: &ModelDef,
        target: &ModelDef,
        condition: Option<&str>,
        column: &str,
        batch_size: usize,
        zero_fill: bool,
        fixed: &mut Vec<FixRecord>,
    ) -> Result<()> {
        let q = |ident: &str| self.store.quote_identifier(ident);

        let mut plan = JoinBuilder::new(self.store, trace).inner(!zero_fill).build(target);
        if let Some(condition) = condition {
            plan.restrict_last(condition);
        }

        let aggregate = match def.delta() {
            Some(delta) => format!("SUM(COALESCE({}.{}, 0))", plan.dependent_alias, q(delta)),
            None => format!(
                "COUNT(DISTINCT {}.{})",
                plan.dependent_alias,
                q(&dependent.primary_key)
            ),
        };
        let target_key = format!("{}.{}", plan.target_alias, q(&target.primary_key));
        let stored_column = format!("{}.{}", plan.target_alias, q(column));
        let sql = format!(
            "SELECT {key} AS {key_alias}, {aggregate} AS {computed}, {stored_column} AS {stored} \
             FROM {table} {joins} GROUP BY {key}, {stored_column} \
             ORDER BY {key} ASC LIMIT {limit} OFFSET {offset}",
            key = target_key,
            key_alias = q("target_key"),
            computed = q("computed"),
            table = plan.target_alias,
            stored = q("stored"),
            joins = plan.joins.join(" "),
            limit = self.store.placeholder(1),
            offset = self.store.placeholder(2),
        );
        let update = format!(
            "UPDATE {} SET {} = {} WHERE {} = {}",
            q(&target.table),
            q(column),
            self.store.placeholder(1),
            q(&target.primary_key),
            self.store.placeholder(2)
        );

        let mut offset = 0usize;
        loop {
            let rows = self.store.select(
                &sql,
                &[
                    Value::Integer(batch_size as i64),
                    Value::Integer(offset as i64),
                ],
            )?;
            if rows.is_empty() {
                break;
            }

            for row in &rows {
                let key = row.get("target_key").clone();
                let stored = row.get("stored").clone();
                let computed = match row.get("computed") {
                    Value::Null => Value::Integer(0),
                    value => value.clone(),
                };
                if stored.numeric_eq(&computed) {
                    continue;
                }

                self.store.execute(&update, &[computed.clone(), key.clone()])?;
                fixed.push(FixRecord {
                    entity: target.name.clone(),
                    primary_key: key,
                    column: column.to_string(),
                    wrong_value: stored,
                    correct_value: computed,
                });
            }
            offset += batch_size;
        }
        Ok(())
    }
}
