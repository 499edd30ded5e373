//! Lifecycle handlers that turn record changes into counter updates.

use super::unit_of_work::{CounterUpdate, Direction, UnitOfWork};
use crate::catalog::ModelDef;
use crate::datastore::Datastore;
use crate::error::{CounterError, Result};
use crate::registry::{CounterDef, CounterRegistry};
use crate::resolver::RelationResolver;
use crate::types::{Attributes, Record, RecordKey, Value};

/// Schedules counter updates for created, destroyed and updated records.
pub struct DeltaEngine<'a> {
    registry: &'a CounterRegistry,
}

impl<'a> DeltaEngine<'a> {
    pub fn new(registry: &'a CounterRegistry) -> Self {
        Self { registry }
    }

    /// A record was inserted: add its delta to every counter it feeds.
    pub fn after_create<D: Datastore + ?Sized>(
        &self,
        uow: &mut UnitOfWork,
        store: &D,
        record: &Record,
    ) -> Result<()> {
        self.adjust_all(uow, store, record, Direction::Increment)
    }

    /// A record was deleted: subtract its delta from every counter it fed.
    pub fn after_destroy<D: Datastore + ?Sized>(
        &self,
        uow: &mut UnitOfWork,
        store: &D,
        record: &Record,
    ) -> Result<()> {
        self.adjust_all(uow, store, record, Direction::Decrement)
    }

    /// A record was modified from `before` to `after`.
    ///
    /// For each counter whose first-hop key or type, delta value or column
    /// changed, the new state's delta goes to the new target and the old
    /// state's delta comes off the old target. Both legs are scheduled even
    /// when the targets coincide; their sum is the net change.
    pub fn after_update<D: Datastore + ?Sized>(
        &self,
        uow: &mut UnitOfWork,
        store: &D,
        model: &str,
        before: &Attributes,
        after: &Attributes,
    ) -> Result<()> {
        let counters = self.registry.counters_for(model);
        if counters.is_empty() {
            return Ok(());
        }
        let dependent = self.registry.catalog().get(model)?;
        let identity = record_key(dependent, after).or_else(|_| record_key(dependent, before))?;
        if !uow.begin_counting(identity.clone()) {
            tracing::trace!(model, "counters already handled in this unit of work");
            return Ok(());
        }

        let resolver = RelationResolver::new(self.registry.catalog(), store);
        let planned = self.plan_update(&resolver, counters, model, before, after);
        schedule_or_release(uow, &identity, planned)
    }

    fn adjust_all<D: Datastore + ?Sized>(
        &self,
        uow: &mut UnitOfWork,
        store: &D,
        record: &Record,
        direction: Direction,
    ) -> Result<()> {
        let counters = self.registry.counters_for(&record.model);
        if counters.is_empty() {
            return Ok(());
        }
        let dependent = self.registry.catalog().get(&record.model)?;
        let identity = record_key(dependent, &record.attributes)?;
        if !uow.begin_counting(identity.clone()) {
            tracing::trace!(model = %record.model, "counters already handled in this unit of work");
            return Ok(());
        }

        let resolver = RelationResolver::new(self.registry.catalog(), store);
        let planned = counters
            .iter()
            .map(|def| {
                let column = def.column_name_for(&record.attributes);
                self.plan(&resolver, def, &record.model, &record.attributes, direction, column)
            })
            .collect::<Result<Vec<_>>>()
            .map(|updates| updates.into_iter().flatten().collect());
        schedule_or_release(uow, &identity, planned)
    }

    fn plan_update<D: Datastore + ?Sized>(
        &self,
        resolver: &RelationResolver<'_, D>,
        counters: &[CounterDef],
        model: &str,
        before: &Attributes,
        after: &Attributes,
    ) -> Result<Vec<CounterUpdate>> {
        let mut updates = Vec::new();
        for def in counters {
            let column_before = def.column_name_for(before);
            let column_after = def.column_name_for(after);
            let delta_changed = def.delta().is_some_and(|c| before.get(c) != after.get(c));

            if !resolver.first_hop_changed(def, model, before, after)?
                && !delta_changed
                && column_before == column_after
            {
                continue;
            }

            updates.extend(self.plan(resolver, def, model, after, Direction::Increment, column_after)?);
            updates.extend(self.plan(resolver, def, model, before, Direction::Decrement, column_before)?);
        }
        Ok(updates)
    }

    /// The update one counter needs for one record state, if any.
    fn plan<D: Datastore + ?Sized>(
        &self,
        resolver: &RelationResolver<'_, D>,
        def: &CounterDef,
        model: &str,
        attributes: &Attributes,
        direction: Direction,
        column: Option<String>,
    ) -> Result<Option<CounterUpdate>> {
        let Some(column) = column else {
            return Ok(None);
        };
        let trace = resolver.trace(def, model, attributes)?;
        let Some(target) = trace.model else {
            return Ok(None);
        };

        let keys = match def.key_override() {
            Some(remap) => remap(trace.key.as_ref()),
            None => trace.key.into_iter().collect(),
        };
        if keys.is_empty() {
            return Ok(None);
        }

        Ok(Some(CounterUpdate {
            model: target.name.clone(),
            table: target.table.clone(),
            primary_key: target.primary_key.clone(),
            keys,
            column,
            direction,
            magnitude: magnitude(def, attributes)?,
            touch_columns: if def.touches() {
                target.timestamp_columns.clone()
            } else {
                Vec::new()
            },
        }))
    }
}

/// Queue every planned update, or none of them: a failed plan leaves the
/// record uncounted so the unit of work holds no partial set.
fn schedule_or_release(
    uow: &mut UnitOfWork,
    identity: &RecordKey,
    planned: Result<Vec<CounterUpdate>>,
) -> Result<()> {
    match planned {
        Ok(updates) => {
            for update in updates {
                uow.schedule(update);
            }
            Ok(())
        }
        Err(err) => {
            uow.end_counting(identity);
            Err(err)
        }
    }
}

fn record_key(model: &ModelDef, attributes: &Attributes) -> Result<RecordKey> {
    let key = attributes.get(&model.primary_key);
    if key.is_null() {
        return Err(CounterError::MissingPrimaryKey(model.name.clone()));
    }
    Ok(RecordKey {
        model: model.name.clone(),
        key: key.clone(),
    })
}

/// 1 for counting counters, the delta column's value (null as 0) for sums.
fn magnitude(def: &CounterDef, attributes: &Attributes) -> Result<Value> {
    let Some(column) = def.delta() else {
        return Ok(Value::Integer(1));
    };
    let value = attributes.get(column);
    match value {
        Value::Null => Ok(Value::Integer(0)),
        Value::Integer(_) | Value::Real(_) => Ok(value.clone()),
        Value::Text(_) => Err(CounterError::InvalidDelta {
            column: column.to_string(),
            value: value.clone(),
        }),
    }
}
