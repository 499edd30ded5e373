//! Unit-of-work transactions that fire counter hooks.

use super::store::SqliteStore;
use crate::catalog::ModelDef;
use crate::datastore::Datastore;
use crate::delta::UnitOfWork;
use crate::engine::CounterEngine;
use crate::error::{CounterError, Result};
use crate::registry::LifecycleEvent;
use crate::types::{Attributes, Record, Value};

/// One open transaction.
///
/// Record changes go through the session so the installed lifecycle hooks
/// see them. Counter updates collected along the way run after `commit`;
/// dropping an uncommitted session rolls it back and discards them.
///
/// Once a counter hook fails the row change it belongs to has already
/// happened, so the session refuses to commit and can only be rolled back.
pub struct Session<'s> {
    store: &'s SqliteStore,
    engine: &'s CounterEngine,
    uow: Option<UnitOfWork>,
    aborted: bool,
}

impl<'s> Session<'s> {
    pub(crate) fn begin(store: &'s SqliteStore, engine: &'s CounterEngine) -> Result<Self> {
        store.execute("BEGIN", &[])?;
        Ok(Self {
            store,
            engine,
            uow: Some(UnitOfWork::new()),
            aborted: false,
        })
    }

    /// Insert a row and return it as stored. An absent primary key is
    /// taken from the generated rowid.
    pub fn insert(&mut self, model: &str, attributes: Attributes) -> Result<Attributes> {
        let def = self.model(model)?;
        let store = self.store;

        let sql = if attributes.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", store.quote_identifier(&def.table))
        } else {
            let columns: Vec<String> = attributes.iter().map(|(c, _)| store.quote_identifier(c)).collect();
            let markers: Vec<String> = (1..=columns.len()).map(|i| store.placeholder(i)).collect();
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                store.quote_identifier(&def.table),
                columns.join(", "),
                markers.join(", ")
            )
        };
        let params: Vec<Value> = attributes.iter().map(|(_, v)| v.clone()).collect();
        store.execute(&sql, &params)?;

        let key = match attributes.get(&def.primary_key) {
            Value::Null => Value::Integer(store.last_insert_rowid()),
            key => key.clone(),
        };
        let row = self.load(def, &key)?;

        if store.has_hook(model, LifecycleEvent::AfterCreate) {
            let engine = self.engine;
            let record = Record::new(model, row.clone());
            let outcome = engine.after_create(self.uow_mut()?, store, &record);
            self.abort_on_error(outcome)?;
        }
        Ok(row)
    }

    /// Apply `changes` to one row and return its new state.
    pub fn update(&mut self, model: &str, key: impl Into<Value>, changes: Attributes) -> Result<Attributes> {
        let def = self.model(model)?;
        let store = self.store;
        let key = key.into();
        let before = self.load(def, &key)?;
        if changes.is_empty() {
            return Ok(before);
        }

        let mut params: Vec<Value> = Vec::with_capacity(changes.len() + 1);
        let mut assignments = Vec::with_capacity(changes.len());
        for (column, value) in changes.iter() {
            params.push(value.clone());
            assignments.push(format!(
                "{} = {}",
                store.quote_identifier(column),
                store.placeholder(params.len())
            ));
        }
        params.push(key.clone());
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = {}",
            store.quote_identifier(&def.table),
            assignments.join(", "),
            store.quote_identifier(&def.primary_key),
            store.placeholder(params.len())
        );
        store.execute(&sql, &params)?;

        let new_key = match changes.get(&def.primary_key) {
            Value::Null => key,
            changed => changed.clone(),
        };
        let after = self.load(def, &new_key)?;

        if store.has_hook(model, LifecycleEvent::AfterUpdate) {
            let engine = self.engine;
            let outcome = engine.after_update(self.uow_mut()?, store, model, &before, &after);
            self.abort_on_error(outcome)?;
        }
        Ok(after)
    }

    /// Delete one row. Returns false if it did not exist.
    pub fn delete(&mut self, model: &str, key: impl Into<Value>) -> Result<bool> {
        let def = self.model(model)?;
        let store = self.store;
        let key = key.into();
        let Some(before) = store.find(&def.table, &def.primary_key, &key)? else {
            return Ok(false);
        };

        let sql = format!(
            "DELETE FROM {} WHERE {} = {}",
            store.quote_identifier(&def.table),
            store.quote_identifier(&def.primary_key),
            store.placeholder(1)
        );
        store.execute(&sql, std::slice::from_ref(&key))?;

        if store.has_hook(model, LifecycleEvent::AfterDestroy) {
            let engine = self.engine;
            let record = Record::new(model, before);
            let outcome = engine.after_destroy(self.uow_mut()?, store, &record);
            self.abort_on_error(outcome)?;
        }
        Ok(true)
    }

    pub fn find(&self, model: &str, key: impl Into<Value>) -> Result<Option<Attributes>> {
        let def = self.model(model)?;
        self.store.find(&def.table, &def.primary_key, &key.into())
    }

    /// Counter updates waiting for commit.
    pub fn pending(&self) -> usize {
        self.uow.as_ref().map_or(0, |uow| uow.scheduled().len())
    }

    /// True once a counter hook has failed; `commit` will refuse.
    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Commit, then apply the collected counter updates. Returns how many
    /// updates ran. An aborted session is rolled back instead.
    pub fn commit(mut self) -> Result<usize> {
        if self.aborted {
            return Err(CounterError::SessionAborted);
        }
        self.store.execute("COMMIT", &[])?;
        let uow = self.uow.take().unwrap_or_default();
        self.engine.commit(uow, self.store)
    }

    pub fn rollback(mut self) -> Result<()> {
        if let Some(uow) = self.uow.take() {
            uow.discard();
        }
        self.store.execute("ROLLBACK", &[])?;
        Ok(())
    }

    fn model(&self, model: &str) -> Result<&'s ModelDef> {
        self.engine.registry().catalog().get(model)
    }

    fn load(&self, def: &ModelDef, key: &Value) -> Result<Attributes> {
        self.store
            .find(&def.table, &def.primary_key, key)?
            .ok_or_else(|| CounterError::Datastore(format!("no {} row with key {}", def.name, key)))
    }

    fn abort_on_error(&mut self, outcome: Result<()>) -> Result<()> {
        if let Err(err) = &outcome {
            tracing::warn!(error = %err, "counter hook failed, session must roll back");
            self.aborted = true;
        }
        outcome
    }

    fn uow_mut(&mut self) -> Result<&mut UnitOfWork> {
        self.uow
            .as_mut()
            .ok_or_else(|| CounterError::Datastore("session already finished".to_string()))
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        if let Some(uow) = self.uow.take() {
            uow.discard();
            if let Err(err) = self.store.execute("ROLLBACK", &[]) {
                tracing::warn!(error = %err, "rollback of abandoned session failed");
            }
        }
    }
}
