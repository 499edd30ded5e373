//! Per-transaction counter bookkeeping.

use crate::datastore::Datastore;
use crate::error::Result;
use crate::types::{RecordKey, Value};
use std::collections::HashSet;

/// Which way a scheduled update moves the counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Increment,
    Decrement,
}

impl Direction {
    pub fn operator(self) -> &'static str {
        match self {
            Direction::Increment => "+",
            Direction::Decrement => "-",
        }
    }
}

/// A counter column change waiting for the transaction to commit.
#[derive(Clone, Debug, PartialEq)]
pub struct CounterUpdate {
    /// Target model name.
    pub model: String,
    pub table: String,
    pub primary_key: String,
    /// Target rows; more than one only with a foreign-key override.
    pub keys: Vec<Value>,
    pub column: String,
    pub direction: Direction,
    pub magnitude: Value,
    /// Timestamp columns to set alongside the counter.
    pub touch_columns: Vec<String>,
}

impl CounterUpdate {
    /// Statement and parameters applying this update.
    ///
    /// `column = COALESCE(column, 0) <op> magnitude`, filtered by primary key,
    /// so the datastore does the read-modify-write under its row lock.
    pub fn statement<D: Datastore + ?Sized>(
        &self,
        store: &D,
        now: &str,
    ) -> (String, Vec<Value>) {
        let column = store.quote_identifier(&self.column);
        let mut params = vec![self.magnitude.clone()];
        let mut assignments = vec![format!(
            "{column} = COALESCE({column}, 0) {} {}",
            self.direction.operator(),
            store.placeholder(params.len())
        )];

        for timestamp in &self.touch_columns {
            params.push(Value::Text(now.to_string()));
            assignments.push(format!(
                "{} = {}",
                store.quote_identifier(timestamp),
                store.placeholder(params.len())
            ));
        }

        let mut markers = Vec::with_capacity(self.keys.len());
        for key in &self.keys {
            params.push(key.clone());
            markers.push(store.placeholder(params.len()));
        }

        let sql = format!(
            "UPDATE {} SET {} WHERE {} IN ({})",
            store.quote_identifier(&self.table),
            assignments.join(", "),
            store.quote_identifier(&self.primary_key),
            markers.join(", ")
        );
        (sql, params)
    }
}

/// Counter state of one host transaction.
///
/// Created when the transaction starts and consumed when it ends. Holds the
/// records whose counters were already handled in this transaction and the
/// updates to run once it commits.
#[derive(Debug, Default)]
pub struct UnitOfWork {
    active: HashSet<RecordKey>,
    scheduled: Vec<CounterUpdate>,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `record` as handled. Returns false if it already was, in which
    /// case the caller must not adjust counters again.
    pub fn begin_counting(&mut self, record: RecordKey) -> bool {
        self.active.insert(record)
    }

    pub fn is_counting(&self, record: &RecordKey) -> bool {
        self.active.contains(record)
    }

    /// Forget `record` so a later hook may count it again.
    pub fn end_counting(&mut self, record: &RecordKey) {
        self.active.remove(record);
    }

    pub fn schedule(&mut self, update: CounterUpdate) {
        tracing::debug!(
            model = %update.model,
            column = %update.column,
            keys = ?update.keys,
            op = update.direction.operator(),
            magnitude = ?update.magnitude,
            "counter update scheduled"
        );
        self.scheduled.push(update);
    }

    pub fn scheduled(&self) -> &[CounterUpdate] {
        &self.scheduled
    }

    /// Run scheduled updates in order. Call only after the host
    /// transaction has committed.
    pub fn apply<D: Datastore + ?Sized>(self, store: &D, now: &str) -> Result<usize> {
        let mut applied = 0;
        for update in &self.scheduled {
            let (sql, params) = update.statement(store, now);
            let rows = store.execute(&sql, &params)?;
            tracing::debug!(model = %update.model, column = %update.column, rows, "counter update applied");
            applied += 1;
        }
        Ok(applied)
    }

    /// Drop scheduled updates (transaction rolled back).
    pub fn discard(self) {
        if !self.scheduled.is_empty() {
            tracing::debug!(count = self.scheduled.len(), "scheduled counter updates discarded");
        }
    }
}
