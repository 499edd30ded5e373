//! `Datastore` over a single SQLite connection.

use super::session::Session;
use crate::datastore::{Datastore, Row};
use crate::engine::CounterEngine;
use crate::error::Result;
use crate::registry::{LifecycleEvent, LifecycleHost};
use crate::types::{Attributes, Value};
use parking_lot::{Mutex, RwLock};
use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection};
use std::collections::HashSet;
use std::path::Path;

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Integer(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            Value::Real(f) => ToSqlOutput::Owned(SqlValue::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(f) => Value::Real(f),
            ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
                Value::Text(String::from_utf8_lossy(bytes).into_owned())
            }
        }
    }
}

/// SQLite-backed host: runs the engine's SQL and remembers which lifecycle
/// hooks were installed.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    hooks: RwLock<HashSet<(String, LifecycleEvent)>>,
}

impl SqliteStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            hooks: RwLock::new(HashSet::new()),
        }
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "opening sqlite store");
        Ok(Self::new(Connection::open(path)?))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Connection::open_in_memory()?))
    }

    /// Run a batch of `;`-separated statements, typically a schema.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn.lock().execute_batch(sql)?;
        Ok(())
    }

    pub fn has_hook(&self, model: &str, event: LifecycleEvent) -> bool {
        self.hooks.read().contains(&(model.to_string(), event))
    }

    /// Start a transaction whose record changes drive `engine`'s counters.
    pub fn session<'s>(&'s self, engine: &'s CounterEngine) -> Result<Session<'s>> {
        Session::begin(self, engine)
    }

    pub(crate) fn last_insert_rowid(&self) -> i64 {
        self.conn.lock().last_insert_rowid()
    }
}

impl Datastore for SqliteStore {
    fn select(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(sql)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut attributes = Attributes::new();
            for (i, name) in names.iter().enumerate() {
                attributes.insert(name.clone(), Value::from(row.get_ref(i)?));
            }
            out.push(attributes);
        }
        tracing::trace!(sql, rows = out.len(), "select");
        Ok(out)
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<usize> {
        let changed = self
            .conn
            .lock()
            .execute(sql, params_from_iter(params.iter()))?;
        tracing::trace!(sql, changed, "execute");
        Ok(changed)
    }
}

impl LifecycleHost for SqliteStore {
    fn register_hook(&self, model: &str, event: LifecycleEvent) {
        self.hooks.write().insert((model.to_string(), event));
    }
}
