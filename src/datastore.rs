//! Host datastore interface.
//!
//! The engine never owns a connection. Everything it reads or writes goes
//! through this trait, inside whatever unit of work the host has open.

use crate::error::Result;
use crate::types::{Attributes, Value};

/// One result row, keyed by column name or alias.
pub type Row = Attributes;

/// Structured query execution against the host's relational store.
pub trait Datastore {
    /// Run a read query and collect its rows.
    fn select(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    /// Run a write statement, returning the number of affected rows.
    fn execute(&self, sql: &str, params: &[Value]) -> Result<usize>;

    /// Quote an identifier for safe interpolation.
    fn quote_identifier(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    /// Positional parameter marker for the 1-based `index`.
    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    /// Quote a string literal for interpolation into generated SQL.
    fn quote_literal(&self, literal: &str) -> String {
        format!("'{}'", literal.replace('\'', "''"))
    }

    /// Load one row by primary key.
    fn find(&self, table: &str, primary_key: &str, key: &Value) -> Result<Option<Row>> {
        let sql = format!(
            "SELECT * FROM {} WHERE {} = {} LIMIT 1",
            self.quote_identifier(table),
            self.quote_identifier(primary_key),
            self.placeholder(1)
        );
        Ok(self.select(&sql, std::slice::from_ref(key))?.into_iter().next())
    }
}
