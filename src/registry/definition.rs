//! Counter definitions.

use crate::error::{CounterError, Result};
use crate::types::{Attributes, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// Computes a counter column name from a dependent's attributes. `None`
/// means the dependent is not counted anywhere.
pub type ColumnFn = Arc<dyn Fn(&Attributes) -> Option<String> + Send + Sync>;

/// Remaps a resolved target key to the keys that should actually change.
pub type KeyOverrideFn = Arc<dyn Fn(Option<&Value>) -> Vec<Value> + Send + Sync>;

/// Where the counter lives on the target row.
#[derive(Clone)]
pub enum CounterColumn {
    Fixed(String),
    Dynamic(ColumnFn),
}

impl CounterColumn {
    /// Column name for a dependent in the given state.
    pub fn name_for(&self, attributes: &Attributes) -> Option<String> {
        match self {
            CounterColumn::Fixed(name) => Some(name.clone()),
            CounterColumn::Dynamic(f) => f(attributes),
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, CounterColumn::Dynamic(_))
    }
}

impl fmt::Debug for CounterColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CounterColumn::Fixed(name) => write!(f, "Fixed({:?})", name),
            CounterColumn::Dynamic(_) => write!(f, "Dynamic(..)"),
        }
    }
}

/// A declared counter: walk `relation` from the dependent, then adjust
/// `column` on the row found at the end.
#[derive(Clone)]
pub struct CounterDef {
    relation: Vec<String>,
    column: Option<CounterColumn>,
    column_conditions: Option<Vec<(Option<String>, String)>>,
    delta_column: Option<String>,
    foreign_key_override: Option<KeyOverrideFn>,
    touch: bool,
    only: BTreeMap<usize, BTreeSet<String>>,
}

impl CounterDef {
    pub fn new<I, S>(relation: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            relation: relation.into_iter().map(Into::into).collect(),
            column: None,
            column_conditions: None,
            delta_column: None,
            foreign_key_override: None,
            touch: false,
            only: BTreeMap::new(),
        }
    }

    /// Fixed counter column. Defaults to `<dependent table>_count`.
    pub fn column(mut self, name: impl Into<String>) -> Self {
        self.column = Some(CounterColumn::Fixed(name.into()));
        self
    }

    /// Counter column chosen per dependent from its attributes.
    pub fn dynamic_column<F>(mut self, f: F) -> Self
    where
        F: Fn(&Attributes) -> Option<String> + Send + Sync + 'static,
    {
        self.column = Some(CounterColumn::Dynamic(Arc::new(f)));
        self
    }

    /// Conditional columns used by reconciliation: each SQL condition selects
    /// the dependents counted into its column. A `None` condition counts
    /// every dependent.
    pub fn column_conditions<I, C, S>(mut self, conditions: I) -> Self
    where
        I: IntoIterator<Item = (Option<C>, S)>,
        C: Into<String>,
        S: Into<String>,
    {
        self.column_conditions = Some(
            conditions
                .into_iter()
                .map(|(c, s)| (c.map(Into::into), s.into()))
                .collect(),
        );
        self
    }

    /// Sum this attribute instead of counting rows.
    pub fn delta_column(mut self, column: impl Into<String>) -> Self {
        self.delta_column = Some(column.into());
        self
    }

    pub fn foreign_key_override<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<&Value>) -> Vec<Value> + Send + Sync + 'static,
    {
        self.foreign_key_override = Some(Arc::new(f));
        self
    }

    /// Also set the target's timestamp columns when its counter changes.
    pub fn touch(mut self, touch: bool) -> Self {
        self.touch = touch;
        self
    }

    /// Only count when the model reached after `hop` (0-based) is one of
    /// `models`.
    pub fn only<I, S>(mut self, hop: usize, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.only
            .entry(hop)
            .or_default()
            .extend(models.into_iter().map(Into::into));
        self
    }

    pub fn relation(&self) -> &[String] {
        &self.relation
    }

    /// Counter column. Always set once the definition is registered.
    pub fn counter_column(&self) -> Option<&CounterColumn> {
        self.column.as_ref()
    }

    pub fn delta(&self) -> Option<&str> {
        self.delta_column.as_deref()
    }

    pub fn key_override(&self) -> Option<&KeyOverrideFn> {
        self.foreign_key_override.as_ref()
    }

    pub fn touches(&self) -> bool {
        self.touch
    }

    /// Whether `model` may appear after `hop`.
    pub fn allows(&self, hop: usize, model: &str) -> bool {
        self.only
            .get(&hop)
            .map_or(true, |allowed| allowed.contains(model))
    }

    /// Relation chain rendered for messages, e.g. `[album, owner]`.
    pub fn chain_label(&self) -> String {
        format!("[{}]", self.relation.join(", "))
    }

    /// Column name for a dependent in the given state.
    pub fn column_name_for(&self, attributes: &Attributes) -> Option<String> {
        self.column.as_ref().and_then(|c| c.name_for(attributes))
    }

    /// (condition, column) pairs reconciliation recomputes.
    pub fn reconcile_columns(&self) -> Result<Vec<(Option<String>, String)>> {
        if let Some(conditions) = &self.column_conditions {
            return Ok(conditions.clone());
        }
        match &self.column {
            Some(CounterColumn::Fixed(name)) => Ok(vec![(None, name.clone())]),
            _ => Err(CounterError::DynamicColumnWithoutColumnNames(
                self.chain_label(),
            )),
        }
    }

    /// Whether reconciliation can recompute this counter with joins.
    pub fn reconcilable(&self) -> bool {
        self.foreign_key_override.is_none()
            && (self.column_conditions.is_some()
                || !self.column.as_ref().is_some_and(CounterColumn::is_dynamic))
    }

    pub(crate) fn with_default_column(mut self, table: &str) -> Self {
        if self.column.is_none() {
            self.column = Some(CounterColumn::Fixed(format!("{}_count", table)));
        }
        self
    }

    pub(crate) fn validate_shape(&self) -> Result<()> {
        if self.relation.is_empty() {
            return Err(CounterError::EmptyChain);
        }
        if let Some(conditions) = &self.column_conditions {
            if conditions.is_empty() {
                return Err(CounterError::MalformedColumnConditions(format!(
                    "no columns given for {}",
                    self.chain_label()
                )));
            }
            if let Some((condition, _)) = conditions.iter().find(|(_, col)| col.trim().is_empty())
            {
                return Err(CounterError::MalformedColumnConditions(format!(
                    "empty column name for condition {:?} on {}",
                    condition,
                    self.chain_label()
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for CounterDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CounterDef")
            .field("relation", &self.relation)
            .field("column", &self.column)
            .field("column_conditions", &self.column_conditions)
            .field("delta_column", &self.delta_column)
            .field("foreign_key_override", &self.foreign_key_override.is_some())
            .field("touch", &self.touch)
            .field("only", &self.only)
            .finish()
    }
}
