//! Relationship metadata for counted and counting models.
//!
//! The catalog is the engine's view of the host schema: which table a model
//! lives in, its primary key, the timestamp columns touched on update, and
//! the `belongs_to`-style relations a counter chain may walk. Polymorphic
//! relations store the target's type tag next to the foreign key; tags are
//! mapped back to models through the catalog rather than any runtime lookup.

use crate::error::{CounterError, Result};
use std::collections::HashMap;

/// How a relation step finds its target type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RelationKind {
    /// Target type is fixed by the schema.
    BelongsTo { target: String },
    /// Target type tag is stored per row in `foreign_type`.
    Polymorphic { foreign_type: String },
}

/// One hop in a relation chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelationDef {
    pub name: String,
    pub foreign_key: String,
    pub kind: RelationKind,
}

impl RelationDef {
    pub fn is_polymorphic(&self) -> bool {
        matches!(self.kind, RelationKind::Polymorphic { .. })
    }

    /// Type tag column, for polymorphic relations.
    pub fn foreign_type(&self) -> Option<&str> {
        match &self.kind {
            RelationKind::Polymorphic { foreign_type } => Some(foreign_type),
            RelationKind::BelongsTo { .. } => None,
        }
    }
}

/// Descriptor of one model (one table).
#[derive(Clone, Debug)]
pub struct ModelDef {
    pub name: String,
    pub table: String,
    pub primary_key: String,
    /// Value stored in polymorphic type columns that point at this model.
    pub type_tag: String,
    /// Columns set to the current time when a counter update touches the row.
    pub timestamp_columns: Vec<String>,
    relations: Vec<RelationDef>,
}

impl ModelDef {
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            type_tag: name.clone(),
            name,
            table: table.into(),
            primary_key: "id".to_string(),
            timestamp_columns: Vec::new(),
            relations: Vec::new(),
        }
    }

    pub fn primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = column.into();
        self
    }

    pub fn type_tag(mut self, tag: impl Into<String>) -> Self {
        self.type_tag = tag.into();
        self
    }

    pub fn timestamps<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.timestamp_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn belongs_to(
        mut self,
        name: impl Into<String>,
        foreign_key: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        self.relations.push(RelationDef {
            name: name.into(),
            foreign_key: foreign_key.into(),
            kind: RelationKind::BelongsTo {
                target: target.into(),
            },
        });
        self
    }

    pub fn polymorphic(
        mut self,
        name: impl Into<String>,
        foreign_key: impl Into<String>,
        foreign_type: impl Into<String>,
    ) -> Self {
        self.relations.push(RelationDef {
            name: name.into(),
            foreign_key: foreign_key.into(),
            kind: RelationKind::Polymorphic {
                foreign_type: foreign_type.into(),
            },
        });
        self
    }

    pub fn relation(&self, name: &str) -> Option<&RelationDef> {
        self.relations.iter().find(|r| r.name == name)
    }

    pub fn relations(&self) -> &[RelationDef] {
        &self.relations
    }
}

/// Registry of model descriptors and polymorphic type tags.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    models: HashMap<String, ModelDef>,
    /// type tag -> model name
    tags: HashMap<String, String>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a model (builder style).
    pub fn model(mut self, model: ModelDef) -> Self {
        self.add(model);
        self
    }

    pub fn add(&mut self, model: ModelDef) {
        self.tags.insert(model.type_tag.clone(), model.name.clone());
        self.models.insert(model.name.clone(), model);
    }

    pub fn get(&self, name: &str) -> Result<&ModelDef> {
        self.models
            .get(name)
            .ok_or_else(|| CounterError::UnknownModel(name.to_string()))
    }

    pub fn find(&self, name: &str) -> Option<&ModelDef> {
        self.models.get(name)
    }

    /// Model a polymorphic type tag points at, if any.
    pub fn model_for_tag(&self, tag: &str) -> Option<&ModelDef> {
        self.tags.get(tag).and_then(|name| self.models.get(name))
    }

    /// Relation `name` on `model`. A missing relation is a configuration
    /// error.
    pub fn relation(&self, model: &str, name: &str) -> Result<&RelationDef> {
        self.get(model)?
            .relation(name)
            .ok_or_else(|| CounterError::UnknownRelation {
                model: model.to_string(),
                relation: name.to_string(),
            })
    }

    /// Target model of a non-polymorphic relation.
    pub fn belongs_to_target(&self, relation: &RelationDef) -> Result<&ModelDef> {
        match &relation.kind {
            RelationKind::BelongsTo { target } => self.get(target),
            RelationKind::Polymorphic { .. } => Err(CounterError::IncompatibleRelation {
                relation: relation.name.clone(),
                models: Vec::new(),
            }),
        }
    }
}
