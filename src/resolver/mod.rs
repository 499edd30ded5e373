//! Relationship resolution.
//!
//! Walks a counter's relation chain from a dependent record to the row that
//! owns the counter:
//! - `trace`/`resolve` follow one live record hop by hop, loading each
//!   intermediate row because the next hop's type tag may live on it
//! - `trace_static` works without a record and lists every model the chain
//!   can reach, reading the distinct type tags actually stored for
//!   polymorphic hops
//!
//! A null foreign key, an unknown tag, or a missing row ends the walk with no
//! target. A relation name the catalog does not know is an error.

mod static_tracer;
mod tracer;

pub use static_tracer::{StaticHop, StaticTrace};
pub use tracer::Trace;

use crate::catalog::Catalog;
use crate::datastore::Datastore;

/// Resolves relation chains against the host's catalog and datastore.
pub struct RelationResolver<'a, D: Datastore + ?Sized> {
    catalog: &'a Catalog,
    store: &'a D,
}

impl<'a, D: Datastore + ?Sized> RelationResolver<'a, D> {
    pub fn new(catalog: &'a Catalog, store: &'a D) -> Self {
        Self { catalog, store }
    }

    pub fn catalog(&self) -> &'a Catalog {
        self.catalog
    }
}
