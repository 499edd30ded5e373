//! # Counter Cache
//!
//! Keeps denormalized count and sum columns on parent rows in step with
//! their dependent rows, and repairs them when they drift.
//!
//! ## Core Concepts
//!
//! - **Registry**: counters declared per dependent model, each walking a
//!   chain of relations (plain or polymorphic) to the row that holds it
//! - **Resolver**: finds the target row for a record, or every model a
//!   chain can reach
//! - **Delta engine**: turns creates, deletes and updates into atomic
//!   `±delta` updates applied after the transaction commits
//! - **Reconciliation**: recomputes counters in batches with aggregate
//!   joins and corrects the stored values
//!
//! ## Example
//!
//! ```ignore
//! use counter_cache::{Catalog, CounterDef, CounterEngine, ModelDef, RegistryBuilder};
//!
//! let catalog = Arc::new(
//!     Catalog::new()
//!         .model(ModelDef::new("User", "users"))
//!         .model(ModelDef::new("Review", "reviews").belongs_to("user", "user_id", "User")),
//! );
//! let engine = CounterEngine::new(
//!     RegistryBuilder::new(catalog)
//!         .counter("Review", CounterDef::new(["user"]))?
//!         .build(),
//! );
//!
//! let store = SqliteStore::open("app.db")?;
//! engine.registry().install_hooks(&store);
//!
//! let mut session = store.session(&engine)?;
//! session.insert("Review", Attributes::new().with("user_id", 1))?;
//! session.commit()?; // users.reviews_count += 1
//!
//! let fixed = engine.fix_counts(&store, "Review", &FixOptions::new())?;
//! ```

pub mod catalog;
pub mod datastore;
pub mod delta;
pub mod engine;
pub mod error;
pub mod reconcile;
pub mod registry;
pub mod resolver;
pub mod sqlite;
pub mod types;

// Re-exports
pub use catalog::{Catalog, ModelDef, RelationDef, RelationKind};
pub use datastore::{Datastore, Row};
pub use delta::{CounterUpdate, DeltaEngine, Direction, UnitOfWork};
pub use engine::{CounterEngine, EngineConfig};
pub use error::{CounterError, Result};
pub use reconcile::{FixOptions, JoinBuilder, JoinPlan, Reconciler};
pub use registry::{
    ColumnFn, CounterColumn, CounterDef, CounterRegistry, KeyOverrideFn, LifecycleEvent,
    LifecycleHost, RegistryBuilder,
};
pub use resolver::{RelationResolver, StaticHop, StaticTrace, Trace};
pub use sqlite::{Session, SqliteStore};
pub use types::*;
