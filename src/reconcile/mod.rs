//! Reconciliation engine.
//!
//! Recomputes counters in bulk with one aggregate query per target model and
//! column, paged by target primary key, and rewrites stored values that
//! disagree. Targets are discovered with the static tracer, so polymorphic
//! chains cover every type actually stored.
//!
//! Counters with a foreign-key override, or a dynamic column without
//! `column_conditions`, cannot be expressed as joins and are rejected unless
//! `skip_unsupported` is set.

mod fixer;
mod join_builder;
mod options;

pub use fixer::Reconciler;
pub use join_builder::{JoinBuilder, JoinPlan};
pub use options::FixOptions;
