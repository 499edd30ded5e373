//! Delta engine.
//!
//! Lifecycle handlers compute `+delta` / `-delta` changes for each counter a
//! record feeds and park them on the transaction's [`UnitOfWork`]. Nothing
//! touches counter rows until the host commits and calls
//! [`UnitOfWork::apply`]; a rollback just drops the unit of work.
//!
//! Updates are plain `column = COALESCE(column, 0) ± delta` statements, so
//! concurrent transactions never lose increments.

mod engine;
mod unit_of_work;

pub use engine::DeltaEngine;
pub use unit_of_work::{CounterUpdate, Direction, UnitOfWork};
