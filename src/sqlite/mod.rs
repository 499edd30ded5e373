//! Reference host over SQLite.
//!
//! [`SqliteStore`] runs the engine's SQL and records installed hooks;
//! [`Session`] is the unit of work that feeds record changes to a
//! [`CounterEngine`](crate::CounterEngine).
//!
//! ```ignore
//! let store = SqliteStore::open(dir.path().join("app.db"))?;
//! engine.registry().install_hooks(&store);
//!
//! let mut session = store.session(&engine)?;
//! session.insert("Review", Attributes::new().with("user_id", 1))?;
//! session.commit()?;
//! ```

mod session;
mod store;

pub use session::Session;
pub use store::SqliteStore;
