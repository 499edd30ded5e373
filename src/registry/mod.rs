//! Counter registry.
//!
//! Each counted model carries an ordered list of counter definitions,
//! declared once at configuration time and never changed afterwards. The
//! delta engine and the reconciliation engine both read from it.
//!
//! # Example
//!
//! ```ignore
//! let registry = RegistryBuilder::new(catalog)
//!     .counter("Review", CounterDef::new(["user"]))?
//!     .counter("Review", CounterDef::new(["user"]).column("review_value_sum").delta_column("value"))?
//!     .counter("Image", CounterDef::new(["album", "owner"]).column("album_images_count"))?
//!     .build();
//! registry.install_hooks(&host);
//! ```

mod definition;
mod manager;

pub use definition::{ColumnFn, CounterColumn, CounterDef, KeyOverrideFn};
pub use manager::{CounterRegistry, LifecycleEvent, LifecycleHost, RegistryBuilder};
