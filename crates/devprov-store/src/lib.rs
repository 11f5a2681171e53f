//! devprov-store: relational record store for device provisioning.
//!
//! Backed by SQLite through [rusqlite](https://docs.rs/rusqlite). Owns the
//! device factory table, the append-only history table, the VIN side table
//! and the externally maintained association table.
//!
//! # Architecture
//!
//! Every multi-step write (insert → VIN → history, update → history,
//! delete → history) runs in a single SQLite transaction. Conditional writes
//! embed their precondition in the `WHERE` clause; zero affected rows is
//! reported as [`StoreError::Precondition`].
//!
//! Listings go through [`query::ListQuery`], which validates the open map of
//! request parameters against the static tables in [`columns`] and renders
//! a parameterized `WHERE`/`ORDER BY` shape. User values are only ever bound.
//!
//! The `RecordStore` is `Clone` + `Send` + `Sync` (backed by
//! `Arc<Mutex<Connection>>`).

pub mod columns;
pub mod error;
pub mod query;
pub mod schema;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use query::{FilterFamily, ListQuery, QueryError, SortOrder};
pub use store::RecordStore;
