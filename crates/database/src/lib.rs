//! # Shows Catalog Database Crate
//!
//! This crate is the storage core of the catalog: a PostgreSQL adapter that
//! keeps each show and its multi-valued attributes consistent.
//!
//! ## Architectural Principles
//!
//! - **Adapter:** All SQL lives here. Callers hand in validated, typed values
//!   from `core-types` and get shows, summaries or a `DbError` back.
//! - **Allowlisted dynamic SQL:** Sort and filter names are resolved through
//!   the Schema Registry before any query text is assembled; every caller
//!   value is a bound parameter.
//! - **Asynchronous & Pooled:** Each repository call acquires its own pooled
//!   connection and transaction, and releases it on every exit path.
//!
//! ## Public API
//!
//! - `connect` / `run_migrations`: pool bootstrap and schema setup.
//! - `DbRepository`: list, get, create, patch, delete, summarize, alive.
//! - `store`, `reconciler`, `query`, `aggregation`: the building blocks the
//!   repository composes, usable inside a caller-owned transaction.
//! - `DbError`: the error kinds surfaced to callers.

// Declare the modules that constitute this crate.
pub mod aggregation;
pub mod connection;
pub mod error;
pub mod query;
pub mod reconciler;
pub mod repository;
pub mod store;

// Re-export the key components to create a clean, public-facing API.
pub use connection::{connect, connect_options, run_migrations};
pub use error::DbError;
pub use query::ShowQuery;
pub use reconciler::Delta;
pub use repository::DbRepository;
pub use store::ShowRow;
