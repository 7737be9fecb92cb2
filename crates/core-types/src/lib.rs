//! # Shows Catalog Core Types
//!
//! The shared vocabulary of the catalog: the show record, the requests the
//! surrounding layer hands to the storage core, and the Schema Registry that
//! decides which attribute names may ever reach a query.
//!
//! This crate is pure. It performs no I/O and knows nothing about SQL beyond
//! the fixed table and column names listed in [`registry`].

pub mod error;
pub mod registry;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use error::CoreError;
pub use registry::{Association, ShowAttribute, ShowColumn};
pub use structs::{
    ListRequest, NewShow, Show, ShowFields, ShowId, ShowUpdate, Summary, DEFAULT_LIMIT,
};
