//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the document-store contract for the person collection.
//! - Isolate SQLite query details from the async repository facade.
//!
//! # Invariants
//! - Store writes enforce model validation before persistence.
//! - Store APIs return semantic errors (`NotFound`, `InvalidArgument`) in
//!   addition to DB transport errors.

pub mod person_store;
pub mod query;
