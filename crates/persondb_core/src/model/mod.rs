//! Domain model for the person collection.
//!
//! # Responsibility
//! - Define the typed document shape stored by the repository.
//! - Keep validation at the boundary, before any store call.
//!
//! # Invariants
//! - Every stored person is identified by a store-assigned `PersonId`.
//! - Deletion is a hard delete; there is no tombstone state.

pub mod person;
