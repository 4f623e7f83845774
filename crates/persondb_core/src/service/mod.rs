//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate store calls into use-case level async APIs.
//! - Keep callers decoupled from storage details.

pub mod person_repository;
