//! Core data access for the person document collection.
//! This crate owns the document model, the store and the async repository.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{AppConfig, ConfigError};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::person::{
    InvalidPersonId, NewPerson, Person, PersonId, PersonPatch, PersonValidationError,
};
pub use repo::person_store::{ErrorKind, PersonStore, RepoError, RepoResult, SqlitePersonStore};
pub use repo::query::{
    PersonField, PersonFilter, PersonQuery, ProjectedPerson, Projection, SortOrder,
};
pub use service::person_repository::PersonRepository;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
