//! Person domain model.
//!
//! # Responsibility
//! - Define the canonical person document stored in the `people` collection.
//! - Provide boundary validation for inserts and field-level updates.
//!
//! # Invariants
//! - `id` is assigned by the store at insert time and never reassigned.
//! - `name` is present and non-empty.
//! - `favorite_foods` keeps caller insertion order.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Stable identifier assigned to every stored person.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersonId(Uuid);

impl PersonId {
    /// Generates a fresh identifier. Only the store should call this.
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Display for PersonId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Error returned when text cannot be parsed as a [`PersonId`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidPersonId(pub String);

impl Display for InvalidPersonId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "malformed person id `{}`", self.0)
    }
}

impl Error for InvalidPersonId {}

impl FromStr for PersonId {
    type Err = InvalidPersonId;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let uuid = Uuid::parse_str(trimmed).map_err(|_| InvalidPersonId(value.to_string()))?;
        if uuid.is_nil() {
            return Err(InvalidPersonId(value.to_string()));
        }
        Ok(Self(uuid))
    }
}

/// Validation failures detected before a document reaches the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersonValidationError {
    /// `name` is missing or empty.
    MissingName,
}

impl Display for PersonValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingName => write!(f, "person validation failed: `name` is required"),
        }
    }
}

impl Error for PersonValidationError {}

/// Field set used to insert one person.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPerson {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default)]
    pub favorite_foods: Vec<String>,
}

impl NewPerson {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            age: None,
            favorite_foods: Vec::new(),
        }
    }

    pub fn with_age(mut self, age: u32) -> Self {
        self.age = Some(age);
        self
    }

    pub fn with_favorite_foods<I, S>(mut self, foods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.favorite_foods = foods.into_iter().map(Into::into).collect();
        self
    }

    pub fn validate(&self) -> Result<(), PersonValidationError> {
        validate_name(&self.name)
    }

    /// Materializes the field set into a document with the given identity.
    pub(crate) fn into_person(self, id: PersonId) -> Person {
        Person {
            id,
            name: self.name,
            age: self.age,
            favorite_foods: self.favorite_foods,
        }
    }
}

/// Canonical person document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub id: PersonId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default)]
    pub favorite_foods: Vec<String>,
}

impl Person {
    pub fn validate(&self) -> Result<(), PersonValidationError> {
        validate_name(&self.name)
    }
}

/// Field-level update applied atomically by the store.
///
/// `None` leaves a field untouched. `age: Some(None)` clears the age.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonPatch {
    pub name: Option<String>,
    pub age: Option<Option<u32>>,
    pub favorite_foods: Option<Vec<String>>,
}

impl PersonPatch {
    pub fn set_age(age: u32) -> Self {
        Self {
            age: Some(Some(age)),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.age.is_none() && self.favorite_foods.is_none()
    }

    pub fn validate(&self) -> Result<(), PersonValidationError> {
        match &self.name {
            Some(name) => validate_name(name),
            None => Ok(()),
        }
    }
}

fn validate_name(name: &str) -> Result<(), PersonValidationError> {
    if name.is_empty() {
        return Err(PersonValidationError::MissingName);
    }
    Ok(())
}
