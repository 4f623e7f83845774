//! Query builder for the person collection.
//!
//! # Responsibility
//! - Describe filter, sort, limit and projection as one explicit value.
//! - Apply projection to materialized documents.
//!
//! # Invariants
//! - Composition order is fixed: filter, then sort, then limit, then projection.
//! - Sort ties fall back to insertion order.
//! - `id` is always projected.

use crate::model::person::{Person, PersonId};
use serde::Serialize;

/// Document selector shared by find/update/delete paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PersonFilter {
    #[default]
    All,
    Id(PersonId),
    Name(String),
    /// Array membership: matches when any favorite food equals the value.
    FavoriteFood(String),
}

impl PersonFilter {
    /// Short description used in logs and `NotFound` errors.
    pub fn describe(&self) -> String {
        match self {
            Self::All => "all".to_string(),
            Self::Id(id) => format!("id={id}"),
            Self::Name(name) => format!("name={name}"),
            Self::FavoriteFood(food) => format!("favoriteFoods={food}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PersonField {
    Name,
    Age,
    FavoriteFoods,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Field selection applied after filter/sort/limit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Projection {
    #[default]
    All,
    Exclude(Vec<PersonField>),
    Include(Vec<PersonField>),
}

impl Projection {
    pub fn keeps(&self, field: PersonField) -> bool {
        match self {
            Self::All => true,
            Self::Exclude(fields) => !fields.contains(&field),
            Self::Include(fields) => fields.contains(&field),
        }
    }

    pub fn apply(&self, person: Person) -> ProjectedPerson {
        ProjectedPerson {
            id: person.id,
            name: self.keeps(PersonField::Name).then_some(person.name),
            age: if self.keeps(PersonField::Age) {
                person.age
            } else {
                None
            },
            favorite_foods: self
                .keeps(PersonField::FavoriteFoods)
                .then_some(person.favorite_foods),
        }
    }
}

/// Person document after projection. Excluded fields are `None` and are
/// omitted when serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectedPerson {
    pub id: PersonId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favorite_foods: Option<Vec<String>>,
}

/// Query options for the `find` path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonQuery {
    pub filter: PersonFilter,
    pub sort: Option<(PersonField, SortOrder)>,
    pub limit: Option<u32>,
    pub projection: Projection,
}

impl PersonQuery {
    pub fn new(filter: PersonFilter) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    pub fn sort_by(mut self, field: PersonField, order: SortOrder) -> Self {
        self.sort = Some((field, order));
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn exclude(mut self, field: PersonField) -> Self {
        match &mut self.projection {
            Projection::Exclude(fields) => {
                if !fields.contains(&field) {
                    fields.push(field);
                }
            }
            _ => self.projection = Projection::Exclude(vec![field]),
        }
        self
    }

    pub fn include(mut self, field: PersonField) -> Self {
        match &mut self.projection {
            Projection::Include(fields) => {
                if !fields.contains(&field) {
                    fields.push(field);
                }
            }
            _ => self.projection = Projection::Include(vec![field]),
        }
        self
    }

    /// The tutorial chain: people who like `food`, by name, two at most,
    /// without their age.
    pub fn favorite_food_chain(food: impl Into<String>) -> Self {
        Self::new(PersonFilter::FavoriteFood(food.into()))
            .sort_by(PersonField::Name, SortOrder::Ascending)
            .limit(2)
            .exclude(PersonField::Age)
    }
}

#[cfg(test)]
mod tests {
    use super::{PersonField, PersonQuery, Projection};

    #[test]
    fn exclude_and_include_replace_each_other() {
        let query = PersonQuery::default()
            .include(PersonField::Name)
            .exclude(PersonField::Age)
            .exclude(PersonField::Age);
        assert_eq!(
            query.projection,
            Projection::Exclude(vec![PersonField::Age])
        );
    }

    #[test]
    fn include_projection_keeps_only_listed_fields() {
        let projection = Projection::Include(vec![PersonField::Name]);
        assert!(projection.keeps(PersonField::Name));
        assert!(!projection.keeps(PersonField::Age));
        assert!(!projection.keeps(PersonField::FavoriteFoods));
    }
}
