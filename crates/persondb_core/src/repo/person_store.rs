//! Person store contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide the document-store driver surface (insert/find/update/delete)
//!   over the canonical `people` table.
//! - Keep SQL and JSON column encoding inside the persistence boundary.
//!
//! # Invariants
//! - Write paths validate documents before SQL mutations.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Single-document selectors pick the earliest inserted match.
//! - `find_one_and_update` and `delete_one` are single statements.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::person::{
    InvalidPersonId, NewPerson, Person, PersonId, PersonPatch, PersonValidationError,
};
use crate::repo::query::{PersonField, PersonFilter, PersonQuery, ProjectedPerson, SortOrder};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

const PERSON_COLUMNS: &str = "id, name, age, favorite_foods";
const PERSON_SELECT_SQL: &str = "SELECT id, name, age, favorite_foods FROM people";
const TOUCH_UPDATED_AT: &str = "updated_at = (strftime('%s', 'now') * 1000)";

pub type RepoResult<T> = Result<T, RepoError>;

/// Coarse failure category reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    InvalidArgument,
    Store,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::InvalidArgument => "invalid_argument",
            Self::Store => "store",
        }
    }
}

/// Repository error for person persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(PersonValidationError),
    /// One document of a bulk insert failed validation; nothing was written.
    BatchValidation {
        index: usize,
        error: PersonValidationError,
    },
    InvalidArgument(String),
    /// Lookup or update target did not exist. Carries the selector.
    NotFound(String),
    Db(DbError),
    InvalidData(String),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
}

impl RepoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::BatchValidation { .. } => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::Db(_)
            | Self::InvalidData(_)
            | Self::UninitializedConnection { .. }
            | Self::MissingRequiredTable(_) => ErrorKind::Store,
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::BatchValidation { index, error } => {
                write!(f, "document at index {index} rejected: {error}")
            }
            Self::InvalidArgument(message) => write!(f, "invalid argument: {message}"),
            Self::NotFound(selector) => write!(f, "person not found: {selector}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted person data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} does not match expected {expected_version}; open it through db::open_*"
            ),
            Self::MissingRequiredTable(table) => write!(f, "required table `{table}` is missing"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::BatchValidation { error, .. } => Some(error),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<PersonValidationError> for RepoError {
    fn from(value: PersonValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<InvalidPersonId> for RepoError {
    fn from(value: InvalidPersonId) -> Self {
        Self::InvalidArgument(value.to_string())
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Document-store surface for the person collection.
pub trait PersonStore {
    /// Validates and inserts one document, assigning its id.
    fn insert_one(&self, person: &NewPerson) -> RepoResult<Person>;
    /// Inserts all documents or none; output order matches input order.
    fn insert_many(&self, people: &[NewPerson]) -> RepoResult<Vec<Person>>;
    /// Runs a full query chain.
    fn find(&self, query: &PersonQuery) -> RepoResult<Vec<ProjectedPerson>>;
    /// Returns every matching document in insertion order.
    fn find_all(&self, filter: &PersonFilter) -> RepoResult<Vec<Person>>;
    /// Returns the earliest inserted match.
    fn find_one(&self, filter: &PersonFilter) -> RepoResult<Option<Person>>;
    fn find_by_id(&self, id: PersonId) -> RepoResult<Option<Person>> {
        self.find_one(&PersonFilter::Id(id))
    }
    /// Atomically patches the earliest match and returns the updated document.
    fn find_one_and_update(
        &self,
        filter: &PersonFilter,
        patch: &PersonPatch,
    ) -> RepoResult<Option<Person>>;
    /// Rewrites a whole document by id.
    fn replace(&self, person: &Person) -> RepoResult<()>;
    /// Removes the earliest match and returns its pre-deletion snapshot.
    fn delete_one(&self, filter: &PersonFilter) -> RepoResult<Option<Person>>;
    fn delete_many(&self, filter: &PersonFilter) -> RepoResult<u64>;
    fn count(&self, filter: &PersonFilter) -> RepoResult<u64>;
}

/// SQLite-backed person store.
pub struct SqlitePersonStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePersonStore<'conn> {
    /// Constructs a store from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }

    /// Skips readiness checks for a connection already verified by `try_new`.
    pub(crate) fn from_ready(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn insert_row(&self, person: &Person) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO people (id, name, age, favorite_foods) VALUES (?1, ?2, ?3, ?4);",
            params![
                person.id.to_string(),
                person.name.as_str(),
                person.age,
                encode_foods(&person.favorite_foods)?,
            ],
        )?;
        Ok(())
    }

    fn query_people(&self, sql: &str, bind_values: Vec<Value>) -> RepoResult<Vec<Person>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut people = Vec::new();

        while let Some(row) = rows.next()? {
            people.push(parse_person_row(row)?);
        }

        Ok(people)
    }

    fn query_first(&self, sql: &str, bind_values: Vec<Value>) -> RepoResult<Option<Person>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_person_row(row)?));
        }

        Ok(None)
    }
}

impl PersonStore for SqlitePersonStore<'_> {
    fn insert_one(&self, person: &NewPerson) -> RepoResult<Person> {
        person.validate()?;

        let person = person.clone().into_person(PersonId::generate());
        self.insert_row(&person)?;
        Ok(person)
    }

    fn insert_many(&self, people: &[NewPerson]) -> RepoResult<Vec<Person>> {
        for (index, person) in people.iter().enumerate() {
            person
                .validate()
                .map_err(|error| RepoError::BatchValidation { index, error })?;
        }

        let tx = self.conn.unchecked_transaction()?;
        let mut inserted = Vec::with_capacity(people.len());
        for person in people {
            let person = person.clone().into_person(PersonId::generate());
            self.insert_row(&person)?;
            inserted.push(person);
        }
        tx.commit()?;

        Ok(inserted)
    }

    fn find(&self, query: &PersonQuery) -> RepoResult<Vec<ProjectedPerson>> {
        let (clause, mut bind_values) = filter_clause(&query.filter);
        let mut sql = format!("{PERSON_SELECT_SQL} WHERE {clause}");

        match query.sort {
            Some((field, order)) => {
                let column = sort_column(field)?;
                let direction = match order {
                    SortOrder::Ascending => "ASC",
                    SortOrder::Descending => "DESC",
                };
                sql.push_str(&format!(" ORDER BY {column} {direction}, seq ASC"));
            }
            None => sql.push_str(" ORDER BY seq ASC"),
        }

        // A zero limit means "no limit", matching document-store drivers.
        if let Some(limit) = query.limit.filter(|limit| *limit > 0) {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
        }

        let people = self.query_people(&sql, bind_values)?;
        Ok(people
            .into_iter()
            .map(|person| query.projection.apply(person))
            .collect())
    }

    fn find_all(&self, filter: &PersonFilter) -> RepoResult<Vec<Person>> {
        let (clause, bind_values) = filter_clause(filter);
        self.query_people(
            &format!("{PERSON_SELECT_SQL} WHERE {clause} ORDER BY seq ASC"),
            bind_values,
        )
    }

    fn find_one(&self, filter: &PersonFilter) -> RepoResult<Option<Person>> {
        let (clause, bind_values) = filter_clause(filter);
        self.query_first(
            &format!("{PERSON_SELECT_SQL} WHERE {clause} ORDER BY seq ASC LIMIT 1"),
            bind_values,
        )
    }

    fn find_one_and_update(
        &self,
        filter: &PersonFilter,
        patch: &PersonPatch,
    ) -> RepoResult<Option<Person>> {
        patch.validate()?;
        if patch.is_empty() {
            return self.find_one(filter);
        }

        let mut assignments = Vec::new();
        let mut bind_values = Vec::new();
        if let Some(name) = &patch.name {
            assignments.push("name = ?");
            bind_values.push(Value::Text(name.clone()));
        }
        if let Some(age) = patch.age {
            assignments.push("age = ?");
            bind_values.push(age.map_or(Value::Null, |age| Value::Integer(i64::from(age))));
        }
        if let Some(foods) = &patch.favorite_foods {
            assignments.push("favorite_foods = ?");
            bind_values.push(Value::Text(encode_foods(foods)?));
        }
        assignments.push(TOUCH_UPDATED_AT);

        let (clause, filter_values) = filter_clause(filter);
        bind_values.extend(filter_values);

        self.query_first(
            &format!(
                "UPDATE people
                 SET {}
                 WHERE seq = (SELECT seq FROM people WHERE {clause} ORDER BY seq ASC LIMIT 1)
                 RETURNING {PERSON_COLUMNS};",
                assignments.join(", ")
            ),
            bind_values,
        )
    }

    fn replace(&self, person: &Person) -> RepoResult<()> {
        person.validate()?;

        let changed = self.conn.execute(
            &format!(
                "UPDATE people
                 SET
                    name = ?1,
                    age = ?2,
                    favorite_foods = ?3,
                    {TOUCH_UPDATED_AT}
                 WHERE id = ?4;"
            ),
            params![
                person.name.as_str(),
                person.age,
                encode_foods(&person.favorite_foods)?,
                person.id.to_string(),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(PersonFilter::Id(person.id).describe()));
        }

        Ok(())
    }

    fn delete_one(&self, filter: &PersonFilter) -> RepoResult<Option<Person>> {
        let (clause, bind_values) = filter_clause(filter);
        self.query_first(
            &format!(
                "DELETE FROM people
                 WHERE seq = (SELECT seq FROM people WHERE {clause} ORDER BY seq ASC LIMIT 1)
                 RETURNING {PERSON_COLUMNS};"
            ),
            bind_values,
        )
    }

    fn delete_many(&self, filter: &PersonFilter) -> RepoResult<u64> {
        let (clause, bind_values) = filter_clause(filter);
        let removed = self.conn.execute(
            &format!("DELETE FROM people WHERE {clause};"),
            params_from_iter(bind_values),
        )?;
        Ok(removed as u64)
    }

    fn count(&self, filter: &PersonFilter) -> RepoResult<u64> {
        let (clause, bind_values) = filter_clause(filter);
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM people WHERE {clause};"),
            params_from_iter(bind_values),
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

fn filter_clause(filter: &PersonFilter) -> (&'static str, Vec<Value>) {
    match filter {
        PersonFilter::All => ("1 = 1", Vec::new()),
        PersonFilter::Id(id) => ("id = ?", vec![Value::Text(id.to_string())]),
        PersonFilter::Name(name) => ("name = ?", vec![Value::Text(name.clone())]),
        PersonFilter::FavoriteFood(food) => (
            "EXISTS (SELECT 1 FROM json_each(people.favorite_foods) AS food WHERE food.value = ?)",
            vec![Value::Text(food.clone())],
        ),
    }
}

fn sort_column(field: PersonField) -> RepoResult<&'static str> {
    match field {
        PersonField::Name => Ok("name"),
        PersonField::Age => Ok("age"),
        PersonField::FavoriteFoods => Err(RepoError::InvalidArgument(
            "cannot sort by array field `favoriteFoods`".to_string(),
        )),
    }
}

fn encode_foods(foods: &[String]) -> RepoResult<String> {
    serde_json::to_string(foods)
        .map_err(|err| RepoError::InvalidData(format!("cannot encode favoriteFoods: {err}")))
}

fn parse_person_row(row: &Row<'_>) -> RepoResult<Person> {
    let id_text: String = row.get("id")?;
    let id = id_text.parse::<PersonId>().map_err(|_| {
        RepoError::InvalidData(format!("invalid id value `{id_text}` in people.id"))
    })?;

    let age = match row.get::<_, Option<i64>>("age")? {
        Some(value) => Some(u32::try_from(value).map_err(|_| {
            RepoError::InvalidData(format!("invalid age value `{value}` in people.age"))
        })?),
        None => None,
    };

    let foods_text: String = row.get("favorite_foods")?;
    let favorite_foods: Vec<String> = serde_json::from_str(&foods_text).map_err(|err| {
        RepoError::InvalidData(format!(
            "invalid favorite_foods value `{foods_text}` in people.favorite_foods: {err}"
        ))
    })?;

    let person = Person {
        id,
        name: row.get("name")?,
        age,
        favorite_foods,
    };
    person
        .validate()
        .map_err(|err| RepoError::InvalidData(format!("{err} in people.name")))?;
    Ok(person)
}

fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    let has_table: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'people');",
        [],
        |row| row.get(0),
    )?;
    if has_table == 0 {
        return Err(RepoError::MissingRequiredTable("people"));
    }

    Ok(())
}
