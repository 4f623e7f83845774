//! Asynchronous person repository.
//!
//! # Responsibility
//! - Own the store connection and expose the person CRUD/query use-cases.
//! - Run blocking store calls off the async caller and report every failure.
//!
//! # Invariants
//! - Every operation returns `RepoResult`; nothing is retried.
//! - Failures are logged with the operation name before being returned.
//! - `update_by_find_then_save` is two store round trips and is not atomic;
//!   `update_age_by_name` is a single atomic store statement.
//! - Without an operation timeout, calls wait until the store resolves.

use crate::db::{open_uri, DbError};
use crate::model::person::{NewPerson, Person, PersonId, PersonPatch};
use crate::repo::person_store::{ErrorKind, PersonStore, RepoError, RepoResult, SqlitePersonStore};
use crate::repo::query::{PersonFilter, PersonQuery, ProjectedPerson};
use log::{debug, error, warn};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Handle to the person collection. Cheap to clone; clones share the
/// underlying connection.
#[derive(Clone)]
pub struct PersonRepository {
    conn: Arc<Mutex<Connection>>,
    operation_timeout: Option<Duration>,
}

impl PersonRepository {
    /// Opens the store named by `uri` and applies migrations.
    pub async fn connect(uri: &str) -> RepoResult<Self> {
        let uri = uri.to_string();
        let conn = tokio::task::spawn_blocking(move || open_uri(&uri))
            .await
            .map_err(|err| DbError::Unavailable(format!("connect worker failed: {err}")))??;
        Self::from_connection(conn)
    }

    /// Wraps an already opened and migrated connection.
    pub fn from_connection(conn: Connection) -> RepoResult<Self> {
        SqlitePersonStore::try_new(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            operation_timeout: None,
        })
    }

    /// Bounds how long each store call may take. A timed-out call reports a
    /// store error; the statement itself still runs to completion.
    pub fn with_operation_timeout(mut self, limit: Duration) -> Self {
        self.operation_timeout = Some(limit);
        self
    }

    pub async fn create_one(&self, person: NewPerson) -> RepoResult<Person> {
        self.run("create_one", move |store| store.insert_one(&person))
            .await
    }

    pub async fn create_many(&self, people: Vec<NewPerson>) -> RepoResult<Vec<Person>> {
        self.run("create_many", move |store| store.insert_many(&people))
            .await
    }

    pub async fn find_by_name(&self, name: &str) -> RepoResult<Vec<Person>> {
        let filter = PersonFilter::Name(name.to_string());
        self.run("find_by_name", move |store| store.find_all(&filter))
            .await
    }

    pub async fn find_one_by_food(&self, food: &str) -> RepoResult<Option<Person>> {
        let filter = PersonFilter::FavoriteFood(food.to_string());
        self.run("find_one_by_food", move |store| store.find_one(&filter))
            .await
    }

    pub async fn find_by_id(&self, id: &str) -> RepoResult<Option<Person>> {
        let id = parse_id("find_by_id", id)?;
        self.run("find_by_id", move |store| store.find_by_id(id))
            .await
    }

    /// Read-modify-write update: fetch the document, apply `mutate` in
    /// process, then save the whole document back.
    ///
    /// The id cannot be changed by `mutate`. A concurrent writer between the
    /// two round trips is overwritten; a concurrent delete yields `NotFound`.
    pub async fn update_by_find_then_save<F>(&self, id: &str, mutate: F) -> RepoResult<Person>
    where
        F: FnOnce(&mut Person),
    {
        const OP: &str = "update_by_find_then_save";

        let id = parse_id(OP, id)?;
        let mut person = match self.run(OP, move |store| store.find_by_id(id)).await? {
            Some(person) => person,
            None => {
                return Err(report_failure(
                    OP,
                    RepoError::NotFound(PersonFilter::Id(id).describe()),
                ))
            }
        };

        mutate(&mut person);
        person.id = id;

        self.run(OP, move |store| {
            store.replace(&person)?;
            Ok(person)
        })
        .await
    }

    /// Appends `food` to the person's favorite foods via find-then-save.
    pub async fn add_favorite_food(&self, id: &str, food: &str) -> RepoResult<Person> {
        let food = food.to_string();
        self.update_by_find_then_save(id, move |person| person.favorite_foods.push(food))
            .await
    }

    /// Atomically sets `age` on the earliest inserted person named `name`.
    pub async fn update_age_by_name(&self, name: &str, age: u32) -> RepoResult<Person> {
        const OP: &str = "update_age_by_name";

        let filter = PersonFilter::Name(name.to_string());
        let description = filter.describe();
        let patch = PersonPatch::set_age(age);
        match self
            .run(OP, move |store| store.find_one_and_update(&filter, &patch))
            .await?
        {
            Some(person) => Ok(person),
            None => Err(report_failure(OP, RepoError::NotFound(description))),
        }
    }

    /// Removes one person and returns the pre-deletion snapshot.
    pub async fn delete_by_id(&self, id: &str) -> RepoResult<Option<Person>> {
        let id = parse_id("delete_by_id", id)?;
        self.run("delete_by_id", move |store| {
            store.delete_one(&PersonFilter::Id(id))
        })
        .await
    }

    pub async fn delete_many_by_name(&self, name: &str) -> RepoResult<u64> {
        let filter = PersonFilter::Name(name.to_string());
        self.run("delete_many_by_name", move |store| {
            store.delete_many(&filter)
        })
        .await
    }

    /// People who like `food`, sorted by name, at most two, without age.
    pub async fn query_chain(&self, food: &str) -> RepoResult<Vec<ProjectedPerson>> {
        let query = PersonQuery::favorite_food_chain(food);
        self.run("query_chain", move |store| store.find(&query))
            .await
    }

    pub async fn find(&self, query: PersonQuery) -> RepoResult<Vec<ProjectedPerson>> {
        self.run("find", move |store| store.find(&query)).await
    }

    pub async fn count(&self) -> RepoResult<u64> {
        self.run("count", |store| store.count(&PersonFilter::All))
            .await
    }

    async fn run<T, F>(&self, op: &'static str, work: F) -> RepoResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&SqlitePersonStore<'_>) -> RepoResult<T> + Send + 'static,
    {
        let started_at = Instant::now();
        let conn = Arc::clone(&self.conn);
        let task = tokio::task::spawn_blocking(move || -> RepoResult<T> {
            let guard = conn.lock().map_err(|_| {
                RepoError::Db(DbError::Unavailable("connection lock poisoned".to_string()))
            })?;
            work(&SqlitePersonStore::from_ready(&guard))
        });

        let joined = match self.operation_timeout {
            Some(limit) => match tokio::time::timeout(limit, task).await {
                Ok(joined) => joined,
                Err(_) => return Err(report_failure(op, DbError::Timeout(limit).into())),
            },
            None => task.await,
        };

        let result = joined.unwrap_or_else(|err| {
            Err(RepoError::Db(DbError::Unavailable(format!(
                "store worker failed: {err}"
            ))))
        });

        match result {
            Ok(value) => {
                debug!(
                    "event=person_op module=repo status=ok op={} duration_ms={}",
                    op,
                    started_at.elapsed().as_millis()
                );
                Ok(value)
            }
            Err(err) => Err(report_failure(op, err)),
        }
    }
}

fn parse_id(op: &'static str, raw: &str) -> RepoResult<PersonId> {
    raw.parse::<PersonId>()
        .map_err(|err| report_failure(op, err.into()))
}

fn report_failure(op: &'static str, err: RepoError) -> RepoError {
    let kind = err.kind();
    match kind {
        ErrorKind::Store => error!(
            "event=person_op module=repo status=error op={} error_kind={} error={}",
            op,
            kind.as_str(),
            err
        ),
        _ => warn!(
            "event=person_op module=repo status=error op={} error_kind={} error={}",
            op,
            kind.as_str(),
            err
        ),
    }
    err
}
