use persondb_core::db::{open_db, open_db_in_memory, DbError};
use persondb_core::{ErrorKind, NewPerson, PersonFilter, PersonQuery, PersonRepository, RepoError};
use std::collections::HashSet;
use std::time::Duration;

async fn repository() -> PersonRepository {
    PersonRepository::connect("memory").await.unwrap()
}

fn person(name: &str, age: u32, foods: &[&str]) -> NewPerson {
    NewPerson::new(name)
        .with_age(age)
        .with_favorite_foods(foods.iter().copied())
}

fn tutorial_people() -> Vec<NewPerson> {
    vec![
        person("Alice", 30, &["sushi", "ramen"]),
        person("Bob", 22, &["burger", "fries"]),
        person("Mary", 28, &["salad"]),
    ]
}

#[tokio::test]
async fn create_one_assigns_id_and_keeps_fields() {
    let repo = repository().await;

    let created = repo
        .create_one(person("John Doe", 25, &["pizza", "pasta"]))
        .await
        .unwrap();

    assert!(!created.id.as_uuid().is_nil());
    assert_eq!(created.name, "John Doe");
    assert_eq!(created.age, Some(25));
    assert_eq!(created.favorite_foods, vec!["pizza", "pasta"]);

    let loaded = repo.find_by_id(&created.id.to_string()).await.unwrap();
    assert_eq!(loaded, Some(created));
}

#[tokio::test]
async fn create_one_without_name_is_a_validation_error() {
    let repo = repository().await;

    let err = repo
        .create_one(NewPerson::default().with_age(5))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(repo.count().await.unwrap(), 0);
}

#[tokio::test]
async fn create_many_preserves_order_with_distinct_ids() {
    let repo = repository().await;

    let created = repo.create_many(tutorial_people()).await.unwrap();

    let names: Vec<_> = created.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Alice", "Bob", "Mary"]);
    let ids: HashSet<_> = created.iter().map(|p| p.id).collect();
    assert_eq!(ids.len(), 3);
}

#[tokio::test]
async fn create_many_with_one_invalid_record_writes_nothing() {
    let repo = repository().await;

    let mut batch = tutorial_people();
    batch.push(NewPerson::new(""));
    let err = repo.create_many(batch).await.unwrap_err();

    assert!(matches!(err, RepoError::BatchValidation { index: 3, .. }));
    assert_eq!(repo.count().await.unwrap(), 0);
}

#[tokio::test]
async fn find_by_name_and_find_one_by_food() {
    let repo = repository().await;
    repo.create_many(tutorial_people()).await.unwrap();

    let alices = repo.find_by_name("Alice").await.unwrap();
    assert_eq!(alices.len(), 1);
    assert!(repo.find_by_name("Nobody").await.unwrap().is_empty());

    let fries_fan = repo.find_one_by_food("fries").await.unwrap().unwrap();
    assert_eq!(fries_fan.name, "Bob");
    assert!(repo.find_one_by_food("burritos").await.unwrap().is_none());
}

#[tokio::test]
async fn malformed_ids_are_invalid_arguments() {
    let repo = repository().await;

    let find_err = repo.find_by_id("some_id_here").await.unwrap_err();
    assert_eq!(find_err.kind(), ErrorKind::InvalidArgument);

    let delete_err = repo.delete_by_id("some_id_here").await.unwrap_err();
    assert_eq!(delete_err.kind(), ErrorKind::InvalidArgument);

    let update_err = repo
        .add_favorite_food("some_id_here", "hamburger")
        .await
        .unwrap_err();
    assert_eq!(update_err.kind(), ErrorKind::InvalidArgument);
}

#[tokio::test]
async fn find_then_save_appends_hamburger() {
    let repo = repository().await;
    let created = repo
        .create_one(person("John Doe", 25, &["pizza", "pasta"]))
        .await
        .unwrap();

    let updated = repo
        .add_favorite_food(&created.id.to_string(), "hamburger")
        .await
        .unwrap();

    assert_eq!(
        updated.favorite_foods.len(),
        created.favorite_foods.len() + 1
    );
    assert_eq!(
        updated.favorite_foods.last().map(String::as_str),
        Some("hamburger")
    );

    let stored = repo
        .find_by_id(&created.id.to_string())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored, updated);
}

#[tokio::test]
async fn find_then_save_cannot_change_id_or_break_validation() {
    let repo = repository().await;
    let created = repo.create_one(person("Ann", 41, &[])).await.unwrap();
    let other = repo.create_one(person("Zed", 50, &[])).await.unwrap();
    let id = created.id.to_string();

    let updated = repo
        .update_by_find_then_save(&id, |person| {
            person.id = other.id;
            person.age = Some(42);
        })
        .await
        .unwrap();
    assert_eq!(updated.id, created.id);
    assert_eq!(
        repo.find_by_id(&other.id.to_string()).await.unwrap().unwrap().age,
        Some(50)
    );

    let err = repo
        .update_by_find_then_save(&id, |person| person.name.clear())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn find_then_save_on_missing_id_is_not_found() {
    let repo = repository().await;
    let created = repo.create_one(person("Bob", 22, &[])).await.unwrap();
    let id = created.id.to_string();
    repo.delete_by_id(&id).await.unwrap();

    let err = repo.add_favorite_food(&id, "hamburger").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn update_age_by_name_changes_only_age() {
    let repo = repository().await;
    let created = repo
        .create_one(person("Alice", 30, &["sushi", "ramen"]))
        .await
        .unwrap();

    let updated = repo.update_age_by_name("Alice", 20).await.unwrap();

    assert_eq!(updated.id, created.id);
    assert_eq!(updated.age, Some(20));
    assert_eq!(updated.name, created.name);
    assert_eq!(updated.favorite_foods, created.favorite_foods);

    let err = repo.update_age_by_name("Nobody", 20).await.unwrap_err();
    assert!(matches!(err, RepoError::NotFound(_)));
}

#[tokio::test]
async fn delete_by_id_returns_snapshot_then_not_found() {
    let repo = repository().await;
    let created = repo.create_one(person("John Doe", 25, &["pizza"])).await.unwrap();
    let id = created.id.to_string();

    let removed = repo.delete_by_id(&id).await.unwrap();
    assert_eq!(removed, Some(created));
    assert!(repo.find_by_id(&id).await.unwrap().is_none());
    assert!(repo.delete_by_id(&id).await.unwrap().is_none());
}

#[tokio::test]
async fn delete_many_by_name_reports_count() {
    let repo = repository().await;
    repo.create_many(tutorial_people()).await.unwrap();
    repo.create_one(person("Mary", 35, &["soup"])).await.unwrap();

    let removed = repo.delete_many_by_name("Mary").await.unwrap();

    assert_eq!(removed, 2);
    assert!(repo.find_by_name("Mary").await.unwrap().is_empty());
    assert_eq!(repo.count().await.unwrap(), 2);
    assert_eq!(repo.delete_many_by_name("Mary").await.unwrap(), 0);
}

#[tokio::test]
async fn query_chain_sorts_limits_and_hides_age() {
    let repo = repository().await;
    repo.create_many(vec![
        person("Zed", 50, &["burritos"]),
        person("Ann", 41, &["tacos", "burritos"]),
    ])
    .await
    .unwrap();

    let two = repo.query_chain("burritos").await.unwrap();
    let names: Vec<_> = two.iter().map(|p| p.name.clone().unwrap()).collect();
    assert_eq!(names, vec!["Ann", "Zed"]);
    assert!(two.iter().all(|p| p.age.is_none()));

    repo.create_one(person("Abe", 60, &["burritos"])).await.unwrap();
    let capped = repo.query_chain("burritos").await.unwrap();
    let names: Vec<_> = capped.iter().map(|p| p.name.clone().unwrap()).collect();
    assert_eq!(names, vec!["Abe", "Ann"]);
}

#[tokio::test]
async fn find_runs_custom_queries() {
    let repo = repository().await;
    repo.create_many(tutorial_people()).await.unwrap();

    let everyone = repo
        .find(PersonQuery::new(PersonFilter::All))
        .await
        .unwrap();
    assert_eq!(everyone.len(), 3);
    assert!(everyone.iter().all(|p| p.age.is_some()));
}

#[tokio::test]
async fn clones_share_the_same_collection() {
    let repo = repository().await;
    let clone = repo.clone();

    let created = clone.create_one(person("Bob", 22, &[])).await.unwrap();
    let loaded = repo.find_by_id(&created.id.to_string()).await.unwrap();
    assert_eq!(loaded, Some(created));
}

#[tokio::test]
async fn generous_timeout_does_not_change_results() {
    let repo = repository()
        .await
        .with_operation_timeout(Duration::from_secs(30));

    let created = repo.create_one(person("Ann", 41, &[])).await.unwrap();
    assert_eq!(repo.find_by_name("Ann").await.unwrap(), vec![created]);
}

#[tokio::test]
async fn operation_timeout_surfaces_as_store_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("people.db");
    let repo = PersonRepository::from_connection(open_db(&path).unwrap())
        .unwrap()
        .with_operation_timeout(Duration::from_millis(50));

    let writer = rusqlite::Connection::open(&path).unwrap();
    writer.execute_batch("BEGIN IMMEDIATE;").unwrap();

    let err = repo.create_one(person("Ann", 41, &[])).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Store);
    assert!(matches!(
        err,
        RepoError::Db(DbError::Timeout(limit)) if limit == Duration::from_millis(50)
    ));

    writer.execute_batch("ROLLBACK;").unwrap();
}

#[tokio::test]
async fn from_connection_rejects_unmigrated_connections() {
    let conn = rusqlite::Connection::open_in_memory().unwrap();
    let err = match PersonRepository::from_connection(conn) {
        Ok(_) => panic!("expected unmigrated connection to be rejected"),
        Err(err) => err,
    };
    assert_eq!(err.kind(), ErrorKind::Store);

    assert!(PersonRepository::from_connection(open_db_in_memory().unwrap()).is_ok());
}

#[tokio::test]
async fn connect_rejects_unknown_connection_strings() {
    let err = match PersonRepository::connect("mongodb://localhost/people").await {
        Ok(_) => panic!("expected connection string to be rejected"),
        Err(err) => err,
    };
    assert_eq!(err.kind(), ErrorKind::Store);
}
