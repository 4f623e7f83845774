//! Tutorial runner for the person collection.
//!
//! # Responsibility
//! - Connect to the store named by `PERSONDB_URI`.
//! - Walk through the create/read/update/delete/query steps in order and
//!   print each result.
//!
//! # Invariants
//! - A failing step is reported and the next step still runs.
//! - A failed initial connection is reported but does not fail the process.

use log::{error, info};
use persondb_core::{
    core_version, init_logging, AppConfig, NewPerson, PersonRepository, RepoResult,
};
use serde::Serialize;
use std::future::Future;
use std::process::ExitCode;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err}");
            return ExitCode::FAILURE;
        }
    };

    if let Some(log_dir) = &config.log_dir {
        if let Err(err) = init_logging(config.log_level, log_dir) {
            eprintln!("logging disabled: {err}");
        }
    }
    info!(
        "event=cli_start module=cli status=ok version={}",
        core_version()
    );

    let repo = match PersonRepository::connect(&config.store_uri).await {
        Ok(repo) => {
            println!("Connected to person store");
            repo
        }
        Err(err) => {
            error!("event=cli_connect module=cli status=error error={err}");
            eprintln!("Connection error: {err}");
            return ExitCode::SUCCESS;
        }
    };

    run_tutorial(&repo).await;
    ExitCode::SUCCESS
}

fn john_doe() -> NewPerson {
    NewPerson::new("John Doe")
        .with_age(25)
        .with_favorite_foods(["pizza", "pasta"])
}

fn tutorial_people() -> Vec<NewPerson> {
    vec![
        NewPerson::new("Alice")
            .with_age(30)
            .with_favorite_foods(["sushi", "ramen"]),
        NewPerson::new("Bob")
            .with_age(22)
            .with_favorite_foods(["burger", "fries"]),
        NewPerson::new("Mary")
            .with_age(28)
            .with_favorite_foods(["salad"]),
    ]
}

async fn run_tutorial(repo: &PersonRepository) {
    let john = step("Person saved", repo.create_one(john_doe())).await;
    step("People created", repo.create_many(tutorial_people())).await;
    step("People found by name", repo.find_by_name("Alice")).await;
    step("Person who likes pizza", repo.find_one_by_food("pizza")).await;

    // Steps addressing one record reuse the id from the first step.
    let john_id = john.map(|person| person.id.to_string()).unwrap_or_default();
    step("Person by ID", repo.find_by_id(&john_id)).await;
    step(
        "Updated person",
        repo.add_favorite_food(&john_id, "hamburger"),
    )
    .await;
    step("Updated person age", repo.update_age_by_name("Alice", 20)).await;
    step("Removed person", repo.delete_by_id(&john_id)).await;
    step("Remove result", repo.delete_many_by_name("Mary")).await;
    step("Query chain result", repo.query_chain("burritos")).await;
}

async fn step<T, F>(label: &str, operation: F) -> Option<T>
where
    T: Serialize,
    F: Future<Output = RepoResult<T>>,
{
    match operation.await {
        Ok(value) => {
            println!("{label}: {}", render(&value));
            Some(value)
        }
        Err(err) => {
            eprintln!("{label} failed [{}]: {err}", err.kind().as_str());
            None
        }
    }
}

fn render<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|err| format!("<unrenderable: {err}>"))
}
