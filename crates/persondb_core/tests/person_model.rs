use persondb_core::{NewPerson, PersonField, PersonQuery, PersonValidationError, Projection};
use persondb_core::{Person, PersonId};

fn john_doe() -> Person {
    Person {
        id: "11111111-2222-4333-8444-555555555555".parse().unwrap(),
        name: "John Doe".to_string(),
        age: Some(25),
        favorite_foods: vec!["pizza".to_string(), "pasta".to_string()],
    }
}

#[test]
fn new_person_builder_sets_fields_in_order() {
    let person = NewPerson::new("Alice")
        .with_age(30)
        .with_favorite_foods(["sushi", "ramen"]);

    assert_eq!(person.name, "Alice");
    assert_eq!(person.age, Some(30));
    assert_eq!(person.favorite_foods, vec!["sushi", "ramen"]);
    assert!(person.validate().is_ok());
}

#[test]
fn missing_name_fails_validation() {
    let person = NewPerson::default().with_age(3);
    assert_eq!(person.validate(), Err(PersonValidationError::MissingName));
}

#[test]
fn person_serialization_uses_document_field_names() {
    let person = john_doe();

    let json = serde_json::to_value(&person).unwrap();
    assert_eq!(json["id"], "11111111-2222-4333-8444-555555555555");
    assert_eq!(json["name"], "John Doe");
    assert_eq!(json["age"], 25);
    assert_eq!(json["favoriteFoods"], serde_json::json!(["pizza", "pasta"]));

    let decoded: Person = serde_json::from_value(json).unwrap();
    assert_eq!(decoded, person);
}

#[test]
fn person_without_age_omits_the_field() {
    let mut person = john_doe();
    person.age = None;

    let json = serde_json::to_value(&person).unwrap();
    assert!(json.get("age").is_none());
}

#[test]
fn new_person_deserializes_with_defaults() {
    let person: NewPerson = serde_json::from_str(r#"{"name":"Mary"}"#).unwrap();
    assert_eq!(person, NewPerson::new("Mary"));
}

#[test]
fn exclusion_projection_drops_age_from_output() {
    let projection = PersonQuery::favorite_food_chain("burritos").projection;
    assert_eq!(projection, Projection::Exclude(vec![PersonField::Age]));

    let projected = projection.apply(john_doe());
    assert_eq!(projected.name.as_deref(), Some("John Doe"));
    assert_eq!(projected.age, None);

    let json = serde_json::to_value(&projected).unwrap();
    assert!(json.get("age").is_none());
    assert_eq!(json["favoriteFoods"], serde_json::json!(["pizza", "pasta"]));
}

#[test]
fn person_id_display_roundtrips_through_parse() {
    let id: PersonId = " 11111111-2222-4333-8444-555555555555 ".parse().unwrap();
    assert_eq!(id.to_string(), "11111111-2222-4333-8444-555555555555");
    assert_eq!(id.to_string().parse::<PersonId>().unwrap(), id);
}
