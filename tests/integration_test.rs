//! Integration tests for recordkit.

#![allow(clippy::expect_used)]

use proptest::prelude::*;
use recordkit::{
    ActiveRecord, AttributeType, Attributes, Condition, EntityDescription, Error,
    PersistenceCoordinator, Predicate, Query, RecordState, SchemaModel, StoreConfig, StoreKind,
    Value,
};
use tempfile::TempDir;

struct Person;
impl ActiveRecord for Person {}

struct Badge;
impl ActiveRecord for Badge {}

fn schema() -> SchemaModel {
    SchemaModel::new(vec![
        EntityDescription::new("Person")
            .attribute("name", AttributeType::String)
            .attribute("firstName", AttributeType::String)
            .attribute("age", AttributeType::Integer)
            .attribute("active", AttributeType::Boolean),
        EntityDescription::new("Badge")
            .required("label", AttributeType::String)
            .relationship("owner", "Person"),
    ])
    .expect("valid schema")
}

/// Helper to create a coordinator backed by a temporary directory.
fn create_test_stack() -> (PersistenceCoordinator, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = StoreConfig::new("IntegrationTest", schema()).with_directory(temp_dir.path());
    let stack = PersistenceCoordinator::open(config).expect("Failed to open stack");
    (stack, temp_dir)
}

fn attributes(pairs: &[(&str, Value)]) -> Attributes {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}

#[test]
fn test_create_ten_then_delete_all() {
    let (mut stack, _temp) = create_test_stack();

    for i in 0..10 {
        let person = Person::create(&mut stack).expect("create failed");
        stack
            .context_mut()
            .set_value(person, "age", i)
            .expect("set_value failed");
    }
    assert!(stack.save_context());
    assert_eq!(Person::all(&mut stack).expect("all failed").len(), 10);

    assert_eq!(Person::delete_all(&mut stack).expect("delete_all failed"), 10);
    assert!(stack.save_context());
    assert!(Person::all(&mut stack).expect("all failed").is_empty());
}

#[test]
fn test_where_condition_raw_string() {
    let (mut stack, _temp) = create_test_stack();

    let john = Person::create_with(
        Some(&attributes(&[("name", Value::from("John"))])),
        stack.context_mut(),
    )
    .expect("create_with failed")
    .expect("attributes were given");
    Person::create_with(
        Some(&attributes(&[("name", Value::from("Jane"))])),
        stack.context_mut(),
    )
    .expect("create_with failed");
    assert!(stack.save_context());

    let found = Person::where_condition(&mut stack, "name == 'John'").expect("where failed");
    assert_eq!(found, vec![john]);
    let record = found[0].get(stack.context()).expect("handle resolves");
    assert_eq!(record.get("name"), Some(&Value::from("John")));
}

#[test]
fn test_where_shapes_agree() {
    let (mut stack, _temp) = create_test_stack();
    for (name, age) in [("Ann", 31), ("Bob", 25), ("Cid", 31)] {
        Person::create_with(
            Some(&attributes(&[("name", Value::from(name)), ("age", Value::from(age))])),
            stack.context_mut(),
        )
        .expect("create_with failed");
    }
    assert!(stack.save_context());

    let by_map = Person::where_condition(&mut stack, Condition::equals([("age", 31)]))
        .expect("map condition failed");
    let by_predicate = Person::where_condition(&mut stack, Predicate::eq("age", 31))
        .expect("predicate condition failed");
    let by_raw = Person::where_condition(&mut stack, "age = 31").expect("raw condition failed");
    assert_eq!(by_map.len(), 2);
    assert_eq!(by_map, by_predicate);
    assert_eq!(by_map, by_raw);

    let ctx = stack.context_mut();
    let limited = Person::where_in_context(
        ctx,
        Query::matching(Condition::equals([("age", 31)]))
            .order("name DESC")
            .limit(1),
    )
    .expect("limited fetch failed");
    assert_eq!(limited.len(), 1);
    assert_eq!(
        limited[0].get(ctx).expect("resolves").get("name"),
        Some(&Value::from("Cid"))
    );
}

#[test]
fn test_create_save_lifecycle() {
    let (mut stack, _temp) = create_test_stack();

    let person = Person::create(&mut stack).expect("create failed");
    assert!(stack.context().has_changes());
    assert_eq!(
        person.get(stack.context()).expect("resolves").state(),
        RecordState::Unsaved
    );

    assert!(person.save(stack.context_mut()));
    assert!(!stack.context().has_changes());
    assert_eq!(
        person.get(stack.context()).expect("resolves").state(),
        RecordState::Saved
    );

    person.delete(stack.context_mut()).expect("delete failed");
    assert!(person.save(stack.context_mut()));
    assert_eq!(
        person.get(stack.context()).expect("resolves").state(),
        RecordState::Purged
    );
    assert!(Person::all(&mut stack).expect("all failed").is_empty());
}

#[test]
fn test_update_applies_without_commit() {
    let (mut stack, temp) = create_test_stack();
    let person = Person::create(&mut stack).expect("create failed");
    assert!(stack.save_context());

    person
        .update(
            stack.context_mut(),
            &attributes(&[("first_name", Value::from("Ann")), ("active", Value::from("yes"))]),
        )
        .expect("update failed");
    let record = person.get(stack.context()).expect("resolves");
    assert_eq!(record.get("firstName"), Some(&Value::from("Ann")));
    assert_eq!(record.get("active"), Some(&Value::Boolean(true)));

    // Visible in this context before saving.
    assert_eq!(
        Person::count_where(Condition::equals([("first_name", "Ann")]), stack.context())
            .expect("count failed"),
        1
    );
    assert_eq!(
        Person::count_where(Condition::equals([("active", "yes")]), stack.context())
            .expect("count failed"),
        1
    );

    // A second stack on the same file sees only committed data.
    let other = PersistenceCoordinator::open(
        StoreConfig::new("IntegrationTest", schema()).with_directory(temp.path()),
    )
    .expect("second stack");
    assert_eq!(
        Person::count_where(Predicate::eq("firstName", "Ann"), other.context())
            .expect("count failed"),
        0
    );
}

#[test]
fn test_reset_makes_handles_stale() {
    let (mut stack, _temp) = create_test_stack();
    let person = Person::create(&mut stack).expect("create failed");
    assert!(stack.save_context());
    let mut old_context = stack.new_context();

    stack.reset().expect("reset failed");

    assert!(matches!(
        person.get(stack.context()),
        Err(Error::StaleHandle { .. })
    ));
    assert!(matches!(
        Person::all_in_context(&mut old_context, None),
        Err(Error::StaleHandle { .. })
    ));
    assert_eq!(Person::count(&stack).expect("count failed"), 0);
}

#[test]
fn test_save_through_stale_context_fails() {
    let (mut stack, _temp) = create_test_stack();
    let mut old_context = stack.new_context();
    let person = Person::create_in_context(&mut old_context).expect("create failed");
    assert!(person.save(&mut old_context));
    assert_eq!(old_context.records().expect("records failed").count(), 1);

    stack.reset().expect("reset failed");

    assert!(!old_context.is_valid());
    assert!(matches!(
        person.try_save(&mut old_context),
        Err(Error::StaleHandle { .. })
    ));
    assert!(!person.save(&mut old_context));
    assert!(matches!(
        old_context.try_save(),
        Err(Error::StaleHandle { .. })
    ));
    assert!(matches!(
        old_context.records(),
        Err(Error::StaleHandle { .. })
    ));
    assert!(!person.save(stack.context_mut()));
}

#[test]
fn test_in_memory_then_reset() {
    let (mut stack, temp) = create_test_stack();
    Person::create(&mut stack).expect("create failed");
    assert!(stack.save_context());

    stack.use_in_memory_store().expect("in-memory switch failed");
    assert_eq!(stack.store_kind(), StoreKind::InMemory);
    Person::create(&mut stack).expect("create failed");
    Person::create(&mut stack).expect("create failed");
    assert!(stack.save_context());
    assert_eq!(Person::count(&stack).expect("count failed"), 2);

    stack.reset().expect("reset failed");
    assert_eq!(stack.store_kind(), StoreKind::OnDisk);
    assert_eq!(
        stack.store_path(),
        Some(temp.path().join("IntegrationTest.sqlite").as_path())
    );
    assert_eq!(Person::count(&stack).expect("count failed"), 0);
}

#[test]
fn test_failed_save_preserves_pending_changes() {
    let (mut stack, _temp) = create_test_stack();
    let person = Person::create(&mut stack).expect("create failed");
    let badge = Badge::create(&mut stack).expect("create failed");

    assert!(!stack.save_context());
    assert!(stack.context().has_changes());
    assert!(matches!(
        stack.try_save_context(),
        Err(Error::Storage(_))
    ));
    assert_eq!(
        person.get(stack.context()).expect("resolves").state(),
        RecordState::Unsaved
    );

    stack
        .context_mut()
        .set_value(badge, "label", "founder")
        .expect("set label");
    assert!(stack.save_context());
    assert_eq!(Badge::count(&stack).expect("count failed"), 1);
    assert_eq!(Person::count(&stack).expect("count failed"), 1);
}

#[test]
fn test_relationship_set_by_object_id() {
    let (mut stack, _temp) = create_test_stack();
    let person = Person::create(&mut stack).expect("create failed");
    assert!(stack.save_context());
    let owner_id = person
        .get(stack.context())
        .expect("resolves")
        .object_id()
        .expect("saved record has an id");

    Badge::create_with(
        Some(&attributes(&[
            ("label", Value::from("gold")),
            ("owner", Value::Integer(owner_id)),
        ])),
        stack.context_mut(),
    )
    .expect("create_with failed");
    assert!(stack.save_context());

    assert_eq!(
        Badge::count_where(Predicate::eq("owner", owner_id), stack.context())
            .expect("count failed"),
        1
    );
}

#[test]
fn test_malformed_condition_is_error_not_empty() {
    let (mut stack, _temp) = create_test_stack();
    assert!(Person::where_condition(&mut stack, "name ==").is_err());
    assert!(Person::where_condition(&mut stack, Predicate::eq("nickname", "x")).is_err());
    assert!(
        Person::where_condition(&mut stack, "name == 'nobody'")
            .expect("valid fetch")
            .is_empty()
    );
}

#[test]
fn test_explicit_context_operations() {
    let (mut stack, _temp) = create_test_stack();
    let mut ctx = stack.new_context();

    Person::create_in_context(&mut ctx).expect("create failed");
    assert_eq!(Person::count_in_context(&ctx).expect("count failed"), 1);
    assert_eq!(Person::count(&stack).expect("count failed"), 0);

    assert!(ctx.save());
    assert_eq!(Person::count(&stack).expect("count failed"), 1);

    Person::delete_all_in_context(&mut ctx).expect("delete_all failed");
    assert!(ctx.save());
    assert!(
        Person::all_with_order(&mut stack, "age DESC")
            .expect("all failed")
            .is_empty()
    );
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_count_matches_all(ages in prop::collection::vec(0i64..100, 0..12), threshold in 0i64..100) {
        let (mut stack, _temp) = create_test_stack();
        for age in &ages {
            let person = Person::create(&mut stack).expect("create failed");
            stack.context_mut().set_value(person, "age", *age).expect("set age");
        }
        prop_assert!(stack.save_context());

        let all = Person::all(&mut stack).expect("all failed");
        prop_assert_eq!(Person::count(&stack).expect("count failed"), all.len());
        prop_assert_eq!(all.len(), ages.len());

        let condition = Predicate::lt("age", threshold);
        let matching = Person::where_condition(&mut stack, condition.clone()).expect("where failed");
        let counted = Person::count_where(condition, stack.context()).expect("count failed");
        prop_assert_eq!(matching.len(), counted);
        prop_assert_eq!(counted, ages.iter().filter(|a| **a < threshold).count());
    }

    #[test]
    fn prop_equality_map_is_conjunction(
        rows in prop::collection::vec((0i64..3, any::<bool>()), 1..10),
        age in 0i64..3,
        active in any::<bool>(),
    ) {
        let (mut stack, _temp) = create_test_stack();
        for (row_age, row_active) in &rows {
            Person::create_with(
                Some(&attributes(&[
                    ("age", Value::Integer(*row_age)),
                    ("active", Value::Boolean(*row_active)),
                ])),
                stack.context_mut(),
            )
            .expect("create_with failed");
        }
        prop_assert!(stack.save_context());

        let both = Condition::equals([("age", Value::Integer(age)), ("active", Value::Boolean(active))]);
        let expected = rows.iter().filter(|(a, b)| *a == age && *b == active).count();
        prop_assert_eq!(Person::count_where(both, stack.context()).expect("count failed"), expected);

        let none = Condition::equals(Vec::<(String, Value)>::new());
        prop_assert_eq!(Person::count_where(none, stack.context()).expect("count failed"), rows.len());
    }

    #[test]
    fn prop_order_direction_policy(token in "[A-Za-z]{1,5}") {
        let (mut stack, _temp) = create_test_stack();
        for age in [2, 1, 3] {
            let person = Person::create(&mut stack).expect("create failed");
            stack.context_mut().set_value(person, "age", age).expect("set age");
        }
        prop_assert!(stack.save_context());

        let ordered = Person::all_with_order(&mut stack, format!("age {token}")).expect("all failed");
        let ctx = stack.context();
        let ages: Vec<Value> = ordered
            .iter()
            .map(|r| r.get(ctx).expect("resolves").get("age").cloned().unwrap_or(Value::Null))
            .collect();
        let ascending = vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)];
        if token.eq_ignore_ascii_case("asc") {
            prop_assert_eq!(ages, ascending);
        } else {
            prop_assert_eq!(ages, ascending.into_iter().rev().collect::<Vec<_>>());
        }
    }
}

mod cli {
    use assert_cmd::Command;
    use predicates::prelude::*;
    use tempfile::TempDir;

    const SCHEMA: &str = r#"{"entities": [{"name": "Person", "fields": [
        {"name": "firstName", "kind": "attribute", "type": "string"},
        {"name": "age", "kind": "attribute", "type": "integer"}
    ]}]}"#;

    fn recordkit(dir: &TempDir) -> Command {
        let schema = dir.path().join("model.json");
        if !schema.exists() {
            std::fs::write(&schema, SCHEMA).expect("write schema");
        }
        let mut cmd = Command::cargo_bin("recordkit").expect("binary exists");
        cmd.env_remove("RUST_LOG")
            .arg("--app-name")
            .arg("Cli")
            .arg("--store-dir")
            .arg(dir.path())
            .arg("--schema")
            .arg(schema);
        cmd
    }

    #[test]
    fn test_cli_create_and_where() {
        let dir = TempDir::new().expect("temp dir");
        recordkit(&dir)
            .args(["create", "Person", r#"{"first_name": "John", "age": 40}"#])
            .assert()
            .success()
            .stdout(predicate::str::contains("Created Person record 1"));

        recordkit(&dir)
            .args(["where", "Person", "firstName == 'John'"])
            .assert()
            .success()
            .stdout(predicate::str::contains("John"));

        recordkit(&dir)
            .args(["--format", "json", "count", "Person"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"count\": 1"));
    }

    #[test]
    fn test_cli_bad_condition_fails() {
        let dir = TempDir::new().expect("temp dir");
        recordkit(&dir)
            .args(["where", "Person", r#"{"age": [1, 2]}"#])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Error:"));
    }

    #[test]
    fn test_cli_reset_requires_yes() {
        let dir = TempDir::new().expect("temp dir");
        recordkit(&dir)
            .arg("reset")
            .assert()
            .failure()
            .stderr(predicate::str::contains("--yes"));
        recordkit(&dir).args(["reset", "--yes"]).assert().success();
    }
}
