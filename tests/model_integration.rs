// tests/model_integration.rs

use serde_json::{json, Value};


use backend_test_utils::shared::{MemoryBackend, Post};
use parse_model::{Model, ModelError, ModelExt, ParseRecord};

#[test]
fn write_then_read_returns_the_written_value() {
    let mut post = Post::create();

    post.write("title", "A Title").unwrap();
    post.write("score", 42).unwrap();
    post.write("body", json!({"nested": [1, 2, 3]})).unwrap();

    assert_eq!(post.read("title").unwrap(), json!("A Title"));
    assert_eq!(post.read("score").unwrap(), json!(42));
    assert_eq!(post.read("body").unwrap(), json!({"nested": [1, 2, 3]}));
}

#[test]
fn declared_but_unset_fields_read_as_null() {
    let post = Post::create();
    assert_eq!(post.read("title").unwrap(), Value::Null);
}

#[test]
fn undeclared_names_fail_with_unknown_operation() {
    let mut post = Post::create();

    match post.read("publishedAt") {
        Err(ModelError::UnknownOperation {
            class_name,
            operation,
        }) => {
            assert_eq!(class_name, "Post");
            assert_eq!(operation, "publishedAt");
        }
        other => panic!("expected UnknownOperation, got {:?}", other),
    }

    assert!(matches!(
        post.write("publishedAt", 1),
        Err(ModelError::UnknownOperation { .. })
    ));
    assert!(matches!(
        post.invoke("publish", &[]),
        Err(ModelError::UnknownOperation { .. })
    ));
}

#[test]
fn construction_from_mapping_drops_undeclared_keys() {
    let post = Post::with_fields(vec![
        ("title".to_string(), json!("A")),
        ("body".to_string(), json!("B")),
        ("ignored".to_string(), json!("X")),
    ]);

    assert_eq!(post.read("title").unwrap(), json!("A"));
    assert_eq!(post.read("body").unwrap(), json!("B"));
    assert!(!post.record().has("ignored"));
    assert!(matches!(
        post.read("ignored"),
        Err(ModelError::UnknownOperation { .. })
    ));
}

#[test]
fn adopting_an_existing_record_preserves_it() {
    let mut record = ParseRecord::new("Post");
    record.object_id = Some("seeded01".to_string());
    record.set("title", "already there");

    let post = Post::from_record(record);
    assert_eq!(post.object_id(), Some("seeded01"));
    assert_eq!(post.read("title").unwrap(), json!("already there"));
    // Native surface reads resolve after the declared-field stage.
    assert_eq!(post.read("objectId").unwrap(), json!("seeded01"));
    assert_eq!(post.read("className").unwrap(), json!("Post"));
}

#[test]
fn native_operations_pass_through_invoke() {
    let mut post = Post::create();
    post.write("title", "t").unwrap();

    assert_eq!(post.invoke("has", &[json!("title")]).unwrap(), json!(true));
    post.invoke("unset", &[json!("title")]).unwrap();
    assert_eq!(post.invoke("has", &[json!("title")]).unwrap(), json!(false));
}

#[tokio::test]
async fn save_creates_then_updates() {
    let backend = MemoryBackend::new();
    let mut post = Post::create();
    post.write("title", "first").unwrap();

    post.save(&backend).await.unwrap();
    let object_id = post.object_id().expect("create assigns an objectId").to_string();
    assert!(post.record().created_at.is_some());
    assert!(post.record().updated_at.is_none());

    post.write("title", "second").unwrap();
    post.save(&backend).await.unwrap();
    assert!(post.record().updated_at.is_some());

    let fetched = Post::query(backend.clone()).get(&object_id).await.unwrap();
    assert_eq!(fetched.read("title").unwrap(), json!("second"));
}

#[tokio::test]
async fn destroy_removes_the_saved_record() {
    let backend = MemoryBackend::new();
    let mut post = Post::create();
    post.write("title", "doomed").unwrap();
    post.save(&backend).await.unwrap();

    assert_eq!(Post::query(backend.clone()).count().await.unwrap(), 1);
    post.destroy(&backend).await.unwrap();
    assert_eq!(Post::query(backend.clone()).count().await.unwrap(), 0);
}

#[tokio::test]
async fn destroy_of_an_unsaved_record_is_rejected() {
    let backend = MemoryBackend::new();
    let post = Post::create();
    assert!(matches!(
        post.destroy(&backend).await,
        Err(ModelError::InvalidInput(_))
    ));
}
