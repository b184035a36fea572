// tests/query_integration.rs

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::json;


use backend_test_utils::shared::{MemoryBackend, Post};
use parse_model::{ModelError, ModelExt};

async fn seed_posts(backend: &MemoryBackend) -> Vec<String> {
    let mut ids = Vec::new();
    for (title, score) in [("alpha", 10), ("beta", 20), ("gamma", 30)] {
        let mut post = Post::create();
        post.write("title", title).unwrap();
        post.write("score", score).unwrap();
        post.save(backend).await.unwrap();
        ids.push(post.object_id().unwrap().to_string());
    }
    ids
}

#[tokio::test]
async fn find_wraps_every_record_in_reported_order() {
    let backend = MemoryBackend::new();
    let ids = seed_posts(&backend).await;

    let posts = Post::query(backend.clone()).find().await.unwrap();
    assert_eq!(posts.len(), 3);

    let found_ids: Vec<_> = posts
        .iter()
        .map(|post| post.object_id().unwrap().to_string())
        .collect();
    assert_eq!(found_ids, ids);

    let titles: Vec<_> = posts
        .iter()
        .map(|post| post.read("title").unwrap())
        .collect();
    assert_eq!(titles, vec![json!("alpha"), json!("beta"), json!("gamma")]);
}

#[tokio::test]
async fn find_with_no_matches_is_empty() {
    let backend = MemoryBackend::new();
    seed_posts(&backend).await;

    let mut query = Post::query(backend.clone());
    query.equal_to("title", "delta");
    assert!(query.find().await.unwrap().is_empty());
}

#[tokio::test]
async fn constraints_filter_results() {
    let backend = MemoryBackend::new();
    seed_posts(&backend).await;

    let mut query = Post::query(backend.clone());
    query.greater_than("score", 10).less_than("score", 30);
    let posts = query.find().await.unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].read("title").unwrap(), json!("beta"));
}

#[tokio::test]
async fn descending_order_is_respected() {
    let backend = MemoryBackend::new();
    seed_posts(&backend).await;

    let mut query = Post::query(backend.clone());
    query.order_by_descending("score");
    let posts = query.find().await.unwrap();
    let scores: Vec<_> = posts
        .iter()
        .map(|post| post.read("score").unwrap())
        .collect();
    assert_eq!(scores, vec![json!(30), json!(20), json!(10)]);
}

#[tokio::test]
async fn substring_and_membership_constraints_match() {
    let backend = MemoryBackend::new();
    seed_posts(&backend).await;

    let mut starts = Post::query(backend.clone());
    starts.starts_with("title", "be");
    let posts = starts.find().await.unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].read("title").unwrap(), json!("beta"));

    let mut within = Post::query(backend.clone());
    within.contained_in("title", vec!["alpha", "gamma"]);
    assert_eq!(within.count().await.unwrap(), 2);
}

#[tokio::test]
async fn first_returns_the_first_match_or_none() {
    let backend = MemoryBackend::new();
    seed_posts(&backend).await;

    let mut query = Post::query(backend.clone());
    query.greater_than_or_equal_to("score", 20);
    let first = query.first().await.unwrap().expect("a match exists");
    assert_eq!(first.read("title").unwrap(), json!("beta"));

    let mut none_query = Post::query(backend.clone());
    none_query.equal_to("title", "delta");
    assert!(none_query.first().await.unwrap().is_none());
}

#[tokio::test]
async fn get_fetches_by_identifier() {
    let backend = MemoryBackend::new();
    let ids = seed_posts(&backend).await;

    let post = Post::query(backend.clone()).get(&ids[1]).await.unwrap();
    assert_eq!(post.read("title").unwrap(), json!("beta"));

    assert!(matches!(
        Post::query(backend.clone()).get("nosuchid").await,
        Err(ModelError::ObjectNotFound(_))
    ));
}

#[tokio::test]
async fn count_matches_without_constructing_adapters() {
    let backend = MemoryBackend::new();
    assert_eq!(Post::query(backend.clone()).count().await.unwrap(), 0);

    seed_posts(&backend).await;
    assert_eq!(Post::query(backend.clone()).count().await.unwrap(), 3);

    let mut query = Post::query(backend.clone());
    query.greater_than("score", 15);
    assert_eq!(query.count().await.unwrap(), 2);
}

#[tokio::test]
async fn find_in_background_invokes_callback_exactly_once() {
    let backend = MemoryBackend::new();
    seed_posts(&backend).await;

    let invocations = Arc::new(AtomicUsize::new(0));
    let seen = invocations.clone();
    let handle = Post::query(backend.clone()).find_in_background(move |result| {
        seen.fetch_add(1, Ordering::SeqCst);
        assert_eq!(result.unwrap().len(), 3);
    });
    handle.await.unwrap();
    assert_eq!(invocations.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn first_and_count_background_forms_deliver_once() {
    let backend = MemoryBackend::new();
    seed_posts(&backend).await;

    let invocations = Arc::new(AtomicUsize::new(0));

    let seen = invocations.clone();
    let first_handle = Post::query(backend.clone()).first_in_background(move |result| {
        seen.fetch_add(1, Ordering::SeqCst);
        assert!(result.unwrap().is_some());
    });

    let seen = invocations.clone();
    let count_handle = Post::query(backend.clone()).count_in_background(move |result| {
        seen.fetch_add(1, Ordering::SeqCst);
        assert_eq!(result.unwrap(), 3);
    });

    first_handle.await.unwrap();
    count_handle.await.unwrap();
    assert_eq!(invocations.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn background_failure_delivers_the_error_half_once() {
    let backend = MemoryBackend::new();
    seed_posts(&backend).await;

    let invocations = Arc::new(AtomicUsize::new(0));
    let seen = invocations.clone();
    let handle = Post::query(backend.clone()).get_in_background("nosuchid", move |result| {
        seen.fetch_add(1, Ordering::SeqCst);
        assert!(matches!(result, Err(ModelError::ObjectNotFound(_))));
    });
    handle.await.unwrap();
    assert_eq!(invocations.load(Ordering::SeqCst), 1);
}
