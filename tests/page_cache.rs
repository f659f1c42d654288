mod support;

use std::time::Duration;

use axum::http::StatusCode;
use support::{INDEX_CAPACITY, INDEX_TTL, TestApp, body_text};

#[tokio::test(start_paused = true)]
async fn feed_is_served_from_cache_until_ttl_expires() {
    let app = TestApp::new();
    let author = app.store.add_user("leo");
    let post = app.store.add_post(&author, "soon to vanish", None);

    let first = body_text(app.get("/", None).await).await;
    assert!(first.contains("soon to vanish"));

    app.store.delete_post(post.id);
    assert!(app.store.posts().is_empty());

    tokio::time::advance(INDEX_TTL - Duration::from_secs(1)).await;
    let cached = body_text(app.get("/", None).await).await;
    assert_eq!(cached, first);

    tokio::time::advance(Duration::from_secs(1)).await;
    let fresh = body_text(app.get("/", None).await).await;
    assert!(!fresh.contains("soon to vanish"));
}

#[tokio::test(start_paused = true)]
async fn cache_entries_vary_by_query_and_viewer() {
    let app = TestApp::new();
    let author = app.store.add_user("leo");
    for n in 0..11 {
        app.store.add_post(&author, &format!("entry {n}"), None);
    }

    let _ = app.get("/", None).await;
    let _ = app.get("/?page=2", None).await;
    let _ = app.get("/", Some("leo")).await;
    assert_eq!(app.cache.len().await, 3);

    let _ = app.get("/", None).await;
    let _ = app.get("/?page=1", None).await;
    let _ = app.get("/?page=abc", None).await;
    assert_eq!(app.cache.len().await, 3);
}

#[tokio::test(start_paused = true)]
async fn unrelated_query_parameters_share_the_first_page_entry() {
    let app = TestApp::new();
    let author = app.store.add_user("leo");
    app.store.add_post(&author, "only entry", None);

    let first = body_text(app.get("/", None).await).await;
    for n in 0..500 {
        let response = app.get(&format!("/?junk={n}"), None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
    assert_eq!(app.cache.len().await, 1);

    let again = body_text(app.get("/?utm_source=mail", None).await).await;
    assert_eq!(again, first);
}

#[tokio::test(start_paused = true)]
async fn cache_size_stays_bounded() {
    let app = TestApp::new();
    let author = app.store.add_user("leo");
    app.store.add_post(&author, "only entry", None);

    for n in 0..500 {
        let _ = app.get(&format!("/?page={n}"), None).await;
    }
    assert!(app.cache.len().await <= INDEX_CAPACITY);

    tokio::time::advance(INDEX_TTL * 10).await;
    let _ = app.get("/", None).await;
    assert_eq!(app.cache.len().await, 1);
}

#[tokio::test(start_paused = true)]
async fn other_listings_are_never_cached() {
    let app = TestApp::new();
    let author = app.store.add_user("leo");
    let post = app.store.add_post(&author, "profile entry", None);

    let first = body_text(app.get("/profile/leo/", None).await).await;
    assert!(first.contains("profile entry"));

    app.store.delete_post(post.id);
    let second = body_text(app.get("/profile/leo/", None).await).await;
    assert!(!second.contains("profile entry"));
    assert!(app.cache.is_empty().await);
}

#[tokio::test(start_paused = true)]
async fn error_responses_are_not_cached() {
    let app = TestApp::new();
    let response = app.get("/", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    app.cache.clear().await;

    let response = app.get("/missing/", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(app.cache.is_empty().await);
}
