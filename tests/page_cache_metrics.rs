mod support;

use std::collections::HashSet;
use std::time::Duration;

use axum::http::StatusCode;
use metrics_util::debugging::DebuggingRecorder;
use support::{INDEX_TTL, TestApp};
use yatube::infra::cache::{CACHE_EXPIRED_TOTAL, CACHE_HIT_TOTAL, CACHE_MISS_TOTAL};

#[tokio::test(start_paused = true)]
async fn page_cache_emits_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let app = TestApp::new();
    let author = app.store.add_user("leo");
    app.store.add_post(&author, "metrics post", None);

    // miss, hit, then expired + miss
    for advance in [Duration::ZERO, Duration::ZERO, INDEX_TTL] {
        tokio::time::advance(advance).await;
        let response = app.get("/", None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    for metric in [CACHE_HIT_TOTAL, CACHE_MISS_TOTAL, CACHE_EXPIRED_TOTAL] {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
    assert_eq!(CACHE_HIT_TOTAL, "yatube_page_cache_hit_total");
}
