use std::{num::NonZeroUsize, sync::Arc, time::Duration};

use axum::{
    body::Body,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::Response,
};
use bytes::Bytes;
use http_body_util::BodyExt;
use lru::LruCache;
use thiserror::Error;
use tokio::{sync::Mutex, time::Instant};
use tracing::debug;

pub const CACHE_HIT_TOTAL: &str = "yatube_page_cache_hit_total";
pub const CACHE_MISS_TOTAL: &str = "yatube_page_cache_miss_total";
pub const CACHE_EXPIRED_TOTAL: &str = "yatube_page_cache_expired_total";

/// Process-wide store of rendered responses, each valid until its expiry.
///
/// Holds at most `capacity` entries; the least recently used one is evicted first.
#[derive(Clone)]
pub struct ResponseCache {
    entries: Arc<Mutex<LruCache<String, CachedResponse>>>,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(ttl: Duration, capacity: NonZeroUsize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(LruCache::new(capacity))),
            ttl,
        }
    }

    /// Return a live entry, dropping it instead when it has expired.
    pub async fn get(&self, key: &str) -> Option<Response<Body>> {
        let now = Instant::now();
        let mut guard = self.entries.lock().await;

        let live = match guard.peek(key) {
            Some(entry) => entry.expires_at > now,
            None => {
                metrics::counter!(CACHE_MISS_TOTAL).increment(1);
                debug!(target = "yatube::cache", key, "page cache miss");
                return None;
            }
        };

        if live {
            if let Some(entry) = guard.get(key) {
                metrics::counter!(CACHE_HIT_TOTAL).increment(1);
                debug!(target = "yatube::cache", key, "page cache hit");
                return Some(entry.clone().into_response());
            }
        } else {
            guard.pop(key);
            metrics::counter!(CACHE_EXPIRED_TOTAL).increment(1);
            debug!(target = "yatube::cache", key, "page cache entry expired");
        }

        metrics::counter!(CACHE_MISS_TOTAL).increment(1);
        None
    }

    /// Insert an entry after sweeping every expired one.
    pub async fn put(&self, key: String, response: CachedResponse) {
        let now = Instant::now();
        let mut guard = self.entries.lock().await;

        let expired: Vec<String> = guard
            .iter()
            .filter(|(_, entry)| entry.expires_at <= now)
            .map(|(key, _)| key.clone())
            .collect();
        for stale in &expired {
            guard.pop(stale);
        }
        if !expired.is_empty() {
            metrics::counter!(CACHE_EXPIRED_TOTAL).increment(expired.len() as u64);
            debug!(
                target = "yatube::cache",
                swept = expired.len(),
                "swept expired page cache entries"
            );
        }

        guard.put(key, response);
    }

    /// Buffer `response`, remember it for one TTL and hand back an equivalent response.
    pub async fn store_response(
        &self,
        key: &str,
        response: Response,
    ) -> Result<Response, (Response, CacheStoreError)> {
        let expires_at = Instant::now() + self.ttl;
        match buffer_response(response, expires_at).await {
            Ok((rebuilt, cached)) => {
                self.put(key.to_string(), cached).await;
                Ok(rebuilt)
            }
            Err((rebuilt, error)) => Err((rebuilt, error)),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }
}

#[derive(Clone)]
pub struct CachedResponse {
    status: StatusCode,
    headers: Vec<(HeaderName, HeaderValue)>,
    body: Bytes,
    expires_at: Instant,
}

impl CachedResponse {
    pub fn new(status: StatusCode, headers: &HeaderMap, body: Bytes, expires_at: Instant) -> Self {
        let stored_headers = headers
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        Self {
            status,
            headers: stored_headers,
            body,
            expires_at,
        }
    }

    fn into_response(self) -> Response<Body> {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;

        let headers = response.headers_mut();
        headers.clear();
        for (name, value) in self.headers {
            headers.append(name, value);
        }

        response
    }
}

#[derive(Debug, Error)]
pub enum CacheStoreError {
    #[error("failed to buffer response body: {0}")]
    Buffer(String),
}

/// Only successful, cookie-free responses are shared between requests.
pub fn should_store_response(response: &Response) -> bool {
    response.status() == StatusCode::OK && !response.headers().contains_key(header::SET_COOKIE)
}

pub async fn buffer_response(
    response: Response,
    expires_at: Instant,
) -> Result<(Response, CachedResponse), (Response, CacheStoreError)> {
    let (parts, body) = response.into_parts();
    match BodyExt::collect(body).await {
        Ok(collected) => {
            let bytes = collected.to_bytes();
            let cached =
                CachedResponse::new(parts.status, &parts.headers, bytes.clone(), expires_at);
            let rebuilt = Response::from_parts(parts, Body::from(bytes));
            Ok((rebuilt, cached))
        }
        Err(error) => {
            let rebuilt = Response::from_parts(parts, Body::empty());
            Err((rebuilt, CacheStoreError::Buffer(error.to_string())))
        }
    }
}
