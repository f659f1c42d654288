//! Utilities for generating deterministic, human-friendly group slugs.
//!
//! `slug` transliterates non-Latin titles (Cyrillic included) before
//! slugifying, so "Книги о Rust" becomes `knigi-o-rust`. Uniqueness is
//! delegated to a caller-supplied predicate so the derivation stays pure.

use std::future::Future;

use slug::slugify;
use thiserror::Error;

/// Slugs are stored in a `VARCHAR(50)` column.
pub const MAX_SLUG_LEN: usize = 50;
const MAX_SUFFIX_ATTEMPTS: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug source text is empty")]
    EmptyInput,
    #[error("failed to derive slug from `{input}`")]
    Unrepresentable { input: String },
    #[error("slug `{slug}` must contain only latin letters, digits, hyphens or underscores")]
    Invalid { slug: String },
    #[error("exhausted attempts to find a unique slug for `{base}`")]
    Exhausted { base: String },
}

#[derive(Debug, Error)]
pub enum SlugAsyncError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    #[error(transparent)]
    Slug(#[from] SlugError),
    #[error(transparent)]
    Predicate(E),
}

/// Derive a base slug from the provided human-readable text.
pub fn derive_slug(input: &str) -> Result<String, SlugError> {
    if input.trim().is_empty() {
        return Err(SlugError::EmptyInput);
    }

    let candidate = clamp(slugify(input), MAX_SLUG_LEN - suffix_room());

    if candidate.is_empty() {
        return Err(SlugError::Unrepresentable {
            input: input.to_string(),
        });
    }

    Ok(candidate)
}

/// Check an operator-supplied slug against the allowed alphabet.
pub fn validate_slug(slug: &str) -> Result<(), SlugError> {
    let valid = !slug.is_empty()
        && slug.len() <= MAX_SLUG_LEN
        && slug
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');

    if valid {
        Ok(())
    } else {
        Err(SlugError::Invalid {
            slug: slug.to_string(),
        })
    }
}

/// Produce a slug the async `is_unique` predicate accepts, suffixing a
/// counter (`-2`, `-3`, ...) on collisions.
pub async fn generate_unique_slug_async<F, Fut, E>(
    input: &str,
    mut is_unique: F,
) -> Result<String, SlugAsyncError<E>>
where
    F: FnMut(&str) -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    let base = derive_slug(input)?;

    if is_unique(&base).await.map_err(SlugAsyncError::Predicate)? {
        return Ok(base);
    }

    for attempt in 2..=MAX_SUFFIX_ATTEMPTS + 1 {
        let candidate = format!("{base}-{attempt}");
        if is_unique(&candidate)
            .await
            .map_err(SlugAsyncError::Predicate)?
        {
            return Ok(candidate);
        }
    }

    Err(SlugAsyncError::Slug(SlugError::Exhausted { base }))
}

fn suffix_room() -> usize {
    // "-" plus up to two digits.
    3
}

fn clamp(slug: String, max: usize) -> String {
    if slug.len() <= max {
        return slug;
    }
    // slugify output is ASCII, so byte slicing is safe.
    slug[..max].trim_end_matches('-').to_string()
}
