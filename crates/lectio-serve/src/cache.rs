//! Listing cache for provider data.
//!
//! Book lists, per-book verse counts and the edition catalogue are fetched
//! with one or many provider calls and change only when the provider
//! republishes an edition. They are kept in a moka cache as JSON, keyed by
//! [`ListingKey`], for [`LISTING_TTL`].
//!
//! Errors are never cached: a failed listing is retried on the next request.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use moka::future::Cache;
use serde::{Serialize, de::DeserializeOwned};

/// Maximum number of cached listings.
pub const LISTING_CAPACITY: u64 = 1000;

/// How long a listing stays fresh.
pub const LISTING_TTL: Duration = Duration::from_secs(3600);

/// What a cache entry holds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ListingKey {
    /// Books of one edition.
    Books { bible_id: String },
    /// Chapter verse counts of one provider book.
    VerseCounts { bible_id: String, book_id: String },
    /// Edition catalogue, optionally for one language.
    Bibles { language: Option<String> },
}

impl ListingKey {
    pub fn books(bible_id: &str) -> Self {
        Self::Books {
            bible_id: bible_id.to_string(),
        }
    }

    pub fn verse_counts(bible_id: &str, book_id: &str) -> Self {
        Self::VerseCounts {
            bible_id: bible_id.to_string(),
            book_id: book_id.to_string(),
        }
    }

    pub fn bibles(language: Option<&str>) -> Self {
        Self::Bibles {
            language: language.map(str::to_string),
        }
    }

    /// Short name used as a log field.
    fn kind(&self) -> &'static str {
        match self {
            Self::Books { .. } => "books",
            Self::VerseCounts { .. } => "verse-counts",
            Self::Bibles { .. } => "bibles",
        }
    }
}

impl fmt::Display for ListingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Books { bible_id } => write!(f, "books:{bible_id}"),
            Self::VerseCounts { bible_id, book_id } => {
                write!(f, "verse-counts:{bible_id}:{book_id}")
            }
            Self::Bibles { language } => {
                write!(f, "bibles:lang={}", language.as_deref().unwrap_or("*"))
            }
        }
    }
}

/// A cached listing.
#[derive(Clone, Debug)]
pub struct CachedListing {
    json: String,
    fetched_at: chrono::DateTime<chrono::Utc>,
}

impl CachedListing {
    /// Time since the listing was fetched from the provider.
    pub fn age(&self) -> chrono::Duration {
        chrono::Utc::now() - self.fetched_at
    }
}

/// The shared listing cache.
pub type ResponseCache = Cache<ListingKey, CachedListing>;

pub fn new_cache() -> ResponseCache {
    Cache::builder()
        .max_capacity(LISTING_CAPACITY)
        .time_to_live(LISTING_TTL)
        .build()
}

/// Return the cached listing for `key`, or fetch, store and return it.
///
/// An entry that no longer deserialises into `T` is treated as a miss.
///
/// ```ignore
/// let books = get_or_compute(&state.cache, &ListingKey::books(bible_id), || {
///     state.scripture.list_books(bible_id)
/// })
/// .await?;
/// ```
pub async fn get_or_compute<T, E, F, Fut>(
    cache: &ResponseCache,
    key: &ListingKey,
    fetch: F,
) -> Result<T, E>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    if let Some(entry) = cache.get(key).await {
        match serde_json::from_str(&entry.json) {
            Ok(value) => {
                tracing::debug!(
                    key = %key,
                    age_secs = entry.age().num_seconds(),
                    "listing cache hit"
                );
                return Ok(value);
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "stale listing shape, refetching");
                cache.invalidate(key).await;
            }
        }
    }

    tracing::debug!(key = %key, kind = key.kind(), "listing cache miss");
    let value = fetch().await?;

    match serde_json::to_string(&value) {
        Ok(json) => {
            let entry = CachedListing {
                json,
                fetched_at: chrono::Utc::now(),
            };
            cache.insert(key.clone(), entry).await;
        }
        Err(e) => tracing::warn!(key = %key, error = %e, "listing not cacheable"),
    }

    Ok(value)
}
