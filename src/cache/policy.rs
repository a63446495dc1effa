//! Which cache tags each mutating operation invalidates, and when.

use std::fmt;
use std::future::Future;

use tracing::debug;

use super::keys::tags;
use super::store::TaggedCache;

/// A mutating catalog operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteOperation {
    CreateAuthor,
    UpdateAuthor,
    DeleteAuthor,
    CreateBook,
    UpdateBook,
    DeleteBook,
}

/// Whether tags are invalidated before or after the persistence write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationTiming {
    /// Invalidate unconditionally, then write. A failed write leaves the
    /// cohort evicted; the next read recomputes.
    BeforeWrite,
    /// Write, then invalidate only if the write succeeded.
    AfterWrite,
}

impl WriteOperation {
    pub const ALL: [WriteOperation; 6] = [
        WriteOperation::CreateAuthor,
        WriteOperation::UpdateAuthor,
        WriteOperation::DeleteAuthor,
        WriteOperation::CreateBook,
        WriteOperation::UpdateBook,
        WriteOperation::DeleteBook,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            WriteOperation::CreateAuthor => "createAuthor",
            WriteOperation::UpdateAuthor => "updateAuthor",
            WriteOperation::DeleteAuthor => "deleteAuthor",
            WriteOperation::CreateBook => "createBook",
            WriteOperation::UpdateBook => "updateBook",
            WriteOperation::DeleteBook => "deleteBook",
        }
    }

    /// Tags invalidated by this operation.
    ///
    /// Author updates invalidate `booksCache`, not `AuthorsCache`. Author
    /// listings stay stale after an update until the next author create or
    /// delete.
    pub fn tags_to_invalidate(self) -> &'static [&'static str] {
        match self {
            WriteOperation::CreateAuthor | WriteOperation::DeleteAuthor => &[tags::AUTHORS],
            WriteOperation::UpdateAuthor
            | WriteOperation::CreateBook
            | WriteOperation::UpdateBook
            | WriteOperation::DeleteBook => &[tags::BOOKS],
        }
    }

    pub fn timing(self) -> InvalidationTiming {
        match self {
            WriteOperation::UpdateAuthor | WriteOperation::UpdateBook => {
                InvalidationTiming::AfterWrite
            }
            WriteOperation::CreateAuthor
            | WriteOperation::DeleteAuthor
            | WriteOperation::CreateBook
            | WriteOperation::DeleteBook => InvalidationTiming::BeforeWrite,
        }
    }
}

impl fmt::Display for WriteOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Invalidate every tag of `operation` on `cache`. Returns entries removed.
pub fn invalidate(cache: &TaggedCache, operation: WriteOperation) -> usize {
    operation
        .tags_to_invalidate()
        .iter()
        .map(|tag| cache.invalidate_tag(tag))
        .sum()
}

/// Run `write` with the invalidation timing of `operation`.
///
/// Invalidations are never rolled back: a before-write invalidation followed
/// by a failed write simply costs a recompute.
pub async fn guarded_write<F, Fut, T, E>(
    cache: &TaggedCache,
    operation: WriteOperation,
    write: F,
) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    match operation.timing() {
        InvalidationTiming::BeforeWrite => {
            let removed = invalidate(cache, operation);
            debug!(%operation, removed, timing = "before_write", "cache invalidated");
            write().await
        }
        InvalidationTiming::AfterWrite => {
            let value = write().await?;
            let removed = invalidate(cache, operation);
            debug!(%operation, removed, timing = "after_write", "cache invalidated");
            Ok(value)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use bytes::Bytes;

    use super::*;
    use crate::cache::CacheConfig;

    async fn seed(cache: &TaggedCache, key: &str, tag: &str) {
        cache
            .get_or_compute(key, &[tag], || async {
                Ok::<_, Infallible>(Bytes::from_static(b"[]"))
            })
            .await
            .unwrap();
    }

    #[test]
    fn author_update_invalidates_books_tag() {
        assert_eq!(
            WriteOperation::UpdateAuthor.tags_to_invalidate(),
            &["booksCache"]
        );
        assert!(
            !WriteOperation::UpdateAuthor
                .tags_to_invalidate()
                .contains(&"AuthorsCache")
        );
    }

    #[test]
    fn table_matches_observed_mapping() {
        let expected = [
            ("createAuthor", "AuthorsCache", InvalidationTiming::BeforeWrite),
            ("updateAuthor", "booksCache", InvalidationTiming::AfterWrite),
            ("deleteAuthor", "AuthorsCache", InvalidationTiming::BeforeWrite),
            ("createBook", "booksCache", InvalidationTiming::BeforeWrite),
            ("updateBook", "booksCache", InvalidationTiming::AfterWrite),
            ("deleteBook", "booksCache", InvalidationTiming::BeforeWrite),
        ];

        for (op, (name, tag, timing)) in WriteOperation::ALL.iter().zip(expected) {
            assert_eq!(op.as_str(), name);
            assert_eq!(op.tags_to_invalidate(), &[tag]);
            assert_eq!(op.timing(), timing);
        }
    }

    #[tokio::test]
    async fn before_write_invalidates_even_when_write_fails() {
        let cache = TaggedCache::new(CacheConfig::default());
        seed(&cache, "getAllBooks-1-3", tags::BOOKS).await;

        let result: Result<(), &str> =
            guarded_write(&cache, WriteOperation::CreateBook, || async { Err("conflict") }).await;

        assert!(result.is_err());
        assert!(!cache.contains_key("getAllBooks-1-3"));
    }

    #[tokio::test]
    async fn after_write_keeps_cache_when_write_fails() {
        let cache = TaggedCache::new(CacheConfig::default());
        seed(&cache, "getAllBooks-1-3", tags::BOOKS).await;

        let result: Result<(), &str> =
            guarded_write(&cache, WriteOperation::UpdateBook, || async { Err("not found") }).await;

        assert!(result.is_err());
        assert!(cache.contains_key("getAllBooks-1-3"));
    }

    #[tokio::test]
    async fn after_write_invalidates_on_success() {
        let cache = TaggedCache::new(CacheConfig::default());
        seed(&cache, "getAllBooks-1-3", tags::BOOKS).await;
        seed(&cache, "getAllAuthors-1-3", tags::AUTHORS).await;

        let value: Result<u8, Infallible> =
            guarded_write(&cache, WriteOperation::UpdateAuthor, || async { Ok(7) }).await;

        assert_eq!(value.unwrap(), 7);
        assert!(!cache.contains_key("getAllBooks-1-3"));
        assert!(cache.contains_key("getAllAuthors-1-3"));
    }
}
