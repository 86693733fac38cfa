//! 分页列举 / Paginated listing over GET Bucket
//!
//! A listing is a lazy stream: nothing is fetched until the first poll, and
//! the next page is requested only once the current one has been drained.
//! The continuation marker lives inside the stream, so every call starts a
//! fresh traversal.

use futures::stream::{self, Stream, TryStreamExt};

use crate::storage::{BackendError, StorageAttributes};
use super::client::{BackendResult, CosBackend};
use super::types::{ListBucketResult, ListObjectsRequest};

/// `""` stays the bucket root, anything else ends with exactly one `/` / 规范化前缀
pub fn normalize_prefix(path: &str) -> String {
    let trimmed = path.trim_start_matches('/').trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}/", trimmed)
    }
}

/// Listing parameters shared by every page / 列举参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingQuery {
    pub prefix: String,
    pub delimiter: Option<String>,
    pub page_size: u32,
}

impl ListingQuery {
    /// Shallow listings group deeper keys into common prefixes / 浅层列举使用分隔符
    pub fn new(path: &str, deep: bool, page_size: u32) -> Self {
        Self {
            prefix: normalize_prefix(path),
            delimiter: if deep { None } else { Some("/".to_string()) },
            page_size,
        }
    }

    fn request(&self, marker: String) -> ListObjectsRequest {
        ListObjectsRequest {
            prefix: self.prefix.clone(),
            delimiter: self.delimiter.clone(),
            marker,
            max_keys: self.page_size,
        }
    }
}

enum Cursor {
    Next(String),
    Stalled(String),
    Done,
}

/// Stream of raw pages / 原始分页流
///
/// Stops after the first page whose truncation flag is clear. Keys come
/// back in lexicographic order, so every marker must sort after the one
/// just sent; a truncated page that breaks this is still yielded, followed
/// by `BackendError::MarkerStalled`.
pub fn pages<'a, B>(
    backend: &'a B,
    query: ListingQuery,
) -> impl Stream<Item = BackendResult<ListBucketResult>> + Send + 'a
where
    B: CosBackend + ?Sized,
{
    stream::try_unfold(Cursor::Next(String::new()), move |cursor| {
        let query = query.clone();
        async move {
            let marker = match cursor {
                Cursor::Next(marker) => marker,
                Cursor::Stalled(marker) => return Err(BackendError::MarkerStalled(marker)),
                Cursor::Done => return Ok(None),
            };

            let page = backend.list_objects(&query.request(marker.clone())).await?;
            tracing::debug!(
                "COS list page: prefix={}, marker={}, objects={}, prefixes={}, truncated={}",
                query.prefix,
                marker,
                page.contents.len(),
                page.common_prefixes.len(),
                page.is_truncated
            );

            let next = if !page.is_truncated {
                Cursor::Done
            } else {
                match page.continuation_marker() {
                    Some(next) if next > marker => Cursor::Next(next),
                    _ => Cursor::Stalled(marker),
                }
            };
            Ok(Some((page, next)))
        }
    })
}

/// Flattened entries: objects then common prefixes, page by page / 扁平化条目流
pub fn entries<'a, B>(
    backend: &'a B,
    query: ListingQuery,
) -> impl Stream<Item = BackendResult<StorageAttributes>> + Send + 'a
where
    B: CosBackend + ?Sized,
{
    pages(backend, query)
        .map_ok(|page| stream::iter(page.into_entries().map(Ok::<_, BackendError>)))
        .try_flatten()
}
