//! Lazy offset/limit pagination over list endpoints.

use std::future::Future;

use futures_util::Stream;
use futures_util::stream;

use crate::error::{ProvisionError, ProvisionResult};

/// One page to fetch: zero-based `offset` and the requested `limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: usize,
    pub limit: usize,
}

impl PageRequest {
    /// SCIM uses one-based `startIndex`.
    pub fn start_index(&self) -> usize {
        self.offset + 1
    }
}

/// Produces pages from `fetch` until one comes back shorter than `page_size`.
///
/// Nothing is requested until the stream is polled, and polling stops as
/// soon as the consumer stops, so lookups that find their match early skip
/// the remaining pages. An empty page ends the stream without being yielded.
pub fn paginate<T, F, Fut>(
    page_size: usize,
    fetch: F,
) -> impl Stream<Item = ProvisionResult<Vec<T>>>
where
    F: FnMut(PageRequest) -> Fut,
    Fut: Future<Output = ProvisionResult<Vec<T>>>,
{
    let limit = page_size.max(1);
    stream::try_unfold((fetch, Some(0usize)), move |(mut fetch, next)| async move {
        let Some(offset) = next else {
            return Ok::<_, ProvisionError>(None);
        };
        let page = fetch(PageRequest { offset, limit }).await?;
        if page.is_empty() {
            return Ok(None);
        }
        let next = (page.len() >= limit).then(|| offset + page.len());
        Ok(Some((page, (fetch, next))))
    })
}
