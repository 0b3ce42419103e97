//! Cursor-based paging over list endpoints

use crate::error::{NsxtError, Result};
use crate::model::ListResult;
use std::future::Future;

/// Walk all pages and return the first item accepted by `matches`.
///
/// `fetch` is called with the cursor of the page to load (`None` for the
/// first page). Exhausting all pages yields `Ok(None)`.
pub async fn find_first<T, F, Fut, P>(mut fetch: F, mut matches: P) -> Result<Option<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<ListResult<T>>>,
    P: FnMut(&T) -> bool,
{
    let mut cursor: Option<String> = None;
    loop {
        let page = fetch(cursor.clone()).await?;
        let next = page.next_cursor();
        if let Some(found) = page.results.into_iter().find(|item| matches(item)) {
            return Ok(Some(found));
        }
        match next {
            Some(next) if cursor.as_deref() == Some(next.as_str()) => {
                return Err(NsxtError::UnexpectedResponse(format!(
                    "listing returned the same cursor twice: {}",
                    next
                )));
            }
            Some(next) => {
                tracing::debug!("Fetching next page at cursor {}", next);
                cursor = Some(next);
            }
            None => return Ok(None),
        }
    }
}

/// Walk all pages and collect every item accepted by `matches`.
pub async fn collect_matching<T, F, Fut, P>(mut fetch: F, mut matches: P) -> Result<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<ListResult<T>>>,
    P: FnMut(&T) -> bool,
{
    let mut collected = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = fetch(cursor.clone()).await?;
        let next = page.next_cursor();
        collected.extend(page.results.into_iter().filter(|item| matches(item)));
        match next {
            Some(next) if cursor.as_deref() == Some(next.as_str()) => {
                return Err(NsxtError::UnexpectedResponse(format!(
                    "listing returned the same cursor twice: {}",
                    next
                )));
            }
            Some(next) => cursor = Some(next),
            None => return Ok(collected),
        }
    }
}
