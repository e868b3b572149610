//! Generic continuation-token pagination walker.
//! See ARCHITECTURE.md §2 (pagination protocol)
//!
//! Every provider endpoint follows the same shape: a page of items plus an
//! optional continuation value; an absent continuation terminates the walk.
//! The continuation is opaque to the walker — a token to re-send (AWS, GCP)
//! or an absolute next link (Azure); the per-provider closure knows which.

use std::future::Future;

use serde_json::Value;
use tracing::debug;

use stratus_common::error::FetchError;

/// One fetched page: its items and the continuation for the next request.
pub struct Page {
    pub items: Vec<Value>,
    pub next: Option<String>,
}

/// Walk pages until the continuation is absent, handing each page's items to
/// `sink` as they arrive so a large catalog never has to be re-buffered.
/// Returns the total item count.
pub async fn walk_pages<F, Fut, S>(mut fetch: F, mut sink: S) -> Result<usize, FetchError>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page, FetchError>>,
    S: FnMut(Vec<Value>),
{
    let mut continuation: Option<String> = None;
    let mut total = 0usize;
    let mut pages = 0usize;

    loop {
        let page = fetch(continuation.take()).await?;
        pages += 1;
        total += page.items.len();
        sink(page.items);

        match page.next {
            Some(next) => continuation = Some(next),
            None => break,
        }
    }

    debug!(pages, total, "pagination complete");
    Ok(total)
}

/// Convenience wrapper that materializes all pages into one vector.
pub async fn collect_pages<F, Fut>(fetch: F) -> Result<Vec<Value>, FetchError>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page, FetchError>>,
{
    let mut items = Vec::new();
    walk_pages(fetch, |batch| items.extend(batch)).await?;
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_walk_follows_tokens_until_absent() {
        let seen = std::cell::RefCell::new(Vec::new());
        let items = collect_pages(|token| {
            seen.borrow_mut().push(token.clone());
            async move {
                Ok(match token.as_deref() {
                    None => Page {
                        items: vec![json!(1), json!(2)],
                        next: Some("p2".to_string()),
                    },
                    Some("p2") => Page {
                        items: vec![json!(3)],
                        next: None,
                    },
                    other => panic!("unexpected token {other:?}"),
                })
            }
        })
        .await
        .unwrap();

        assert_eq!(items.len(), 3);
        assert_eq!(*seen.borrow(), vec![None, Some("p2".to_string())]);
    }

    #[tokio::test]
    async fn test_walk_surfaces_fetch_error() {
        let result = collect_pages(|_| async {
            Err::<Page, _>(FetchError::InvalidRequest("boom".to_string()))
        })
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_single_page_without_continuation() {
        let items = collect_pages(|_| async {
            Ok(Page {
                items: vec![json!({"sku": "x"})],
                next: None,
            })
        })
        .await
        .unwrap();
        assert_eq!(items.len(), 1);
    }
}
