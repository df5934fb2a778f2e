//! Cursor-following pagination over list-shaped upstream endpoints.

use std::future::Future;

use serde_json::Value;
use tracing::warn;

/// Hard ceiling on pages fetched for one logical listing.
pub const MAX_PAGES: usize = 500;

/// One page of results and the cursor that continues it.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub cursor: Option<Value>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, cursor: Option<Value>) -> Self {
        Self { items, cursor }
    }
}

/// Collect every item by repeatedly calling `fetch_page` with the previous cursor.
///
/// Stops when a page has no items, carries no cursor, repeats a cursor that was
/// already followed, or [`MAX_PAGES`] is reached. Item order is preserved across
/// pages. The first fetch error aborts the listing.
pub async fn paginate<T, E, F, Fut>(fetch_page: F) -> Result<Vec<T>, E>
where
    F: FnMut(Option<Value>) -> Fut,
    Fut: Future<Output = Result<Page<T>, E>>,
{
    paginate_up_to(usize::MAX, fetch_page).await
}

/// Like [`paginate`], but returns as soon as `limit` items are collected.
///
/// No further page is requested once the limit is met; the result holds at
/// most `limit` items.
pub async fn paginate_up_to<T, E, F, Fut>(limit: usize, mut fetch_page: F) -> Result<Vec<T>, E>
where
    F: FnMut(Option<Value>) -> Fut,
    Fut: Future<Output = Result<Page<T>, E>>,
{
    let mut collected = Vec::new();
    let mut followed: Vec<Value> = Vec::new();
    let mut cursor: Option<Value> = None;

    if limit == 0 {
        return Ok(collected);
    }

    for _ in 0..MAX_PAGES {
        let page = fetch_page(cursor.take()).await?;
        if page.items.is_empty() {
            return Ok(collected);
        }
        collected.extend(page.items);

        if collected.len() >= limit {
            collected.truncate(limit);
            return Ok(collected);
        }

        match page.cursor {
            None => return Ok(collected),
            Some(next) if followed.contains(&next) => {
                warn!(cursor = %next, "Upstream repeated a pagination cursor; stopping");
                return Ok(collected);
            }
            Some(next) => {
                followed.push(next.clone());
                cursor = Some(next);
            }
        }
    }

    warn!(max_pages = MAX_PAGES, "Pagination page limit reached; result may be truncated");
    Ok(collected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::convert::Infallible;

    fn fixture(cursor: Option<Value>) -> Result<Page<&'static str>, Infallible> {
        let page = match cursor.as_ref().and_then(Value::as_str) {
            None => Page::new(vec!["a", "b"], Some(json!("C1"))),
            Some("C1") => Page::new(vec!["c", "d"], Some(json!("C2"))),
            Some(_) => Page::new(vec![], None),
        };
        Ok(page)
    }

    #[test]
    fn test_three_page_fixture_yields_all_items_in_order() {
        let mut requested = Vec::new();
        let items = tokio_test::block_on(paginate(|cursor| {
            requested.push(cursor.clone());
            std::future::ready(fixture(cursor))
        }))
        .unwrap();

        assert_eq!(items, vec!["a", "b", "c", "d"]);
        assert_eq!(requested, vec![None, Some(json!("C1")), Some(json!("C2"))]);
    }

    #[tokio::test]
    async fn test_repeated_cursor_terminates() {
        let mut calls = 0;
        let items = paginate(|_cursor| {
            calls += 1;
            std::future::ready(Ok::<_, Infallible>(Page::new(vec![calls], Some(json!("same")))))
        })
        .await
        .unwrap();

        // The second page echoes the cursor already followed.
        assert_eq!(items, vec![1, 2]);
        assert_eq!(calls, 2);
    }

    #[tokio::test]
    async fn test_missing_cursor_stops_after_first_page() {
        let items = paginate(|_cursor| {
            std::future::ready(Ok::<_, Infallible>(Page::new(vec![1, 2, 3], None)))
        })
        .await
        .unwrap();

        assert_eq!(items, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_limit_stops_fetching_once_met() {
        let mut calls = 0;
        let items = paginate_up_to(3, |_cursor| {
            calls += 1;
            let cursor = json!(format!("C{calls}"));
            std::future::ready(Ok::<_, Infallible>(Page::new(vec![calls, calls], Some(cursor))))
        })
        .await
        .unwrap();

        // Two pages of two cover the limit; the endless cursor chain is not followed.
        assert_eq!(items, vec![1, 1, 2]);
        assert_eq!(calls, 2);
    }

    #[tokio::test]
    async fn test_zero_limit_fetches_nothing() {
        let mut calls = 0;
        let items = paginate_up_to(0, |_cursor| {
            calls += 1;
            std::future::ready(Ok::<_, Infallible>(Page::new(vec![1], None)))
        })
        .await
        .unwrap();

        assert!(items.is_empty());
        assert_eq!(calls, 0);
    }

    #[tokio::test]
    async fn test_first_error_propagates() {
        let result: Result<Vec<u8>, &str> =
            paginate(|_cursor| std::future::ready(Err("boom"))).await;

        assert_eq!(result, Err("boom"));
    }
}
