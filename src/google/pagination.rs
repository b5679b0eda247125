// Token-based pagination shared by the YouTube and Drive list endpoints

use std::future::Future;

use super::errors::ApiError;

/// One page of a list response
#[derive(Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_page_token: Option<String>,
}

/// Upper bound on pages fetched for one listing
const MAX_PAGES: usize = 1000;

/// Fetch pages until the server stops returning a continuation token.
///
/// `fetch` receives the token of the page to load (`None` for the first).
/// An empty token string counts as the end of the listing.
pub async fn collect_pages<T, F, Fut>(mut fetch: F) -> Result<Vec<T>, ApiError>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>, ApiError>>,
{
    let mut items = Vec::new();
    let mut token: Option<String> = None;

    for page_no in 0..MAX_PAGES {
        let page = fetch(token.take()).await?;
        items.extend(page.items);

        match page.next_page_token.filter(|t| !t.is_empty()) {
            Some(next) => token = Some(next),
            None => return Ok(items),
        }

        tracing::debug!(page = page_no + 1, collected = items.len(), "fetching next page");
    }

    Err(ApiError::Decode(format!(
        "listing did not finish after {} pages",
        MAX_PAGES
    )))
}
