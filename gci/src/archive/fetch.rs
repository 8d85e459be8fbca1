//! Collects every record of a paginated listing.

use crate::connectors::Error;
use crate::model::Page;
use regex::Regex;
use std::future::Future;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, warn};

static PAGE_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"page=(\d+)").expect("valid page pattern"));

/// Extracts the page number from a `next` URL such as `.../tasks/?page=3`.
pub fn next_page(next_url: &str) -> Option<u32> {
    PAGE_PARAM
        .captures(next_url)
        .and_then(|captures| captures[1].parse().ok())
}

/// Requests pages 1, 2, ... until a page has no `next` link, sleeping
/// `throttle` after every request, and returns all results in order.
///
/// The first failing request aborts the whole fetch.
pub async fn fetch_all<T, F, Fut>(mut fetch_page: F, throttle: Duration) -> Result<Vec<T>, Error>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Page<T>, Error>>,
{
    let mut all = Vec::new();
    let mut page = 1;
    loop {
        debug!("requesting page {page}");
        let Page { next, results } = fetch_page(page).await?;
        tokio::time::sleep(throttle).await;
        all.extend(results);

        let Some(next) = next.as_deref().and_then(next_page) else {
            break;
        };
        if next <= page {
            warn!("next page {next} does not advance past page {page}, stopping");
            break;
        }
        page = next;
    }
    Ok(all)
}
