use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::article::RawArticle;
use crate::client::ArticleSource;
use crate::error::SyncError;
use crate::query::RetrieveParams;

/// Largest `count` the remote API accepts for a single call.
pub const MAX_PAGE_SIZE: u32 = 5000;

/// Pages through `source` until a page comes back empty or `max_records` items are held.
/// Pages are requested one at a time; any page error aborts the whole fetch.
pub async fn fetch_all<S>(
    source: &S,
    params: &RetrieveParams,
    max_records: u32,
) -> Result<BTreeMap<String, RawArticle>, SyncError>
where
    S: ArticleSource + ?Sized,
{
    let cap = max_records as usize;
    let page_size = max_records.min(MAX_PAGE_SIZE);
    let mut articles: BTreeMap<String, RawArticle> = BTreeMap::new();
    let mut page_index: u32 = 0;
    let mut requests = 0usize;

    while articles.len() < cap {
        let offset = page_index.saturating_mul(page_size);
        let remaining = u32::try_from(cap - articles.len()).unwrap_or(u32::MAX);
        let request = params.page(offset, page_size.min(remaining));

        requests += 1;
        let response = source.retrieve(&request).await.map_err(|err| {
            warn!(offset, error = %err, "page fetch failed");
            err
        })?;

        let returned = response.list.len();
        if returned == 0 {
            debug!(offset, "empty page, pagination complete");
            break;
        }

        let before = articles.len();
        for (key, mut article) in response.list {
            if articles.len() >= cap {
                // surplus is picked by id order; callers make no ordering assumptions
                debug!(offset, "record cap reached mid-page, dropping the rest");
                break;
            }
            if article.item_id.is_empty() {
                article.item_id = key;
            }
            articles.insert(article.item_id.clone(), article);
        }
        debug!(offset, returned, total = articles.len(), "page merged");

        if articles.len() == before {
            warn!(offset, "page added no new articles, stopping pagination");
            break;
        }
        page_index += 1;
    }

    info!(fetched = articles.len(), requests, "fetched articles");
    Ok(articles)
}
