//! Sequential page walking for list endpoints.
//!
//! Pages are requested one at a time with `limit=100&page=N`, starting at 1,
//! until a page comes back short. A catalog whose size is an exact multiple
//! of the page size costs one extra, empty request.

use std::future::Future;

use display_toggle_core::Resource;
use serde_json::Value;
use tracing::instrument;

use crate::api::ApiError;

/// Records requested per page.
pub const PAGE_SIZE: usize = 100;

/// Anything that can fetch one page of a resource.
pub trait PageSource {
    /// Fetch one page. `query` already carries `limit` and `page`.
    fn fetch_page(
        &self,
        resource: Resource,
        query: &[(&str, &str)],
    ) -> impl Future<Output = Result<Value, ApiError>> + Send;
}

/// Fetch every record of `resource`, in page order.
///
/// `limit` and `page` in `query` are replaced. Records are pulled out of each
/// body with the resource's list envelope.
///
/// # Errors
///
/// The first failing page aborts the whole fetch; nothing is returned for
/// pages that did succeed.
#[instrument(skip(source, query), fields(resource = resource.gateway_path()))]
pub async fn fetch_all<P>(
    source: &P,
    resource: Resource,
    query: &[(&str, &str)],
) -> Result<Vec<Value>, ApiError>
where
    P: PageSource + Sync + ?Sized,
{
    let envelope = resource.envelope();
    let limit = PAGE_SIZE.to_string();
    let mut records = Vec::new();
    let mut page: u32 = 1;

    loop {
        let page_number = page.to_string();
        let mut params: Vec<(&str, &str)> = query
            .iter()
            .copied()
            .filter(|(key, _)| *key != "limit" && *key != "page")
            .collect();
        params.push(("limit", limit.as_str()));
        params.push(("page", page_number.as_str()));

        let body = source.fetch_page(resource, &params).await?;
        let items = envelope.extract(body);
        let count = items.len();
        records.extend(items);

        tracing::debug!(page, count, "Fetched page");

        if count < PAGE_SIZE {
            break;
        }
        page += 1;
    }

    tracing::info!(total = records.len(), pages = page, "Fetched all pages");
    Ok(records)
}
