//! Claim listing pipeline: filter → sort → paginate.
//!
//! `list_claims` never fails. Bad parameters are dropped with warnings, and a
//! store fault is logged and turned into an empty listing with `error` set.

pub mod pagination;
pub mod params;

pub use pagination::{page_range, PageInfo, PageLink, PageSelector, Paginator};
pub use params::{AppliedFilters, ListParams, ListingRequest};

use serde::Serialize;
use tracing::{debug, error};

use crate::messages::Message;
use crate::store::{ClaimStore, SortSpec};
use crate::types::{ClaimStatus, ClaimView};

pub const LOAD_FAILED_MESSAGE: &str = "An error occurred while loading claims. Please try again.";

/// Everything needed to render a claim table, either as a full page or as a
/// partial fragment.
#[derive(Debug, Clone, Serialize)]
pub struct ClaimListing {
    pub claims: Vec<ClaimView>,
    pub total_claims: u64,
    /// `None` when nothing matched; no paginator is built in that case.
    pub page: Option<PageInfo>,
    pub page_range: Vec<PageLink>,
    pub items_per_page: u64,
    pub sort: SortSpec,
    #[serde(flatten)]
    pub filters: AppliedFilters,
    pub filters_applied: bool,
    pub statuses: Vec<ClaimStatus>,
    pub insurers: Vec<String>,
    pub messages: Vec<Message>,
    pub error: bool,
}

impl ClaimListing {
    fn empty(request: &ListingRequest, statuses: Vec<ClaimStatus>, insurers: Vec<String>) -> Self {
        Self {
            claims: Vec::new(),
            total_claims: 0,
            page: None,
            page_range: vec![PageLink::Page(1)],
            items_per_page: request.per_page,
            sort: request.sort,
            filters: request.echo.clone(),
            filters_applied: request.filters_applied(),
            statuses,
            insurers,
            messages: request.warnings.clone(),
            error: false,
        }
    }
}

pub async fn list_claims(store: &dyn ClaimStore, params: &ListParams) -> ClaimListing {
    let request = ListingRequest::from_params(params);
    match run_listing(store, &request).await {
        Ok(listing) => listing,
        Err(e) => {
            error!(error = %format!("{:#}", e), filter = ?request.filter, "Error loading claims listing");
            // Choice lists are best-effort here; the store may be the thing that failed.
            let statuses = store.distinct_statuses().await.unwrap_or_default();
            let insurers = store.distinct_insurers().await.unwrap_or_default();
            let mut listing = ClaimListing::empty(&request, statuses, insurers);
            listing.page_range.clear();
            listing.messages.push(Message::error(LOAD_FAILED_MESSAGE));
            listing.error = true;
            listing
        }
    }
}

async fn run_listing(
    store: &dyn ClaimStore,
    request: &ListingRequest,
) -> anyhow::Result<ClaimListing> {
    let (total, statuses, insurers) = tokio::try_join!(
        store.count_claims(&request.filter),
        store.distinct_statuses(),
        store.distinct_insurers(),
    )?;

    let mut listing = ClaimListing::empty(request, statuses, insurers);
    if total == 0 {
        debug!("Claims listing matched nothing");
        return Ok(listing);
    }

    let page = Paginator::new(total, request.per_page).page(request.page);
    let claims = store
        .list_claims(&request.filter, request.sort, page.window())
        .await?;
    debug!(
        total,
        page = page.number,
        returned = claims.len(),
        "Loaded claims page"
    );

    listing.claims = claims;
    listing.total_claims = total;
    listing.page_range = page_range(page.number, page.num_pages);
    listing.page = Some(page);
    Ok(listing)
}
