//! Read-only claim views.
//!
//! GET /               - filtered, sorted, paginated claim listing
//! GET /claim/:id/     - claim detail with flags and notes

use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    Extension, Json,
};
use claims_core::types::ClaimId;
use claims_core::{list_claims, ClaimDetailView, ClaimListing, ClaimStore, ListParams};

use crate::error::AppError;
use crate::render::{RenderMode, Rendered};

pub async fn claim_list(
    Extension(store): Extension<Arc<dyn ClaimStore>>,
    mode: RenderMode,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Json<Rendered<ClaimListing>> {
    let params = ListParams::from_pairs(pairs);
    let listing = list_claims(store.as_ref(), &params).await;
    mode.render("claims/list", "claims/table_partial", listing)
}

pub async fn claim_detail(
    Extension(store): Extension<Arc<dyn ClaimStore>>,
    mode: RenderMode,
    Path(claim_id): Path<ClaimId>,
) -> Result<Json<Rendered<ClaimDetailView>>, AppError> {
    let view = ClaimDetailView::load(store.as_ref(), claim_id).await?;
    Ok(mode.render("claims/detail", "claims/detail_modal", view))
}
