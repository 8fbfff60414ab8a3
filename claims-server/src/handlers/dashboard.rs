use std::sync::Arc;

use axum::{Extension, Json};
use claims_core::types::Actor;
use claims_core::{ClaimStore, DashboardReport};

use crate::error::AppError;
use crate::render::Rendered;

/// GET /admin-dashboard/ - aggregate claim statistics.
pub async fn admin_dashboard(
    Extension(store): Extension<Arc<dyn ClaimStore>>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Rendered<DashboardReport>>, AppError> {
    tracing::debug!(actor = %actor.username, "Building admin dashboard");
    let report = DashboardReport::compute(store.as_ref()).await?;
    Ok(Rendered::page("claims/admin_dashboard", report))
}
