//! Read-only aggregate statistics for the admin dashboard.

use serde::Serialize;
use tracing::debug;

use crate::error::ClaimsResult;
use crate::store::{ClaimFilter, ClaimStore, InsurerBreakdown, StatusBreakdown};
use crate::types::FlagActivity;

pub const TOP_INSURERS: usize = 5;
pub const RECENT_FLAGS: usize = 10;

#[derive(Debug, Clone, Serialize)]
pub struct DashboardReport {
    pub total_claims: u64,
    /// Distinct claims carrying at least one flag.
    pub flagged_claims: u64,
    /// Percentage of claims flagged; 0 when there are no claims.
    pub flag_rate: f64,
    pub status_stats: Vec<StatusBreakdown>,
    pub insurer_stats: Vec<InsurerBreakdown>,
    pub recent_flags: Vec<FlagActivity>,
    pub total_notes: u64,
    pub total_users: u64,
}

pub fn flag_rate(flagged: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    flagged as f64 / total as f64 * 100.0
}

impl DashboardReport {
    pub async fn compute(store: &dyn ClaimStore) -> ClaimsResult<Self> {
        let unfiltered = ClaimFilter::default();
        let (
            total_claims,
            flagged_claims,
            status_stats,
            insurer_stats,
            recent_flags,
            total_notes,
            total_users,
        ) = tokio::try_join!(
            store.count_claims(&unfiltered),
            store.flagged_claim_count(),
            store.status_breakdown(),
            store.insurer_breakdown(TOP_INSURERS),
            store.recent_flags(RECENT_FLAGS),
            store.note_count(),
            store.actor_count(),
        )?;

        debug!(total_claims, flagged_claims, "Computed dashboard report");

        Ok(Self {
            total_claims,
            flagged_claims,
            flag_rate: flag_rate(flagged_claims, total_claims),
            status_stats,
            insurer_stats,
            recent_flags,
            total_notes,
            total_users,
        })
    }
}
