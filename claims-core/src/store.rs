use crate::types::*;
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

// ─── Query shapes ─────────────────────────────────────────────

/// Predicates applied to the claim table. Every `Some` narrows the result;
/// `match_nothing` short-circuits to an empty result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClaimFilter {
    /// Case-insensitive substring over patient name, insurer name or id text.
    pub search: Option<String>,
    pub status: Option<ClaimStatus>,
    /// Case-insensitive substring over insurer name.
    pub insurer: Option<String>,
    pub min_billed: Option<Decimal>,
    pub max_billed: Option<Decimal>,
    pub discharged_from: Option<NaiveDate>,
    pub discharged_to: Option<NaiveDate>,
    pub match_nothing: bool,
}

impl ClaimFilter {
    pub fn is_unfiltered(&self) -> bool {
        *self == Self::default()
    }

    /// In-process evaluation of the filter; the Postgres backend compiles the
    /// same predicates to SQL.
    pub fn matches(&self, claim: &Claim) -> bool {
        if self.match_nothing {
            return false;
        }
        if let Some(term) = &self.search {
            let term = term.to_lowercase();
            let hit = claim.patient_name.to_lowercase().contains(&term)
                || claim.insurer_name.to_lowercase().contains(&term)
                || claim.id.to_string().contains(&term);
            if !hit {
                return false;
            }
        }
        if let Some(status) = self.status {
            if claim.status != status {
                return false;
            }
        }
        if let Some(insurer) = &self.insurer {
            if !claim
                .insurer_name
                .to_lowercase()
                .contains(&insurer.to_lowercase())
            {
                return false;
            }
        }
        if matches!(self.min_billed, Some(min) if claim.billed_amount < min) {
            return false;
        }
        if matches!(self.max_billed, Some(max) if claim.billed_amount > max) {
            return false;
        }
        if matches!(self.discharged_from, Some(from) if claim.discharge_date < from) {
            return false;
        }
        if matches!(self.discharged_to, Some(to) if claim.discharge_date > to) {
            return false;
        }
        true
    }
}

/// Sortable claim attributes, keyed by their request names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    Id,
    Patient,
    Insurer,
    Amount,
    Status,
    Date,
}

impl SortField {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "id" => Some(Self::Id),
            "patient" => Some(Self::Patient),
            "insurer" => Some(Self::Insurer),
            "amount" => Some(Self::Amount),
            "status" => Some(Self::Status),
            "date" => Some(Self::Date),
            _ => None,
        }
    }

    /// Column backing this field.
    pub fn column(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Patient => "patient_name",
            Self::Insurer => "insurer_name",
            Self::Amount => "billed_amount",
            Self::Status => "status",
            Self::Date => "discharge_date",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Ordering for a listing. Ties always fall back to id descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SortSpec {
    pub field: SortField,
    pub direction: SortDirection,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            field: SortField::Date,
            direction: SortDirection::Desc,
        }
    }
}

impl SortSpec {
    pub fn compare(&self, a: &Claim, b: &Claim) -> std::cmp::Ordering {
        let primary = match self.field {
            SortField::Id => a.id.cmp(&b.id),
            SortField::Patient => a.patient_name.cmp(&b.patient_name),
            SortField::Insurer => a.insurer_name.cmp(&b.insurer_name),
            SortField::Amount => a.billed_amount.cmp(&b.billed_amount),
            SortField::Status => a.status.as_str().cmp(b.status.as_str()),
            SortField::Date => a.discharge_date.cmp(&b.discharge_date),
        };
        let primary = match self.direction {
            SortDirection::Asc => primary,
            SortDirection::Desc => primary.reverse(),
        };
        primary.then_with(|| b.id.cmp(&a.id))
    }
}

/// LIMIT/OFFSET window for one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub offset: u64,
    pub limit: u64,
}

// ─── Report rows ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusBreakdown {
    pub status: ClaimStatus,
    pub count: u64,
    /// AVG(billed) − AVG(paid) over the group, rounded to cents.
    pub avg_underpayment: Decimal,
    pub total_billed: Decimal,
    pub total_paid: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsurerBreakdown {
    pub insurer_name: String,
    pub claim_count: u64,
    /// AVG(billed) − AVG(paid) over the group, rounded to cents.
    pub avg_underpayment: Decimal,
}

// ─── Store port ───────────────────────────────────────────────

/// Persistence trait for claims and their annotations.
///
/// Handlers operate exclusively through this trait. `MemoryStore` backs tests
/// and demos, `PgClaimStore` backs production.
#[async_trait]
pub trait ClaimStore: Send + Sync {
    // ── Claims ──

    async fn insert_claim(&self, claim: NewClaim) -> Result<Claim>;
    async fn load_claim(&self, id: ClaimId) -> Result<Option<Claim>>;
    async fn count_claims(&self, filter: &ClaimFilter) -> Result<u64>;
    async fn list_claims(
        &self,
        filter: &ClaimFilter,
        sort: SortSpec,
        window: PageWindow,
    ) -> Result<Vec<ClaimView>>;
    /// Distinct statuses present in the table, in name order.
    async fn distinct_statuses(&self) -> Result<Vec<ClaimStatus>>;
    /// Distinct non-empty insurer names, in name order.
    async fn distinct_insurers(&self) -> Result<Vec<String>>;

    // ── Details ──

    async fn insert_detail(&self, claim_id: ClaimId, detail: NewClaimDetail)
        -> Result<ClaimDetail>;
    /// Oldest detail for the claim, creating an empty one when none exists.
    async fn get_or_create_detail(&self, claim_id: ClaimId) -> Result<ClaimDetail>;

    // ── Actors ──

    async fn ensure_actor(&self, username: &str) -> Result<Actor>;

    // ── Flags ──

    /// Returns the flag for (claim, actor) and whether this call created it.
    async fn get_or_create_flag(
        &self,
        claim_id: ClaimId,
        actor_id: ActorId,
        reason: &str,
    ) -> Result<(ClaimFlag, bool)>;
    /// Flags on a claim, newest first.
    async fn flags_for_claim(&self, claim_id: ClaimId) -> Result<Vec<FlagActivity>>;

    // ── Notes (append-only) ──

    async fn insert_note(&self, note: NewClaimNote) -> Result<ClaimNote>;
    /// Notes on a claim, newest first.
    async fn notes_for_claim(&self, claim_id: ClaimId) -> Result<Vec<NoteActivity>>;

    // ── Reporting ──

    async fn flagged_claim_count(&self) -> Result<u64>;
    async fn status_breakdown(&self) -> Result<Vec<StatusBreakdown>>;
    async fn insurer_breakdown(&self, limit: usize) -> Result<Vec<InsurerBreakdown>>;
    async fn recent_flags(&self, limit: usize) -> Result<Vec<FlagActivity>>;
    async fn note_count(&self) -> Result<u64>;
    async fn actor_count(&self) -> Result<u64>;
}
