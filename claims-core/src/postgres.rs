//! PostgreSQL implementation of [`ClaimStore`].
//!
//! Filters are compiled with `sqlx::QueryBuilder`; rows are decoded into
//! private `FromRow` structs and converted into domain records.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder};
use tracing::{info, warn};

use crate::memory::avg_underpayment;
use crate::store::*;
use crate::types::*;

// ─── Connection ───────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub connection_timeout: Duration,
    pub idle_timeout: Option<Duration>,
    pub max_lifetime: Option<Duration>,
}

impl DatabaseConfig {
    /// Reads `DATABASE_URL` and `DATABASE_POOL_SIZE`. Returns `None` when no
    /// database is configured.
    pub fn from_env() -> Option<Self> {
        let database_url = std::env::var("DATABASE_URL").ok()?;
        Some(Self {
            database_url,
            max_connections: std::env::var("DATABASE_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            ..Self::with_url("")
        })
    }

    pub fn with_url(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: 10,
            connection_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(600)),
            max_lifetime: Some(Duration::from_secs(1800)),
        }
    }
}

/// Mask the password in a database URL for logging.
pub fn mask_database_url(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(parsed) => {
            let mut masked = parsed.clone();
            if parsed.password().is_some() {
                let _ = masked.set_password(Some("***"));
            }
            masked.to_string()
        }
        Err(_) => {
            let chars: Vec<char> = url.chars().collect();
            if chars.len() > 20 {
                let head: String = chars[..10].iter().collect();
                let tail: String = chars[chars.len() - 10..].iter().collect();
                format!("{head}***{tail}")
            } else {
                "***".to_string()
            }
        }
    }
}

pub struct PgClaimStore {
    pool: PgPool,
}

impl PgClaimStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        info!(
            "Connecting to database: {}",
            mask_database_url(&config.database_url)
        );

        let mut options = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connection_timeout);
        if let Some(idle) = config.idle_timeout {
            options = options.idle_timeout(idle);
        }
        if let Some(lifetime) = config.max_lifetime {
            options = options.max_lifetime(lifetime);
        }

        let pool = options
            .connect(&config.database_url)
            .await
            .map_err(|e| {
                warn!("Failed to connect to database: {}", e);
                e
            })
            .context("Failed to create connection pool")?;

        info!("Database connection pool created successfully");
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<()> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run migrations")?;
        Ok(())
    }
}

// ─── Rows ─────────────────────────────────────────────────────

const CLAIM_COLUMNS: &str = "c.id, c.patient_name, c.billed_amount, c.paid_amount, c.status, \
     c.insurer_name, c.discharge_date, c.created_at, c.updated_at";

#[derive(sqlx::FromRow)]
struct ClaimRow {
    id: i64,
    patient_name: String,
    billed_amount: Decimal,
    paid_amount: Decimal,
    status: String,
    insurer_name: String,
    discharge_date: NaiveDate,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ClaimRow> for Claim {
    type Error = anyhow::Error;

    fn try_from(row: ClaimRow) -> Result<Self> {
        Ok(Claim {
            id: row.id,
            patient_name: row.patient_name,
            billed_amount: row.billed_amount,
            paid_amount: row.paid_amount,
            status: row.status.parse()?,
            insurer_name: row.insurer_name,
            discharge_date: row.discharge_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ClaimListRow {
    #[sqlx(flatten)]
    claim: ClaimRow,
    flag_count: i64,
}

#[derive(sqlx::FromRow)]
struct DetailRow {
    id: i64,
    claim_id: i64,
    denial_reason: Option<String>,
    cpt_codes: String,
}

impl From<DetailRow> for ClaimDetail {
    fn from(row: DetailRow) -> Self {
        ClaimDetail {
            id: row.id,
            claim_id: row.claim_id,
            denial_reason: row.denial_reason,
            cpt_codes: row.cpt_codes,
        }
    }
}

#[derive(sqlx::FromRow)]
struct FlagRow {
    id: i64,
    claim_id: i64,
    user_id: i64,
    reason: String,
    flagged_at: DateTime<Utc>,
}

impl From<FlagRow> for ClaimFlag {
    fn from(row: FlagRow) -> Self {
        ClaimFlag {
            id: row.id,
            claim_id: row.claim_id,
            user_id: row.user_id,
            reason: row.reason,
            flagged_at: row.flagged_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct FlagActivityRow {
    #[sqlx(flatten)]
    flag: FlagRow,
    patient_name: String,
    flagged_by: String,
}

impl From<FlagActivityRow> for FlagActivity {
    fn from(row: FlagActivityRow) -> Self {
        FlagActivity {
            flag: row.flag.into(),
            patient_name: row.patient_name,
            flagged_by: row.flagged_by,
        }
    }
}

#[derive(sqlx::FromRow)]
struct NoteRow {
    id: i64,
    claim_id: i64,
    user_id: i64,
    content: String,
    note_type: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<NoteRow> for ClaimNote {
    type Error = anyhow::Error;

    fn try_from(row: NoteRow) -> Result<Self> {
        Ok(ClaimNote {
            id: row.id,
            claim_id: row.claim_id,
            user_id: row.user_id,
            content: row.content,
            note_type: row.note_type.parse()?,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct NoteActivityRow {
    #[sqlx(flatten)]
    note: NoteRow,
    author: String,
}

#[derive(sqlx::FromRow)]
struct GroupTotalsRow {
    key: String,
    count: i64,
    total_billed: Decimal,
    total_paid: Decimal,
}

const FLAG_ACTIVITY_SELECT: &str = "SELECT f.id, f.claim_id, f.user_id, f.reason, f.flagged_at, \
     c.patient_name, u.username AS flagged_by \
     FROM claim_flags f \
     JOIN claims c ON c.id = f.claim_id \
     JOIN claim_users u ON u.id = f.user_id";

// ─── Filter compilation ───────────────────────────────────────

/// `%term%` with LIKE metacharacters escaped.
fn contains_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for ch in term.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

/// Appends ` AND ...` clauses for every predicate in `filter`. The builder
/// must already contain a `WHERE` over `claims c`.
fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &ClaimFilter) {
    if filter.match_nothing {
        qb.push(" AND FALSE");
        return;
    }
    if let Some(term) = &filter.search {
        let pattern = contains_pattern(term);
        qb.push(" AND (c.patient_name ILIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" OR c.insurer_name ILIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" OR CAST(c.id AS TEXT) ILIKE ");
        qb.push_bind(pattern);
        qb.push(")");
    }
    if let Some(status) = filter.status {
        qb.push(" AND c.status = ");
        qb.push_bind(status.as_str());
    }
    if let Some(insurer) = &filter.insurer {
        qb.push(" AND c.insurer_name ILIKE ");
        qb.push_bind(contains_pattern(insurer));
    }
    if let Some(min) = filter.min_billed {
        qb.push(" AND c.billed_amount >= ");
        qb.push_bind(min);
    }
    if let Some(max) = filter.max_billed {
        qb.push(" AND c.billed_amount <= ");
        qb.push_bind(max);
    }
    if let Some(from) = filter.discharged_from {
        qb.push(" AND c.discharge_date >= ");
        qb.push_bind(from);
    }
    if let Some(to) = filter.discharged_to {
        qb.push(" AND c.discharge_date <= ");
        qb.push_bind(to);
    }
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn to_u64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

// ─── Store ────────────────────────────────────────────────────

#[async_trait]
impl ClaimStore for PgClaimStore {
    async fn insert_claim(&self, claim: NewClaim) -> Result<Claim> {
        claim.validate().map_err(|e| anyhow!(e))?;
        let row = sqlx::query_as::<_, ClaimRow>(
            r#"
            INSERT INTO claims (id, patient_name, billed_amount, paid_amount, status,
                                insurer_name, discharge_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, patient_name, billed_amount, paid_amount, status,
                      insurer_name, discharge_date, created_at, updated_at
            "#,
        )
        .bind(claim.id)
        .bind(&claim.patient_name)
        .bind(to_cents(claim.billed_amount))
        .bind(to_cents(claim.paid_amount))
        .bind(claim.status.as_str())
        .bind(&claim.insurer_name)
        .bind(claim.discharge_date)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("Failed to insert claim {}", claim.id))?;
        row.try_into()
    }

    async fn load_claim(&self, id: ClaimId) -> Result<Option<Claim>> {
        let row = sqlx::query_as::<_, ClaimRow>(&format!(
            "SELECT {} FROM claims c WHERE c.id = $1",
            CLAIM_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to load claim")?;
        row.map(Claim::try_from).transpose()
    }

    async fn count_claims(&self, filter: &ClaimFilter) -> Result<u64> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM claims c WHERE 1=1");
        push_filter(&mut qb, filter);
        let count: i64 = qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .context("Failed to count claims")?;
        Ok(to_u64(count))
    }

    async fn list_claims(
        &self,
        filter: &ClaimFilter,
        sort: SortSpec,
        window: PageWindow,
    ) -> Result<Vec<ClaimView>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {}, \
             (SELECT COUNT(*) FROM claim_flags f WHERE f.claim_id = c.id) AS flag_count \
             FROM claims c WHERE 1=1",
            CLAIM_COLUMNS
        ));
        push_filter(&mut qb, filter);
        // Column and direction come from closed enums, never from input.
        qb.push(format!(
            " ORDER BY c.{} {}, c.id DESC LIMIT ",
            sort.field.column(),
            sort.direction.as_sql()
        ));
        qb.push_bind(to_i64(window.limit));
        qb.push(" OFFSET ");
        qb.push_bind(to_i64(window.offset));

        let rows = qb
            .build_query_as::<ClaimListRow>()
            .fetch_all(&self.pool)
            .await
            .context("Failed to list claims")?;

        rows.into_iter()
            .map(|row| {
                let flags = to_u64(row.flag_count);
                Ok(ClaimView::new(row.claim.try_into()?, flags))
            })
            .collect()
    }

    async fn distinct_statuses(&self) -> Result<Vec<ClaimStatus>> {
        let raw: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT status FROM claims ORDER BY status")
                .fetch_all(&self.pool)
                .await
                .context("Failed to load statuses")?;
        raw.iter()
            .map(|s| s.parse::<ClaimStatus>().map_err(Into::into))
            .collect()
    }

    async fn distinct_insurers(&self) -> Result<Vec<String>> {
        sqlx::query_scalar(
            "SELECT DISTINCT insurer_name FROM claims WHERE insurer_name <> '' ORDER BY insurer_name",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to load insurers")
    }

    async fn insert_detail(
        &self,
        claim_id: ClaimId,
        detail: NewClaimDetail,
    ) -> Result<ClaimDetail> {
        let row = sqlx::query_as::<_, DetailRow>(
            r#"
            INSERT INTO claim_details (claim_id, denial_reason, cpt_codes)
            VALUES ($1, $2, $3)
            RETURNING id, claim_id, denial_reason, cpt_codes
            "#,
        )
        .bind(claim_id)
        .bind(&detail.denial_reason)
        .bind(&detail.cpt_codes)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("Failed to insert detail for claim {}", claim_id))?;
        Ok(row.into())
    }

    async fn get_or_create_detail(&self, claim_id: ClaimId) -> Result<ClaimDetail> {
        let existing = sqlx::query_as::<_, DetailRow>(
            r#"
            SELECT id, claim_id, denial_reason, cpt_codes
            FROM claim_details
            WHERE claim_id = $1
            ORDER BY id
            LIMIT 1
            "#,
        )
        .bind(claim_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to load claim detail")?;

        match existing {
            Some(row) => Ok(row.into()),
            None => self.insert_detail(claim_id, NewClaimDetail::default()).await,
        }
    }

    async fn ensure_actor(&self, username: &str) -> Result<Actor> {
        let (id, username): (i64, String) = sqlx::query_as(
            r#"
            INSERT INTO claim_users (username) VALUES ($1)
            ON CONFLICT (username) DO UPDATE SET username = EXCLUDED.username
            RETURNING id, username
            "#,
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await
        .context("Failed to resolve actor")?;
        Ok(Actor { id, username })
    }

    async fn get_or_create_flag(
        &self,
        claim_id: ClaimId,
        actor_id: ActorId,
        reason: &str,
    ) -> Result<(ClaimFlag, bool)> {
        let inserted = sqlx::query_as::<_, FlagRow>(
            r#"
            INSERT INTO claim_flags (claim_id, user_id, reason)
            VALUES ($1, $2, $3)
            ON CONFLICT (claim_id, user_id) DO NOTHING
            RETURNING id, claim_id, user_id, reason, flagged_at
            "#,
        )
        .bind(claim_id)
        .bind(actor_id)
        .bind(reason)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to insert flag")?;

        if let Some(row) = inserted {
            return Ok((row.into(), true));
        }

        let existing = sqlx::query_as::<_, FlagRow>(
            r#"
            SELECT id, claim_id, user_id, reason, flagged_at
            FROM claim_flags
            WHERE claim_id = $1 AND user_id = $2
            "#,
        )
        .bind(claim_id)
        .bind(actor_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to load existing flag")?;
        Ok((existing.into(), false))
    }

    async fn flags_for_claim(&self, claim_id: ClaimId) -> Result<Vec<FlagActivity>> {
        let rows = sqlx::query_as::<_, FlagActivityRow>(&format!(
            "{} WHERE f.claim_id = $1 ORDER BY f.flagged_at DESC, f.id DESC",
            FLAG_ACTIVITY_SELECT
        ))
        .bind(claim_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load flags")?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn insert_note(&self, note: NewClaimNote) -> Result<ClaimNote> {
        let row = sqlx::query_as::<_, NoteRow>(
            r#"
            INSERT INTO claim_notes (claim_id, user_id, content, note_type)
            VALUES ($1, $2, $3, $4)
            RETURNING id, claim_id, user_id, content, note_type, created_at
            "#,
        )
        .bind(note.claim_id)
        .bind(note.user_id)
        .bind(&note.content)
        .bind(note.note_type.as_str())
        .fetch_one(&self.pool)
        .await
        .context("Failed to insert note")?;
        row.try_into()
    }

    async fn notes_for_claim(&self, claim_id: ClaimId) -> Result<Vec<NoteActivity>> {
        let rows = sqlx::query_as::<_, NoteActivityRow>(
            r#"
            SELECT n.id, n.claim_id, n.user_id, n.content, n.note_type, n.created_at,
                   u.username AS author
            FROM claim_notes n
            JOIN claim_users u ON u.id = n.user_id
            WHERE n.claim_id = $1
            ORDER BY n.created_at DESC, n.id DESC
            "#,
        )
        .bind(claim_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load notes")?;

        rows.into_iter()
            .map(|row| {
                Ok(NoteActivity {
                    note: row.note.try_into()?,
                    author: row.author,
                })
            })
            .collect()
    }

    async fn flagged_claim_count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(DISTINCT claim_id) FROM claim_flags")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count flagged claims")?;
        Ok(to_u64(count))
    }

    async fn status_breakdown(&self) -> Result<Vec<StatusBreakdown>> {
        let rows = sqlx::query_as::<_, GroupTotalsRow>(
            r#"
            SELECT status AS key, COUNT(*) AS count,
                   SUM(billed_amount) AS total_billed, SUM(paid_amount) AS total_paid
            FROM claims
            GROUP BY status
            ORDER BY status
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to compute status breakdown")?;

        rows.into_iter()
            .map(|row| {
                let count = to_u64(row.count);
                Ok(StatusBreakdown {
                    status: row.key.parse()?,
                    count,
                    avg_underpayment: avg_underpayment(row.total_billed, row.total_paid, count),
                    total_billed: row.total_billed,
                    total_paid: row.total_paid,
                })
            })
            .collect()
    }

    async fn insurer_breakdown(&self, limit: usize) -> Result<Vec<InsurerBreakdown>> {
        let rows = sqlx::query_as::<_, GroupTotalsRow>(
            r#"
            SELECT insurer_name AS key, COUNT(*) AS count,
                   SUM(billed_amount) AS total_billed, SUM(paid_amount) AS total_paid
            FROM claims
            GROUP BY insurer_name
            ORDER BY COUNT(*) DESC, insurer_name ASC
            LIMIT $1
            "#,
        )
        .bind(to_i64(limit as u64))
        .fetch_all(&self.pool)
        .await
        .context("Failed to compute insurer breakdown")?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let count = to_u64(row.count);
                InsurerBreakdown {
                    avg_underpayment: avg_underpayment(row.total_billed, row.total_paid, count),
                    insurer_name: row.key,
                    claim_count: count,
                }
            })
            .collect())
    }

    async fn recent_flags(&self, limit: usize) -> Result<Vec<FlagActivity>> {
        let rows = sqlx::query_as::<_, FlagActivityRow>(&format!(
            "{} ORDER BY f.flagged_at DESC, f.id DESC LIMIT $1",
            FLAG_ACTIVITY_SELECT
        ))
        .bind(to_i64(limit as u64))
        .fetch_all(&self.pool)
        .await
        .context("Failed to load recent flags")?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn note_count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM claim_notes")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count notes")?;
        Ok(to_u64(count))
    }

    async fn actor_count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM claim_users")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count users")?;
        Ok(to_u64(count))
    }
}
