use crate::store::*;
use crate::types::*;
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct Tables {
    claims: BTreeMap<ClaimId, Claim>,
    details: Vec<ClaimDetail>,
    flags: Vec<ClaimFlag>,
    notes: Vec<ClaimNote>,
    actors: BTreeMap<ActorId, Actor>,
    next_detail_id: i64,
    next_flag_id: i64,
    next_note_id: i64,
    next_actor_id: ActorId,
}

impl Tables {
    fn flag_count(&self, claim_id: ClaimId) -> u64 {
        self.flags.iter().filter(|f| f.claim_id == claim_id).count() as u64
    }

    fn username(&self, actor_id: ActorId) -> String {
        self.actors
            .get(&actor_id)
            .map(|a| a.username.clone())
            .unwrap_or_default()
    }

    fn flag_activity(&self, flag: &ClaimFlag) -> FlagActivity {
        FlagActivity {
            flag: flag.clone(),
            patient_name: self
                .claims
                .get(&flag.claim_id)
                .map(|c| c.patient_name.clone())
                .unwrap_or_default(),
            flagged_by: self.username(flag.user_id),
        }
    }

    fn require_claim(&self, claim_id: ClaimId) -> Result<()> {
        if !self.claims.contains_key(&claim_id) {
            bail!("claim {} does not exist", claim_id);
        }
        Ok(())
    }
}

/// In-memory ClaimStore for tests and demos.
///
/// Mirrors the relational constraints of the Postgres schema: unique claim
/// ids, unique (claim, actor) flags, unique usernames, and foreign keys on
/// details, flags and notes.
pub struct MemoryStore {
    inner: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Tables::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.inner.read().map_err(|e| anyhow!("Lock: {}", e))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        self.inner.write().map_err(|e| anyhow!("Lock: {}", e))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// (AVG(billed) − AVG(paid)) for a group, rounded to cents.
pub(crate) fn avg_underpayment(total_billed: Decimal, total_paid: Decimal, count: u64) -> Decimal {
    if count == 0 {
        return to_cents(Decimal::ZERO);
    }
    let n = Decimal::from(count);
    to_cents(total_billed / n - total_paid / n)
}

#[async_trait]
impl ClaimStore for MemoryStore {
    async fn insert_claim(&self, claim: NewClaim) -> Result<Claim> {
        claim.validate().map_err(|e| anyhow!(e))?;
        let mut tables = self.write()?;
        if tables.claims.contains_key(&claim.id) {
            bail!("claim {} already exists", claim.id);
        }
        let claim = claim.into_claim(Utc::now());
        tables.claims.insert(claim.id, claim.clone());
        Ok(claim)
    }

    async fn load_claim(&self, id: ClaimId) -> Result<Option<Claim>> {
        Ok(self.read()?.claims.get(&id).cloned())
    }

    async fn count_claims(&self, filter: &ClaimFilter) -> Result<u64> {
        let tables = self.read()?;
        Ok(tables.claims.values().filter(|c| filter.matches(c)).count() as u64)
    }

    async fn list_claims(
        &self,
        filter: &ClaimFilter,
        sort: SortSpec,
        window: PageWindow,
    ) -> Result<Vec<ClaimView>> {
        let tables = self.read()?;
        let mut matched: Vec<&Claim> = tables.claims.values().filter(|c| filter.matches(c)).collect();
        matched.sort_by(|a, b| sort.compare(a, b));
        Ok(matched
            .into_iter()
            .skip(window.offset as usize)
            .take(window.limit as usize)
            .map(|c| ClaimView::new(c.clone(), tables.flag_count(c.id)))
            .collect())
    }

    async fn distinct_statuses(&self) -> Result<Vec<ClaimStatus>> {
        let tables = self.read()?;
        let statuses: BTreeSet<ClaimStatus> = tables.claims.values().map(|c| c.status).collect();
        Ok(statuses.into_iter().collect())
    }

    async fn distinct_insurers(&self) -> Result<Vec<String>> {
        let tables = self.read()?;
        let insurers: BTreeSet<&str> = tables
            .claims
            .values()
            .map(|c| c.insurer_name.as_str())
            .filter(|name| !name.is_empty())
            .collect();
        Ok(insurers.into_iter().map(String::from).collect())
    }

    async fn insert_detail(
        &self,
        claim_id: ClaimId,
        detail: NewClaimDetail,
    ) -> Result<ClaimDetail> {
        let mut tables = self.write()?;
        tables.require_claim(claim_id)?;
        tables.next_detail_id += 1;
        let detail = ClaimDetail {
            id: tables.next_detail_id,
            claim_id,
            denial_reason: detail.denial_reason,
            cpt_codes: detail.cpt_codes,
        };
        tables.details.push(detail.clone());
        Ok(detail)
    }

    async fn get_or_create_detail(&self, claim_id: ClaimId) -> Result<ClaimDetail> {
        let mut tables = self.write()?;
        if let Some(existing) = tables.details.iter().find(|d| d.claim_id == claim_id) {
            return Ok(existing.clone());
        }
        tables.require_claim(claim_id)?;
        tables.next_detail_id += 1;
        let detail = ClaimDetail {
            id: tables.next_detail_id,
            claim_id,
            denial_reason: None,
            cpt_codes: String::new(),
        };
        tables.details.push(detail.clone());
        Ok(detail)
    }

    async fn ensure_actor(&self, username: &str) -> Result<Actor> {
        let mut tables = self.write()?;
        if let Some(actor) = tables.actors.values().find(|a| a.username == username) {
            return Ok(actor.clone());
        }
        tables.next_actor_id += 1;
        let actor = Actor {
            id: tables.next_actor_id,
            username: username.to_string(),
        };
        tables.actors.insert(actor.id, actor.clone());
        Ok(actor)
    }

    async fn get_or_create_flag(
        &self,
        claim_id: ClaimId,
        actor_id: ActorId,
        reason: &str,
    ) -> Result<(ClaimFlag, bool)> {
        let mut tables = self.write()?;
        if let Some(existing) = tables
            .flags
            .iter()
            .find(|f| f.claim_id == claim_id && f.user_id == actor_id)
        {
            return Ok((existing.clone(), false));
        }
        tables.require_claim(claim_id)?;
        if !tables.actors.contains_key(&actor_id) {
            bail!("actor {} does not exist", actor_id);
        }
        tables.next_flag_id += 1;
        let flag = ClaimFlag {
            id: tables.next_flag_id,
            claim_id,
            user_id: actor_id,
            reason: reason.to_string(),
            flagged_at: Utc::now(),
        };
        tables.flags.push(flag.clone());
        Ok((flag, true))
    }

    async fn flags_for_claim(&self, claim_id: ClaimId) -> Result<Vec<FlagActivity>> {
        let tables = self.read()?;
        let mut flags: Vec<&ClaimFlag> =
            tables.flags.iter().filter(|f| f.claim_id == claim_id).collect();
        flags.sort_by(|a, b| b.flagged_at.cmp(&a.flagged_at).then(b.id.cmp(&a.id)));
        Ok(flags.into_iter().map(|f| tables.flag_activity(f)).collect())
    }

    async fn insert_note(&self, note: NewClaimNote) -> Result<ClaimNote> {
        let mut tables = self.write()?;
        tables.require_claim(note.claim_id)?;
        if !tables.actors.contains_key(&note.user_id) {
            bail!("actor {} does not exist", note.user_id);
        }
        tables.next_note_id += 1;
        let note = ClaimNote {
            id: tables.next_note_id,
            claim_id: note.claim_id,
            user_id: note.user_id,
            content: note.content,
            note_type: note.note_type,
            created_at: Utc::now(),
        };
        tables.notes.push(note.clone());
        Ok(note)
    }

    async fn notes_for_claim(&self, claim_id: ClaimId) -> Result<Vec<NoteActivity>> {
        let tables = self.read()?;
        let mut notes: Vec<&ClaimNote> =
            tables.notes.iter().filter(|n| n.claim_id == claim_id).collect();
        notes.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(notes
            .into_iter()
            .map(|n| NoteActivity {
                note: n.clone(),
                author: tables.username(n.user_id),
            })
            .collect())
    }

    async fn flagged_claim_count(&self) -> Result<u64> {
        let tables = self.read()?;
        let distinct: BTreeSet<ClaimId> = tables.flags.iter().map(|f| f.claim_id).collect();
        Ok(distinct.len() as u64)
    }

    async fn status_breakdown(&self) -> Result<Vec<StatusBreakdown>> {
        let tables = self.read()?;
        let mut groups: BTreeMap<&str, (ClaimStatus, u64, Decimal, Decimal)> = BTreeMap::new();
        for claim in tables.claims.values() {
            let entry = groups
                .entry(claim.status.as_str())
                .or_insert((claim.status, 0, Decimal::ZERO, Decimal::ZERO));
            entry.1 += 1;
            entry.2 += claim.billed_amount;
            entry.3 += claim.paid_amount;
        }
        Ok(groups
            .into_values()
            .map(|(status, count, billed, paid)| StatusBreakdown {
                status,
                count,
                avg_underpayment: avg_underpayment(billed, paid, count),
                total_billed: billed,
                total_paid: paid,
            })
            .collect())
    }

    async fn insurer_breakdown(&self, limit: usize) -> Result<Vec<InsurerBreakdown>> {
        let tables = self.read()?;
        let mut groups: HashMap<&str, (u64, Decimal, Decimal)> = HashMap::new();
        for claim in tables.claims.values() {
            let entry = groups
                .entry(claim.insurer_name.as_str())
                .or_insert((0, Decimal::ZERO, Decimal::ZERO));
            entry.0 += 1;
            entry.1 += claim.billed_amount;
            entry.2 += claim.paid_amount;
        }
        let mut rows: Vec<InsurerBreakdown> = groups
            .into_iter()
            .map(|(name, (count, billed, paid))| InsurerBreakdown {
                insurer_name: name.to_string(),
                claim_count: count,
                avg_underpayment: avg_underpayment(billed, paid, count),
            })
            .collect();
        rows.sort_by(|a, b| {
            b.claim_count
                .cmp(&a.claim_count)
                .then_with(|| a.insurer_name.cmp(&b.insurer_name))
        });
        rows.truncate(limit);
        Ok(rows)
    }

    async fn recent_flags(&self, limit: usize) -> Result<Vec<FlagActivity>> {
        let tables = self.read()?;
        let mut flags: Vec<&ClaimFlag> = tables.flags.iter().collect();
        flags.sort_by(|a, b| b.flagged_at.cmp(&a.flagged_at).then(b.id.cmp(&a.id)));
        Ok(flags
            .into_iter()
            .take(limit)
            .map(|f| tables.flag_activity(f))
            .collect())
    }

    async fn note_count(&self) -> Result<u64> {
        Ok(self.read()?.notes.len() as u64)
    }

    async fn actor_count(&self) -> Result<u64> {
        Ok(self.read()?.actors.len() as u64)
    }
}
