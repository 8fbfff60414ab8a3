use serde::Serialize;

use crate::error::{ClaimsError, ClaimsResult};
use crate::store::ClaimStore;
use crate::types::*;

/// A single claim with everything attached to it.
#[derive(Debug, Clone, Serialize)]
pub struct ClaimDetailView {
    pub claim: ClaimView,
    pub detail: ClaimDetail,
    pub cpt_codes: Vec<String>,
    pub flags: Vec<FlagActivity>,
    pub notes: Vec<NoteActivity>,
}

impl ClaimDetailView {
    pub async fn load(store: &dyn ClaimStore, claim_id: ClaimId) -> ClaimsResult<Self> {
        let claim = store
            .load_claim(claim_id)
            .await?
            .ok_or(ClaimsError::ClaimNotFound(claim_id))?;

        let (detail, flags, notes) = tokio::try_join!(
            store.get_or_create_detail(claim_id),
            store.flags_for_claim(claim_id),
            store.notes_for_claim(claim_id),
        )?;

        Ok(Self {
            claim: ClaimView::new(claim, flags.len() as u64),
            cpt_codes: detail.cpt_codes_list().into_iter().map(String::from).collect(),
            detail,
            flags,
            notes,
        })
    }
}
