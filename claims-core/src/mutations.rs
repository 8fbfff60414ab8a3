//! Actor-scoped writes: flags (get-or-create) and notes (append-only).

use tracing::info;

use crate::error::{ClaimsError, ClaimsResult};
use crate::messages::Message;
use crate::store::ClaimStore;
use crate::types::*;

pub const EMPTY_NOTE_MESSAGE: &str = "Note content cannot be empty.";

#[derive(Debug, Clone)]
pub struct FlagOutcome {
    pub flag: ClaimFlag,
    /// False when the actor had already flagged this claim.
    pub created: bool,
}

impl FlagOutcome {
    pub fn message(&self) -> Message {
        if self.created {
            Message::success(format!("Claim {} flagged for review!", self.flag.claim_id))
        } else {
            Message::info(format!("Claim {} already flagged by you.", self.flag.claim_id))
        }
    }
}

async fn require_claim(store: &dyn ClaimStore, claim_id: ClaimId) -> ClaimsResult<Claim> {
    store
        .load_claim(claim_id)
        .await?
        .ok_or(ClaimsError::ClaimNotFound(claim_id))
}

/// Flag a claim for review. Idempotent per (claim, actor). Reasons longer
/// than [`MAX_FLAG_REASON_CHARS`] are truncated.
pub async fn flag_claim(
    store: &dyn ClaimStore,
    claim_id: ClaimId,
    actor: &Actor,
    reason: Option<&str>,
) -> ClaimsResult<FlagOutcome> {
    require_claim(store, claim_id).await?;
    let reason: String = reason
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or(DEFAULT_FLAG_REASON)
        .chars()
        .take(MAX_FLAG_REASON_CHARS)
        .collect();

    let (flag, created) = store.get_or_create_flag(claim_id, actor.id, &reason).await?;
    if created {
        info!(claim_id, actor = %actor.username, "Claim flagged");
    }
    Ok(FlagOutcome { flag, created })
}

/// Append a note to a claim. Blank content and unknown note types are
/// rejected before anything is written.
pub async fn add_note(
    store: &dyn ClaimStore,
    claim_id: ClaimId,
    actor: &Actor,
    content: Option<&str>,
    note_type: Option<&str>,
) -> ClaimsResult<ClaimNote> {
    require_claim(store, claim_id).await?;

    let content = content.map(str::trim).unwrap_or("");
    if content.is_empty() {
        return Err(ClaimsError::Validation(EMPTY_NOTE_MESSAGE.to_string()));
    }
    let note_type = match note_type.map(str::trim).filter(|t| !t.is_empty()) {
        None => NoteType::default(),
        Some(raw) => raw
            .parse::<NoteType>()
            .map_err(|_| ClaimsError::Validation(format!("Unknown note type: {}", raw)))?,
    };

    let note = store
        .insert_note(NewClaimNote {
            claim_id,
            user_id: actor.id,
            content: content.to_string(),
            note_type,
        })
        .await?;
    info!(claim_id, note_id = note.id, actor = %actor.username, "Note added");
    Ok(note)
}

pub fn note_added_message() -> Message {
    Message::success("Note added successfully!")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    async fn store_with_claim() -> (MemoryStore, Actor) {
        let store = MemoryStore::new();
        store
            .insert_claim(NewClaim {
                id: 99999,
                patient_name: "Test Patient".into(),
                billed_amount: Decimal::new(100000, 2),
                paid_amount: Decimal::new(50000, 2),
                status: ClaimStatus::UnderReview,
                insurer_name: "Test Insurance".into(),
                discharge_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            })
            .await
            .unwrap();
        let actor = store.ensure_actor("testuser").await.unwrap();
        (store, actor)
    }

    #[tokio::test]
    async fn flagging_twice_keeps_one_flag() {
        let (store, actor) = store_with_claim().await;
        let first = flag_claim(&store, 99999, &actor, Some("Test flag reason")).await.unwrap();
        assert!(first.created);
        assert_eq!(first.flag.reason, "Test flag reason");
        assert_eq!(first.message().text, "Claim 99999 flagged for review!");

        let second = flag_claim(&store, 99999, &actor, Some("again")).await.unwrap();
        assert!(!second.created);
        assert_eq!(second.flag.id, first.flag.id);
        assert_eq!(second.flag.reason, "Test flag reason");
        assert_eq!(second.message().text, "Claim 99999 already flagged by you.");

        assert_eq!(store.flags_for_claim(99999).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_reason_uses_default() {
        let (store, actor) = store_with_claim().await;
        let outcome = flag_claim(&store, 99999, &actor, Some("   ")).await.unwrap();
        assert_eq!(outcome.flag.reason, DEFAULT_FLAG_REASON);
    }

    #[tokio::test]
    async fn long_reason_is_truncated_to_column_width() {
        let (store, actor) = store_with_claim().await;
        let reason = "é".repeat(600);
        let outcome = flag_claim(&store, 99999, &actor, Some(&reason)).await.unwrap();
        assert_eq!(outcome.flag.reason.chars().count(), MAX_FLAG_REASON_CHARS);

        let stored = store.flags_for_claim(99999).await.unwrap();
        assert_eq!(stored[0].flag.reason.chars().count(), MAX_FLAG_REASON_CHARS);
    }

    #[tokio::test]
    async fn flagging_unknown_claim_is_not_found() {
        let (store, actor) = store_with_claim().await;
        let err = flag_claim(&store, 999999, &actor, None).await.unwrap_err();
        assert!(matches!(err, ClaimsError::ClaimNotFound(999999)));
    }

    #[tokio::test]
    async fn two_actors_flag_the_same_claim() {
        let (store, alice) = store_with_claim().await;
        let bob = store.ensure_actor("bob").await.unwrap();
        assert!(flag_claim(&store, 99999, &alice, None).await.unwrap().created);
        assert!(flag_claim(&store, 99999, &bob, None).await.unwrap().created);
        assert_eq!(store.flagged_claim_count().await.unwrap(), 1);
        assert_eq!(store.flags_for_claim(99999).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn blank_note_is_rejected_and_not_stored() {
        let (store, actor) = store_with_claim().await;
        for content in [None, Some(""), Some("  \n\t ")] {
            let err = add_note(&store, 99999, &actor, content, None).await.unwrap_err();
            match err {
                ClaimsError::Validation(msg) => assert_eq!(msg, EMPTY_NOTE_MESSAGE),
                other => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(store.note_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn note_is_trimmed_and_typed() {
        let (store, actor) = store_with_claim().await;
        let note = add_note(&store, 99999, &actor, Some("  Test note content "), None)
            .await
            .unwrap();
        assert_eq!(note.content, "Test note content");
        assert_eq!(note.note_type, NoteType::UserNote);

        let admin = add_note(&store, 99999, &actor, Some("escalate"), Some("Admin Note"))
            .await
            .unwrap();
        assert_eq!(admin.note_type, NoteType::AdminNote);

        let notes = store.notes_for_claim(99999).await.unwrap();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].author, "testuser");
    }

    #[tokio::test]
    async fn unknown_note_type_is_rejected() {
        let (store, actor) = store_with_claim().await;
        let err = add_note(&store, 99999, &actor, Some("hi"), Some("Memo"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Unknown note type: Memo");
        assert_eq!(store.note_count().await.unwrap(), 0);
    }
}
