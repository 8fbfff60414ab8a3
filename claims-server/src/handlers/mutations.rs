//! Authenticated writes.
//!
//! POST /claim/:id/flag/  - flag a claim for review (once per actor)
//! POST /claim/:id/note/  - append a note
//!
//! Full-page requests are answered with a 303 back to the claim carrying a
//! flash message; fragment requests get the refreshed partial.

use std::sync::Arc;

use axum::{
    extract::Path,
    response::{IntoResponse, Response},
    Extension, Form,
};
use claims_core::mutations::{self, note_added_message};
use claims_core::types::{Actor, ClaimId, NoteActivity};
use claims_core::{ClaimStore, ClaimsError, Message};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::render::{claim_detail_path, redirect_with_message, RenderMode, Rendered};

#[derive(Debug, Default, Deserialize)]
pub struct FlagForm {
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NoteForm {
    pub content: Option<String>,
    pub note_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FlagStatus {
    pub claim_id: ClaimId,
    pub is_flagged: bool,
    pub flag_count: usize,
    pub message: Message,
}

#[derive(Debug, Serialize)]
pub struct NotesPartial {
    pub claim_id: ClaimId,
    pub notes: Vec<NoteActivity>,
    pub message: Message,
}

pub async fn flag_claim(
    Extension(store): Extension<Arc<dyn ClaimStore>>,
    Extension(actor): Extension<Actor>,
    mode: RenderMode,
    Path(claim_id): Path<ClaimId>,
    form: Option<Form<FlagForm>>,
) -> Result<Response, AppError> {
    let form = form.map(|Form(f)| f).unwrap_or_default();
    let outcome =
        mutations::flag_claim(store.as_ref(), claim_id, &actor, form.reason.as_deref()).await?;
    let message = outcome.message();

    if !mode.is_fragment() {
        return Ok(redirect_with_message(&claim_detail_path(claim_id), &message));
    }

    let flags = store.flags_for_claim(claim_id).await?;
    let status = FlagStatus {
        claim_id,
        is_flagged: !flags.is_empty(),
        flag_count: flags.len(),
        message,
    };
    Ok(Rendered::fragment("claims/flag_status", status).into_response())
}

pub async fn add_note(
    Extension(store): Extension<Arc<dyn ClaimStore>>,
    Extension(actor): Extension<Actor>,
    mode: RenderMode,
    Path(claim_id): Path<ClaimId>,
    form: Option<Form<NoteForm>>,
) -> Result<Response, AppError> {
    let form = form.map(|Form(f)| f).unwrap_or_default();
    let detail_path = claim_detail_path(claim_id);

    let result = mutations::add_note(
        store.as_ref(),
        claim_id,
        &actor,
        form.content.as_deref(),
        form.note_type.as_deref(),
    )
    .await;

    match result {
        Ok(_) if mode.is_fragment() => {
            let notes = store.notes_for_claim(claim_id).await?;
            let partial = NotesPartial {
                claim_id,
                notes,
                message: note_added_message(),
            };
            Ok(Rendered::fragment("claims/notes_partial", partial).into_response())
        }
        Ok(_) => Ok(redirect_with_message(&detail_path, &note_added_message())),
        Err(ClaimsError::Validation(text)) => {
            tracing::debug!(claim_id, reason = %text, "Note rejected");
            Ok(redirect_with_message(&detail_path, &Message::error(text)))
        }
        Err(e) => Err(e.into()),
    }
}
