//! # Notes
//!
//! A note is readable by its owner and, once shared, by every email listed
//! in its permissions; `edit` permissions may also save it. Settings and
//! deletion stay with the owner. Notes the caller may not read answer 404.
//!
//! `PATCH /edit` accepts the save either as JSON or packed
//! ([`store::packing`]). The body text and first image are derived from the
//! editor tree here, whatever the client computed for its own preview.

use axum::body::Bytes;
use axum::extract::{FromRequest, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::routing::{get, patch};
use axum::{Json, Router};
use store::packing::{unpack, PACKED_CONTENT_TYPE};
use store::wire::SaveNote;
use store::{
    EditorState, NewNote, Note, NoteDocument, NoteSettings, NoteUpdate, NoteView, Page,
    PageRequest,
};
use uuid::Uuid;

use super::{JsonBody, Path, Query};
use crate::auth::AuthUser;
use crate::error::{ApiError, Message, Result};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/notes", get(list))
        .route("/note/{id}", get(load).delete(remove))
        .route("/note/{id}/settings", patch(update_settings))
        .route("/edit", patch(save))
}

/// Save body in either wire format.
pub struct SaveBody(pub SaveNote);

impl<S: Send + Sync> FromRequest<S> for SaveBody {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> std::result::Result<Self, Self::Rejection> {
        let packed = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with(PACKED_CONTENT_TYPE));
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| ApiError::Validation(e.body_text()))?;

        let save = if packed {
            unpack(&bytes).map_err(|e| ApiError::validation(format!("Invalid packed body: {e}")))?
        } else {
            serde_json::from_slice(&bytes)
                .map_err(|e| ApiError::validation(format!("Invalid JSON body: {e}")))?
        };
        Ok(SaveBody(save))
    }
}

/// Resolve label ids against the owner's labels.
pub(crate) async fn view(state: &AppState, note: Note) -> Result<NoteView> {
    let labels = state.store.list_labels(note.user_id).await?;
    Ok(note.into_view(&labels))
}

async fn readable_note(state: &AppState, auth: &AuthUser, id: Uuid) -> Result<Note> {
    state
        .store
        .get_note(id)
        .await?
        .filter(|n| n.can_read(auth.user.id, &auth.user.email))
        .ok_or(ApiError::NotFound("Note"))
}

pub(crate) async fn owned_note(state: &AppState, auth: &AuthUser, id: Uuid) -> Result<Note> {
    state
        .store
        .get_note(id)
        .await?
        .filter(|n| n.is_owner(auth.user.id))
        .ok_or(ApiError::NotFound("Note"))
}

async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(page): Query<PageRequest>,
) -> Result<Json<Page<NoteView>>> {
    let notes = state.store.list_notes(auth.user.id, page.normalized()).await?;
    let labels = state.store.list_labels(auth.user.id).await?;
    Ok(Json(notes.map(|note| note.into_view(&labels))))
}

async fn load(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<NoteDocument>> {
    let note = readable_note(&state, &auth, id).await?;
    let record = state
        .store
        .get_note_state(note.state_id)
        .await?
        .ok_or(ApiError::NotFound("Note state"))?;

    Ok(Json(NoteDocument {
        note: view(&state, note).await?,
        state: record.state,
    }))
}

async fn save(
    State(state): State<AppState>,
    auth: AuthUser,
    SaveBody(save): SaveBody,
) -> Result<Json<NoteView>> {
    let tree = EditorState::parse(&save.state)
        .map_err(|e| ApiError::validation(format!("Invalid editor state: {e}")))?;
    let body = tree.excerpt(state.settings.notes.excerpt_limit);
    let image = tree.first_image();

    let note = match save.note_id {
        None => {
            let note = state
                .store
                .create_note(NewNote {
                    user_id: auth.user.id,
                    state: save.state,
                    body,
                    image,
                })
                .await?;
            tracing::info!("Created note {} for {}", note.id, auth.user.id);
            note
        }
        Some(note_id) => {
            let existing = readable_note(&state, &auth, note_id).await?;
            if !existing.can_edit(auth.user.id, &auth.user.email) {
                return Err(ApiError::AccessDenied);
            }
            state
                .store
                .save_note(NoteUpdate {
                    note_id,
                    state_id: save.state_id.unwrap_or(existing.state_id),
                    state: save.state,
                    body,
                    image,
                    expected_version: save.expected_version,
                })
                .await?
        }
    };

    Ok(Json(view(&state, note).await?))
}

async fn update_settings(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    JsonBody(settings): JsonBody<NoteSettings>,
) -> Result<Json<NoteView>> {
    owned_note(&state, &auth, id).await?;
    let note = state.store.update_note_settings(id, settings).await?;
    Ok(Json(view(&state, note).await?))
}

async fn remove(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Message>> {
    owned_note(&state, &auth, id).await?;
    state.store.delete_note(id).await?;
    tracing::info!("Deleted note {}", id);
    Ok(Json(Message::new("Note deleted")))
}
