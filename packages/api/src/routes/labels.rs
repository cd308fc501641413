//! Labels and their attachment to notes. Only the note owner can change a
//! note's labels, and only with labels they own.

use axum::extract::State;
use axum::routing::{delete, get, patch, post, put};
use axum::{Json, Router};
use store::{Label, LabelPatch, NewLabel, NoteView};
use uuid::Uuid;

use super::notes::{owned_note, view};
use super::{JsonBody, Path};
use crate::auth::AuthUser;
use crate::error::{ApiError, Message, Result};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/labels", get(list))
        .route("/label", post(create))
        .route("/label/{id}", patch(update).delete(remove))
        .route("/note/label/{label_id}/{note_id}", put(attach))
        .route("/note/delete/label/{label_id}/{note_id}", delete(detach))
        .route("/note/delete-all/label/{note_id}", delete(detach_all))
}

async fn owned_label(state: &AppState, auth: &AuthUser, id: Uuid) -> Result<Label> {
    state
        .store
        .get_label(id)
        .await?
        .filter(|l| l.user_id == auth.user.id)
        .ok_or(ApiError::NotFound("Label"))
}

async fn list(State(state): State<AppState>, auth: AuthUser) -> Result<Json<Vec<Label>>> {
    Ok(Json(state.store.list_labels(auth.user.id).await?))
}

async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    JsonBody(mut label): JsonBody<NewLabel>,
) -> Result<Json<Label>> {
    label.name = label.name.trim().to_string();
    if label.name.is_empty() {
        return Err(ApiError::validation("Label name is required"));
    }
    label.user_id = auth.user.id;
    Ok(Json(state.store.create_label(label).await?))
}

async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    JsonBody(patch): JsonBody<LabelPatch>,
) -> Result<Json<Label>> {
    owned_label(&state, &auth, id).await?;
    if patch.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(ApiError::validation("Label name is required"));
    }
    Ok(Json(state.store.update_label(id, patch).await?))
}

// Notes keep the id; it is dropped when they are next resolved.
async fn remove(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Message>> {
    owned_label(&state, &auth, id).await?;
    state.store.delete_label(id).await?;
    Ok(Json(Message::new("Label deleted")))
}

async fn attach(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((label_id, note_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<NoteView>> {
    owned_note(&state, &auth, note_id).await?;
    owned_label(&state, &auth, label_id).await?;
    let note = state.store.attach_label(note_id, label_id).await?;
    Ok(Json(view(&state, note).await?))
}

async fn detach(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((label_id, note_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<NoteView>> {
    owned_note(&state, &auth, note_id).await?;
    let note = state.store.detach_label(note_id, label_id).await?;
    Ok(Json(view(&state, note).await?))
}

async fn detach_all(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(note_id): Path<Uuid>,
) -> Result<Json<NoteView>> {
    owned_note(&state, &auth, note_id).await?;
    let note = state.store.detach_all_labels(note_id).await?;
    Ok(Json(view(&state, note).await?))
}
