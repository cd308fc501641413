//! Activities. These routes carry the access token as a path segment.

use axum::extract::State;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use store::wire::ActivityUpdate;
use store::{Activity, ActivityPatch, NewActivity, Page, PageRequest};
use uuid::Uuid;

use super::{JsonBody, Path, Query};
use crate::auth::AuthUser;
use crate::error::{ApiError, Message, Result};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/activities/{user_id}/{token}", get(list))
        .route("/new-ac/{token}", post(create))
        .route("/up-ac/{token}", put(update))
        .route("/de-ac/{id}/{token}", delete(remove))
}

async fn owned_activity(state: &AppState, auth: &AuthUser, id: Uuid) -> Result<Activity> {
    state
        .store
        .get_activity(id)
        .await?
        .filter(|a| a.user_id == auth.user.id)
        .ok_or(ApiError::NotFound("Activity"))
}

async fn list(
    State(state): State<AppState>,
    Path((user_id, token)): Path<(Uuid, String)>,
    Query(page): Query<PageRequest>,
) -> Result<Json<Page<Activity>>> {
    let auth = state.authenticate(&token).await?;
    if auth.user.id != user_id {
        tracing::debug!("User {} asked for activities of {}", auth.user.id, user_id);
        return Err(ApiError::AccessDenied);
    }
    let page = state
        .store
        .list_activities(user_id, page.normalized())
        .await?;
    Ok(Json(page))
}

async fn create(
    State(state): State<AppState>,
    Path(token): Path<String>,
    JsonBody(mut activity): JsonBody<NewActivity>,
) -> Result<Json<Activity>> {
    let auth = state.authenticate(&token).await?;
    if activity.title.trim().is_empty() {
        return Err(ApiError::validation("Title is required"));
    }
    activity.user_id = auth.user.id;
    Ok(Json(state.store.create_activity(activity).await?))
}

async fn update(
    State(state): State<AppState>,
    Path(token): Path<String>,
    JsonBody(update): JsonBody<ActivityUpdate>,
) -> Result<Json<Activity>> {
    let auth = state.authenticate(&token).await?;
    owned_activity(&state, &auth, update.id).await?;
    if update.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(ApiError::validation("Title is required"));
    }

    let patch = ActivityPatch {
        title: update.title,
        body: update.body,
        bookmark: update.bookmark,
        bookmark_color: update.bookmark_color,
    };
    Ok(Json(state.store.update_activity(update.id, patch).await?))
}

async fn remove(
    State(state): State<AppState>,
    Path((id, token)): Path<(Uuid, String)>,
) -> Result<Json<Message>> {
    let auth = state.authenticate(&token).await?;
    owned_activity(&state, &auth, id).await?;
    state.store.delete_activity(id).await?;
    Ok(Json(Message::new("Activity deleted")))
}
