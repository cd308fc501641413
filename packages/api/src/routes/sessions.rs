use axum::extract::State;
use axum::routing::{delete, get};
use axum::{Json, Router};
use store::wire::SessionView;
use uuid::Uuid;

use super::Path;
use crate::auth::AuthUser;
use crate::error::{ApiError, Message, Result};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sessions", get(list))
        .route("/sessions/{id}", delete(remove))
}

async fn list(State(state): State<AppState>, auth: AuthUser) -> Result<Json<Vec<SessionView>>> {
    let sessions = state.store.list_sessions(auth.user.id).await?;
    Ok(Json(
        sessions
            .into_iter()
            .map(|session| SessionView {
                current: auth.claims.sid == Some(session.id),
                session,
            })
            .collect(),
    ))
}

// Removing a session is bookkeeping only: tokens stay valid until they expire.
async fn remove(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Message>> {
    state
        .store
        .get_session(id)
        .await?
        .filter(|s| s.user_id == auth.user.id)
        .ok_or(ApiError::NotFound("Session"))?;
    state.store.delete_session(id).await?;
    Ok(Json(Message::new("Session removed")))
}
