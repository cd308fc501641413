//! Google sign-in. The callback hands the token to the frontend in the URL
//! fragment, which browsers never send to servers.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Redirect;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use store::StoreError;

use super::users::complete_sign_in;
use super::Query;
use crate::error::{ApiError, Result};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/google", get(start))
        .route("/auth/google/callback", get(callback))
}

#[derive(Debug, Deserialize)]
struct Callback {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

async fn start(State(state): State<AppState>) -> Result<Redirect> {
    let url = state.google()?.authorize_url(&state.store).await?;
    Ok(Redirect::to(&url))
}

async fn callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<Callback>,
) -> Result<Redirect> {
    let google = state.google()?;
    if let Some(error) = params.error {
        tracing::info!("Google sign-in cancelled: {}", error);
        return Ok(Redirect::to(&sign_in_url(&state, "error", &error)));
    }
    let (Some(code), Some(csrf)) = (params.code, params.state) else {
        return Err(ApiError::validation("Missing code or state"));
    };

    let profile = google.exchange_code(&state.store, &code, &csrf).await?;
    let user = match state.store.upsert_google_user(profile).await {
        Ok(user) => user,
        Err(StoreError::Invalid(message)) => {
            tracing::info!("Google sign-in refused: {}", message);
            return Ok(Redirect::to(&sign_in_url(&state, "error", "unverified_email")));
        }
        Err(e) => return Err(e.into()),
    };

    let target = if user.tfa_enabled {
        sign_in_url(&state, "tfa", &state.tokens.issue_pending(&user)?)
    } else {
        let response = complete_sign_in(&state, &user, &headers).await?;
        sign_in_url(&state, "token", &response.token)
    };
    Ok(Redirect::to(&target))
}

fn sign_in_url(state: &AppState, key: &str, value: &str) -> String {
    let value: String = value
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .collect();
    format!(
        "{}/sign-in#{key}={value}",
        state.settings.frontend.url.trim_end_matches('/')
    )
}
