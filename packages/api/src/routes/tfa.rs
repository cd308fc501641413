//! Two-factor setup and the second step of sign-in.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use chrono::{Duration, Utc};
use store::wire::{AuthResponse, TfaCode, TfaSetup, TfaVerify};
use store::{TfaRecord, UserInfo};
use uuid::Uuid;

use super::users::complete_sign_in;
use super::JsonBody;
use crate::auth::{tfa, AuthUser};
use crate::error::{ApiError, Result};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tfa/setup", post(setup))
        .route("/tfa/enable", post(enable))
        .route("/tfa/disable", post(disable))
        .route("/tfa/verify", post(verify))
}

/// Wrong codes allowed before verification is refused for a while.
const MAX_ATTEMPTS: i32 = 5;
const LOCKOUT_MINUTES: i64 = 5;

fn invalid_code() -> ApiError {
    ApiError::validation("Invalid authentication code")
}

/// Match `code` against the record, counting misses toward a lockout.
async fn check_code(state: &AppState, record: &TfaRecord, code: &str) -> Result<i64> {
    let now = Utc::now();
    if record.is_locked(now) {
        return Err(ApiError::validation(
            "Too many invalid codes, try again later",
        ));
    }
    match tfa::matching_step(&record.secret, code, now)? {
        Some(step) => Ok(step),
        None => {
            state
                .store
                .record_tfa_failure(
                    record.user_id,
                    MAX_ATTEMPTS,
                    now + Duration::minutes(LOCKOUT_MINUTES),
                )
                .await?;
            Err(invalid_code())
        }
    }
}

/// Like [`check_code`], and the code can not be used again.
async fn spend_code(state: &AppState, record: &TfaRecord, code: &str) -> Result<()> {
    let step = check_code(state, record, code).await?;
    if !state.store.accept_tfa_step(record.user_id, step).await? {
        return Err(invalid_code());
    }
    Ok(())
}

async fn setup(State(state): State<AppState>, auth: AuthUser) -> Result<Json<TfaSetup>> {
    if auth.user.tfa_enabled {
        return Err(ApiError::validation(
            "Two-factor authentication is already enabled",
        ));
    }

    let secret = tfa::generate_secret();
    state
        .store
        .put_tfa(TfaRecord::new(auth.user.id, secret.clone(), Utc::now()))
        .await?;

    let otpauth_url = tfa::otpauth_url(&secret, &auth.user.email)?;
    Ok(Json(TfaSetup {
        secret,
        otpauth_url,
    }))
}

async fn enable(
    State(state): State<AppState>,
    auth: AuthUser,
    JsonBody(body): JsonBody<TfaCode>,
) -> Result<Json<UserInfo>> {
    let record = state
        .store
        .get_tfa(auth.user.id)
        .await?
        .ok_or_else(|| ApiError::validation("Two-factor setup has not been started"))?;
    let step = check_code(&state, &record, &body.code).await?;

    state.store.enable_tfa(auth.user.id, step).await?;
    tracing::info!("Two-factor enabled for {}", auth.user.id);

    current_info(&state, auth.user.id).await
}

async fn disable(
    State(state): State<AppState>,
    auth: AuthUser,
    JsonBody(body): JsonBody<TfaCode>,
) -> Result<Json<UserInfo>> {
    let record = state
        .store
        .get_tfa(auth.user.id)
        .await?
        .filter(|r| r.enabled)
        .ok_or_else(|| ApiError::validation("Two-factor authentication is not enabled"))?;
    spend_code(&state, &record, &body.code).await?;

    state.store.disable_tfa(auth.user.id).await?;
    tracing::info!("Two-factor disabled for {}", auth.user.id);

    current_info(&state, auth.user.id).await
}

async fn verify(
    State(state): State<AppState>,
    headers: HeaderMap,
    JsonBody(body): JsonBody<TfaVerify>,
) -> Result<Json<AuthResponse>> {
    let claims = state.tokens.verify_pending(&body.token)?;
    let user = state
        .store
        .get_user(claims.sub.id)
        .await?
        .ok_or(ApiError::AccessDenied)?;
    let record = state
        .store
        .get_tfa(user.id)
        .await?
        .filter(|r| r.enabled)
        .ok_or(ApiError::AccessDenied)?;
    spend_code(&state, &record, &body.code).await?;

    Ok(Json(complete_sign_in(&state, &user, &headers).await?))
}

async fn current_info(state: &AppState, user_id: Uuid) -> Result<Json<UserInfo>> {
    let user = state
        .store
        .get_user(user_id)
        .await?
        .ok_or(ApiError::NotFound("User"))?;
    Ok(Json(user.to_info()))
}
