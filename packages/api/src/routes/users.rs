//! Sign-up, sign-in and the current user's profile.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use store::wire::{AuthResponse, ProfileUpdate, SignIn, SignUp};
use store::{NewUser, User, UserInfo, UserSettings};

use super::JsonBody;
use crate::auth::password::{hash_password, verify_password};
use crate::auth::AuthUser;
use crate::device::{client_ip, Device};
use crate::error::{ApiError, Message, Result};
use crate::state::AppState;

const MIN_PASSWORD_LEN: usize = 6;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/sign-up", post(sign_up))
        .route("/sign-in", post(sign_in))
        .route("/user", get(current_user))
        .route("/user/settings", patch(update_settings))
        .route("/user/profile", patch(update_profile))
}

async fn health() -> Json<Message> {
    Json(Message::new("OK"))
}

fn looks_like_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.contains(char::is_whitespace)
}

fn validate_sign_up(form: &SignUp) -> Result<()> {
    if form.name.trim().is_empty() {
        return Err(ApiError::validation("Name is required"));
    }
    if !looks_like_email(form.login.trim()) {
        return Err(ApiError::validation("Please enter a valid email"));
    }
    if form.password.is_empty() {
        return Err(ApiError::validation("Password is required"));
    }
    if form.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

async fn sign_up(
    State(state): State<AppState>,
    JsonBody(form): JsonBody<SignUp>,
) -> Result<Json<Message>> {
    validate_sign_up(&form)?;

    let email = form.login.trim().to_lowercase();
    if state.store.find_user_by_email(&email).await?.is_some() {
        return Err(ApiError::UserExists);
    }

    let user = state
        .store
        .create_user(NewUser {
            email,
            name: form.name.trim().to_string(),
            password_hash: Some(hash_password(&form.password)?),
        })
        .await?;

    tracing::info!("Created user {}", user.id);
    Ok(Json(Message::new("User created successfully!")))
}

async fn sign_in(
    State(state): State<AppState>,
    headers: HeaderMap,
    JsonBody(form): JsonBody<SignIn>,
) -> Result<Json<AuthResponse>> {
    let email = form.login.trim().to_lowercase();

    let Some(user) = state.store.find_user_by_email(&email).await? else {
        return Err(ApiError::InvalidCredentials);
    };
    let Some(ref hash) = user.password_hash else {
        return Err(ApiError::InvalidCredentials);
    };
    if !verify_password(&form.password, hash)? {
        return Err(ApiError::InvalidCredentials);
    }

    if user.tfa_enabled {
        return Ok(Json(AuthResponse {
            token: state.tokens.issue_pending(&user)?,
            user: user.to_info(),
            tfa_required: true,
        }));
    }

    Ok(Json(complete_sign_in(&state, &user, &headers).await?))
}

/// Record a session for this device and issue a full access token.
pub(crate) async fn complete_sign_in(
    state: &AppState,
    user: &User,
    headers: &HeaderMap,
) -> Result<AuthResponse> {
    let session = state
        .store
        .create_session(Device::from_headers(headers).into_session(user.id, client_ip(headers)))
        .await?;

    tracing::info!("User {} signed in ({} on {})", user.id, session.browser, session.os);
    Ok(AuthResponse {
        token: state.tokens.issue(user, Some(session.id))?,
        user: user.to_info(),
        tfa_required: false,
    })
}

async fn current_user(auth: AuthUser) -> Json<UserInfo> {
    Json(auth.user.to_info())
}

async fn update_settings(
    State(state): State<AppState>,
    auth: AuthUser,
    JsonBody(settings): JsonBody<UserSettings>,
) -> Result<Json<UserInfo>> {
    if settings.language.trim().is_empty() {
        return Err(ApiError::validation("Language is required"));
    }
    let user = state
        .store
        .update_user_settings(auth.user.id, settings)
        .await?;
    Ok(Json(user.to_info()))
}

async fn update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    JsonBody(update): JsonBody<ProfileUpdate>,
) -> Result<Json<UserInfo>> {
    let name = update.name.trim();
    if name.is_empty() {
        return Err(ApiError::validation("Name is required"));
    }
    let user = state.store.update_user_name(auth.user.id, name).await?;
    Ok(Json(user.to_info()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(name: &str, login: &str, password: &str) -> SignUp {
        SignUp {
            name: name.into(),
            login: login.into(),
            password: password.into(),
        }
    }

    #[test]
    fn test_email_shape() {
        assert!(looks_like_email("ada@example.com"));
        assert!(!looks_like_email("ada"));
        assert!(!looks_like_email("@example.com"));
        assert!(!looks_like_email("ada@localhost"));
        assert!(!looks_like_email("ada@@example.com"));
        assert!(!looks_like_email("a da@example.com"));
    }

    #[test]
    fn test_validate_sign_up() {
        assert!(validate_sign_up(&form("Ada", "ada@example.com", "secret")).is_ok());

        let cases = [
            (form("", "ada@example.com", "secret"), "Name is required"),
            (form("Ada", "nope", "secret"), "Please enter a valid email"),
            (form("Ada", "ada@example.com", ""), "Password is required"),
            (
                form("Ada", "ada@example.com", "12345"),
                "Password must be at least 6 characters",
            ),
        ];
        for (form, message) in cases {
            assert_eq!(validate_sign_up(&form).unwrap_err().to_string(), message);
        }
    }
}
