use std::sync::Arc;

use chrono::Utc;
use store::Store;

use crate::auth::{AuthUser, GoogleOAuth, OAuthConfig, TokenIssuer};
use crate::error::{ApiError, Result};
use crate::settings::Settings;

/// Shared by every handler. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub tokens: TokenIssuer,
    pub settings: Arc<Settings>,
    /// `None` when Google sign-in is not configured.
    pub google: Option<Arc<GoogleOAuth>>,
}

impl AppState {
    pub fn new(settings: Settings, store: Arc<dyn Store>) -> Result<Self> {
        let tokens = TokenIssuer::new(&settings.auth.secret, settings.auth.token_ttl_hours);
        let google = match OAuthConfig::google(&settings.google)? {
            Some(config) => Some(Arc::new(GoogleOAuth::new(config)?)),
            None => {
                tracing::info!("Google sign-in disabled: no client credentials");
                None
            }
        };

        Ok(Self {
            store,
            tokens,
            settings: Arc::new(settings),
            google,
        })
    }

    /// Resolve a full access token to its user.
    pub async fn authenticate(&self, token: &str) -> Result<AuthUser> {
        let claims = self.tokens.verify(token)?;
        let user = self
            .store
            .get_user(claims.sub.id)
            .await?
            .ok_or_else(|| {
                tracing::debug!("Token for unknown user {}", claims.sub.id);
                ApiError::AccessDenied
            })?;

        if let Some(sid) = claims.sid {
            if let Err(e) = self.store.touch_session(sid, Utc::now()).await {
                tracing::warn!("Failed to update session {}: {}", sid, e);
            }
        }
        Ok(AuthUser { user, claims })
    }

    pub fn google(&self) -> Result<&GoogleOAuth> {
        self.google
            .as_deref()
            .ok_or_else(|| ApiError::Unavailable("Google sign-in is not configured".into()))
    }
}
