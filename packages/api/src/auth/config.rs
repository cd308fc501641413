//! OAuth provider configuration built from [`Settings`](crate::settings::Settings).

use oauth2::{AuthUrl, ClientId, ClientSecret, RedirectUrl, TokenUrl};

use crate::error::ApiError;
use crate::settings::Google;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// OAuth provider configuration.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: ClientId,
    pub client_secret: ClientSecret,
    pub auth_url: AuthUrl,
    pub token_url: TokenUrl,
    pub redirect_url: RedirectUrl,
}

impl OAuthConfig {
    /// Google endpoints with the configured client credentials.
    ///
    /// Returns `None` when no client id/secret is configured.
    pub fn google(settings: &Google) -> Result<Option<Self>, ApiError> {
        if !settings.is_configured() {
            return Ok(None);
        }

        Ok(Some(Self {
            client_id: ClientId::new(settings.client_id.clone()),
            client_secret: ClientSecret::new(settings.client_secret.clone()),
            auth_url: AuthUrl::new(GOOGLE_AUTH_URL.to_string()).map_err(ApiError::internal)?,
            token_url: TokenUrl::new(GOOGLE_TOKEN_URL.to_string()).map_err(ApiError::internal)?,
            redirect_url: RedirectUrl::new(settings.redirect_url.clone())
                .map_err(|e| ApiError::validation(format!("Invalid Google redirect URL: {e}")))?,
        }))
    }
}
