//! # Google OAuth 2.0
//!
//! Authorization Code flow with PKCE.
//!
//! 1. [`GoogleOAuth::authorize_url`] builds the consent URL (`openid`, `email`,
//!    `profile` scopes) and stores the CSRF state with its PKCE verifier for
//!    ten minutes.
//! 2. [`GoogleOAuth::exchange_code`] consumes the stored state (single use,
//!    rejected once expired), exchanges the code and fetches the userinfo
//!    profile. Linking the profile to a user is left to the caller.

use std::sync::Arc;

use chrono::{Duration, Utc};
use oauth2::basic::BasicClient;
use oauth2::{
    AuthorizationCode, CsrfToken, EndpointNotSet, EndpointSet, PkceCodeChallenge,
    PkceCodeVerifier, Scope, TokenResponse,
};
use serde::Deserialize;
use store::{GoogleProfile, OAuthState, Store};

use super::config::OAuthConfig;
use crate::error::ApiError;

const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";
const STATE_TTL_MINUTES: i64 = 10;

/// Google user info from API.
#[derive(Debug, Deserialize)]
struct GoogleUser {
    id: String,
    email: String,
    name: Option<String>,
    picture: Option<String>,
    #[serde(default)]
    verified_email: bool,
}

impl From<GoogleUser> for GoogleProfile {
    fn from(user: GoogleUser) -> Self {
        GoogleProfile {
            google_id: user.id,
            email: user.email,
            name: user.name,
            avatar_url: user.picture,
            verified_email: user.verified_email,
        }
    }
}

/// OAuth client type with auth URL and token URL set.
type ConfiguredClient = oauth2::Client<
    oauth2::basic::BasicErrorResponse,
    oauth2::basic::BasicTokenResponse,
    oauth2::basic::BasicTokenIntrospectionResponse,
    oauth2::StandardRevocableToken,
    oauth2::basic::BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;

/// Google OAuth handler.
pub struct GoogleOAuth {
    config: OAuthConfig,
    http: reqwest::Client,
}

impl GoogleOAuth {
    pub fn new(config: OAuthConfig) -> Result<Self, ApiError> {
        // The token endpoint must not be followed through redirects.
        let http = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(ApiError::internal)?;
        Ok(Self { config, http })
    }

    fn create_client(&self) -> ConfiguredClient {
        BasicClient::new(self.config.client_id.clone())
            .set_client_secret(self.config.client_secret.clone())
            .set_auth_uri(self.config.auth_url.clone())
            .set_token_uri(self.config.token_url.clone())
            .set_redirect_uri(self.config.redirect_url.clone())
    }

    /// Build the consent URL and remember its state.
    pub async fn authorize_url(&self, store: &Arc<dyn Store>) -> Result<String, ApiError> {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let (auth_url, csrf_state) = self
            .create_client()
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new("openid".to_string()))
            .add_scope(Scope::new("email".to_string()))
            .add_scope(Scope::new("profile".to_string()))
            .set_pkce_challenge(pkce_challenge)
            .url();

        store
            .put_oauth_state(OAuthState {
                state: csrf_state.secret().clone(),
                pkce_verifier: pkce_verifier.secret().clone(),
                expires_at: Utc::now() + Duration::minutes(STATE_TTL_MINUTES),
            })
            .await?;

        Ok(auth_url.to_string())
    }

    /// Exchange an authorization code for the user's Google profile.
    pub async fn exchange_code(
        &self,
        store: &Arc<dyn Store>,
        code: &str,
        state: &str,
    ) -> Result<GoogleProfile, ApiError> {
        let pkce_verifier = store
            .take_oauth_state(state, Utc::now())
            .await?
            .ok_or_else(|| ApiError::validation("Invalid or expired OAuth state"))?;

        let token = self
            .create_client()
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier))
            .request_async(&self.http)
            .await
            .map_err(|e| ApiError::Upstream(format!("Token exchange failed: {e}")))?;

        let google_user: GoogleUser = self
            .http
            .get(USERINFO_URL)
            .bearer_auth(token.access_token().secret())
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| ApiError::Upstream(e.to_string()))?
            .json()
            .await
            .map_err(|e| ApiError::Upstream(e.to_string()))?;

        tracing::info!("Google sign-in for {}", google_user.email);
        Ok(google_user.into())
    }
}
