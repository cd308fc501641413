//! # Access tokens (HS256 JWT)
//!
//! Payload: `{ iss, sub: { _id, name }, exp, iat, sid? }`.
//!
//! Two issuers are used. [`ISSUER`] marks a completed sign-in and is the only
//! one protected routes accept. [`TFA_ISSUER`] marks a password check that
//! still waits for a one-time code; such tokens live five minutes and can
//! only be exchanged at `/tfa/verify`.
//!
//! There is no refresh or revocation: a token is valid until `exp`.
//!
//! `sub` is an object rather than the registered string claim, so tokens are
//! checked here (signature, then `iss` and `exp` with no leeway) instead of
//! through [`jsonwebtoken::decode`].

use chrono::{Duration, Utc};
use data_encoding::BASE64URL_NOPAD;
use jsonwebtoken::{crypto, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use store::User;
use thiserror::Error;
use uuid::Uuid;

use crate::error::ApiError;

pub const ISSUER: &str = "login-form";
pub const TFA_ISSUER: &str = "login-form/tfa";

const PENDING_TTL_MINUTES: i64 = 5;

#[derive(Error, Debug)]
enum TokenError {
    #[error("malformed token")]
    Malformed,

    #[error("unexpected algorithm {0:?}")]
    Algorithm(Algorithm),

    #[error("bad signature")]
    Signature,

    #[error("wrong issuer {0}")]
    Issuer(String),

    #[error("expired")]
    Expired,

    #[error(transparent)]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("payload encoding: {0}")]
    Encoding(#[from] data_encoding::DecodeError),

    #[error("payload: {0}")]
    Payload(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,
    pub sub: Subject,
    pub exp: i64,
    pub iat: i64,
    /// Session record created at sign-in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<Uuid>,
}

/// Signs and verifies access tokens with a shared secret.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(ttl_hours),
        }
    }

    /// Token for a completed sign-in.
    pub fn issue(&self, user: &User, session_id: Option<Uuid>) -> Result<String, ApiError> {
        self.sign(ISSUER, user, session_id, self.ttl)
    }

    /// Token that only proves the password check passed.
    pub fn issue_pending(&self, user: &User) -> Result<String, ApiError> {
        self.sign(TFA_ISSUER, user, None, Duration::minutes(PENDING_TTL_MINUTES))
    }

    fn sign(
        &self,
        iss: &str,
        user: &User,
        sid: Option<Uuid>,
        ttl: Duration,
    ) -> Result<String, ApiError> {
        let now = Utc::now();
        let claims = Claims {
            iss: iss.to_string(),
            sub: Subject {
                id: user.id,
                name: user.name.clone(),
            },
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            sid,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(ApiError::internal)
    }

    /// Verify a token from a completed sign-in.
    pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        self.decode(token, ISSUER)
    }

    /// Verify a token waiting for its second factor.
    pub fn verify_pending(&self, token: &str) -> Result<Claims, ApiError> {
        self.decode(token, TFA_ISSUER)
    }

    fn decode(&self, token: &str, iss: &str) -> Result<Claims, ApiError> {
        self.check(token, iss).map_err(|e| {
            tracing::debug!("Rejected token: {}", e);
            ApiError::AccessDenied
        })
    }

    fn check(&self, token: &str, iss: &str) -> Result<Claims, TokenError> {
        let (message, signature) = token.rsplit_once('.').ok_or(TokenError::Malformed)?;
        let (_, payload) = message.split_once('.').ok_or(TokenError::Malformed)?;

        let header = decode_header(token)?;
        if header.alg != Algorithm::HS256 {
            return Err(TokenError::Algorithm(header.alg));
        }
        if !crypto::verify(signature, message.as_bytes(), &self.decoding, Algorithm::HS256)? {
            return Err(TokenError::Signature);
        }

        let claims: Claims = serde_json::from_slice(&BASE64URL_NOPAD.decode(payload.as_bytes())?)?;
        if claims.iss != iss {
            return Err(TokenError::Issuer(claims.iss));
        }
        if claims.exp < Utc::now().timestamp() {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::UserSettings;

    fn user() -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            email: "ada@example.com".into(),
            name: "Ada".into(),
            password_hash: None,
            google_id: None,
            avatar_url: None,
            tfa_enabled: false,
            settings: UserSettings::default(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_issue_and_verify() {
        let issuer = TokenIssuer::new("secret", 24);
        let user = user();
        let sid = Uuid::new_v4();

        let claims = issuer.verify(&issuer.issue(&user, Some(sid)).unwrap()).unwrap();
        assert_eq!(claims.iss, ISSUER);
        assert_eq!(claims.sub.id, user.id);
        assert_eq!(claims.sub.name, "Ada");
        assert_eq!(claims.sid, Some(sid));
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_subject_serializes_with_underscore_id() {
        let subject = Subject {
            id: Uuid::nil(),
            name: "Ada".into(),
        };
        let json = serde_json::to_value(&subject).unwrap();
        assert_eq!(json["_id"], Uuid::nil().to_string());
    }

    #[test]
    fn test_pending_and_full_tokens_are_not_interchangeable() {
        let issuer = TokenIssuer::new("secret", 24);
        let user = user();

        let pending = issuer.issue_pending(&user).unwrap();
        assert!(matches!(issuer.verify(&pending), Err(ApiError::AccessDenied)));
        assert_eq!(issuer.verify_pending(&pending).unwrap().sub.id, user.id);

        let full = issuer.issue(&user, None).unwrap();
        assert!(issuer.verify_pending(&full).is_err());
    }

    #[test]
    fn test_rejects_bad_tokens() {
        let issuer = TokenIssuer::new("secret", 24);
        let other = TokenIssuer::new("other-secret", 24);
        let expired = TokenIssuer::new("secret", -1);
        let user = user();

        assert!(issuer.verify("garbage").is_err());
        assert!(issuer.verify(&other.issue(&user, None).unwrap()).is_err());
        assert!(issuer.verify(&expired.issue(&user, None).unwrap()).is_err());
        assert!(issuer.verify("a.b").is_err());
        assert!(issuer.verify("").is_err());
    }

    #[test]
    fn test_payload_carries_subject_object() {
        let issuer = TokenIssuer::new("secret", 24);
        let user = user();
        let token = issuer.issue(&user, None).unwrap();

        let payload = token.split('.').nth(1).unwrap();
        let json: serde_json::Value =
            serde_json::from_slice(&BASE64URL_NOPAD.decode(payload.as_bytes()).unwrap()).unwrap();
        assert_eq!(json["iss"], ISSUER);
        assert_eq!(json["sub"]["_id"], user.id.to_string());
        assert_eq!(json["sub"]["name"], "Ada");
    }

    #[test]
    fn test_rejects_tampered_payload() {
        let issuer = TokenIssuer::new("secret", 24);
        let user = user();
        let token = issuer.issue(&user, None).unwrap();
        let parts: Vec<&str> = token.split('.').collect();

        let mut claims = issuer.verify(&token).unwrap();
        claims.sub.name = "Mallory".into();
        let forged = BASE64URL_NOPAD.encode(&serde_json::to_vec(&claims).unwrap());
        let tampered = format!("{}.{}.{}", parts[0], forged, parts[2]);
        assert!(matches!(issuer.verify(&tampered), Err(ApiError::AccessDenied)));
    }
}
