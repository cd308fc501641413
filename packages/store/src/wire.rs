//! Request and response bodies exchanged between the API and its clients.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Session, UserInfo};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignUp {
    #[serde(default)]
    pub name: String,
    /// Email address.
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignIn {
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub password: String,
}

/// Result of a sign-in. When `tfa_required` is set, `token` is a pending
/// token that must be exchanged with a one-time code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserInfo,
    pub tfa_required: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfaCode {
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfaVerify {
    pub token: String,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TfaSetup {
    pub secret: String,
    pub otpauth_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub name: String,
}

/// Body of `PATCH /edit`. Without `note_id` the save creates the note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveNote {
    #[serde(default)]
    pub note_id: Option<Uuid>,
    #[serde(default)]
    pub state_id: Option<Uuid>,
    /// Serialized editor tree.
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_version: Option<i64>,
}

/// Body of `PUT /up-ac/{token}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityUpdate {
    pub id: Uuid,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub bookmark: Option<bool>,
    #[serde(default)]
    pub bookmark_color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionView {
    #[serde(flatten)]
    pub session: Session,
    /// The session that issued the calling token.
    pub current: bool,
}
