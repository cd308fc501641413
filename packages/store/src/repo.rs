//! # Store: persistence interface for every API resource
//!
//! [`Store`] is the single seam between the HTTP layer and persistence. The
//! server holds it as `Arc<dyn Store>`, so the same handlers run against
//! PostgreSQL ([`crate::PgStore`]) in production and against
//! [`crate::MemoryStore`] in tests and local development.
//!
//! Authorization is not the store's concern: methods take record ids and
//! trust the caller to have checked ownership. The exceptions are the
//! uniqueness rules (email, Google id) and the optimistic version check on
//! [`Store::save_note`], which backends enforce atomically.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

#[async_trait]
pub trait Store: Send + Sync {
    // Users

    /// Insert a user. Fails with `AlreadyExists` if the email is taken.
    async fn create_user(&self, user: NewUser) -> Result<User>;
    async fn get_user(&self, id: Uuid) -> Result<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;
    /// Find the user linked to a Google account, else link the account with
    /// the same email, else create a password-less user.
    async fn upsert_google_user(&self, profile: GoogleProfile) -> Result<User>;
    async fn update_user_settings(&self, id: Uuid, settings: UserSettings) -> Result<User>;
    async fn update_user_name(&self, id: Uuid, name: &str) -> Result<User>;

    // Two-factor records. The user's `tfa_enabled` flag only changes
    // together with the record.

    /// Store an unconfirmed record, replacing any previous one.
    async fn put_tfa(&self, record: TfaRecord) -> Result<()>;
    async fn get_tfa(&self, user_id: Uuid) -> Result<Option<TfaRecord>>;
    /// Confirm the record with the code accepted at `step` and set the
    /// user's flag.
    async fn enable_tfa(&self, user_id: Uuid, step: i64) -> Result<()>;
    /// Remove the record and clear the user's flag.
    async fn disable_tfa(&self, user_id: Uuid) -> Result<()>;
    /// Spend the code at `step`. Returns false when that step or a later one
    /// was already used. Resets the failure count on success.
    async fn accept_tfa_step(&self, user_id: Uuid, step: i64) -> Result<bool>;
    /// Count a wrong code. Reaching `max_attempts` locks the record until
    /// `lock_until` and starts counting again.
    async fn record_tfa_failure(
        &self,
        user_id: Uuid,
        max_attempts: i32,
        lock_until: DateTime<Utc>,
    ) -> Result<()>;

    // OAuth

    async fn put_oauth_state(&self, state: OAuthState) -> Result<()>;
    /// Remove a stored state and return its PKCE verifier if it has not
    /// expired at `now`.
    async fn take_oauth_state(&self, state: &str, now: DateTime<Utc>) -> Result<Option<String>>;

    // Notes

    /// Notes owned by a user, pinned first, then most recently updated.
    async fn list_notes(&self, user_id: Uuid, page: PageRequest) -> Result<Page<Note>>;
    async fn get_note(&self, id: Uuid) -> Result<Option<Note>>;
    async fn get_note_state(&self, state_id: Uuid) -> Result<Option<NoteState>>;
    /// First save: creates the note and its state record.
    async fn create_note(&self, note: NewNote) -> Result<Note>;
    /// Later saves. The state record must belong to the note, and when
    /// `expected_version` is set it must match the stored version.
    async fn save_note(&self, update: NoteUpdate) -> Result<Note>;
    async fn update_note_settings(&self, id: Uuid, settings: NoteSettings) -> Result<Note>;
    async fn delete_note(&self, id: Uuid) -> Result<bool>;
    async fn attach_label(&self, note_id: Uuid, label_id: Uuid) -> Result<Note>;
    async fn detach_label(&self, note_id: Uuid, label_id: Uuid) -> Result<Note>;
    async fn detach_all_labels(&self, note_id: Uuid) -> Result<Note>;

    // Labels

    async fn list_labels(&self, user_id: Uuid) -> Result<Vec<Label>>;
    async fn get_label(&self, id: Uuid) -> Result<Option<Label>>;
    async fn create_label(&self, label: NewLabel) -> Result<Label>;
    async fn update_label(&self, id: Uuid, patch: LabelPatch) -> Result<Label>;
    async fn delete_label(&self, id: Uuid) -> Result<bool>;

    // Activities

    /// Activities of a user, newest first.
    async fn list_activities(&self, user_id: Uuid, page: PageRequest) -> Result<Page<Activity>>;
    async fn get_activity(&self, id: Uuid) -> Result<Option<Activity>>;
    async fn create_activity(&self, activity: NewActivity) -> Result<Activity>;
    async fn update_activity(&self, id: Uuid, patch: ActivityPatch) -> Result<Activity>;
    async fn delete_activity(&self, id: Uuid) -> Result<bool>;

    // Sessions

    async fn create_session(&self, session: NewSession) -> Result<Session>;
    /// Sessions of a user, most recently seen first.
    async fn list_sessions(&self, user_id: Uuid) -> Result<Vec<Session>>;
    async fn get_session(&self, id: Uuid) -> Result<Option<Session>>;
    /// Move `last_seen` forward to `now`. Returns false if the session is gone.
    async fn touch_session(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool>;
    async fn delete_session(&self, id: Uuid) -> Result<bool>;
}
