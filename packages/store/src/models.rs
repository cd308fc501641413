//! # Domain models shared by the server and the client
//!
//! Every record the API persists or exchanges lives here. The types are
//! `Serialize + Deserialize` so they cross the HTTP boundary unchanged.
//!
//! | Type | Represents |
//! |------|-----------|
//! | [`User`] | Full account record, including the password hash. Server only in practice. |
//! | [`UserInfo`] | Client-safe projection of a [`User`]. |
//! | [`Note`] / [`NoteState`] | A note and the serialized editor tree it owns. |
//! | [`NoteView`] | A note with its label ids resolved to [`Label`] records. |
//! | [`Label`] | A user-defined tag attachable to many notes. |
//! | [`Activity`] | Todo-like entity, unrelated to notes. |
//! | [`Session`] | Device/browser metadata recorded on sign-in. |
//! | [`TfaRecord`] | TOTP secret and whether it has been confirmed. |
//! | [`OAuthState`] | CSRF state + PKCE verifier for an in-flight OAuth login. |
//! | [`Page`] / [`PageRequest`] | Paginated listing. |

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Full user record.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub password_hash: Option<String>,
    pub google_id: Option<String>,
    pub avatar_url: Option<String>,
    pub tfa_enabled: bool,
    pub settings: UserSettings,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Convert to UserInfo for client consumption.
    pub fn to_info(&self) -> UserInfo {
        UserInfo {
            id: self.id,
            email: self.email.clone(),
            name: self.name.clone(),
            avatar_url: self.avatar_url.clone(),
            tfa_enabled: self.tfa_enabled,
            google: self.google_id.is_some(),
            settings: self.settings.clone(),
        }
    }
}

/// User information safe to send to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub avatar_url: Option<String>,
    pub tfa_enabled: bool,
    pub google: bool,
    pub settings: UserSettings,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

/// Per-user display preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSettings {
    #[serde(default)]
    pub theme: Theme,
    #[serde(default = "default_language")]
    pub language: String,
    /// Show pinned notes in their own folder.
    #[serde(default = "default_pin_folder")]
    pub pin_folder: bool,
}

fn default_language() -> String {
    "en".to_string()
}

fn default_pin_folder() -> bool {
    true
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            language: default_language(),
            pin_folder: default_pin_folder(),
        }
    }
}

/// Fields needed to create a password account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: Option<String>,
}

/// Profile returned by an OAuth provider.
#[derive(Debug, Clone)]
pub struct GoogleProfile {
    pub google_id: String,
    pub email: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    /// Only a verified address may be linked to an existing account.
    pub verified_email: bool,
}

pub const UNVERIFIED_EMAIL: &str = "Google account email is not verified";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    View,
    Edit,
}

/// Grants another user access to a shared note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotePermission {
    pub email: String,
    pub access: Access,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoteSettings {
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub shared: bool,
    #[serde(default)]
    pub permissions: Vec<NotePermission>,
    #[serde(default)]
    pub expanded: bool,
    #[serde(default)]
    pub read_mode: bool,
}

/// A note record. The editor tree itself lives in its [`NoteState`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Plain-text excerpt of the editor state, used as preview.
    pub body: String,
    pub state_id: Uuid,
    /// First image embedded in the note, if any.
    pub image: Option<String>,
    pub labels: Vec<Uuid>,
    pub settings: NoteSettings,
    /// Incremented on every save.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    pub fn is_owner(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }

    /// Owner, or listed in the sharing permissions of a shared note.
    pub fn can_read(&self, user_id: Uuid, email: &str) -> bool {
        self.is_owner(user_id) || self.permission_for(email).is_some()
    }

    pub fn can_edit(&self, user_id: Uuid, email: &str) -> bool {
        self.is_owner(user_id) || self.permission_for(email) == Some(Access::Edit)
    }

    fn permission_for(&self, email: &str) -> Option<Access> {
        if !self.settings.shared {
            return None;
        }
        self.settings
            .permissions
            .iter()
            .find(|p| p.email.eq_ignore_ascii_case(email))
            .map(|p| p.access)
    }

    /// Resolve label ids against the owner's labels, dropping ids that no
    /// longer match a label.
    pub fn into_view(self, labels: &[Label]) -> NoteView {
        let resolved = self
            .labels
            .iter()
            .filter_map(|id| labels.iter().find(|l| l.id == *id).cloned())
            .collect();
        NoteView {
            note: self,
            labels: resolved,
        }
    }
}

/// Serialized editor tree of a note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteState {
    pub id: Uuid,
    pub note_id: Uuid,
    pub state: String,
    pub updated_at: DateTime<Utc>,
}

/// A note together with its resolved labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteView {
    #[serde(flatten)]
    pub note: Note,
    #[serde(rename = "label_records")]
    pub labels: Vec<Label>,
}

/// A note plus its editor state, as returned by a load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteDocument {
    pub note: NoteView,
    pub state: String,
}

/// Fields for the first save of a note.
#[derive(Debug, Clone)]
pub struct NewNote {
    pub user_id: Uuid,
    pub state: String,
    pub body: String,
    pub image: Option<String>,
}

/// Fields for a subsequent save of a note.
#[derive(Debug, Clone)]
pub struct NoteUpdate {
    pub note_id: Uuid,
    pub state_id: Uuid,
    pub state: String,
    pub body: String,
    pub image: Option<String>,
    pub expected_version: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelKind {
    #[default]
    Default,
    Outlined,
}

impl LabelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LabelKind::Default => "default",
            LabelKind::Outlined => "outlined",
        }
    }
}

impl fmt::Display for LabelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LabelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(LabelKind::Default),
            "outlined" => Ok(LabelKind::Outlined),
            other => Err(format!("unknown label kind: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub kind: LabelKind,
    pub color: String,
    pub font_color: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLabel {
    #[serde(skip)]
    pub user_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub kind: LabelKind,
    #[serde(default = "default_label_color")]
    pub color: String,
    #[serde(default = "default_font_color")]
    pub font_color: String,
}

fn default_label_color() -> String {
    "#e0e0e0".to_string()
}

fn default_font_color() -> String {
    "#000000".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabelPatch {
    pub name: Option<String>,
    pub kind: Option<LabelKind>,
    pub color: Option<String>,
    pub font_color: Option<String>,
}

impl LabelPatch {
    pub fn apply(self, label: &mut Label) {
        if let Some(name) = self.name {
            label.name = name;
        }
        if let Some(kind) = self.kind {
            label.kind = kind;
        }
        if let Some(color) = self.color {
            label.color = color;
        }
        if let Some(font_color) = self.font_color {
            label.font_color = font_color;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub body: String,
    pub bookmark: bool,
    pub bookmark_color: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewActivity {
    #[serde(skip)]
    pub user_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub bookmark: bool,
    #[serde(default)]
    pub bookmark_color: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivityPatch {
    pub title: Option<String>,
    pub body: Option<String>,
    pub bookmark: Option<bool>,
    pub bookmark_color: Option<String>,
}

impl ActivityPatch {
    pub fn apply(self, activity: &mut Activity) {
        if let Some(title) = self.title {
            activity.title = title;
        }
        if let Some(body) = self.body {
            activity.body = body;
        }
        if let Some(bookmark) = self.bookmark {
            activity.bookmark = bookmark;
        }
        if let Some(color) = self.bookmark_color {
            activity.bookmark_color = Some(color);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub device: String,
    pub browser: String,
    pub os: String,
    pub ip: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSession {
    pub user_id: Uuid,
    pub device: String,
    pub browser: String,
    pub os: String,
    pub ip: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TfaRecord {
    pub user_id: Uuid,
    /// Base32 TOTP secret.
    pub secret: String,
    pub enabled: bool,
    /// Time step of the last accepted code. Codes at or before it are spent.
    pub last_step: Option<i64>,
    /// Wrong codes since the last accepted one or the last lockout.
    pub failed_attempts: i32,
    pub locked_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TfaRecord {
    /// Unconfirmed record for a freshly generated secret.
    pub fn new(user_id: Uuid, secret: String, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            secret,
            enabled: false,
            last_step: None,
            failed_attempts: 0,
            locked_until: None,
            created_at: now,
        }
    }

    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| until > now)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OAuthState {
    pub state: String,
    pub pkce_verifier: String,
    pub expires_at: DateTime<Utc>,
}

pub const DEFAULT_PAGE_LIMIT: u32 = 20;
pub const MAX_PAGE_LIMIT: u32 = 100;

/// 1-based page request, as sent in `?page=&limit=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PageRequest {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    DEFAULT_PAGE_LIMIT
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
        }
    }
}

impl PageRequest {
    pub fn new(page: u32, limit: u32) -> Self {
        Self { page, limit }.normalized()
    }

    /// Clamp page to at least 1 and limit into `1..=MAX_PAGE_LIMIT`.
    pub fn normalized(self) -> Self {
        Self {
            page: self.page.max(1),
            limit: self.limit.clamp(1, MAX_PAGE_LIMIT),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub docs: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub pages: u32,
}

impl<T> Page<T> {
    pub fn new(docs: Vec<T>, total: u64, request: PageRequest) -> Self {
        let pages = total.div_ceil(u64::from(request.limit)) as u32;
        Self {
            docs,
            total,
            page: request.page,
            limit: request.limit,
            pages,
        }
    }

    /// Slice an already sorted collection.
    pub fn from_sorted(items: Vec<T>, request: PageRequest) -> Self {
        let request = request.normalized();
        let total = items.len() as u64;
        let docs = items
            .into_iter()
            .skip(request.offset() as usize)
            .take(request.limit as usize)
            .collect();
        Self::new(docs, total, request)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            docs: self.docs.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            limit: self.limit,
            pages: self.pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(labels: Vec<Uuid>) -> Note {
        let now = Utc::now();
        Note {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            body: String::new(),
            state_id: Uuid::new_v4(),
            image: None,
            labels,
            settings: NoteSettings::default(),
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    fn label(user_id: Uuid, name: &str) -> Label {
        Label {
            id: Uuid::new_v4(),
            user_id,
            name: name.to_string(),
            kind: LabelKind::Default,
            color: default_label_color(),
            font_color: default_font_color(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_into_view_drops_dangling_labels() {
        let owner = Uuid::new_v4();
        let work = label(owner, "work");
        let home = label(owner, "home");
        let gone = Uuid::new_v4();

        let view = note(vec![home.id, gone, work.id]).into_view(&[work.clone(), home.clone()]);

        assert_eq!(view.labels, vec![home, work]);
        assert_eq!(view.note.labels.len(), 3);
    }

    #[test]
    fn test_shared_note_permissions() {
        let mut n = note(vec![]);
        n.settings.permissions = vec![
            NotePermission {
                email: "viewer@example.com".into(),
                access: Access::View,
            },
            NotePermission {
                email: "editor@example.com".into(),
                access: Access::Edit,
            },
        ];
        let stranger = Uuid::new_v4();

        // Permissions only apply once the note is shared
        assert!(!n.can_read(stranger, "viewer@example.com"));

        n.settings.shared = true;
        assert!(n.can_read(stranger, "Viewer@Example.com"));
        assert!(!n.can_edit(stranger, "viewer@example.com"));
        assert!(n.can_edit(stranger, "editor@example.com"));
        assert!(!n.can_read(stranger, "nobody@example.com"));
        assert!(n.can_edit(n.user_id, "owner@example.com"));
    }

    #[test]
    fn test_page_from_sorted() {
        let page = Page::from_sorted((1..=45).collect::<Vec<_>>(), PageRequest::new(3, 20));
        assert_eq!(page.docs, (41..=45).collect::<Vec<_>>());
        assert_eq!(page.total, 45);
        assert_eq!(page.pages, 3);

        let clamped = PageRequest::new(0, 1000);
        assert_eq!(clamped.page, 1);
        assert_eq!(clamped.limit, MAX_PAGE_LIMIT);
    }

    #[test]
    fn test_user_settings_defaults() {
        let settings: UserSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, UserSettings::default());
        assert_eq!(settings.theme, Theme::System);
        assert!(settings.pin_folder);
    }
}
