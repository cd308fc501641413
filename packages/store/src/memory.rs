use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::models::*;
use crate::repo::Store;

#[derive(Debug, Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    tfa: HashMap<Uuid, TfaRecord>,
    oauth_states: HashMap<String, OAuthState>,
    notes: HashMap<Uuid, Note>,
    note_states: HashMap<Uuid, NoteState>,
    labels: HashMap<Uuid, Label>,
    activities: HashMap<Uuid, Activity>,
    sessions: HashMap<Uuid, Session>,
}

impl Inner {
    fn user_mut(&mut self, id: Uuid) -> Result<&mut User> {
        self.users.get_mut(&id).ok_or(StoreError::NotFound("User"))
    }

    fn note_mut(&mut self, id: Uuid) -> Result<&mut Note> {
        self.notes.get_mut(&id).ok_or(StoreError::NotFound("Note"))
    }
}

/// In-memory Store for tests and running without a database.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn new_user(email: String, name: String, now: DateTime<Utc>) -> User {
    User {
        id: Uuid::new_v4(),
        email,
        name,
        password_hash: None,
        google_id: None,
        avatar_url: None,
        tfa_enabled: false,
        settings: UserSettings::default(),
        created_at: now,
        updated_at: now,
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        let mut inner = self.inner();
        let email = user.email.to_lowercase();
        if inner.users.values().any(|u| u.email == email) {
            return Err(StoreError::AlreadyExists("User"));
        }
        let mut created = new_user(email, user.name, Utc::now());
        created.password_hash = user.password_hash;
        inner.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.inner().users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = email.to_lowercase();
        Ok(self
            .inner()
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn upsert_google_user(&self, profile: GoogleProfile) -> Result<User> {
        let mut inner = self.inner();
        let email = profile.email.to_lowercase();
        let now = Utc::now();

        let by_google = inner
            .users
            .values()
            .find(|u| u.google_id.as_deref() == Some(profile.google_id.as_str()))
            .map(|u| u.id);
        let existing = match by_google {
            Some(id) => Some(id),
            None => {
                let by_email = inner.users.values().find(|u| u.email == email).map(|u| u.id);
                if by_email.is_some() && !profile.verified_email {
                    return Err(StoreError::Invalid(UNVERIFIED_EMAIL.to_string()));
                }
                by_email
            }
        };

        let user = match existing {
            Some(id) => {
                let user = inner.user_mut(id)?;
                user.google_id = Some(profile.google_id);
                if profile.avatar_url.is_some() {
                    user.avatar_url = profile.avatar_url;
                }
                user.updated_at = now;
                user.clone()
            }
            None => {
                let name = profile.name.unwrap_or_else(|| email.clone());
                let mut user = new_user(email, name, now);
                user.google_id = Some(profile.google_id);
                user.avatar_url = profile.avatar_url;
                inner.users.insert(user.id, user.clone());
                user
            }
        };
        Ok(user)
    }

    async fn update_user_settings(&self, id: Uuid, settings: UserSettings) -> Result<User> {
        let mut inner = self.inner();
        let user = inner.user_mut(id)?;
        user.settings = settings;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn update_user_name(&self, id: Uuid, name: &str) -> Result<User> {
        let mut inner = self.inner();
        let user = inner.user_mut(id)?;
        user.name = name.to_string();
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn put_tfa(&self, record: TfaRecord) -> Result<()> {
        self.inner().tfa.insert(record.user_id, record);
        Ok(())
    }

    async fn get_tfa(&self, user_id: Uuid) -> Result<Option<TfaRecord>> {
        Ok(self.inner().tfa.get(&user_id).cloned())
    }

    async fn enable_tfa(&self, user_id: Uuid, step: i64) -> Result<()> {
        let mut guard = self.inner();
        let inner = &mut *guard;
        let user = inner
            .users
            .get_mut(&user_id)
            .ok_or(StoreError::NotFound("User"))?;
        let record = inner
            .tfa
            .get_mut(&user_id)
            .ok_or(StoreError::NotFound("Two-factor record"))?;
        record.enabled = true;
        record.last_step = Some(step);
        record.failed_attempts = 0;
        user.tfa_enabled = true;
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn disable_tfa(&self, user_id: Uuid) -> Result<()> {
        let mut inner = self.inner();
        let user = inner.user_mut(user_id)?;
        user.tfa_enabled = false;
        user.updated_at = Utc::now();
        inner.tfa.remove(&user_id);
        Ok(())
    }

    async fn accept_tfa_step(&self, user_id: Uuid, step: i64) -> Result<bool> {
        let mut inner = self.inner();
        let record = inner
            .tfa
            .get_mut(&user_id)
            .ok_or(StoreError::NotFound("Two-factor record"))?;
        if record.last_step.is_some_and(|last| last >= step) {
            return Ok(false);
        }
        record.last_step = Some(step);
        record.failed_attempts = 0;
        Ok(true)
    }

    async fn record_tfa_failure(
        &self,
        user_id: Uuid,
        max_attempts: i32,
        lock_until: DateTime<Utc>,
    ) -> Result<()> {
        let mut inner = self.inner();
        let record = inner
            .tfa
            .get_mut(&user_id)
            .ok_or(StoreError::NotFound("Two-factor record"))?;
        record.failed_attempts += 1;
        if record.failed_attempts >= max_attempts {
            record.failed_attempts = 0;
            record.locked_until = Some(lock_until);
        }
        Ok(())
    }

    async fn put_oauth_state(&self, state: OAuthState) -> Result<()> {
        self.inner().oauth_states.insert(state.state.clone(), state);
        Ok(())
    }

    async fn take_oauth_state(&self, state: &str, now: DateTime<Utc>) -> Result<Option<String>> {
        let mut inner = self.inner();
        inner.oauth_states.retain(|_, s| s.expires_at > now);
        Ok(inner.oauth_states.remove(state).map(|s| s.pkce_verifier))
    }

    async fn list_notes(&self, user_id: Uuid, page: PageRequest) -> Result<Page<Note>> {
        let mut notes: Vec<Note> = self
            .inner()
            .notes
            .values()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        notes.sort_by(|a, b| {
            b.settings
                .pinned
                .cmp(&a.settings.pinned)
                .then(b.updated_at.cmp(&a.updated_at))
        });
        Ok(Page::from_sorted(notes, page))
    }

    async fn get_note(&self, id: Uuid) -> Result<Option<Note>> {
        Ok(self.inner().notes.get(&id).cloned())
    }

    async fn get_note_state(&self, state_id: Uuid) -> Result<Option<NoteState>> {
        Ok(self.inner().note_states.get(&state_id).cloned())
    }

    async fn create_note(&self, note: NewNote) -> Result<Note> {
        let now = Utc::now();
        let created = Note {
            id: Uuid::new_v4(),
            user_id: note.user_id,
            body: note.body,
            state_id: Uuid::new_v4(),
            image: note.image,
            labels: Vec::new(),
            settings: NoteSettings::default(),
            version: 1,
            created_at: now,
            updated_at: now,
        };
        let state = NoteState {
            id: created.state_id,
            note_id: created.id,
            state: note.state,
            updated_at: now,
        };

        let mut inner = self.inner();
        inner.note_states.insert(state.id, state);
        inner.notes.insert(created.id, created.clone());
        Ok(created)
    }

    async fn save_note(&self, update: NoteUpdate) -> Result<Note> {
        let mut guard = self.inner();
        let inner = &mut *guard;
        let now = Utc::now();

        let note = inner
            .notes
            .get_mut(&update.note_id)
            .ok_or(StoreError::NotFound("Note"))?;
        let state = inner
            .note_states
            .get_mut(&update.state_id)
            .filter(|s| s.note_id == update.note_id)
            .ok_or(StoreError::NotFound("Note state"))?;
        if let Some(expected) = update.expected_version {
            if expected != note.version {
                return Err(StoreError::VersionConflict {
                    expected,
                    actual: note.version,
                });
            }
        }

        state.state = update.state;
        state.updated_at = now;
        note.body = update.body;
        note.image = update.image;
        note.version += 1;
        note.updated_at = now;
        Ok(note.clone())
    }

    async fn update_note_settings(&self, id: Uuid, settings: NoteSettings) -> Result<Note> {
        let mut inner = self.inner();
        let note = inner.note_mut(id)?;
        note.settings = settings;
        note.updated_at = Utc::now();
        Ok(note.clone())
    }

    async fn delete_note(&self, id: Uuid) -> Result<bool> {
        let mut inner = self.inner();
        let Some(note) = inner.notes.remove(&id) else {
            return Ok(false);
        };
        inner.note_states.remove(&note.state_id);
        Ok(true)
    }

    async fn attach_label(&self, note_id: Uuid, label_id: Uuid) -> Result<Note> {
        let mut inner = self.inner();
        let note = inner.note_mut(note_id)?;
        if !note.labels.contains(&label_id) {
            note.labels.push(label_id);
            note.updated_at = Utc::now();
        }
        Ok(note.clone())
    }

    async fn detach_label(&self, note_id: Uuid, label_id: Uuid) -> Result<Note> {
        let mut inner = self.inner();
        let note = inner.note_mut(note_id)?;
        if note.labels.contains(&label_id) {
            note.labels.retain(|id| *id != label_id);
            note.updated_at = Utc::now();
        }
        Ok(note.clone())
    }

    async fn detach_all_labels(&self, note_id: Uuid) -> Result<Note> {
        let mut inner = self.inner();
        let note = inner.note_mut(note_id)?;
        if !note.labels.is_empty() {
            note.labels.clear();
            note.updated_at = Utc::now();
        }
        Ok(note.clone())
    }

    async fn list_labels(&self, user_id: Uuid) -> Result<Vec<Label>> {
        let mut labels: Vec<Label> = self
            .inner()
            .labels
            .values()
            .filter(|l| l.user_id == user_id)
            .cloned()
            .collect();
        labels.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.name.cmp(&b.name)));
        Ok(labels)
    }

    async fn get_label(&self, id: Uuid) -> Result<Option<Label>> {
        Ok(self.inner().labels.get(&id).cloned())
    }

    async fn create_label(&self, label: NewLabel) -> Result<Label> {
        let created = Label {
            id: Uuid::new_v4(),
            user_id: label.user_id,
            name: label.name,
            kind: label.kind,
            color: label.color,
            font_color: label.font_color,
            created_at: Utc::now(),
        };
        self.inner().labels.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_label(&self, id: Uuid, patch: LabelPatch) -> Result<Label> {
        let mut inner = self.inner();
        let label = inner
            .labels
            .get_mut(&id)
            .ok_or(StoreError::NotFound("Label"))?;
        patch.apply(label);
        Ok(label.clone())
    }

    async fn delete_label(&self, id: Uuid) -> Result<bool> {
        Ok(self.inner().labels.remove(&id).is_some())
    }

    async fn list_activities(&self, user_id: Uuid, page: PageRequest) -> Result<Page<Activity>> {
        let mut activities: Vec<Activity> = self
            .inner()
            .activities
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        activities.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(Page::from_sorted(activities, page))
    }

    async fn get_activity(&self, id: Uuid) -> Result<Option<Activity>> {
        Ok(self.inner().activities.get(&id).cloned())
    }

    async fn create_activity(&self, activity: NewActivity) -> Result<Activity> {
        let now = Utc::now();
        let created = Activity {
            id: Uuid::new_v4(),
            user_id: activity.user_id,
            title: activity.title,
            body: activity.body,
            bookmark: activity.bookmark,
            bookmark_color: activity.bookmark_color,
            created_at: now,
            updated_at: now,
        };
        self.inner().activities.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_activity(&self, id: Uuid, patch: ActivityPatch) -> Result<Activity> {
        let mut inner = self.inner();
        let activity = inner
            .activities
            .get_mut(&id)
            .ok_or(StoreError::NotFound("Activity"))?;
        patch.apply(activity);
        activity.updated_at = Utc::now();
        Ok(activity.clone())
    }

    async fn delete_activity(&self, id: Uuid) -> Result<bool> {
        Ok(self.inner().activities.remove(&id).is_some())
    }

    async fn create_session(&self, session: NewSession) -> Result<Session> {
        let now = Utc::now();
        let created = Session {
            id: Uuid::new_v4(),
            user_id: session.user_id,
            device: session.device,
            browser: session.browser,
            os: session.os,
            ip: session.ip,
            created_at: now,
            last_seen: now,
        };
        self.inner().sessions.insert(created.id, created.clone());
        Ok(created)
    }

    async fn list_sessions(&self, user_id: Uuid) -> Result<Vec<Session>> {
        let mut sessions: Vec<Session> = self
            .inner()
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));
        Ok(sessions)
    }

    async fn get_session(&self, id: Uuid) -> Result<Option<Session>> {
        Ok(self.inner().sessions.get(&id).cloned())
    }

    async fn touch_session(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool> {
        let mut inner = self.inner();
        let Some(session) = inner.sessions.get_mut(&id) else {
            return Ok(false);
        };
        session.last_seen = session.last_seen.max(now);
        Ok(true)
    }

    async fn delete_session(&self, id: Uuid) -> Result<bool> {
        Ok(self.inner().sessions.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn user(store: &MemoryStore, email: &str) -> User {
        store
            .create_user(NewUser {
                email: email.to_string(),
                name: "Ada".to_string(),
                password_hash: Some("hash".to_string()),
            })
            .await
            .unwrap()
    }

    async fn note(store: &MemoryStore, user_id: Uuid, body: &str) -> Note {
        store
            .create_note(NewNote {
                user_id,
                state: r#"{"root":{"type":"root","children":[]}}"#.to_string(),
                body: body.to_string(),
                image: None,
            })
            .await
            .unwrap()
    }

    async fn label(store: &MemoryStore, user_id: Uuid, name: &str) -> Label {
        store
            .create_label(NewLabel {
                user_id,
                name: name.to_string(),
                kind: LabelKind::Outlined,
                color: "#fff".to_string(),
                font_color: "#000".to_string(),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_user_rejects_duplicate_email() {
        let store = MemoryStore::new();
        let created = user(&store, "Ada@Example.com").await;
        assert_eq!(created.email, "ada@example.com");

        let err = store
            .create_user(NewUser {
                email: "ada@example.com".to_string(),
                name: "Other".to_string(),
                password_hash: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists("User")));

        let found = store.find_user_by_email("ADA@example.com").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(created.id));
    }

    #[tokio::test]
    async fn test_upsert_google_user_links_existing_email() {
        let store = MemoryStore::new();
        let existing = user(&store, "ada@example.com").await;

        let linked = store
            .upsert_google_user(GoogleProfile {
                google_id: "g-1".to_string(),
                email: "ada@example.com".to_string(),
                name: Some("Ada L".to_string()),
                avatar_url: Some("https://pic".to_string()),
                verified_email: true,
            })
            .await
            .unwrap();
        assert_eq!(linked.id, existing.id);
        assert_eq!(linked.google_id.as_deref(), Some("g-1"));
        assert_eq!(linked.name, "Ada");

        // Second login finds the account by Google id even if the email changed
        let again = store
            .upsert_google_user(GoogleProfile {
                google_id: "g-1".to_string(),
                email: "new@example.com".to_string(),
                name: None,
                avatar_url: None,
                verified_email: true,
            })
            .await
            .unwrap();
        assert_eq!(again.id, existing.id);

        let fresh = store
            .upsert_google_user(GoogleProfile {
                google_id: "g-2".to_string(),
                email: "grace@example.com".to_string(),
                name: None,
                avatar_url: None,
                verified_email: true,
            })
            .await
            .unwrap();
        assert_ne!(fresh.id, existing.id);
        assert_eq!(fresh.name, "grace@example.com");
        assert!(fresh.password_hash.is_none());
    }

    #[tokio::test]
    async fn test_tfa_flag_follows_record() {
        let store = MemoryStore::new();
        let owner = user(&store, "ada@example.com").await;
        let now = Utc::now();

        assert!(store.enable_tfa(owner.id, 10).await.is_err());
        store
            .put_tfa(TfaRecord::new(owner.id, "SECRET".to_string(), now))
            .await
            .unwrap();
        store.enable_tfa(owner.id, 10).await.unwrap();
        assert!(store.get_user(owner.id).await.unwrap().unwrap().tfa_enabled);
        let record = store.get_tfa(owner.id).await.unwrap().unwrap();
        assert!(record.enabled);
        assert_eq!(record.last_step, Some(10));

        store.disable_tfa(owner.id).await.unwrap();
        assert!(!store.get_user(owner.id).await.unwrap().unwrap().tfa_enabled);
        assert!(store.get_tfa(owner.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_tfa_steps_are_single_use() {
        let store = MemoryStore::new();
        let owner = user(&store, "ada@example.com").await;
        store
            .put_tfa(TfaRecord::new(owner.id, "SECRET".to_string(), Utc::now()))
            .await
            .unwrap();

        assert!(store.accept_tfa_step(owner.id, 5).await.unwrap());
        assert!(!store.accept_tfa_step(owner.id, 5).await.unwrap());
        assert!(!store.accept_tfa_step(owner.id, 4).await.unwrap());
        assert!(store.accept_tfa_step(owner.id, 6).await.unwrap());
    }

    #[tokio::test]
    async fn test_tfa_failures_lock_the_record() {
        let store = MemoryStore::new();
        let owner = user(&store, "ada@example.com").await;
        let now = Utc::now();
        let until = now + Duration::minutes(5);
        store
            .put_tfa(TfaRecord::new(owner.id, "SECRET".to_string(), now))
            .await
            .unwrap();

        for _ in 0..2 {
            store.record_tfa_failure(owner.id, 3, until).await.unwrap();
        }
        let record = store.get_tfa(owner.id).await.unwrap().unwrap();
        assert_eq!(record.failed_attempts, 2);
        assert!(!record.is_locked(now));

        store.record_tfa_failure(owner.id, 3, until).await.unwrap();
        let record = store.get_tfa(owner.id).await.unwrap().unwrap();
        assert_eq!(record.failed_attempts, 0);
        assert!(record.is_locked(now));
        assert!(!record.is_locked(until));
    }

    #[tokio::test]
    async fn test_touch_session_orders_by_last_seen() {
        let store = MemoryStore::new();
        let owner = user(&store, "ada@example.com").await;
        let session = |device: &str| NewSession {
            user_id: owner.id,
            device: device.to_string(),
            browser: "Firefox".to_string(),
            os: "Linux".to_string(),
            ip: None,
        };
        let older = store.create_session(session("desktop")).await.unwrap();
        let newer = store.create_session(session("phone")).await.unwrap();

        let later = newer.last_seen + Duration::seconds(5);
        assert!(store.touch_session(older.id, later).await.unwrap());
        // Never moves backwards
        assert!(store.touch_session(older.id, older.created_at).await.unwrap());

        let sessions = store.list_sessions(owner.id).await.unwrap();
        assert_eq!(sessions[0].id, older.id);
        assert_eq!(sessions[0].last_seen, later);
        assert!(!store.touch_session(Uuid::new_v4(), later).await.unwrap());
    }

    #[tokio::test]
    async fn test_upsert_google_user_refuses_unverified_email_link() {
        let store = MemoryStore::new();
        let existing = user(&store, "ada@example.com").await;
        let profile = |google_id: &str, email: &str| GoogleProfile {
            google_id: google_id.to_string(),
            email: email.to_string(),
            name: None,
            avatar_url: None,
            verified_email: false,
        };

        let err = store
            .upsert_google_user(profile("g-1", "ADA@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Invalid(ref m) if m == UNVERIFIED_EMAIL));
        let untouched = store.get_user(existing.id).await.unwrap().unwrap();
        assert!(untouched.google_id.is_none());

        // A new address still gets its own account
        let fresh = store
            .upsert_google_user(profile("g-2", "grace@example.com"))
            .await
            .unwrap();
        assert_ne!(fresh.id, existing.id);
    }

    #[tokio::test]
    async fn test_save_note_roundtrip_and_version() {
        let store = MemoryStore::new();
        let owner = user(&store, "ada@example.com").await;
        let created = note(&store, owner.id, "first").await;
        assert_eq!(created.version, 1);

        let state = r#"{"root":{"type":"root","children":[{"type":"paragraph"}]}}"#;
        let saved = store
            .save_note(NoteUpdate {
                note_id: created.id,
                state_id: created.state_id,
                state: state.to_string(),
                body: "second".to_string(),
                image: Some("https://img".to_string()),
                expected_version: Some(1),
            })
            .await
            .unwrap();
        assert_eq!(saved.version, 2);
        assert_eq!(saved.body, "second");

        let loaded = store.get_note_state(saved.state_id).await.unwrap().unwrap();
        assert_eq!(loaded.state, state);

        // Stale version is rejected and nothing changes
        let err = store
            .save_note(NoteUpdate {
                note_id: created.id,
                state_id: created.state_id,
                state: "{}".to_string(),
                body: "stale".to_string(),
                image: None,
                expected_version: Some(1),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::VersionConflict {
                expected: 1,
                actual: 2
            }
        ));
        let loaded = store.get_note_state(saved.state_id).await.unwrap().unwrap();
        assert_eq!(loaded.state, state);

        // No expected version: last writer wins
        let forced = store
            .save_note(NoteUpdate {
                note_id: created.id,
                state_id: created.state_id,
                state: state.to_string(),
                body: "third".to_string(),
                image: None,
                expected_version: None,
            })
            .await
            .unwrap();
        assert_eq!(forced.version, 3);
    }

    #[tokio::test]
    async fn test_save_note_rejects_foreign_state() {
        let store = MemoryStore::new();
        let owner = user(&store, "ada@example.com").await;
        let a = note(&store, owner.id, "a").await;
        let b = note(&store, owner.id, "b").await;

        let err = store
            .save_note(NoteUpdate {
                note_id: a.id,
                state_id: b.state_id,
                state: "{}".to_string(),
                body: String::new(),
                image: None,
                expected_version: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound("Note state")));
    }

    #[tokio::test]
    async fn test_detach_label_only_touches_one_note() {
        let store = MemoryStore::new();
        let owner = user(&store, "ada@example.com").await;
        let work = label(&store, owner.id, "work").await;
        let home = label(&store, owner.id, "home").await;
        let first = note(&store, owner.id, "first").await;
        let second = note(&store, owner.id, "second").await;

        for n in [&first, &second] {
            store.attach_label(n.id, work.id).await.unwrap();
            store.attach_label(n.id, home.id).await.unwrap();
        }
        // Attaching twice keeps one entry
        let first_now = store.attach_label(first.id, work.id).await.unwrap();
        assert_eq!(first_now.labels, vec![work.id, home.id]);

        let detached = store.detach_label(first.id, work.id).await.unwrap();
        assert_eq!(detached.labels, vec![home.id]);

        let untouched = store.get_note(second.id).await.unwrap().unwrap();
        assert_eq!(untouched.labels, vec![work.id, home.id]);

        let cleared = store.detach_all_labels(second.id).await.unwrap();
        assert!(cleared.labels.is_empty());
        let again = store.detach_all_labels(second.id).await.unwrap();
        assert_eq!(again.updated_at, cleared.updated_at);
    }

    #[tokio::test]
    async fn test_list_notes_pinned_first() {
        let store = MemoryStore::new();
        let owner = user(&store, "ada@example.com").await;
        let other = user(&store, "grace@example.com").await;
        let older = note(&store, owner.id, "older").await;
        let _newer = note(&store, owner.id, "newer").await;
        let _foreign = note(&store, other.id, "foreign").await;

        store
            .update_note_settings(
                older.id,
                NoteSettings {
                    pinned: true,
                    ..NoteSettings::default()
                },
            )
            .await
            .unwrap();

        let page = store
            .list_notes(owner.id, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.docs[0].id, older.id);
        assert!(page.docs.iter().all(|n| n.user_id == owner.id));
    }

    #[tokio::test]
    async fn test_take_oauth_state_once_and_unexpired() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store
            .put_oauth_state(OAuthState {
                state: "live".to_string(),
                pkce_verifier: "verifier".to_string(),
                expires_at: now + Duration::minutes(10),
            })
            .await
            .unwrap();
        store
            .put_oauth_state(OAuthState {
                state: "stale".to_string(),
                pkce_verifier: "old".to_string(),
                expires_at: now - Duration::minutes(1),
            })
            .await
            .unwrap();

        assert_eq!(
            store.take_oauth_state("live", now).await.unwrap().as_deref(),
            Some("verifier")
        );
        assert!(store.take_oauth_state("live", now).await.unwrap().is_none());
        assert!(store.take_oauth_state("stale", now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_note_removes_state() {
        let store = MemoryStore::new();
        let owner = user(&store, "ada@example.com").await;
        let n = note(&store, owner.id, "bye").await;

        assert!(store.delete_note(n.id).await.unwrap());
        assert!(!store.delete_note(n.id).await.unwrap());
        assert!(store.get_note_state(n.state_id).await.unwrap().is_none());
    }
}
