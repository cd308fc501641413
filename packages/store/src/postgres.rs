//! PostgreSQL-backed [`Store`].
//!
//! Rows are read into private `*Row` structs and converted into the domain
//! models, so the models stay free of database derives. Multi-statement
//! writes (note creation, saves) run in a transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::models::*;
use crate::repo::Store;

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    name: String,
    password_hash: Option<String>,
    google_id: Option<String>,
    avatar_url: Option<String>,
    tfa_enabled: bool,
    settings: Json<UserSettings>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            email: row.email,
            name: row.name,
            password_hash: row.password_hash,
            google_id: row.google_id,
            avatar_url: row.avatar_url,
            tfa_enabled: row.tfa_enabled,
            settings: row.settings.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct NoteRow {
    id: Uuid,
    user_id: Uuid,
    body: String,
    state_id: Uuid,
    image: Option<String>,
    labels: Vec<Uuid>,
    settings: Json<NoteSettings>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<NoteRow> for Note {
    fn from(row: NoteRow) -> Self {
        Note {
            id: row.id,
            user_id: row.user_id,
            body: row.body,
            state_id: row.state_id,
            image: row.image,
            labels: row.labels,
            settings: row.settings.0,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct NoteStateRow {
    id: Uuid,
    note_id: Uuid,
    state: String,
    updated_at: DateTime<Utc>,
}

impl From<NoteStateRow> for NoteState {
    fn from(row: NoteStateRow) -> Self {
        NoteState {
            id: row.id,
            note_id: row.note_id,
            state: row.state,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct LabelRow {
    id: Uuid,
    user_id: Uuid,
    name: String,
    kind: String,
    color: String,
    font_color: String,
    created_at: DateTime<Utc>,
}

impl From<LabelRow> for Label {
    fn from(row: LabelRow) -> Self {
        Label {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            kind: row.kind.parse().unwrap_or_default(),
            color: row.color,
            font_color: row.font_color,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct ActivityRow {
    id: Uuid,
    user_id: Uuid,
    title: String,
    body: String,
    bookmark: bool,
    bookmark_color: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ActivityRow> for Activity {
    fn from(row: ActivityRow) -> Self {
        Activity {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            body: row.body,
            bookmark: row.bookmark,
            bookmark_color: row.bookmark_color,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct SessionRow {
    id: Uuid,
    user_id: Uuid,
    device: String,
    browser: String,
    os: String,
    ip: Option<String>,
    created_at: DateTime<Utc>,
    last_seen: DateTime<Utc>,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Session {
            id: row.id,
            user_id: row.user_id,
            device: row.device,
            browser: row.browser,
            os: row.os,
            ip: row.ip,
            created_at: row.created_at,
            last_seen: row.last_seen,
        }
    }
}

#[derive(FromRow)]
struct TfaRow {
    user_id: Uuid,
    secret: String,
    enabled: bool,
    last_step: Option<i64>,
    failed_attempts: i32,
    locked_until: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<TfaRow> for TfaRecord {
    fn from(row: TfaRow) -> Self {
        TfaRecord {
            user_id: row.user_id,
            secret: row.secret,
            enabled: row.enabled,
            last_step: row.last_step,
            failed_attempts: row.failed_attempts,
            locked_until: row.locked_until,
            created_at: row.created_at,
        }
    }
}

fn unique_violation(err: sqlx::Error, what: &'static str) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::AlreadyExists(what),
        _ => StoreError::Database(err),
    }
}

/// Store backed by a PostgreSQL connection pool.
#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a connection pool to `url`.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        tracing::info!("Connected to PostgreSQL (max {} connections)", max_connections);
        Ok(Self::new(pool))
    }

    /// Apply the bundled SQL migrations.
    pub async fn migrate(&self) -> Result<()> {
        let migrator = sqlx::migrate!("./migrations");
        migrator.run(&self.pool).await?;
        tracing::info!("Database schema up to date ({} migrations)", migrator.iter().count());
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn require_note(&self, id: Uuid) -> Result<Note> {
        self.get_note(id).await?.ok_or(StoreError::NotFound("Note"))
    }
}

#[async_trait]
impl Store for PgStore {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        let row: UserRow = sqlx::query_as(
            "INSERT INTO users (id, email, name, password_hash, settings)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(user.email.to_lowercase())
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(Json(UserSettings::default()))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_violation(e, "User"))?;
        Ok(row.into())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
            .bind(email.to_lowercase())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn upsert_google_user(&self, profile: GoogleProfile) -> Result<User> {
        let email = profile.email.to_lowercase();
        let mut tx = self.pool.begin().await?;

        let linked: Option<UserRow> = sqlx::query_as(
            "UPDATE users SET avatar_url = COALESCE($2, avatar_url), updated_at = NOW()
             WHERE google_id = $1
             RETURNING *",
        )
        .bind(&profile.google_id)
        .bind(&profile.avatar_url)
        .fetch_optional(&mut *tx)
        .await?;

        let row = match linked {
            Some(row) => row,
            None => {
                if !profile.verified_email {
                    let taken: bool =
                        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE email = $1)")
                            .bind(&email)
                            .fetch_one(&mut *tx)
                            .await?;
                    if taken {
                        return Err(StoreError::Invalid(UNVERIFIED_EMAIL.to_string()));
                    }
                }
                let by_email: Option<UserRow> = sqlx::query_as(
                    "UPDATE users SET google_id = $1, avatar_url = COALESCE($3, avatar_url), updated_at = NOW()
                     WHERE email = $2
                     RETURNING *",
                )
                .bind(&profile.google_id)
                .bind(&email)
                .bind(&profile.avatar_url)
                .fetch_optional(&mut *tx)
                .await?;

                match by_email {
                    Some(row) => row,
                    None => sqlx::query_as(
                        "INSERT INTO users (id, email, name, google_id, avatar_url, settings)
                         VALUES ($1, $2, $3, $4, $5, $6)
                         RETURNING *",
                    )
                    .bind(Uuid::new_v4())
                    .bind(&email)
                    .bind(profile.name.as_deref().unwrap_or(&email))
                    .bind(&profile.google_id)
                    .bind(&profile.avatar_url)
                    .bind(Json(UserSettings::default()))
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(|e| unique_violation(e, "User"))?,
                }
            }
        };

        tx.commit().await?;
        Ok(row.into())
    }

    async fn update_user_settings(&self, id: Uuid, settings: UserSettings) -> Result<User> {
        let row: Option<UserRow> = sqlx::query_as(
            "UPDATE users SET settings = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(Json(settings))
        .fetch_optional(&self.pool)
        .await?;
        row.map(Into::into).ok_or(StoreError::NotFound("User"))
    }

    async fn update_user_name(&self, id: Uuid, name: &str) -> Result<User> {
        let row: Option<UserRow> = sqlx::query_as(
            "UPDATE users SET name = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Into::into).ok_or(StoreError::NotFound("User"))
    }

    async fn put_tfa(&self, record: TfaRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO tfa (user_id, secret, enabled, last_step, failed_attempts, locked_until, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (user_id) DO UPDATE SET
                secret = EXCLUDED.secret,
                enabled = EXCLUDED.enabled,
                last_step = EXCLUDED.last_step,
                failed_attempts = EXCLUDED.failed_attempts,
                locked_until = EXCLUDED.locked_until,
                created_at = EXCLUDED.created_at",
        )
        .bind(record.user_id)
        .bind(&record.secret)
        .bind(record.enabled)
        .bind(record.last_step)
        .bind(record.failed_attempts)
        .bind(record.locked_until)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_tfa(&self, user_id: Uuid) -> Result<Option<TfaRecord>> {
        let row: Option<TfaRow> = sqlx::query_as("SELECT * FROM tfa WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn enable_tfa(&self, user_id: Uuid, step: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE tfa SET enabled = TRUE, last_step = $2, failed_attempts = 0 WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(step)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("Two-factor record"));
        }

        let result =
            sqlx::query("UPDATE users SET tfa_enabled = TRUE, updated_at = NOW() WHERE id = $1")
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("User"));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn disable_tfa(&self, user_id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let result =
            sqlx::query("UPDATE users SET tfa_enabled = FALSE, updated_at = NOW() WHERE id = $1")
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("User"));
        }
        sqlx::query("DELETE FROM tfa WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn accept_tfa_step(&self, user_id: Uuid, step: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE tfa SET last_step = $2, failed_attempts = 0
             WHERE user_id = $1 AND (last_step IS NULL OR last_step < $2)",
        )
        .bind(user_id)
        .bind(step)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn record_tfa_failure(
        &self,
        user_id: Uuid,
        max_attempts: i32,
        lock_until: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE tfa SET
                failed_attempts = CASE WHEN failed_attempts + 1 >= $2 THEN 0 ELSE failed_attempts + 1 END,
                locked_until = CASE WHEN failed_attempts + 1 >= $2 THEN $3 ELSE locked_until END
             WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(max_attempts)
        .bind(lock_until)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn put_oauth_state(&self, state: OAuthState) -> Result<()> {
        sqlx::query(
            "INSERT INTO oauth_states (state, pkce_verifier, expires_at) VALUES ($1, $2, $3)",
        )
        .bind(&state.state)
        .bind(&state.pkce_verifier)
        .bind(state.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn take_oauth_state(&self, state: &str, now: DateTime<Utc>) -> Result<Option<String>> {
        sqlx::query("DELETE FROM oauth_states WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;

        let row: Option<(String,)> = sqlx::query_as(
            "DELETE FROM oauth_states WHERE state = $1 AND expires_at > $2 RETURNING pkce_verifier",
        )
        .bind(state)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(verifier,)| verifier))
    }

    async fn list_notes(&self, user_id: Uuid, page: PageRequest) -> Result<Page<Note>> {
        let page = page.normalized();
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM notes WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        let rows: Vec<NoteRow> = sqlx::query_as(
            "SELECT * FROM notes WHERE user_id = $1
             ORDER BY COALESCE((settings->>'pinned')::BOOLEAN, FALSE) DESC, updated_at DESC
             LIMIT $2 OFFSET $3",
        )
        .bind(user_id)
        .bind(i64::from(page.limit))
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(Page::new(
            rows.into_iter().map(Into::into).collect(),
            total as u64,
            page,
        ))
    }

    async fn get_note(&self, id: Uuid) -> Result<Option<Note>> {
        let row: Option<NoteRow> = sqlx::query_as("SELECT * FROM notes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn get_note_state(&self, state_id: Uuid) -> Result<Option<NoteState>> {
        let row: Option<NoteStateRow> = sqlx::query_as("SELECT * FROM note_states WHERE id = $1")
            .bind(state_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn create_note(&self, note: NewNote) -> Result<Note> {
        let note_id = Uuid::new_v4();
        let state_id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;

        let row: NoteRow = sqlx::query_as(
            "INSERT INTO notes (id, user_id, body, state_id, image, settings)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING *",
        )
        .bind(note_id)
        .bind(note.user_id)
        .bind(&note.body)
        .bind(state_id)
        .bind(&note.image)
        .bind(Json(NoteSettings::default()))
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO note_states (id, note_id, state) VALUES ($1, $2, $3)")
            .bind(state_id)
            .bind(note_id)
            .bind(&note.state)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    async fn save_note(&self, update: NoteUpdate) -> Result<Note> {
        let mut tx = self.pool.begin().await?;

        let row: Option<NoteRow> = sqlx::query_as(
            "UPDATE notes SET body = $2, image = $3, version = version + 1, updated_at = NOW()
             WHERE id = $1 AND ($4::BIGINT IS NULL OR version = $4)
             RETURNING *",
        )
        .bind(update.note_id)
        .bind(&update.body)
        .bind(&update.image)
        .bind(update.expected_version)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            let current: Option<i64> =
                sqlx::query_scalar("SELECT version FROM notes WHERE id = $1")
                    .bind(update.note_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            return Err(match (current, update.expected_version) {
                (Some(actual), Some(expected)) => StoreError::VersionConflict { expected, actual },
                _ => StoreError::NotFound("Note"),
            });
        };

        let result = sqlx::query(
            "UPDATE note_states SET state = $3, updated_at = NOW() WHERE id = $1 AND note_id = $2",
        )
        .bind(update.state_id)
        .bind(update.note_id)
        .bind(&update.state)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("Note state"));
        }

        tx.commit().await?;
        Ok(row.into())
    }

    async fn update_note_settings(&self, id: Uuid, settings: NoteSettings) -> Result<Note> {
        let row: Option<NoteRow> = sqlx::query_as(
            "UPDATE notes SET settings = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(Json(settings))
        .fetch_optional(&self.pool)
        .await?;
        row.map(Into::into).ok_or(StoreError::NotFound("Note"))
    }

    async fn delete_note(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM notes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn attach_label(&self, note_id: Uuid, label_id: Uuid) -> Result<Note> {
        let row: Option<NoteRow> = sqlx::query_as(
            "UPDATE notes SET labels = array_append(labels, $2), updated_at = NOW()
             WHERE id = $1 AND NOT ($2 = ANY(labels))
             RETURNING *",
        )
        .bind(note_id)
        .bind(label_id)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => Ok(row.into()),
            None => self.require_note(note_id).await,
        }
    }

    async fn detach_label(&self, note_id: Uuid, label_id: Uuid) -> Result<Note> {
        let row: Option<NoteRow> = sqlx::query_as(
            "UPDATE notes SET labels = array_remove(labels, $2), updated_at = NOW()
             WHERE id = $1 AND $2 = ANY(labels)
             RETURNING *",
        )
        .bind(note_id)
        .bind(label_id)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => Ok(row.into()),
            None => self.require_note(note_id).await,
        }
    }

    async fn detach_all_labels(&self, note_id: Uuid) -> Result<Note> {
        let row: Option<NoteRow> = sqlx::query_as(
            "UPDATE notes SET labels = '{}', updated_at = NOW()
             WHERE id = $1 AND cardinality(labels) > 0
             RETURNING *",
        )
        .bind(note_id)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => Ok(row.into()),
            None => self.require_note(note_id).await,
        }
    }

    async fn list_labels(&self, user_id: Uuid) -> Result<Vec<Label>> {
        let rows: Vec<LabelRow> = sqlx::query_as(
            "SELECT * FROM labels WHERE user_id = $1 ORDER BY created_at, name",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get_label(&self, id: Uuid) -> Result<Option<Label>> {
        let row: Option<LabelRow> = sqlx::query_as("SELECT * FROM labels WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn create_label(&self, label: NewLabel) -> Result<Label> {
        let row: LabelRow = sqlx::query_as(
            "INSERT INTO labels (id, user_id, name, kind, color, font_color)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(label.user_id)
        .bind(&label.name)
        .bind(label.kind.as_str())
        .bind(&label.color)
        .bind(&label.font_color)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn update_label(&self, id: Uuid, patch: LabelPatch) -> Result<Label> {
        let row: Option<LabelRow> = sqlx::query_as(
            "UPDATE labels SET
                name = COALESCE($2, name),
                kind = COALESCE($3, kind),
                color = COALESCE($4, color),
                font_color = COALESCE($5, font_color)
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(&patch.name)
        .bind(patch.kind.map(|k| k.as_str()))
        .bind(&patch.color)
        .bind(&patch.font_color)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Into::into).ok_or(StoreError::NotFound("Label"))
    }

    async fn delete_label(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM labels WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_activities(&self, user_id: Uuid, page: PageRequest) -> Result<Page<Activity>> {
        let page = page.normalized();
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM activities WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        let rows: Vec<ActivityRow> = sqlx::query_as(
            "SELECT * FROM activities WHERE user_id = $1
             ORDER BY created_at DESC
             LIMIT $2 OFFSET $3",
        )
        .bind(user_id)
        .bind(i64::from(page.limit))
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(Page::new(
            rows.into_iter().map(Into::into).collect(),
            total as u64,
            page,
        ))
    }

    async fn get_activity(&self, id: Uuid) -> Result<Option<Activity>> {
        let row: Option<ActivityRow> = sqlx::query_as("SELECT * FROM activities WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn create_activity(&self, activity: NewActivity) -> Result<Activity> {
        let row: ActivityRow = sqlx::query_as(
            "INSERT INTO activities (id, user_id, title, body, bookmark, bookmark_color)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(activity.user_id)
        .bind(&activity.title)
        .bind(&activity.body)
        .bind(activity.bookmark)
        .bind(&activity.bookmark_color)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn update_activity(&self, id: Uuid, patch: ActivityPatch) -> Result<Activity> {
        let row: Option<ActivityRow> = sqlx::query_as(
            "UPDATE activities SET
                title = COALESCE($2, title),
                body = COALESCE($3, body),
                bookmark = COALESCE($4, bookmark),
                bookmark_color = COALESCE($5, bookmark_color),
                updated_at = NOW()
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(&patch.title)
        .bind(&patch.body)
        .bind(patch.bookmark)
        .bind(&patch.bookmark_color)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Into::into).ok_or(StoreError::NotFound("Activity"))
    }

    async fn delete_activity(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM activities WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_session(&self, session: NewSession) -> Result<Session> {
        let row: SessionRow = sqlx::query_as(
            "INSERT INTO sessions (id, user_id, device, browser, os, ip)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(session.user_id)
        .bind(&session.device)
        .bind(&session.browser)
        .bind(&session.os)
        .bind(&session.ip)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn list_sessions(&self, user_id: Uuid) -> Result<Vec<Session>> {
        let rows: Vec<SessionRow> = sqlx::query_as(
            "SELECT * FROM sessions WHERE user_id = $1 ORDER BY last_seen DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get_session(&self, id: Uuid) -> Result<Option<Session>> {
        let row: Option<SessionRow> = sqlx::query_as("SELECT * FROM sessions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn touch_session(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool> {
        let result =
            sqlx::query("UPDATE sessions SET last_seen = GREATEST(last_seen, $2) WHERE id = $1")
                .bind(id)
                .bind(now)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_session(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
