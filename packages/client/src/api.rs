//! # HTTP client for the notes API
//!
//! [`NotesApi`] is the subset [`crate::sync::DocumentSync`] needs, so the
//! sync logic can run against an in-process fake. [`ApiClient`] implements it
//! over reqwest and adds the account calls.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use store::packing::{pack, PACKED_CONTENT_TYPE};
use store::wire::{AuthResponse, SaveNote, SignIn, SignUp, TfaVerify};
use store::{Label, NewLabel, NoteDocument, NoteView, Page, PageRequest, UserInfo};
use uuid::Uuid;

use crate::error::{ClientError, Result};

#[async_trait]
pub trait NotesApi: Send + Sync {
    async fn list_notes(&self, page: PageRequest) -> Result<Page<NoteView>>;
    async fn load_note(&self, id: Uuid) -> Result<NoteDocument>;
    async fn save_note(&self, save: &SaveNote) -> Result<NoteView>;
    async fn detach_label(&self, label_id: Uuid, note_id: Uuid) -> Result<NoteView>;
    async fn detach_all_labels(&self, note_id: Uuid) -> Result<NoteView>;
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

pub struct ApiClient {
    http: Client,
    base_url: String,
    token: Option<String>,
    /// Send saves gzip-packed instead of as JSON.
    packed: bool,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
            packed: false,
        }
    }

    pub fn with_packed_saves(mut self, packed: bool) -> Self {
        self.packed = packed;
        self
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, builder: RequestBuilder) -> Result<RequestBuilder> {
        let token = self.token.as_deref().ok_or(ClientError::NotSignedIn)?;
        Ok(builder.bearer_auth(token))
    }

    async fn send<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.message,
            Err(_) => status.canonical_reason().unwrap_or("Request failed").to_string(),
        };
        Err(ClientError::Server {
            status: status.as_u16(),
            message,
        })
    }

    pub async fn sign_up(&self, form: &SignUp) -> Result<String> {
        let body: ErrorBody = Self::send(self.http.post(self.url("/sign-up")).json(form)).await?;
        Ok(body.message)
    }

    /// Sign in and keep the token unless a second factor is still needed.
    pub async fn sign_in(&mut self, form: &SignIn) -> Result<AuthResponse> {
        let response: AuthResponse =
            Self::send(self.http.post(self.url("/sign-in")).json(form)).await?;
        if !response.tfa_required {
            self.token = Some(response.token.clone());
        }
        Ok(response)
    }

    pub async fn verify_tfa(&mut self, pending_token: &str, code: &str) -> Result<AuthResponse> {
        let body = TfaVerify {
            token: pending_token.to_string(),
            code: code.to_string(),
        };
        let response: AuthResponse =
            Self::send(self.http.post(self.url("/tfa/verify")).json(&body)).await?;
        self.token = Some(response.token.clone());
        Ok(response)
    }

    pub async fn current_user(&self) -> Result<UserInfo> {
        Self::send(self.authed(self.http.get(self.url("/user")))?).await
    }

    pub async fn list_labels(&self) -> Result<Vec<Label>> {
        Self::send(self.authed(self.http.get(self.url("/labels")))?).await
    }

    pub async fn create_label(&self, label: &NewLabel) -> Result<Label> {
        Self::send(self.authed(self.http.post(self.url("/label")))?.json(label)).await
    }

    pub async fn attach_label(&self, label_id: Uuid, note_id: Uuid) -> Result<NoteView> {
        let url = self.url(&format!("/note/label/{label_id}/{note_id}"));
        Self::send(self.authed(self.http.put(url))?).await
    }
}

#[async_trait]
impl NotesApi for ApiClient {
    async fn list_notes(&self, page: PageRequest) -> Result<Page<NoteView>> {
        let builder = self
            .http
            .get(self.url("/notes"))
            .query(&[("page", page.page), ("limit", page.limit)]);
        Self::send(self.authed(builder)?).await
    }

    async fn load_note(&self, id: Uuid) -> Result<NoteDocument> {
        Self::send(self.authed(self.http.get(self.url(&format!("/note/{id}"))))?).await
    }

    async fn save_note(&self, save: &SaveNote) -> Result<NoteView> {
        let builder = self.authed(self.http.patch(self.url("/edit")))?;
        let builder = if self.packed {
            builder
                .header(CONTENT_TYPE, PACKED_CONTENT_TYPE)
                .body(pack(save)?)
        } else {
            builder.json(save)
        };
        Self::send(builder).await
    }

    async fn detach_label(&self, label_id: Uuid, note_id: Uuid) -> Result<NoteView> {
        let url = self.url(&format!("/note/delete/label/{label_id}/{note_id}"));
        Self::send(self.authed(self.http.delete(url))?).await
    }

    async fn detach_all_labels(&self, note_id: Uuid) -> Result<NoteView> {
        let url = self.url(&format!("/note/delete-all/label/{note_id}"));
        Self::send(self.authed(self.http.delete(url))?).await
    }
}
