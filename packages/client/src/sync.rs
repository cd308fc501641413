//! # Document sync: loading, saving and switching the note in an editor
//!
//! [`DocumentSync`] connects an [`Editor`] to the API:
//!
//! - [`select`](DocumentSync::select) switches notes. Selecting the note
//!   that is already selected does nothing.
//! - [`load`](DocumentSync::load) replaces the editor tree with the stored
//!   state and clears undo history.
//! - [`save`](DocumentSync::save) serializes the editor and sends it with the
//!   open note's ids and version. Success refreshes the note list and
//!   notifies [`Notice::Saved`]; failure notifies [`Notice::Error`] and is
//!   returned. Nothing is retried or queued.
//!
//! Every operation takes `&mut self`, so a response can never land after a
//! later selection.

use store::wire::SaveNote;
use store::{EditorState, NoteView, Page, PageRequest, EXCERPT_LIMIT};
use uuid::Uuid;

use crate::api::NotesApi;
use crate::error::Result;

/// The rich-text editor being driven.
pub trait Editor {
    /// Replace the whole tree with a serialized state.
    fn load_state(&mut self, state: &str);
    fn clear_history(&mut self);
    fn serialize(&self) -> String;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Saved,
    Error(String),
}

/// Where save results are surfaced to the user.
pub trait Notifier {
    fn notify(&self, notice: Notice);
}

/// Ids of the note currently in the editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenNote {
    pub note_id: Uuid,
    pub state_id: Uuid,
    pub version: i64,
    pub labels: Vec<Uuid>,
}

impl From<&NoteView> for OpenNote {
    fn from(view: &NoteView) -> Self {
        OpenNote {
            note_id: view.note.id,
            state_id: view.note.state_id,
            version: view.note.version,
            labels: view.note.labels.clone(),
        }
    }
}

/// Preview text and image of the current editor contents.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Preview {
    pub excerpt: String,
    pub image: Option<String>,
}

pub struct DocumentSync<A, E, N> {
    api: A,
    editor: E,
    notifier: N,
    /// Last value passed to `select`; `None` until the first call.
    selected: Option<Option<Uuid>>,
    open: Option<OpenNote>,
    notes: Option<Page<NoteView>>,
    page: PageRequest,
}

impl<A: NotesApi, E: Editor, N: Notifier> DocumentSync<A, E, N> {
    pub fn new(api: A, editor: E, notifier: N) -> Self {
        Self {
            api,
            editor,
            notifier,
            selected: None,
            open: None,
            notes: None,
            page: PageRequest::default(),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn editor(&self) -> &E {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut E {
        &mut self.editor
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn open_note(&self) -> Option<&OpenNote> {
        self.open.as_ref()
    }

    /// Note list as of the last refresh.
    pub fn notes(&self) -> Option<&Page<NoteView>> {
        self.notes.as_ref()
    }

    /// Switch the editor to another note, or to a blank document for `None`.
    /// Returns `false` when `note_id` is already selected.
    pub async fn select(&mut self, note_id: Option<Uuid>) -> Result<bool> {
        if self.selected == Some(note_id) {
            return Ok(false);
        }
        self.selected = Some(note_id);

        match note_id {
            Some(id) => {
                if let Err(e) = self.load(id).await {
                    self.selected = None;
                    return Err(e);
                }
            }
            None => {
                self.editor.load_state(&EditorState::empty().to_json());
                self.editor.clear_history();
                self.open = None;
            }
        }
        Ok(true)
    }

    /// Fetch a note and put its state into the editor.
    pub async fn load(&mut self, note_id: Uuid) -> Result<()> {
        let document = self.api.load_note(note_id).await?;
        EditorState::parse(&document.state)?;

        self.editor.load_state(&document.state);
        self.editor.clear_history();
        self.open = Some(OpenNote::from(&document.note));
        tracing::debug!("Loaded note {}", note_id);
        Ok(())
    }

    /// Send the editor contents. The first save of a blank document creates
    /// the note and selects it.
    pub async fn save(&mut self) -> Result<NoteView> {
        let save = SaveNote {
            note_id: self.open.as_ref().map(|o| o.note_id),
            state_id: self.open.as_ref().map(|o| o.state_id),
            state: self.editor.serialize(),
            expected_version: self.open.as_ref().map(|o| o.version),
        };

        match self.api.save_note(&save).await {
            Ok(view) => {
                self.open = Some(OpenNote::from(&view));
                self.selected = Some(Some(view.note.id));
                if let Err(e) = self.refresh().await {
                    tracing::warn!("Saved note {} but could not refresh list: {}", view.note.id, e);
                }
                self.notifier.notify(Notice::Saved);
                Ok(view)
            }
            Err(e) => {
                tracing::error!("Failed to save note {:?}: {}", save.note_id, e);
                self.notifier.notify(Notice::Error(e.to_string()));
                Err(e)
            }
        }
    }

    /// Reload the note list.
    pub async fn refresh(&mut self) -> Result<&Page<NoteView>> {
        let page = self.api.list_notes(self.page).await?;
        Ok(self.notes.insert(page))
    }

    pub fn set_page(&mut self, page: PageRequest) {
        self.page = page.normalized();
    }

    /// Remove one label from the open note. Returns `false` without a
    /// request when no note is open.
    pub async fn detach_label(&mut self, label_id: Uuid) -> Result<bool> {
        let Some(note_id) = self.open.as_ref().map(|o| o.note_id) else {
            return Ok(false);
        };
        let view = self.api.detach_label(label_id, note_id).await?;
        self.apply_labels(&view);
        self.refresh().await?;
        Ok(true)
    }

    /// Remove every label from the open note. Returns `false` without a
    /// request when the note has no labels.
    pub async fn detach_all_labels(&mut self) -> Result<bool> {
        let Some(note_id) = self
            .open
            .as_ref()
            .filter(|o| !o.labels.is_empty())
            .map(|o| o.note_id)
        else {
            return Ok(false);
        };
        let view = self.api.detach_all_labels(note_id).await?;
        self.apply_labels(&view);
        self.refresh().await?;
        Ok(true)
    }

    fn apply_labels(&mut self, view: &NoteView) {
        if let Some(open) = self.open.as_mut().filter(|o| o.note_id == view.note.id) {
            open.labels = view.note.labels.clone();
        }
    }

    /// Excerpt and first image of what is in the editor now.
    pub fn preview(&self) -> Result<Preview> {
        let state = EditorState::parse(&self.editor.serialize())?;
        Ok(Preview {
            excerpt: state.excerpt(EXCERPT_LIMIT),
            image: state.first_image(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use async_trait::async_trait;
    use std::cell::RefCell;
    use std::sync::Mutex;
    use store::{Note, NoteDocument, NoteSettings};

    const EMPTY_STATE: &str = r#"{"root":{"type":"root","children":[]}}"#;

    fn note(labels: Vec<Uuid>, version: i64) -> NoteView {
        let now = chrono::Utc::now();
        NoteView {
            note: Note {
                id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
                body: String::new(),
                state_id: Uuid::new_v4(),
                image: None,
                labels,
                settings: NoteSettings::default(),
                version,
                created_at: now,
                updated_at: now,
            },
            labels: vec![],
        }
    }

    #[derive(Default)]
    struct FakeApi {
        document: Mutex<Option<NoteDocument>>,
        saved: Mutex<Vec<SaveNote>>,
        fail_save: bool,
        loads: Mutex<usize>,
        lists: Mutex<usize>,
        detach_calls: Mutex<Vec<(Option<Uuid>, Uuid)>>,
    }

    #[async_trait]
    impl NotesApi for FakeApi {
        async fn list_notes(&self, page: PageRequest) -> Result<Page<NoteView>> {
            *self.lists.lock().unwrap() += 1;
            Ok(Page::new(vec![], 0, page))
        }

        async fn load_note(&self, _id: Uuid) -> Result<NoteDocument> {
            *self.loads.lock().unwrap() += 1;
            self.document
                .lock()
                .unwrap()
                .clone()
                .ok_or(ClientError::Server {
                    status: 404,
                    message: "Note not found".into(),
                })
        }

        async fn save_note(&self, save: &SaveNote) -> Result<NoteView> {
            if self.fail_save {
                return Err(ClientError::Server {
                    status: 409,
                    message: "Note was modified elsewhere".into(),
                });
            }
            self.saved.lock().unwrap().push(save.clone());
            let mut view = note(vec![], save.expected_version.unwrap_or(0) + 1);
            if let Some(id) = save.note_id {
                view.note.id = id;
            }
            Ok(view)
        }

        async fn detach_label(&self, label_id: Uuid, note_id: Uuid) -> Result<NoteView> {
            self.detach_calls.lock().unwrap().push((Some(label_id), note_id));
            let mut view = note(vec![], 1);
            view.note.id = note_id;
            Ok(view)
        }

        async fn detach_all_labels(&self, note_id: Uuid) -> Result<NoteView> {
            self.detach_calls.lock().unwrap().push((None, note_id));
            let mut view = note(vec![], 1);
            view.note.id = note_id;
            Ok(view)
        }
    }

    #[derive(Default)]
    struct FakeEditor {
        state: String,
        history_cleared: usize,
    }

    impl Editor for FakeEditor {
        fn load_state(&mut self, state: &str) {
            self.state = state.to_string();
        }

        fn clear_history(&mut self) {
            self.history_cleared += 1;
        }

        fn serialize(&self) -> String {
            self.state.clone()
        }
    }

    #[derive(Default)]
    struct FakeNotifier {
        notices: RefCell<Vec<Notice>>,
    }

    impl Notifier for FakeNotifier {
        fn notify(&self, notice: Notice) {
            self.notices.borrow_mut().push(notice);
        }
    }

    fn sync_with(api: FakeApi) -> DocumentSync<FakeApi, FakeEditor, FakeNotifier> {
        DocumentSync::new(api, FakeEditor::default(), FakeNotifier::default())
    }

    fn document(labels: Vec<Uuid>) -> NoteDocument {
        NoteDocument {
            note: note(labels, 4),
            state: r#"{"root":{"type":"root","children":[{"type":"paragraph","children":[{"type":"text","text":"Saved text"}]}]}}"#.into(),
        }
    }

    #[tokio::test]
    async fn test_select_loads_once_per_change() {
        let doc = document(vec![]);
        let id = doc.note.note.id;
        let api = FakeApi {
            document: Mutex::new(Some(doc.clone())),
            ..FakeApi::default()
        };
        let mut sync = sync_with(api);

        assert!(sync.select(Some(id)).await.unwrap());
        assert_eq!(sync.editor().state, doc.state);
        assert_eq!(sync.editor().history_cleared, 1);
        assert_eq!(sync.open_note().unwrap().version, 4);

        // Same selection again is a no-op
        assert!(!sync.select(Some(id)).await.unwrap());
        assert_eq!(*sync.api().loads.lock().unwrap(), 1);

        assert!(sync.select(None).await.unwrap());
        assert!(sync.open_note().is_none());
        assert_eq!(sync.editor().state, EditorState::empty().to_json());
        assert_eq!(sync.editor().history_cleared, 2);
    }

    #[tokio::test]
    async fn test_load_rejects_invalid_state() {
        let mut doc = document(vec![]);
        doc.state = "not json".into();
        let id = doc.note.note.id;
        let api = FakeApi {
            document: Mutex::new(Some(doc)),
            ..FakeApi::default()
        };
        let mut sync = sync_with(api);

        let err = sync.load(id).await.unwrap_err();
        assert!(matches!(err, ClientError::Document(_)));
        assert!(sync.editor().state.is_empty());
    }

    #[tokio::test]
    async fn test_first_save_creates_then_updates() {
        let mut sync = sync_with(FakeApi::default());
        sync.editor_mut().load_state(EMPTY_STATE);

        let created = sync.save().await.unwrap();
        assert_eq!(sync.open_note().unwrap().note_id, created.note.id);

        sync.save().await.unwrap();
        let saved = sync.api().saved.lock().unwrap().clone();
        assert_eq!(saved[0].note_id, None);
        assert_eq!(saved[0].expected_version, None);
        assert_eq!(saved[1].note_id, Some(created.note.id));
        assert_eq!(saved[1].state_id, Some(created.note.state_id));
        assert_eq!(saved[1].expected_version, Some(1));

        assert_eq!(*sync.api().lists.lock().unwrap(), 2);
        assert_eq!(
            *sync.notifier().notices.borrow(),
            vec![Notice::Saved, Notice::Saved]
        );
    }

    #[tokio::test]
    async fn test_failed_save_notifies_error() {
        let api = FakeApi {
            fail_save: true,
            ..FakeApi::default()
        };
        let mut sync = sync_with(api);
        sync.editor_mut().load_state(EMPTY_STATE);

        let err = sync.save().await.unwrap_err();
        assert_eq!(err.status(), Some(409));
        assert_eq!(
            *sync.notifier().notices.borrow(),
            vec![Notice::Error("Note was modified elsewhere".into())]
        );
        assert_eq!(*sync.api().lists.lock().unwrap(), 0);
        assert!(sync.open_note().is_none());
    }

    #[tokio::test]
    async fn test_detach_all_labels_skips_empty_notes() {
        let label = Uuid::new_v4();
        let doc = document(vec![label]);
        let id = doc.note.note.id;
        let api = FakeApi {
            document: Mutex::new(Some(doc)),
            ..FakeApi::default()
        };
        let mut sync = sync_with(api);

        // Nothing open yet
        assert!(!sync.detach_all_labels().await.unwrap());

        sync.select(Some(id)).await.unwrap();
        assert!(sync.detach_all_labels().await.unwrap());
        assert!(sync.open_note().unwrap().labels.is_empty());

        // Already empty: no request
        assert!(!sync.detach_all_labels().await.unwrap());
        assert_eq!(*sync.api().detach_calls.lock().unwrap(), vec![(None, id)]);
        assert_eq!(*sync.api().lists.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_detach_label_updates_open_note() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let doc = document(vec![a, b]);
        let id = doc.note.note.id;
        let api = FakeApi {
            document: Mutex::new(Some(doc)),
            ..FakeApi::default()
        };
        let mut sync = sync_with(api);
        sync.select(Some(id)).await.unwrap();

        assert!(sync.detach_label(a).await.unwrap());
        assert_eq!(*sync.api().detach_calls.lock().unwrap(), vec![(Some(a), id)]);
        assert!(sync.notes().is_some());
    }

    #[test]
    fn test_preview_uses_editor_contents() {
        let mut sync = sync_with(FakeApi::default());
        sync.editor_mut().load_state(
            r#"{"root":{"type":"root","children":[{"type":"paragraph","children":[{"type":"text","text":"Detach all labels"}]},{"type":"image","src":"https://img.example/a.png"}]}}"#,
        );

        let preview = sync.preview().unwrap();
        assert_eq!(preview.excerpt, "Detach all labels");
        assert_eq!(preview.image.as_deref(), Some("https://img.example/a.png"));
    }
}
