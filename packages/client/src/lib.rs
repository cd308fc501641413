//! Client side of the notes service: an HTTP client for the API and the
//! logic that keeps an editor in sync with the stored note.

pub mod api;
pub mod error;
pub mod sync;

pub use api::{ApiClient, NotesApi};
pub use error::{ClientError, Result};
pub use sync::{DocumentSync, Editor, Notice, Notifier, OpenNote, Preview};
