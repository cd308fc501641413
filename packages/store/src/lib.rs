pub mod document;
pub mod error;
pub mod models;
pub mod packing;
pub mod repo;
pub mod wire;

mod memory;
pub use memory::MemoryStore;

#[cfg(feature = "postgres")]
mod postgres;
#[cfg(feature = "postgres")]
pub use postgres::PgStore;

pub use document::{DocumentError, EditorState, EXCERPT_LIMIT};
pub use error::{Result, StoreError};
pub use models::*;
pub use repo::Store;
