use store::packing::PackError;
use store::DocumentError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    /// The server answered with an error status and `{"message"}` body.
    #[error("{message}")]
    Server { status: u16, message: String },

    #[error("Packing error: {0}")]
    Pack(#[from] PackError),

    #[error("Invalid document: {0}")]
    Document(#[from] DocumentError),

    #[error("Not signed in")]
    NotSignedIn,
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Server { status, .. } => Some(*status),
            ClientError::Request(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
