//! Compact wire format for note payloads: JSON compressed with gzip.
//!
//! Editor trees are verbose and repetitive, so the save endpoint accepts
//! packed bodies alongside plain JSON.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Content type of a packed request body.
pub const PACKED_CONTENT_TYPE: &str = "application/x-note-pack";

/// Largest inflated body accepted, the same budget as a plain JSON body.
pub const MAX_UNPACKED_BYTES: usize = 2 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum PackError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("packed body inflates past {MAX_UNPACKED_BYTES} bytes")]
    TooLarge,
}

pub fn pack<T: Serialize>(value: &T) -> Result<Vec<u8>, PackError> {
    let json = serde_json::to_vec(value)?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json)?;
    Ok(encoder.finish()?)
}

pub fn unpack<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, PackError> {
    let mut json = Vec::new();
    GzDecoder::new(bytes)
        .take(MAX_UNPACKED_BYTES as u64 + 1)
        .read_to_end(&mut json)?;
    if json.len() > MAX_UNPACKED_BYTES {
        return Err(PackError::TooLarge);
    }
    Ok(serde_json::from_slice(&json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Payload {
        note_id: Option<String>,
        state: String,
    }

    #[test]
    fn test_pack_compresses_repetitive_state() {
        let payload = Payload {
            note_id: None,
            state: r#"{"type":"text","text":"a"},"#.repeat(200),
        };
        let packed = pack(&payload).unwrap();
        assert!(packed.len() < payload.state.len() / 4);
        assert_eq!(unpack::<Payload>(&packed).unwrap(), payload);
    }

    #[test]
    fn test_unpack_rejects_plain_json() {
        let err = unpack::<Payload>(br#"{"note_id":null,"state":""}"#).unwrap_err();
        assert!(matches!(err, PackError::Io(_)));
    }

    #[test]
    fn test_unpack_stops_at_size_limit() {
        let payload = Payload {
            note_id: None,
            state: "a".repeat(MAX_UNPACKED_BYTES),
        };
        let packed = pack(&payload).unwrap();
        assert!(packed.len() < MAX_UNPACKED_BYTES / 100);
        assert!(matches!(
            unpack::<Payload>(&packed),
            Err(PackError::TooLarge)
        ));

        let fits = Payload {
            note_id: None,
            state: "a".repeat(MAX_UNPACKED_BYTES - 64),
        };
        assert_eq!(unpack::<Payload>(&pack(&fits).unwrap()).unwrap(), fits);
    }
}
