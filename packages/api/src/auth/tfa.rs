//! Time-based one-time passwords (RFC 6238): HMAC-SHA1, 30 second steps,
//! six digits, one step of clock skew accepted either way.

use chrono::{DateTime, Utc};
use data_encoding::BASE32_NOPAD;
use hmac::{Hmac, Mac};
use oauth2::url::Url;
use rand::RngCore;
use sha1::Sha1;

use crate::error::ApiError;

type HmacSha1 = Hmac<Sha1>;

pub const STEP_SECONDS: i64 = 30;
pub const DIGITS: usize = 6;
const SKEW_STEPS: i64 = 1;
const SECRET_BYTES: usize = 20;
const ISSUER_NAME: &str = "Notes";

/// Fresh random secret, base32 without padding.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    BASE32_NOPAD.encode(&bytes)
}

fn decode_secret(secret: &str) -> Result<Vec<u8>, ApiError> {
    let normalized = secret.trim_end_matches('=').to_ascii_uppercase();
    BASE32_NOPAD
        .decode(normalized.as_bytes())
        .map_err(|e| ApiError::internal(format!("corrupt TOTP secret: {e}")))
}

/// HOTP value for one counter (RFC 4226 dynamic truncation).
pub fn code_at(key: &[u8], counter: u64) -> Result<u32, ApiError> {
    let mut mac = HmacSha1::new_from_slice(key).map_err(ApiError::internal)?;
    mac.update(&counter.to_be_bytes());
    let hash = mac.finalize().into_bytes();

    let offset = (hash[hash.len() - 1] & 0x0f) as usize;
    let binary = u32::from_be_bytes([
        hash[offset] & 0x7f,
        hash[offset + 1],
        hash[offset + 2],
        hash[offset + 3],
    ]);
    Ok(binary % 10u32.pow(DIGITS as u32))
}

/// Code for the step containing `now`, zero padded.
pub fn current_code(secret: &str, now: DateTime<Utc>) -> Result<String, ApiError> {
    let key = decode_secret(secret)?;
    let code = code_at(&key, (now.timestamp() / STEP_SECONDS) as u64)?;
    Ok(format!("{code:0width$}", width = DIGITS))
}

/// Time step whose code matches, searching the steps around `now`.
pub fn matching_step(
    secret: &str,
    code: &str,
    now: DateTime<Utc>,
) -> Result<Option<i64>, ApiError> {
    let code = code.trim();
    if code.len() != DIGITS || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(None);
    }
    let Ok(expected) = code.parse::<u32>() else {
        return Ok(None);
    };

    let key = decode_secret(secret)?;
    let counter = now.timestamp() / STEP_SECONDS;
    for step in counter - SKEW_STEPS..=counter + SKEW_STEPS {
        if step >= 0 && code_at(&key, step as u64)? == expected {
            return Ok(Some(step));
        }
    }
    Ok(None)
}

/// `otpauth://` provisioning URL for authenticator apps.
pub fn otpauth_url(secret: &str, account: &str) -> Result<String, ApiError> {
    let mut url = Url::parse("otpauth://totp/").map_err(ApiError::internal)?;
    url.set_path(&format!("/{ISSUER_NAME}:{account}"));
    url.query_pairs_mut()
        .append_pair("secret", secret)
        .append_pair("issuer", ISSUER_NAME)
        .append_pair("algorithm", "SHA1")
        .append_pair("digits", &DIGITS.to_string())
        .append_pair("period", &STEP_SECONDS.to_string());
    Ok(url.to_string())
}
