//! Slack request signature verification
//!
//! Slack signs every request with HMAC-SHA256 over `v0:{timestamp}:{body}`,
//! keyed by the app's signing secret, and sends it as `X-Slack-Signature: v0=<hex>`.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

use crate::errors::NotifierError;

pub const SIGNATURE_HEADER: &str = "x-slack-signature";
pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";

const SIGNATURE_PREFIX: &str = "v0=";

/// Requests older (or newer) than this many seconds are replays
pub const MAX_REQUEST_AGE_SECS: u64 = 5 * 60;

/// Check a Slack request signature against the signing secret
///
/// `now` is the current Unix time in seconds.
pub fn verify_signature(
    secret: &SecretString,
    timestamp: &str,
    body: &[u8],
    signature: &str,
    now: i64,
) -> Result<(), NotifierError> {
    let sent_at: i64 = timestamp
        .parse()
        .map_err(|_| NotifierError::SignatureError(format!("invalid timestamp {}", timestamp)))?;
    if now.abs_diff(sent_at) > MAX_REQUEST_AGE_SECS {
        return Err(NotifierError::SignatureError(format!(
            "stale request timestamp {}",
            sent_at
        )));
    }

    let digest_hex = signature.strip_prefix(SIGNATURE_PREFIX).ok_or_else(|| {
        NotifierError::SignatureError("signature must use v0=<hex> format".to_string())
    })?;
    let digest = decode_hex(digest_hex)?;

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.expose_secret().as_bytes())
        .map_err(|e| NotifierError::Internal(e.to_string()))?;
    mac.update(b"v0:");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);
    mac.verify_slice(&digest)
        .map_err(|_| NotifierError::SignatureError("signature mismatch".to_string()))
}

fn decode_hex(raw: &str) -> Result<Vec<u8>, NotifierError> {
    if raw.is_empty() || raw.len() % 2 != 0 || !raw.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(NotifierError::SignatureError(
            "signature digest is not hex".to_string(),
        ));
    }

    raw.as_bytes()
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| NotifierError::SignatureError("signature digest is not hex".to_string()))
        })
        .collect()
}
