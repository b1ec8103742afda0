use base64::Engine;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use serde_json::Value as JsonValue;

use crate::types::IdentityClaims;

const LENIENT: GeneralPurposeConfig = GeneralPurposeConfig::new()
    .with_decode_padding_mode(DecodePaddingMode::Indifferent)
    .with_decode_allow_trailing_bits(true);

const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT);
const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT);

/// Why a token's payload segment could not be turned into display claims.
///
/// Always recoverable: the session stays authenticated by the raw token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum DecodeError {
    #[error("token has no payload segment")]
    MissingPayload,
    #[error("payload is not valid base64url: {0}")]
    Base64(String),
    #[error("payload is not valid UTF-8")]
    Utf8,
    #[error("payload is not valid JSON: {0}")]
    Json(String),
    #[error("payload is not a JSON object")]
    NotAnObject,
}

/// Reads display claims (`name`, `email`, `sub`) from a bearer token without
/// verifying its signature.
///
/// Verification is the backend's job; the values returned here are not
/// authenticated and are only fit for display.
///
/// # Errors
///
/// Returns [`DecodeError`] if the token has fewer than two segments, or the
/// payload is not base64url-encoded UTF-8 JSON object text.
pub fn decode_identity(token: &str) -> Result<IdentityClaims, DecodeError> {
    let payload = extract_payload_from_token(token)?;
    let payload_str = std::str::from_utf8(&payload).map_err(|_| DecodeError::Utf8)?;
    let json_value: JsonValue =
        serde_json::from_str(payload_str).map_err(|e| DecodeError::Json(e.to_string()))?;
    if !json_value.is_object() {
        return Err(DecodeError::NotAnObject);
    }

    Ok(IdentityClaims {
        name: string_claim(&json_value, "name"),
        email: string_claim(&json_value, "email"),
        subject: string_claim(&json_value, "sub"),
    })
}

/// Extracts the decoded payload bytes (second segment) of a compact token.
fn extract_payload_from_token(token: &str) -> Result<Vec<u8>, DecodeError> {
    let payload_b64 = token.split('.').nth(1).ok_or(DecodeError::MissingPayload)?;

    // Tokens minted by the web backend were read with a standard-alphabet
    // decoder, so accept `+` and `/` as well.
    let engine = if payload_b64.contains(['+', '/']) {
        &STANDARD_LENIENT
    } else {
        &URL_SAFE_LENIENT
    };
    engine
        .decode(payload_b64)
        .map_err(|e| DecodeError::Base64(e.to_string()))
}

fn string_claim(claims: &JsonValue, key: &str) -> Option<String> {
    claims.get(key).and_then(|v| v.as_str()).map(str::to_owned)
}
