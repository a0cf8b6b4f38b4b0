//! Reads expiry hints out of backend-issued JWTs.
//!
//! Signatures are not verified. `exp` only schedules local refresh.

use serde_json::Value;

use crate::encoding::{decode_segment, EncodingError};
use crate::errors::ErrorKind;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JwtError {
    #[error("expected 3 dot-separated segments, got {0}")]
    SegmentCount(usize),
    #[error("payload segment is not valid url-safe base64: {0}")]
    Encoding(#[from] EncodingError),
    #[error("payload is not a JSON object")]
    NotAnObject,
    #[error("payload has no numeric `exp` claim")]
    MissingExp,
}

impl JwtError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}

/// Returns the `exp` claim of `token` as unix seconds.
pub fn extract_expiry(token: &str) -> Result<f64, JwtError> {
    let segments: Vec<&str> = token.split('.').collect();
    let [_, payload, _] = segments.as_slice() else {
        return Err(JwtError::SegmentCount(segments.len()));
    };

    let payload = decode_segment(payload)?;
    let claims: Value = serde_json::from_slice(&payload).map_err(|_| JwtError::NotAnObject)?;
    let claims = claims.as_object().ok_or(JwtError::NotAnObject)?;

    claims
        .get("exp")
        .and_then(Value::as_f64)
        .ok_or(JwtError::MissingExp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::encode_segment;

    fn token_with(payload: &str) -> String {
        format!(
            "{}.{}.not-a-real-signature",
            encode_segment(br#"{"alg":"ES256K","typ":"JWT"}"#),
            encode_segment(payload.as_bytes())
        )
    }

    #[test]
    fn reads_exp_without_checking_signature() {
        let token = token_with(r#"{"scope":"com.atproto.access","exp":1700000000}"#);
        assert_eq!(extract_expiry(&token).unwrap(), 1_700_000_000.0);
    }

    #[test]
    fn accepts_fractional_exp() {
        let token = token_with(r#"{"exp":1700000000.5}"#);
        assert_eq!(extract_expiry(&token).unwrap(), 1_700_000_000.5);
    }

    #[test]
    fn requires_three_segments() {
        assert_eq!(extract_expiry("a.b"), Err(JwtError::SegmentCount(2)));
        assert_eq!(extract_expiry("a.b.c.d"), Err(JwtError::SegmentCount(4)));
        assert_eq!(extract_expiry(""), Err(JwtError::SegmentCount(1)));
    }

    #[test]
    fn requires_numeric_exp() {
        assert_eq!(
            extract_expiry(&token_with(r#"{"sub":"did:plc:abc"}"#)),
            Err(JwtError::MissingExp)
        );
        assert_eq!(
            extract_expiry(&token_with(r#"{"exp":"1700000000"}"#)),
            Err(JwtError::MissingExp)
        );
    }

    #[test]
    fn requires_an_object_payload() {
        assert_eq!(extract_expiry(&token_with("[1,2,3]")), Err(JwtError::NotAnObject));
        assert_eq!(extract_expiry(&token_with("not json")), Err(JwtError::NotAnObject));
    }

    #[test]
    fn rejects_undecodable_payload() {
        assert!(matches!(
            extract_expiry("a.b!c.d"),
            Err(JwtError::Encoding(_))
        ));
    }
}
