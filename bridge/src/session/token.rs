use uuid::Uuid;

use super::SessionError;
use crate::encoding::{decode_segment, decode_segment_str, encode_segment};
use crate::encryption::SessionKey;

/// The only artifact the legacy client keeps: `did.token_uuid.key`, each
/// segment URL-safe base64.
///
/// Whoever holds it can decrypt the matching session record; once it is
/// discarded the record can never be read again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpaqueToken {
    pub did: String,
    pub token_uuid: Uuid,
    pub key: SessionKey,
}

impl OpaqueToken {
    pub fn encode(&self) -> String {
        format!(
            "{}.{}.{}",
            encode_segment(self.did.as_bytes()),
            encode_segment(self.token_uuid.to_string().as_bytes()),
            encode_segment(self.key.as_bytes())
        )
    }

    pub fn parse(token: &str) -> Result<Self, SessionError> {
        let segments: Vec<&str> = token.trim().split('.').collect();
        let [did, token_uuid, key] = segments.as_slice() else {
            return Err(SessionError::TokenNotFound);
        };

        let did = decode_segment_str(did).map_err(|_| SessionError::TokenNotFound)?;
        let token_uuid = decode_segment_str(token_uuid)
            .ok()
            .and_then(|uuid| Uuid::parse_str(&uuid).ok())
            .ok_or(SessionError::TokenNotFound)?;
        let key = decode_segment(key)
            .ok()
            .and_then(|bytes| SessionKey::from_bytes(&bytes).ok())
            .ok_or(SessionError::InvalidToken)?;

        Ok(Self {
            did,
            token_uuid,
            key,
        })
    }
}
