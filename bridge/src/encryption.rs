use base64::{engine::general_purpose::STANDARD, Engine};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};

use crate::errors::ErrorKind;

pub const KEY_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VaultError {
    #[error("session key is malformed")]
    InvalidKey,
    #[error("ciphertext failed integrity verification")]
    Integrity,
    #[error("system random number generator failed")]
    Rng,
}

impl VaultError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VaultError::InvalidKey => ErrorKind::Validation,
            VaultError::Integrity | VaultError::Rng => ErrorKind::Integrity,
        }
    }
}

/// A per-session symmetric key.
///
/// Only ever held by the client inside its opaque token; the server sees it
/// for the duration of a single call.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionKey([u8; KEY_LEN]);

impl SessionKey {
    /// 256 bits from the OS CSPRNG.
    pub fn generate() -> Result<Self, VaultError> {
        let mut bytes = [0u8; KEY_LEN];
        SystemRandom::new()
            .fill(&mut bytes)
            .map_err(|_| VaultError::Rng)?;
        Ok(Self(bytes))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, VaultError> {
        let bytes: [u8; KEY_LEN] = bytes.try_into().map_err(|_| VaultError::InvalidKey)?;
        Ok(Self(bytes))
    }

    /// Parses the standard-base64 text form produced by [`SessionKey::encode`].
    pub fn decode(text: &str) -> Result<Self, VaultError> {
        let bytes = STANDARD.decode(text).map_err(|_| VaultError::InvalidKey)?;
        Self::from_bytes(&bytes)
    }

    pub fn encode(&self) -> String {
        STANDARD.encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    fn sealing_key(&self) -> Result<LessSafeKey, VaultError> {
        let unbound = UnboundKey::new(&AES_256_GCM, &self.0).map_err(|_| VaultError::InvalidKey)?;
        Ok(LessSafeKey::new(unbound))
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionKey(..)")
    }
}

/// Generates a fresh key in its textual form.
pub fn generate_key() -> Result<String, VaultError> {
    Ok(SessionKey::generate()?.encode())
}

/// AES-256-GCM seal. Output layout is `nonce || ciphertext || tag`.
pub fn encrypt(plaintext: &[u8], key: &SessionKey) -> Result<Vec<u8>, VaultError> {
    let sealing_key = key.sealing_key()?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    SystemRandom::new()
        .fill(&mut nonce_bytes)
        .map_err(|_| VaultError::Rng)?;

    let mut in_out = plaintext.to_vec();
    sealing_key
        .seal_in_place_append_tag(
            Nonce::assume_unique_for_key(nonce_bytes),
            Aad::empty(),
            &mut in_out,
        )
        .map_err(|_| VaultError::Integrity)?;

    let mut blob = Vec::with_capacity(NONCE_LEN + in_out.len());
    blob.extend_from_slice(&nonce_bytes);
    blob.extend_from_slice(&in_out);
    Ok(blob)
}

/// Opens a blob produced by [`encrypt`].
///
/// Corruption and a wrong key are indistinguishable here and both come back
/// as [`VaultError::Integrity`].
pub fn decrypt(blob: &[u8], key: &SessionKey) -> Result<Vec<u8>, VaultError> {
    if blob.len() < NONCE_LEN {
        return Err(VaultError::Integrity);
    }
    let (nonce_bytes, sealed) = blob.split_at(NONCE_LEN);
    let nonce = Nonce::try_assume_unique_for_key(nonce_bytes).map_err(|_| VaultError::Integrity)?;

    let opening_key = key.sealing_key()?;
    let mut in_out = sealed.to_vec();
    let plaintext = opening_key
        .open_in_place(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| VaultError::Integrity)?;
    Ok(plaintext.to_vec())
}

/// Encrypts a credential into the base64 text stored in a session record.
pub fn encrypt_to_string(plaintext: &str, key: &SessionKey) -> Result<String, VaultError> {
    Ok(STANDARD.encode(encrypt(plaintext.as_bytes(), key)?))
}

pub fn decrypt_from_string(encoded: &str, key: &SessionKey) -> Result<String, VaultError> {
    let blob = STANDARD.decode(encoded).map_err(|_| VaultError::Integrity)?;
    let plaintext = decrypt(&blob, key)?;
    String::from_utf8(plaintext).map_err(|_| VaultError::Integrity)
}
