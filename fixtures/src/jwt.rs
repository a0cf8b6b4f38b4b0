//! Unsigned JWT-shaped tokens. Only the payload matters to the bridge.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde_json::{json, Value};

pub const ACCESS_SCOPE: &str = "com.atproto.access";
pub const REFRESH_SCOPE: &str = "com.atproto.refresh";

pub fn now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or_default()
}

/// Builds `header.payload.signature` around arbitrary claims.
pub fn mint(claims: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"ES256K","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.fixture-signature")
}

pub fn mint_session_token(scope: &str, did: &str, exp: i64, jti: u64) -> String {
    mint(&json!({
        "scope": scope,
        "sub": did,
        "iat": now(),
        "exp": exp,
        "jti": format!("fixture-{jti}"),
    }))
}

/// Reads the claims back out of a token minted here. No verification.
pub fn claims(token: &str) -> Option<Value> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    serde_json::from_slice(&bytes).ok()
}
