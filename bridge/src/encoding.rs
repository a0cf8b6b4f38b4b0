use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodingError {
    #[error("url-safe base64 input has an impossible length {0}")]
    BadLength(usize),
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("decoded segment is not UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Turns standard base64 text into its URL-safe, unpadded form.
pub fn to_url_safe(standard: &str) -> String {
    standard
        .chars()
        .filter(|&c| c != '=')
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect()
}

/// Inverse of [`to_url_safe`]: maps the alphabet back and restores padding.
pub fn from_url_safe(url_safe: &str) -> Result<String, EncodingError> {
    let padding = match url_safe.len() % 4 {
        0 => "",
        2 => "==",
        3 => "=",
        _ => return Err(EncodingError::BadLength(url_safe.len())),
    };

    let mut standard: String = url_safe
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();
    standard.push_str(padding);
    Ok(standard)
}

/// Base64-encodes raw bytes into a URL-safe, unpadded token segment.
pub fn encode_segment(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Padded input is rejected; segments never carry `=`.
pub fn decode_segment(segment: &str) -> Result<Vec<u8>, EncodingError> {
    Ok(URL_SAFE_NO_PAD.decode(segment)?)
}

pub fn decode_segment_str(segment: &str) -> Result<String, EncodingError> {
    Ok(String::from_utf8(decode_segment(segment)?)?)
}
