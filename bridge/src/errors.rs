/// Coarse classification shared by every error in the crate.
///
/// Boundary layers map these onto whatever the legacy client expects; nothing
/// in this crate retries on any of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed handle, token or identifier input.
    Validation,
    /// Handle, DID or PDS discovery failed.
    Resolution,
    /// The backend rejected the supplied credentials.
    Authentication,
    /// The refresh credential has lapsed; the user must log in again.
    RefreshExpired,
    /// Decryption or tag verification failed. Always fatal.
    Integrity,
    /// I/O failure talking to an upstream service.
    TransientNetwork,
    /// The session record store failed.
    Storage,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Resolution => "resolution",
            ErrorKind::Authentication => "authentication",
            ErrorKind::RefreshExpired => "refresh_expired",
            ErrorKind::Integrity => "integrity",
            ErrorKind::TransientNetwork => "transient_network",
            ErrorKind::Storage => "storage",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_snake_case() {
        assert_eq!(ErrorKind::RefreshExpired.to_string(), "refresh_expired");
        assert_eq!(ErrorKind::TransientNetwork.to_string(), "transient_network");
    }
}
