//! Credential codec: builds the `Authorization` header value sent to the broker.
//!
//! The broker uses HTTP Basic authentication: `user:password` encoded as
//! standard base64 and prefixed with `Basic `.
//!
//! Usernames and passwords are bounded: the broker deployment this client
//! targets stores them in fixed-size fields, so an oversized value would be
//! cut on the other side and authenticate with a corrupted credential.  The
//! codec refuses such input and reports which bound was violated.

use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use thiserror::Error;

/// Maximum length in bytes of the username, the password, and the joined
/// `user:password` string.
pub const MAX_CREDENTIAL_LEN: usize = 127;

/// Which credential field violated a bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialField {
    Username,
    Password,
    /// The joined `user:password` string.
    Combined,
}

impl fmt::Display for CredentialField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CredentialField::Username => "username",
            CredentialField::Password => "password",
            CredentialField::Combined => "username:password",
        })
    }
}

/// Reasons a credential pair is refused before anything is sent.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("{field} is {len} bytes, maximum is {max}")]
    TooLong {
        field: CredentialField,
        len: usize,
        max: usize,
    },

    #[error("username must not be empty")]
    EmptyUsername,

    #[error("username must not contain ':'")]
    ColonInUsername,
}

/// A ready-to-send `Authorization` header value.
///
/// `Debug` never prints the encoded credential.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthHeader(String);

impl AuthHeader {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthHeader(Basic <redacted>)")
    }
}

/// Builds the `Authorization` header value for `username` / `password`.
///
/// The function is pure: the same inputs always produce the same value.
///
/// # Errors
///
/// Returns [`CredentialError`] if the username is empty or contains `:`, or
/// if any field exceeds [`MAX_CREDENTIAL_LEN`].
///
/// # Examples
///
/// ```rust
/// use qvd_core::build_auth_header;
///
/// let header = build_auth_header("alice", "secret").unwrap();
/// assert_eq!(header.as_str(), "Basic YWxpY2U6c2VjcmV0");
/// ```
pub fn build_auth_header(username: &str, password: &str) -> Result<AuthHeader, CredentialError> {
    if username.is_empty() {
        return Err(CredentialError::EmptyUsername);
    }
    if username.contains(':') {
        return Err(CredentialError::ColonInUsername);
    }
    check_len(CredentialField::Username, username.len())?;
    check_len(CredentialField::Password, password.len())?;
    // +1 for the ':' separator.
    check_len(CredentialField::Combined, username.len() + 1 + password.len())?;

    let userpwd = format!("{username}:{password}");
    Ok(AuthHeader(format!("Basic {}", BASE64_STANDARD.encode(userpwd))))
}

fn check_len(field: CredentialField, len: usize) -> Result<(), CredentialError> {
    if len > MAX_CREDENTIAL_LEN {
        return Err(CredentialError::TooLong {
            field,
            len,
            max: MAX_CREDENTIAL_LEN,
        });
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vector() {
        let header = build_auth_header("alice", "secret").unwrap();
        assert_eq!(header.as_str(), "Basic YWxpY2U6c2VjcmV0");
    }

    #[test]
    fn test_header_is_deterministic() {
        let a = build_auth_header("bob", "hunter2").unwrap();
        let b = build_auth_header("bob", "hunter2").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_header_does_not_contain_raw_credentials() {
        // Arrange
        let username = "carol-the-admin";
        let password = "PlainTextPassword!";

        // Act
        let header = build_auth_header(username, password).unwrap();

        // Assert
        assert!(!header.as_str().contains(username));
        assert!(!header.as_str().contains(password));
        assert!(header.as_str().is_ascii());
    }

    #[test]
    fn test_empty_password_is_accepted() {
        // "alice:" → YWxpY2U6
        let header = build_auth_header("alice", "").unwrap();
        assert_eq!(header.as_str(), "Basic YWxpY2U6");
    }

    #[test]
    fn test_non_ascii_credentials_are_encoded_as_utf8() {
        // "josé:ñ" in UTF-8
        let header = build_auth_header("josé", "ñ").unwrap();
        assert_eq!(header.as_str(), "Basic am9zw6k6w7E=");
    }

    #[test]
    fn test_username_at_bound_is_accepted_when_combined_fits() {
        let username = "u".repeat(MAX_CREDENTIAL_LEN - 1);
        assert!(build_auth_header(&username, "").is_ok());
    }

    #[test]
    fn test_oversized_username_reports_username_bound() {
        // Arrange
        let username = "u".repeat(MAX_CREDENTIAL_LEN + 1);

        // Act
        let err = build_auth_header(&username, "pw").unwrap_err();

        // Assert
        assert_eq!(
            err,
            CredentialError::TooLong {
                field: CredentialField::Username,
                len: MAX_CREDENTIAL_LEN + 1,
                max: MAX_CREDENTIAL_LEN,
            }
        );
    }

    #[test]
    fn test_oversized_password_reports_password_bound() {
        let password = "p".repeat(200);
        let err = build_auth_header("alice", &password).unwrap_err();
        assert!(matches!(
            err,
            CredentialError::TooLong { field: CredentialField::Password, len: 200, .. }
        ));
    }

    #[test]
    fn test_combined_overflow_is_rejected() {
        // Each field alone fits, the joined form does not: 64 + 1 + 64 = 129.
        let username = "u".repeat(64);
        let password = "p".repeat(64);

        let err = build_auth_header(&username, &password).unwrap_err();

        assert!(matches!(
            err,
            CredentialError::TooLong { field: CredentialField::Combined, len: 129, .. }
        ));
    }

    #[test]
    fn test_empty_username_is_rejected() {
        assert_eq!(build_auth_header("", "pw"), Err(CredentialError::EmptyUsername));
    }

    #[test]
    fn test_colon_in_username_is_rejected() {
        assert_eq!(
            build_auth_header("a:b", "pw"),
            Err(CredentialError::ColonInUsername)
        );
    }

    #[test]
    fn test_debug_output_redacts_credential() {
        let header = build_auth_header("alice", "secret").unwrap();
        let printed = format!("{header:?}");
        assert!(!printed.contains("YWxpY2U6c2VjcmV0"));
    }

    #[test]
    fn test_error_message_names_the_bound() {
        let err = build_auth_header(&"u".repeat(130), "").unwrap_err();
        assert_eq!(err.to_string(), "username is 130 bytes, maximum is 127");
    }
}
