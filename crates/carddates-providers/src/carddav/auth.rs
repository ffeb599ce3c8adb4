//! HTTP Basic authentication (RFC 7617).
//!
//! iCloud expects an app-specific password sent on every request; there is
//! no challenge round trip.

use std::fmt;

use base64::Engine;

/// Username and password for Basic authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// Creates credentials.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Returns the username.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the `Authorization` header value.
    pub fn header_value(&self) -> String {
        basic_auth(&self.username, &self.password)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Encodes a Basic `Authorization` header value.
pub fn basic_auth(username: &str, password: &str) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"));
    format!("Basic {encoded}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_auth_encoding() {
        // base64("user:password")
        assert_eq!(basic_auth("user", "password"), "Basic dXNlcjpwYXNzd29yZA==");
    }

    #[test]
    fn non_ascii_password() {
        let header = Credentials::new("jan", "wachtwoord€").header_value();
        let encoded = header.strip_prefix("Basic ").unwrap();
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), "jan:wachtwoord€");
    }

    #[test]
    fn debug_hides_password() {
        let creds = Credentials::new("me@icloud.com", "abcd-efgh-ijkl-mnop");
        let printed = format!("{creds:?}");
        assert!(printed.contains("me@icloud.com"));
        assert!(!printed.contains("abcd"));
    }
}
