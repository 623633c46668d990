//! Credential resolution.
//!
//! A single `Authorization` header is attached at dial time. Its value is
//! picked by a fixed priority:
//!
//! 1. explicit access token → `Bearer <token>`
//! 2. explicit API key → `token <key>`
//! 3. [`ACCESS_TOKEN_ENV`] → `Bearer <token>`
//! 4. [`API_KEY_ENV`] → `token <key>`

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

// ============================================================================
// Constants
// ============================================================================

/// Environment variable holding a short-lived access token.
pub const ACCESS_TOKEN_ENV: &str = "VOXSTREAM_ACCESS_TOKEN";

/// Environment variable holding a long-lived API key.
pub const API_KEY_ENV: &str = "VOXSTREAM_API_KEY";

// ============================================================================
// Credential
// ============================================================================

/// A resolved credential.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Bearer-style access token.
    AccessToken(String),
    /// Legacy key-style credential.
    ApiKey(String),
}

impl Credential {
    /// Resolves the credential by priority.
    ///
    /// `env` looks up an environment variable; blank values count as unset.
    #[must_use]
    pub fn resolve(
        access_token: Option<&str>,
        api_key: Option<&str>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Option<Self> {
        if let Some(token) = access_token.filter(|t| !t.trim().is_empty()) {
            return Some(Self::AccessToken(token.to_string()));
        }
        if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
            return Some(Self::ApiKey(key.to_string()));
        }
        if let Some(token) = env(ACCESS_TOKEN_ENV).filter(|t| !t.trim().is_empty()) {
            return Some(Self::AccessToken(token));
        }
        env(API_KEY_ENV)
            .filter(|k| !k.trim().is_empty())
            .map(Self::ApiKey)
    }

    /// Returns the `Authorization` header value.
    #[must_use]
    pub fn authorization(&self) -> String {
        match self {
            Self::AccessToken(token) => format!("Bearer {token}"),
            Self::ApiKey(key) => format!("token {key}"),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AccessToken(_) => f.write_str("AccessToken(<redacted>)"),
            Self::ApiKey(_) => f.write_str("ApiKey(<redacted>)"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
