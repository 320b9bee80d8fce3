//! Domain model types for the Pocket client.
//!
//! This module defines the values that flow through authorization:
//! - [`Secret`] - A wrapper for sensitive values that prevents accidental logging
//! - [`ConsumerKey`] - Identifier of the client application
//! - [`RequestToken`] - Short-lived token for a pending authorization attempt
//! - [`Authorization`] - The long-lived access token and the approving user

use serde::{Deserialize, Serialize};
use std::fmt;

/// A secret value that prevents accidental exposure in logs.
///
/// The inner value is only accessible via [`expose()`](Secret::expose).
/// Debug and Display implementations show `[REDACTED]` instead of the value.
/// Serializes as the bare string.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Create a new secret from a string value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the secret value.
    ///
    /// Use sparingly and never log the result.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Consume the secret and return the inner value.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret([REDACTED])")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

/// Identifier of the client application registered with Pocket.
///
/// Obtained once from the operator and cached on disk indefinitely.
///
/// # Examples
///
/// ```
/// use pocket_core::ConsumerKey;
///
/// let key = ConsumerKey::new("1234-abcd1234abcd1234abcd1234");
/// assert_eq!(key.expose(), "1234-abcd1234abcd1234abcd1234");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerKey(Secret);

impl ConsumerKey {
    /// Create a consumer key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(Secret::new(key))
    }

    /// Build a consumer key from the contents of the key file.
    ///
    /// Only the first line counts; anything after the first newline is ignored.
    /// Returns `None` when the first line is blank.
    pub fn from_file_contents(contents: &str) -> Option<Self> {
        let first = contents.split('\n').next().unwrap_or_default();
        let first = first.trim_end_matches('\r').trim();
        if first.is_empty() {
            None
        } else {
            Some(Self::new(first))
        }
    }

    /// Expose the key for use in a request.
    pub fn expose(&self) -> &str {
        self.0.expose()
    }
}

/// A request token for one pending authorization attempt.
///
/// Never persisted; it lives only for the duration of a single acquisition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestToken {
    /// The token issued by the service.
    pub code: Secret,

    /// The redirect target the token was issued for.
    pub redirect_uri: String,
}

impl RequestToken {
    /// Create a request token bound to the given redirect target.
    pub fn new(code: impl Into<String>, redirect_uri: impl Into<String>) -> Self {
        Self {
            code: Secret::new(code),
            redirect_uri: redirect_uri.into(),
        }
    }
}

/// The final artifact of the authorization flow.
///
/// Persisted as `{"access_token": "...", "username": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    /// Access token authorizing API calls on behalf of the user.
    pub access_token: Secret,

    /// The user who approved the request.
    pub username: String,
}

impl Authorization {
    /// Create a new authorization record.
    pub fn new(access_token: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            access_token: Secret::new(access_token),
            username: username.into(),
        }
    }
}
