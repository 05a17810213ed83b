//! Opaque bearer credential handed over by the host.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Placeholder installed when the mini app runs without a host.
pub const DEV_PLACEHOLDER: &str = "dev_token_123456789";

/// An opaque bearer token.
///
/// The value is never parsed or validated. It lives in memory only and is
/// forwarded verbatim in an `Authorization` header.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    /// Wrap a raw token value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The standalone development placeholder.
    pub fn placeholder() -> Self {
        Self::new(DEV_PLACEHOLDER)
    }

    /// The raw token. Callers are responsible for not logging it.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// `Bearer <token>`, suitable for an `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }

    /// An empty token can be stored but never authorizes anything.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential(<redacted, {} bytes>)", self.0.len())
    }
}

impl From<String> for Credential {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Credential {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
