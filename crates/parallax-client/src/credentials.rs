use std::fmt;

/// Opaque API-key material.
///
/// The `Debug` form never reveals any part of the key, not even its length,
/// so configs holding keys can be logged freely.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The raw key, for building auth headers. Must not escape into logs or
    /// error messages.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<String> for ApiKey {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl From<&str> for ApiKey {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}
