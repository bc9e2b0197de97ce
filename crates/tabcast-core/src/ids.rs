//! Tab and stream-token identifiers.

use serde::{Deserialize, Serialize};

/// Opaque handle to the browser tab being captured.
///
/// Resolved once per session from the active, last-focused tab and never
/// revalidated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TabId(pub u32);

impl std::fmt::Display for TabId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Single-use credential authorizing capture of one tab's audio/video.
///
/// Not `Clone`: the token moves into the acquisition call, so a consumed
/// token cannot be presented a second time from safe code. Providers also
/// track spent values so a replayed value is rejected at runtime.
#[derive(Debug, PartialEq, Eq)]
pub struct StreamToken {
    value: String,
}

impl StreamToken {
    /// Wrap a platform-minted token value.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    /// Raw token value, as handed to the platform.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Consume the token, yielding the raw value.
    pub fn into_value(self) -> String {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tab_id_display() {
        assert_eq!(TabId(42).to_string(), "42");
    }

    #[test]
    fn test_token_consumed_by_value() {
        let token = StreamToken::new("tok-1");
        assert_eq!(token.value(), "tok-1");
        assert_eq!(token.into_value(), "tok-1");
    }
}
