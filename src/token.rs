// 🔑 Idempotency Token Manager
// One opaque token per in-progress entry session, attached to every row of a
// submission batch so the store can reject accidental resubmission.

use uuid::Uuid;

/// Manages the idempotency token for one entry session.
///
/// Rotation rule: rotate ONLY after a confirmed successful submission (or an
/// explicit user reset). A failed submission keeps the current token so the
/// retry reuses the same key and the store can deduplicate.
#[derive(Debug, Clone)]
pub struct TokenManager {
    current: String,
}

impl TokenManager {
    /// Create a manager with a freshly minted token
    pub fn new() -> Self {
        TokenManager {
            current: Self::mint(),
        }
    }

    /// Mint a globally unique token (UUID v4 rendered as text)
    pub fn mint() -> String {
        Uuid::new_v4().to_string()
    }

    /// The token for the in-progress session
    pub fn current(&self) -> &str {
        &self.current
    }

    /// Discard the current token, mint and return a new one
    pub fn rotate(&mut self) -> &str {
        self.current = Self::mint();
        &self.current
    }
}

impl Default for TokenManager {
    fn default() -> Self {
        Self::new()
    }
}
