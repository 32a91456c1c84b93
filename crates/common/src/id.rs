//! Identifier and token generation.

use ulid::Ulid;
use uuid::Uuid;

/// Generates row identifiers and session tokens.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    _private: (),
}

impl IdGenerator {
    /// Create a new ID generator.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }

    /// Lowercase ULID used as the primary key of most rows.
    ///
    /// Sorting these strings sorts rows by creation time, which the
    /// cursor-paginated listings rely on.
    #[must_use]
    pub fn generate(&self) -> String {
        Ulid::new().to_string().to_lowercase()
    }

    /// Opaque bearer token with no time component.
    #[must_use]
    pub fn generate_token(&self) -> String {
        format!(
            "{}{}",
            Uuid::new_v4().simple(),
            Uuid::new_v4().simple()
        )
    }
}
