//! Error types for ticket desk operations.

use thiserror::Error;

/// Result type alias for ticket desk operations.
pub type Result<T> = std::result::Result<T, DeskError>;

/// Error taxonomy of the ticket desk.
///
/// Every variant maps to one way a conversation reacts:
/// validation errors are re-prompted, lookups that miss get a neutral message,
/// storage failures get an apology, delivery failures are only logged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeskError {
    /// Malformed user input.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Requested product, ticket or code does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Record with the same unique key already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Identity is not allowed to use the administrator flow.
    #[error("Access denied")]
    Unauthorized,

    /// Storage unavailable or write rejected.
    #[error("Storage failure: {0}")]
    Persistence(String),

    /// Notification channel failed to deliver a message.
    #[error("Delivery failure: {0}")]
    Delivery(String),
}

impl DeskError {
    /// Whether the conversation recovers by asking the user again.
    #[must_use]
    pub const fn is_reprompt(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::AlreadyExists(_))
    }
}
