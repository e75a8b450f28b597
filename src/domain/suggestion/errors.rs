// ============================================================================
// Suggestion Input Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SuggestionError {
    #[error("Invalid suggested date (expected yyyy-MM-dd): {0}")]
    InvalidDate(String),

    #[error("Invalid suggested time (expected HH:mm): {0}")]
    InvalidTime(String),

    #[error("Invalid duration (expected HH:mm): {0}")]
    InvalidDuration(String),

    #[error("Suggested work would end beyond the supported calendar range (starting {0})")]
    CompletionOutOfRange(String),
}
