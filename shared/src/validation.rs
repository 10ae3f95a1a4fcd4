pub const MAX_QUESTION_LENGTH: usize = 280;

/// Rejected input longer than this is cut before it is echoed in an error.
pub const MAX_ECHOED_INPUT: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Question must not be empty")]
    EmptyQuestion,
    #[error("Question exceeds maximum length of {MAX_QUESTION_LENGTH} characters")]
    QuestionTooLong,
    #[error("Question contains control characters")]
    ControlCharacters,
    #[error("Invalid survey id: {0}")]
    InvalidSurveyId(String),
    #[error("Invalid choice: {0} (must be yes or no)")]
    InvalidChoice(String),
}

/// Prefix of rejected input that is safe to put in an error message.
pub fn echo_input(raw: &str) -> String {
    raw.chars().take(MAX_ECHOED_INPUT).collect()
}

/// Checks question text and returns it trimmed, ready to be stored.
pub fn validate_question(question: &str) -> Result<String, ValidationError> {
    let trimmed = question.trim();
    if trimmed.is_empty() { return Err(ValidationError::EmptyQuestion); }
    if trimmed.chars().count() > MAX_QUESTION_LENGTH { return Err(ValidationError::QuestionTooLong); }
    if trimmed.chars().any(char::is_control) { return Err(ValidationError::ControlCharacters); }

    Ok(trimmed.to_string())
}
