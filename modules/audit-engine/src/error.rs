//! Typed error enums for each failing module.

use thiserror::Error;

/// Errors raised by a rule analyzer. Analyzer bugs are not swallowed —
/// they propagate and abort the audit (see `OrchestratorError::Analyzer`).
#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("account code '{0}' referenced in the general ledger is not present in the chart of accounts")]
    UnknownAccount(String),

    #[error("journal entry group '{0}' does not balance: debits {1} != credits {2}")]
    UnbalancedEntryGroup(String, f64, f64),

    #[error("analyzer task panicked or was cancelled: {0}")]
    WorkerOffload(String),
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("rate limit exceeded")]
    RateLimited,

    #[error("quota exceeded after {attempts} attempts: {message}")]
    QuotaExceeded { attempts: u32, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("response could not be parsed as JSON: {0}")]
    InvalidJson(String),

    #[error("response was a bare scalar, expected an object or array")]
    ScalarResponse,

    #[error("content blocked by provider: {0}")]
    Blocked(String),
}

impl LlmError {
    /// Whether this error belongs to the retryable phrase set: rate-limit,
    /// quota, 429, 500, 503, overloaded, unavailable, timeout, resource
    /// exhausted.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::RateLimited | LlmError::QuotaExceeded { .. } => true,
            LlmError::Transport(msg) => is_retryable_message(msg),
            LlmError::InvalidJson(_) | LlmError::ScalarResponse | LlmError::Blocked(_) => false,
        }
    }
}

/// Classifies a raw error message against the retryable phrase set.
pub fn is_retryable_message(message: &str) -> bool {
    const RETRYABLE_PHRASES: &[&str] = &[
        "rate limit",
        "rate-limit",
        "quota",
        "429",
        "500",
        "503",
        "overloaded",
        "unavailable",
        "timeout",
        "resource exhausted",
    ];
    let lower = message.to_lowercase();
    RETRYABLE_PHRASES.iter().any(|p| lower.contains(p))
}

#[derive(Debug, Error)]
pub enum AuditRecordError {
    #[error("record '{0}' was already finalized")]
    AlreadyFinalized(String),

    #[error("failed to canonicalize record for hashing: {0}")]
    Canonicalization(String),
}

#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("unknown operation id: {0}")]
    UnknownOperation(String),
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("analyzer failure: {0}")]
    Analyzer(#[from] AnalyzerError),

    #[error("audit record failure: {0}")]
    AuditRecord(#[from] AuditRecordError),

    #[error("progress tracker failure: {0}")]
    Progress(#[from] ProgressError),

    #[error("unknown resume phase: {0}")]
    UnknownResumePhase(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {0} must be set")]
    MissingVar(String),

    #[error("environment variable {0} has an invalid value: {1}")]
    InvalidValue(String, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_retryable_phrases_case_insensitively() {
        assert!(is_retryable_message("429 Too Many Requests"));
        assert!(is_retryable_message("Service Overloaded, try again"));
        assert!(is_retryable_message("QUOTA exceeded for today"));
        assert!(!is_retryable_message("invalid argument: malformed prompt"));
    }

    #[test]
    fn llm_error_retryability() {
        assert!(LlmError::RateLimited.is_retryable());
        assert!(LlmError::QuotaExceeded { attempts: 3, message: "x".into() }.is_retryable());
        assert!(!LlmError::ScalarResponse.is_retryable());
        assert!(!LlmError::Blocked("safety filter".into()).is_retryable());
    }
}
