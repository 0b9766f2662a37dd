//! WolfConsensus Error Types

use thiserror::Error;

/// Result type alias for consensus operations
pub type Result<T> = std::result::Result<T, Error>;

/// Consensus error types
#[derive(Error, Debug)]
pub enum Error {
    // Abort conditions
    #[error("Operation submitted in term {bound_term} cannot be replicated in term {current_term}")]
    TermMismatch { bound_term: u64, current_term: u64 },

    #[error("Shutdown in progress")]
    ShuttingDown,

    #[error("Operation aborted: {0}")]
    Aborted(String),

    // Role errors
    #[error("Not leader: current role is {0}")]
    NotLeader(String),

    #[error("Illegal state: {0}")]
    IllegalState(String),

    #[error("Invalid bootstrap info: {0}")]
    Bootstrap(String),

    // Collaborator errors
    #[error("Log store error: {0}")]
    LogStore(String),

    // Fault injection
    #[error("{0}")]
    Injected(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Check if this error aborted a round. The proposer may re-submit.
    pub fn is_aborted(&self) -> bool {
        matches!(
            self,
            Error::TermMismatch { .. } | Error::ShuttingDown | Error::Aborted(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abort_classification() {
        assert!(Error::TermMismatch { bound_term: 5, current_term: 6 }.is_aborted());
        assert!(Error::ShuttingDown.is_aborted());
        assert!(Error::Aborted("cancelled".into()).is_aborted());
        assert!(!Error::Injected("disk full".into()).is_aborted());
        assert!(!Error::NotLeader("FOLLOWER".into()).is_aborted());
    }

    #[test]
    fn test_injected_message_is_verbatim() {
        assert_eq!(Error::Injected("disk full".into()).to_string(), "disk full");
    }
}
