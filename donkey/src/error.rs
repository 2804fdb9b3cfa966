//! Error kinds surfaced to the CLI.

/// Errors that end a donkey invocation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The definition file or the requested invocation is invalid. Never retried.
    #[error("{0}")]
    Config(String),

    /// At least one command exited non-zero.
    #[error("{message}")]
    RunFailure {
        message: String,
        /// Every attempted code, in command-line order.
        codes: Vec<i32>,
        /// First non-zero code; the suggested process exit status.
        exit_code: i32,
    },

    /// Unexpected I/O failure, e.g. the interpreter could not be spawned.
    #[error(transparent)]
    Io(#[from] anyhow::Error),
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }
}

/// Result type alias for donkey operations
pub type Result<T> = std::result::Result<T, Error>;
