use thiserror::Error;

/// Top-level error type used across the entire workspace.
#[derive(Debug, Error)]
pub enum LimitError {
    #[error("config error: {0}")]
    Config(String),

    #[error("cannot resolve current process: {0}")]
    ProcessResolution(String),

    #[error("cannot read CPU counters: {0}")]
    CounterRead(String),

    #[error("limiter already started")]
    AlreadyStarted,

    #[error("limiter has been stopped")]
    Stopped,

    #[error("runtime error: {0}")]
    Runtime(String),

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

pub type Result<T, E = LimitError> = std::result::Result<T, E>;
