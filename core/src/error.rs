use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Snapper version {found} is too old (need at least {required})")]
    SnapperTooOld { found: String, required: String },

    #[error("Could not determine snapper version from output: {0}")]
    VersionUnreadable(String),

    #[error("Failed to launch `{command}`: {source}")]
    CommandLaunch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("Malformed response from `{command}`: {reason}")]
    MalformedResponse { command: String, reason: String },

    #[error("Invalid snapshot timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
