use std::path::PathBuf;

use thiserror::Error;

/// Malformed or unexpected bytes on the wire.
#[derive(Debug, Error)]
pub enum FramingError {
    #[error("no frame terminator found in {0} received bytes")]
    MissingTerminator(usize),

    #[error("text contains the frame terminator at byte {0}")]
    EmbeddedTerminator(usize),

    #[error("text frame exceeds {limit} bytes")]
    FrameTooLong { limit: usize },

    #[error("text frame is not valid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("upload of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: u64, limit: u64 },

    #[error("cannot parse hash acknowledgement {0:?}")]
    InvalidHash(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failures touching files, directories or ledgers on disk.
#[derive(Debug, Error)]
pub enum FilesystemError {
    #[error("directory {0:?} does not exist or is not a directory")]
    DirectoryMissing(PathBuf),

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed ledger {path:?} at line {line}: {reason}")]
    MalformedLedger {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("ledger key {0:?} contains a tab or newline")]
    InvalidLedgerKey(String),
}

impl FilesystemError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Anything that terminates a single session.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("peer closed the connection")]
    Closed,

    #[error("no data from peer for {0} seconds")]
    ReadTimeout(u64),

    #[error(transparent)]
    Framing(#[from] FramingError),

    #[error(transparent)]
    Filesystem(#[from] FilesystemError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Invalid startup settings; the server must not start.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("cannot read settings file {path:?}: {source}")]
    SettingsUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings file {path:?}: {source}")]
    SettingsInvalid {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid listen address {0:?}")]
    InvalidAddress(String),

    #[error("invalid listen port {0:?}")]
    InvalidPort(String),

    #[error("files directory {path:?} is unusable: {reason}")]
    FilesDirectory { path: PathBuf, reason: String },
}
