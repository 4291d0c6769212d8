//! ExportError: unified error type for the result-export pipeline.
//!
//! Every public entry point returns `Result<_, ExportError>`. Capability and
//! topology errors are fatal for the caller; validation anomalies found while
//! extracting cell data are never reported through this type (they are logged).

use thiserror::Error;

/// Unified error type for export operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExportError {
    /// The persistence capability was not built in and no backend was supplied.
    #[error("result output is not available ({0}); rebuild with the `file-output` feature or supply a backend")]
    BackendUnavailable(&'static str),
    /// A connection whose cartesian delta matches more than one axis.
    #[error(
        "connection between cartesian cells {cell1} and {cell2} (delta {delta}) matches more than one axis"
    )]
    AmbiguousConnection {
        cell1: usize,
        cell2: usize,
        delta: usize,
    },
    /// A restart field that was requested is absent from the persisted record.
    #[error("restart field `{0}` is required but missing from the record")]
    MissingRestartField(String),
    /// No persisted step record with the given episode index.
    #[error("no restart record for episode {0}")]
    RestartRecordNotFound(usize),
    /// Distributed runs must supply global transmissibilities.
    #[error("distributed run has no global transmissibility provider")]
    MissingGlobalTransmissibility,
    /// A cell index fell outside the addressed range.
    #[error("cell index {cell} out of range (size {size})")]
    CellOutOfRange { cell: usize, size: usize },
    /// The global grid description is inconsistent.
    #[error("invalid grid: {0}")]
    InvalidGrid(String),
    /// A buffer did not have the length its index space requires.
    #[error("buffer `{name}` has length {found}, expected {expected}")]
    BufferSizeMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
    /// A summary or block keyword the output module cannot produce.
    #[error("unsupported output keyword `{0}`")]
    UnsupportedKeyword(String),
    /// An operation reserved for the I/O rank was invoked elsewhere.
    #[error("`{0}` is only valid on the I/O rank")]
    NotIoRank(&'static str),
    /// Another rank failed during a collective exchange.
    #[error("rank {rank} failed: {reason}")]
    RankFailed { rank: usize, reason: String },
    /// Message passing failed or delivered a malformed message.
    #[error("communication error: {0}")]
    Communication(String),
    /// Encoding or decoding a payload failed.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// Filesystem failure reported by a persistence backend.
    #[error("I/O error: {0}")]
    Io(String),
    /// Persisting a step record failed.
    #[error("writing episode {episode} failed: {reason}")]
    WriteFailed { episode: usize, reason: String },
    /// The background worker is gone (it panicked or was shut down).
    #[error("background writer thread is no longer running")]
    WorkerDisconnected,
}

impl From<std::io::Error> for ExportError {
    fn from(err: std::io::Error) -> Self {
        ExportError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ExportError {
    fn from(err: serde_json::Error) -> Self {
        ExportError::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for ExportError {
    fn from(err: bincode::Error) -> Self {
        ExportError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_convert_with_message() {
        let err: ExportError =
            std::io::Error::new(std::io::ErrorKind::NotFound, "no such dir").into();
        assert_eq!(err, ExportError::Io("no such dir".into()));
    }

    #[test]
    fn ambiguous_connection_names_both_cells() {
        let err = ExportError::AmbiguousConnection {
            cell1: 0,
            cell2: 1,
            delta: 1,
        };
        let msg = err.to_string();
        assert!(msg.contains("0") && msg.contains("1"));
    }
}
