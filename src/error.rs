use std::num::ParseIntError;
use thiserror::Error;

/// Result alias for scan engine operations.
pub type Result<T> = std::result::Result<T, ScanError>;

/// A malformed token in a port specification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PortSpecError {
    #[error("port range {token:?} not two numbers separated by a hyphen")]
    TooManyHyphens { token: String },

    #[error("port range {token:?} is missing its lower bound")]
    MissingLowerBound { token: String },

    #[error("port range {token:?} is missing its upper bound")]
    MissingUpperBound { token: String },

    #[error("invalid port number {value:?}: {source}")]
    InvalidNumber {
        value: String,
        #[source]
        source: ParseIntError,
    },
}

/// Errors that stop a scan as a whole. Per-port network failures never end up here.
#[derive(Error, Debug)]
pub enum ScanError {
    /// Unparseable port specification.
    #[error("unable to parse port ranges: {0}")]
    PortSpec(#[from] PortSpecError),

    /// Rejected scan parameters.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The OS random source could not be read.
    #[error("unable to read from the system random source: {0}")]
    Entropy(#[from] rand::Error),

    /// A worker task panicked or was torn down unexpectedly.
    #[error("worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}
