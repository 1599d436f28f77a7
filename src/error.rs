//! Error types for the EGM link.
//!
//! Every layer has its own small error enum so callers can match on exactly the
//! failure they care about, and [`EgmError`] wraps all of them for `?`
//! propagation through the session API.
//!
//! ## Error Categories
//!
//! - **Decode Errors**: Datagrams that cannot be parsed as EGM messages
//! - **Transport Errors**: Socket binding, short writes, closed sockets
//! - **Sequencer Errors**: Operations that need recorded waypoints
//! - **Index Errors**: Joint queries outside `0..6`
//! - **Config / File Errors**: Loading configuration, writing RAPID exports
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use egm_bridge::{EgmError, TransportError};
//!
//! let error: EgmError = TransportError::SocketClosed.into();
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for EGM operations.
pub type Result<T, E = EgmError> = std::result::Result<T, E>;

/// A datagram could not be parsed into an EGM robot message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DecodeError {
    #[error("Malformed EGM message: {reason}")]
    Malformed { reason: String },
}

impl DecodeError {
    /// Helper constructor for malformed input.
    pub fn malformed(reason: impl Into<String>) -> Self {
        DecodeError::Malformed { reason: reason.into() }
    }
}

/// Socket-level failures of the UDP link.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TransportError {
    #[error("Address {addr} is already bound by another socket")]
    BindConflict {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Partial send: wrote {written} of {expected} bytes")]
    PartialSend { written: usize, expected: usize },

    #[error("Socket is closed")]
    SocketClosed,

    #[error("No controller address known yet")]
    NoRemote,

    #[error("Socket {operation} failed")]
    Io {
        operation: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl TransportError {
    /// Helper constructor for generic socket failures.
    pub fn io(operation: &'static str, source: std::io::Error) -> Self {
        TransportError::Io { operation, source }
    }
}

/// Waypoint sequencer failures. These are soft: the operation is a no-op.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum SequencerError {
    #[error("No waypoints recorded")]
    NoWaypoints,
}

/// Joint index outside the six axes of the arm.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum IndexError {
    #[error("Joint index {index} is out of range (expected 0..6)")]
    OutOfRange { index: usize },
}

/// Main error type for the EGM link.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum EgmError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Sequencer(#[from] SequencerError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("Configuration error in {path}: {details}")]
    Config { path: PathBuf, details: String },

    #[error("File error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl EgmError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            EgmError::Decode(_) => true,
            EgmError::Transport(TransportError::BindConflict { .. }) => true,
            EgmError::Transport(TransportError::PartialSend { .. }) => true,
            EgmError::Transport(TransportError::SocketClosed) => true,
            EgmError::Transport(TransportError::NoRemote) => true,
            EgmError::Transport(TransportError::Io { .. }) => true,
            EgmError::Sequencer(_) => false,
            EgmError::Index(_) => false,
            EgmError::Config { .. } => false,
            EgmError::File { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            EgmError::Decode(_) => vec![
                "Check that the sender speaks the EGM protobuf protocol",
                "Verify the RobotWare EGM version matches egm.proto",
            ],
            EgmError::Transport(TransportError::BindConflict { .. }) => vec![
                "Close other programs listening on the EGM port",
                "Change the port in the RobotStudio EGM configuration and config file",
            ],
            EgmError::Transport(TransportError::PartialSend { .. }) => vec![
                "Check the network interface MTU",
                "The next commanded position supersedes this one",
            ],
            EgmError::Transport(TransportError::SocketClosed) => vec![
                "Reconnect the session before sending",
                "Check whether shutdown was requested",
            ],
            EgmError::Transport(TransportError::NoRemote) => vec![
                "Start the EGM RAPID program on the controller",
                "Set remote_addr in the configuration",
            ],
            EgmError::Transport(TransportError::Io { .. }) => vec![
                "Check the network cable to the controller management port",
                "Verify firewall rules allow UDP traffic on the EGM port",
            ],
            EgmError::Sequencer(_) => vec!["Record at least one waypoint first"],
            EgmError::Index(_) => vec!["Use a joint index between 0 and 5"],
            EgmError::Config { .. } => vec![
                "Check YAML syntax of the configuration file",
                "Remove unknown keys from the configuration file",
            ],
            EgmError::File { .. } => vec![
                "Check the export directory exists and is writable",
                "Ensure sufficient disk space",
            ],
        }
    }

    /// Helper constructor for file errors with path context.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        EgmError::File { path, source }
    }

    /// Helper constructor for configuration errors.
    pub fn config_error(path: PathBuf, details: impl Into<String>) -> Self {
        EgmError::Config { path, details: details.into() }
    }
}
