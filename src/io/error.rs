// src/io/error.rs
//
// Error taxonomy for the serial link and session layer.

use thiserror::Error;

/// Errors surfaced by the serial link and the session state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    /// No port name was supplied; device selection happens out-of-band.
    #[error("no port selected")]
    NoDeviceSelected,
    /// The OS refused to open the port (missing, busy, or permission denied).
    #[error("port unavailable: {0}")]
    DeviceUnavailable(String),
    /// The operation requires an active connection.
    #[error("not connected")]
    NotConnected,
    /// A connection is already open; disconnect first.
    #[error("already connected")]
    AlreadyConnected,
    /// A previous write is still in flight. Writes are not queued.
    #[error("a write is already in flight")]
    WriteBusy,
    /// The pending connect was aborted by a disconnect during the settle wait.
    #[error("connection cancelled")]
    Cancelled,
    /// Transport-level read/write failure.
    #[error("i/o error: {0}")]
    Io(String),
}
