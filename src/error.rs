//! Error types for the control-port client.
//!
//! The taxonomy distinguishes errors that end the connection (framing and
//! protocol violations, transport loss) from errors that leave it usable
//! (rejected commands, caller-side timeouts).

use std::io;
use thiserror::Error;

/// The error type for all control-port operations.
#[derive(Error, Debug)]
pub enum ControlError {
    /// I/O failure on the control transport.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A line exceeded the maximum length or was not valid line framing.
    #[error("framing error: {0}")]
    Framing(String),

    /// The reply state machine could not interpret incoming data.
    ///
    /// Fatal: the connection is torn down and must be re-established.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// The authentication handshake failed; the session is unusable.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The daemon answered a command with an error status code.
    ///
    /// The connection remains usable; whether this is fatal to the caller's
    /// task is the caller's decision.
    #[error("command rejected (code {code}): {message}")]
    CommandRejected {
        /// The status code returned by the daemon.
        code: u16,
        /// The error text from the reply.
        message: String,
    },

    /// A caller-supplied deadline elapsed before the reply arrived.
    ///
    /// The reply is still consumed in FIFO position when it eventually
    /// arrives, so later commands pair correctly.
    #[error("operation timed out")]
    Timeout,

    /// The control connection is closed; all outstanding work fails with this.
    #[error("connection closed")]
    ConnectionClosed,

    /// A reply was well-formed but its contents could not be interpreted.
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid configuration input.
    #[error("configuration error: {0}")]
    Config(String),

    /// The daemon or this client does not support the requested operation.
    #[error("not supported: {0}")]
    NotSupported(String),
}

impl ControlError {
    /// Whether this error ends the connection.
    ///
    /// After a fatal error the controller is in a terminal state: every
    /// further command fails with [`ControlError::ConnectionClosed`] and a
    /// new connection (with a fresh authentication handshake) is required.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ControlError::Io(_)
                | ControlError::Framing(_)
                | ControlError::Protocol(_)
                | ControlError::Authentication(_)
                | ControlError::ConnectionClosed
        )
    }
}

/// Result type alias for control-port operations.
pub type Result<T> = std::result::Result<T, ControlError>;

/// Reply status codes from the control protocol's fixed code table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 250 - OK
    Ok,
    /// 251 - Operation was unnecessary
    OperationUnnecessary,
    /// 252 - Resource exhausted, with additional info
    ResourceExhaustedInfo,
    /// 451 - Resource exhausted
    ResourceExhausted,
    /// 500 - Syntax error: protocol
    SyntaxError,
    /// 510 - Unrecognized command
    UnrecognizedCommand,
    /// 511 - Unimplemented command
    UnimplementedCommand,
    /// 512 - Syntax error in command argument
    SyntaxErrorArgument,
    /// 513 - Unrecognized command argument
    UnrecognizedArgument,
    /// 514 - Authentication required
    AuthenticationRequired,
    /// 515 - Bad authentication
    BadAuthentication,
    /// 550 - Unspecified daemon error
    UnspecifiedError,
    /// 551 - Internal error
    InternalError,
    /// 552 - Unrecognized entity
    UnrecognizedEntity,
    /// 553 - Invalid configuration value
    InvalidConfigValue,
    /// 554 - Invalid descriptor
    InvalidDescriptor,
    /// 555 - Unmanaged entity
    UnmanagedEntity,
    /// 650 - Asynchronous event notification
    AsyncEvent,
    /// Any code not in the table; classified by its century digit.
    Other(u16),
}

impl StatusCode {
    /// Look up a numeric code in the table.
    pub fn from_u16(code: u16) -> Self {
        match code {
            250 => StatusCode::Ok,
            251 => StatusCode::OperationUnnecessary,
            252 => StatusCode::ResourceExhaustedInfo,
            451 => StatusCode::ResourceExhausted,
            500 => StatusCode::SyntaxError,
            510 => StatusCode::UnrecognizedCommand,
            511 => StatusCode::UnimplementedCommand,
            512 => StatusCode::SyntaxErrorArgument,
            513 => StatusCode::UnrecognizedArgument,
            514 => StatusCode::AuthenticationRequired,
            515 => StatusCode::BadAuthentication,
            550 => StatusCode::UnspecifiedError,
            551 => StatusCode::InternalError,
            552 => StatusCode::UnrecognizedEntity,
            553 => StatusCode::InvalidConfigValue,
            554 => StatusCode::InvalidDescriptor,
            555 => StatusCode::UnmanagedEntity,
            650 => StatusCode::AsyncEvent,
            other => StatusCode::Other(other),
        }
    }
}

/// Whether a numeric code denotes a successful command reply (2xx).
pub fn is_success_code(code: u16) -> bool {
    (200..=299).contains(&code)
}

/// Whether a numeric code denotes an asynchronous event notification (6xx).
pub fn is_async_code(code: u16) -> bool {
    (600..=699).contains(&code)
}

/// Whether a numeric code denotes a command error (4xx transient, 5xx failure).
pub fn is_error_code(code: u16) -> bool {
    (400..=599).contains(&code)
}
