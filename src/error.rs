//! Error types for the IEC 60870-5-104 simulator.

use std::borrow::Cow;

use thiserror::Error;

/// Result type alias for IEC 104 operations.
pub type Result<T> = std::result::Result<T, Iec104Error>;

/// IEC 60870-5-104 protocol error types.
#[derive(Debug, Error)]
pub enum Iec104Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid frame format (start byte, length, control field)
    #[error("Invalid frame: {0}")]
    InvalidFrame(Cow<'static, str>),

    /// Invalid ASDU
    #[error("Invalid ASDU: {0}")]
    InvalidAsdu(Cow<'static, str>),

    /// Unknown type identifier
    #[error("Unknown type ID: {0}")]
    UnknownTypeId(u8),

    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(Cow<'static, str>),

    /// T1 timeout (send or test frame confirmation)
    #[error("T1 timeout: no confirmation received")]
    T1Timeout,

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Point catalog could not be loaded
    #[error("Point catalog error: {0}")]
    Catalog(#[from] serde_yaml::Error),
}

impl Iec104Error {
    /// Create a protocol error with a message.
    pub fn protocol(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create an invalid frame error.
    pub fn invalid_frame(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidFrame(msg.into())
    }

    /// Create an invalid ASDU error.
    pub fn invalid_asdu(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidAsdu(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Check if this error came from APCI framing.
    ///
    /// Framing errors leave the byte stream unsynchronized, so the
    /// connection that produced them has to be closed.
    pub fn is_framing_error(&self) -> bool {
        matches!(self, Self::InvalidFrame(_) | Self::Io(_))
    }

    /// Check if this error only concerns the content of one ASDU.
    pub fn is_asdu_error(&self) -> bool {
        matches!(self, Self::InvalidAsdu(_) | Self::UnknownTypeId(_))
    }
}
