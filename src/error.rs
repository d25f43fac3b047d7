//! Error types for the laser-shutter crate.

use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

// =============================================================================
// Configuration Error
// =============================================================================

/// Malformed shape or frame input.
///
/// These are surfaced immediately and never retried: a frame is either built
/// completely from well-formed input or not at all.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// The flat color sequence does not have one entry per vertex.
    LengthMismatch {
        /// Total vertex count across all shapes.
        expected: usize,
        /// Number of colors supplied.
        actual: usize,
    },
    /// A shape asked for fewer than one copy of each vertex.
    InvalidRepeat { shape: usize, repeat: u32 },
    /// A shape's interpolation spacing is not a finite positive number.
    InvalidSpacing { shape: usize, spacing: f32 },
    /// The frame would exceed `limit` points; `shape` is where the running
    /// total crossed it.
    FrameTooLarge { shape: usize, limit: usize },
    /// A frame with no points was handed to the device.
    EmptyFrame,
    /// Any other invalid configuration.
    InvalidConfig(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::LengthMismatch { expected, actual } => write!(
                f,
                "color length mismatch: {} vertices but {} colors",
                expected, actual
            ),
            ConfigError::InvalidRepeat { shape, repeat } => {
                write!(f, "shape {}: point repeat must be >= 1, got {}", shape, repeat)
            }
            ConfigError::InvalidSpacing { shape, spacing } => write!(
                f,
                "shape {}: interpolation spacing must be finite and > 0, got {}",
                shape, spacing
            ),
            ConfigError::FrameTooLarge { shape, limit } => {
                write!(f, "shape {}: frame exceeds {} points", shape, limit)
            }
            ConfigError::EmptyFrame => write!(f, "frame contains no points"),
            ConfigError::InvalidConfig(msg) => write!(f, "{}", msg),
        }
    }
}

impl StdError for ConfigError {}

// =============================================================================
// Device Error
// =============================================================================

/// The adapter operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceOp {
    Enumerate,
    Open,
    Close,
    Status,
    Write,
    Stop,
    Shutter { open: bool },
}

impl fmt::Display for DeviceOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceOp::Enumerate => write!(f, "enumerate"),
            DeviceOp::Open => write!(f, "open"),
            DeviceOp::Close => write!(f, "close"),
            DeviceOp::Status => write!(f, "status"),
            DeviceOp::Write => write!(f, "write"),
            DeviceOp::Stop => write!(f, "stop"),
            DeviceOp::Shutter { open: true } => write!(f, "shutter open"),
            DeviceOp::Shutter { open: false } => write!(f, "shutter close"),
        }
    }
}

/// Hardware-side failures reported through the device adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// The device never reported ready within the poll budget.
    ///
    /// The caller may retry the whole operation.
    Timeout { op: DeviceOp, waited: Duration },
    /// The adapter reported a non-success status for the operation.
    Rejected { op: DeviceOp, code: i32 },
}

impl DeviceError {
    /// Returns the operation that failed.
    pub fn op(&self) -> DeviceOp {
        match self {
            DeviceError::Timeout { op, .. } | DeviceError::Rejected { op, .. } => *op,
        }
    }
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::Timeout { op, waited } => {
                write!(f, "{}: device not ready after {:?}", op, waited)
            }
            DeviceError::Rejected { op, code } => {
                write!(f, "{}: rejected by device (status {})", op, code)
            }
        }
    }
}

impl StdError for DeviceError {}

// =============================================================================
// Crate Error
// =============================================================================

/// Top-level error type.
#[derive(Debug)]
pub enum Error {
    /// Malformed input; see [`ConfigError`].
    Config(ConfigError),

    /// Hardware fault; see [`DeviceError`].
    Device(DeviceError),

    /// Guard or session misuse (double release, use after close, ...).
    InvalidState(String),

    /// Adapter-specific error (wrapped).
    Backend(Box<dyn StdError + Send + Sync>),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(e) => write!(f, "invalid configuration: {}", e),
            Error::Device(e) => write!(f, "device error: {}", e),
            Error::InvalidState(msg) => write!(f, "invalid state: {}", msg),
            Error::Backend(e) => write!(f, "backend error: {}", e),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Config(e) => Some(e),
            Error::Device(e) => Some(e),
            Error::Backend(e) => Some(e.as_ref()),
            Error::InvalidState(_) => None,
        }
    }
}

impl Error {
    /// Create an invalid state error with a message.
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Error::InvalidState(msg.into())
    }

    /// Create an invalid config error with a message.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Error::Config(ConfigError::InvalidConfig(msg.into()))
    }

    /// Create a rejected-operation error.
    pub fn rejected(op: DeviceOp, code: i32) -> Self {
        Error::Device(DeviceError::Rejected { op, code })
    }

    /// Create a backend error from any error type.
    pub fn backend(err: impl StdError + Send + Sync + 'static) -> Self {
        Error::Backend(Box::new(err))
    }

    /// Returns true if this is a configuration error.
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }

    /// Returns true if this is an InvalidState error.
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Error::InvalidState(_))
    }

    /// Returns true if the device never became ready.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Device(DeviceError::Timeout { .. }))
    }

    /// Returns true if the adapter rejected an operation.
    pub fn is_rejected(&self) -> bool {
        matches!(self, Error::Device(DeviceError::Rejected { .. }))
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<DeviceError> for Error {
    fn from(err: DeviceError) -> Self {
        Error::Device(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Backend(Box::new(err))
    }
}

/// Result type for session and guard operations.
pub type Result<T> = std::result::Result<T, Error>;
