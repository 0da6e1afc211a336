//! Driver errors

use pv_renderer::RenderError;

/// Errors raised while assembling or writing a diagram
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DriverError {
    /// The rendering engine rejected the scene or failed to write
    #[error(transparent)]
    Render(#[from] RenderError),
    /// A body is unknown to the ephemeris or its data is unusable
    #[error("Ephemeris error: {0}")]
    Ephemeris(String),
    /// Options are inconsistent or out of range
    #[error("Configuration error: {0}")]
    Config(String),
    /// Output could not be written or an input file could not be read
    #[error("IO error: {0}")]
    Io(String),
    /// A time or option string could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<std::io::Error> for DriverError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<std::fmt::Error> for DriverError {
    fn from(e: std::fmt::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// Result alias for driver operations
pub type DriverResult<T> = Result<T, DriverError>;
