//! Renderer errors
//!
//! Geometry never fails. Errors come only from configuration checks made
//! when a scene or viewport is set up, from fixed engine capacities, and
//! from the output sink.

/// Errors raised while setting up or rendering a scene
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderError {
    /// Field of view, viewport or light source parameters are unusable, or
    /// a configuration file does not parse
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    /// More bodies than the engine supports
    #[error("Too many bodies: {count} (maximum {max})")]
    TooManyBodies {
        /// Bodies requested
        count: usize,
        /// Engine limit
        max: usize,
    },
    /// More light sources than the engine supports
    #[error("Too many light sources: {count} (maximum {max})")]
    TooManyLights {
        /// Lights requested
        count: usize,
        /// Engine limit
        max: usize,
    },
    /// An entity generated more candidate segments than the engine allows
    #[error("Segment budget exceeded: {count} segments (maximum {max})")]
    SegmentBudgetExceeded {
        /// Segments generated
        count: usize,
        /// Engine limit
        max: usize,
    },
    /// A drawable referred to a body that is not in the scene
    #[error("Body index {0} is not in the scene")]
    BodyIndex(usize),
    /// Output sink failure
    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for RenderError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// Result alias for renderer operations
pub type RenderResult<T> = Result<T, RenderError>;
