//! Error types for surface plot construction and rendering.
//!
//! Malformed input is rejected eagerly when a [`crate::grid::SampleGrid`] or
//! [`crate::colormap::ColorGradient`] is built. Hardware failures never abort a
//! plot. They are recorded and the plot falls back to the software renderer.

use thiserror::Error;

/// Result type alias using [`PlotError`] as the error type.
pub type Result<T> = std::result::Result<T, PlotError>;

/// Errors that can occur while building or driving a surface plot.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlotError {
    /// The grid needs at least two rows and two columns to form a quad.
    #[error("sample grid must be at least 2x2, got {rows}x{cols}")]
    GridTooSmall { rows: usize, cols: usize },

    /// A row of a nested grid has a different length than the first row.
    #[error("sample grid row {row} has {found} values, expected {expected}")]
    RaggedGrid {
        row: usize,
        expected: usize,
        found: usize,
    },

    /// A flat value buffer does not match `rows * cols`.
    #[error("sample grid holds {found} values, expected {expected}")]
    GridSizeMismatch { expected: usize, found: usize },

    /// Infinite samples would poison the z range and every derived colour.
    /// NaN is accepted and coloured with the first gradient stop.
    #[error("sample ({row}, {col}) is infinite")]
    InfiniteSample { row: usize, col: usize },

    /// A colour gradient was built without any stops.
    #[error("colour gradient needs at least one stop")]
    EmptyGradient,

    /// A colour string could not be parsed as `#rrggbb`.
    #[error("invalid hex colour `{0}`")]
    InvalidColour(String),

    /// No hardware context could be obtained for this plot.
    #[error("hardware rendering unavailable: {0}")]
    HardwareUnavailable(String),

    /// The surface shader failed validation on the device.
    #[error("shader compilation failed: {0}")]
    ShaderCompilation(String),

    /// A label font could not be loaded.
    #[error("label font could not be loaded: {0}")]
    Font(String),

    /// The plot was already cleaned up.
    #[error("surface plot has been cleaned up")]
    Disposed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_context() {
        let err = PlotError::RaggedGrid {
            row: 3,
            expected: 5,
            found: 4,
        };
        let msg = err.to_string();
        assert!(msg.contains("row 3"));
        assert!(msg.contains("expected 5"));

        let err = PlotError::GridTooSmall { rows: 1, cols: 7 };
        assert_eq!(err.to_string(), "sample grid must be at least 2x2, got 1x7");
    }
}
