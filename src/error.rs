//! Error type for the identification core.
//!
//! Only structural misuse and malformed inputs are errors. An empty search
//! result or a frame that fails to match is a normal outcome and is returned
//! as a value.

use thiserror::Error;

/// Failures surfaced by index, masking and star construction calls.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StarIdError {
    /// A search was issued against an index that has not been sorted.
    #[error("spatial index must be sorted before searching")]
    Unsorted,

    /// A direction vector had zero length or non-finite components.
    #[error("degenerate direction vector [{0}, {1}, {2}]")]
    DegenerateDirection(f32, f32, f32),

    /// Flux was negative or not finite.
    #[error("invalid flux {0}")]
    InvalidFlux(f32),

    /// Positional variance was not strictly positive.
    #[error("invalid positional variance {0}")]
    InvalidVariance(f32),

    /// An operation that needs at least one star was given none.
    #[error("star database is empty")]
    EmptyDatabase,

    /// A caller-supplied mask does not line up with the index.
    #[error("mask length {actual} does not match index length {expected}")]
    MaskLength { expected: usize, actual: usize },

    /// Camera parameters failed validation.
    #[error("invalid camera configuration: {0}")]
    InvalidCamera(String),
}

pub type Result<T> = std::result::Result<T, StarIdError>;
