//! Error types used across the crate.

use thiserror::Error;

/// Catch-all error for this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// A particle, vertex or family that is not known to the model registry.
    #[error("model lookup failed for `{0}`")]
    ModelLookup(String),
    /// A tensor operation whose operands have incompatible index ranges, or a
    /// Feynman rule whose declared ranges do not match the vertex legs.
    #[error("tensor shape conflict: {0:?} vs {1:?}")]
    ShapeConflict(Vec<usize>, Vec<usize>),
    /// A process selection string that does not parse to the requested
    /// multiplicities.
    #[error("invalid process string `{0}`")]
    InvalidProcess(String),
    /// A kinematically infeasible request, for instance a total energy below
    /// the sum of the outgoing masses.
    #[error("infeasible kinematics: {0}")]
    Kinematics(String),
    /// A sampler asked to generate in a channel that admits no valid
    /// configuration.
    #[error("degenerate sampler: {0}")]
    Degenerate(String),
    /// A NaN or otherwise non-finite result.
    #[error("non-finite result in {0}")]
    NonFinite(&'static str),
    /// Error that does not originate from this crate.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Type alias for `Result` with the error type [`enum@Error`].
pub type Result<T> = std::result::Result<T, Error>;
