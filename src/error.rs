//! The error taxonomy shared by all modules of this crate.
//!
//! Construction-time validation failures ([`Error::InvalidCovariance`],
//! [`Error::SingularPrecision`], [`Error::ShapeMismatch`], [`Error::InvalidScale`])
//! are fatal and surface before any sampling begins. [`Error::ForwardEvaluation`]
//! marks a failed PDE solve for one specific proposal; the pCN sampler absorbs it
//! as an auto-rejection so a single bad proposal cannot abort a long sampling
//! campaign. Everything else halts sampling and discards the in-progress chain.

use thiserror::Error;

/// Errors produced by geometries, distributions, models and samplers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A vector length does not match the declared dimension.
    #[error("dimension mismatch: expected length {expected}, got {actual}")]
    DimensionMismatch {
        /// The declared dimension.
        expected: usize,
        /// The offending length.
        actual: usize,
    },

    /// A covariance matrix failed the symmetric positive-definite check.
    #[error("covariance matrix is not symmetric positive-definite")]
    InvalidCovariance,

    /// An assembled precision matrix admits no Cholesky factor, so the
    /// distribution cannot be sampled from.
    #[error("precision matrix is singular")]
    SingularPrecision,

    /// Prior and forward model disagree on the parameter dimension.
    #[error("prior dimension {prior} does not match model domain dimension {model}")]
    ShapeMismatch {
        /// Dimension declared by the prior.
        prior: usize,
        /// Domain dimension declared by the model.
        model: usize,
    },

    /// The external PDE solve failed for one proposed parameter vector.
    #[error("forward solve failed: {0}")]
    ForwardEvaluation(String),

    /// Invalid burn-in or thinning arguments for a chain of the given length.
    #[error("invalid burn-in/thinning: burn-in {burn}, stride {thin}, chain length {len}")]
    InvalidRange {
        /// Requested burn-in.
        burn: usize,
        /// Requested thinning stride.
        thin: usize,
        /// Length of the chain being transformed.
        len: usize,
    },

    /// The pCN proposal scale lies outside `(0, 1]`.
    #[error("pCN scale must lie in (0, 1], got {0}")]
    InvalidScale(f64),
}

impl Error {
    /// Whether the sampler may absorb this error as an auto-rejected proposal.
    ///
    /// Only per-proposal solve failures are recoverable; configuration errors
    /// (dimension or shape mismatches propagated from below) are fatal.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::ForwardEvaluation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverability_split() {
        assert!(Error::ForwardEvaluation("diverged".into()).is_recoverable());
        assert!(!Error::DimensionMismatch {
            expected: 3,
            actual: 2
        }
        .is_recoverable());
        assert!(!Error::SingularPrecision.is_recoverable());
    }

    #[test]
    fn display_includes_lengths() {
        let msg = Error::DimensionMismatch {
            expected: 30,
            actual: 29,
        }
        .to_string();
        assert!(msg.contains("30") && msg.contains("29"));
    }
}
