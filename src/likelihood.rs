/*!
The data likelihood: a noise distribution centered at the forward operator's
output, evaluated at a fixed observed data vector.

Under the additive-noise model `data = G(m(x)) + e`, the log-likelihood of a
parameter `x` is the noise density evaluated at the residual,
`loglikelihood(x) = noise.logpdf(data - forward(x))`.
*/

use nalgebra::DVector;

use crate::distributions::Distribution;
use crate::error::Error;
use crate::geometry::Geometry;
use crate::model::{ForwardSolver, Model};

/// A noise distribution with its data argument fixed, wrapped around a forward
/// model. The observed data is immutable and must match the model's range
/// dimension.
#[derive(Debug, Clone)]
pub struct Likelihood<S, GD, GR> {
    model: Model<S, GD, GR>,
    noise: Distribution,
    data: DVector<f64>,
}

impl<S, GD, GR> Likelihood<S, GD, GR>
where
    S: ForwardSolver,
    GD: Geometry,
    GR: Geometry,
{
    /// Fixes `data` as the observation the likelihood is evaluated against.
    ///
    /// Fails with [`Error::DimensionMismatch`] if `data` or the noise
    /// distribution disagree with the model's range dimension.
    pub fn new(
        model: Model<S, GD, GR>,
        noise: Distribution,
        data: DVector<f64>,
    ) -> Result<Self, Error> {
        if data.len() != model.range_dim() {
            return Err(Error::DimensionMismatch {
                expected: model.range_dim(),
                actual: data.len(),
            });
        }
        if noise.dim() != model.range_dim() {
            return Err(Error::DimensionMismatch {
                expected: model.range_dim(),
                actual: noise.dim(),
            });
        }
        Ok(Self { model, noise, data })
    }

    /// The wrapped forward model.
    pub fn model(&self) -> &Model<S, GD, GR> {
        &self.model
    }

    /// The fixed observed data.
    pub fn data(&self) -> &DVector<f64> {
        &self.data
    }

    /// Log-likelihood of the parameter `x` under additive noise.
    ///
    /// Forward-solve failures propagate unchanged; the caller decides whether
    /// they are recoverable.
    pub fn loglikelihood(&self, x: &DVector<f64>) -> Result<f64, Error> {
        let predicted = self.model.forward(x)?;
        self.noise.logpdf(&(&self.data - predicted))
    }
}
