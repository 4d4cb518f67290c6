/*!
The unnormalized posterior density targeted by the sampler: the sum of the
prior log-density and the data log-likelihood.

A [`Posterior`] is pure composition. It borrows the prior and the likelihood
(their lifetimes must exceed its use), holds no other state, and propagates any
evaluation failure from below unchanged.
*/

use nalgebra::DVector;

use crate::distributions::Distribution;
use crate::error::Error;
use crate::geometry::Geometry;
use crate::likelihood::Likelihood;
use crate::model::ForwardSolver;

/// `logpdf(x) = prior.logpdf(x) + likelihood.loglikelihood(x)`, unnormalized.
#[derive(Debug)]
pub struct Posterior<'a, S, GD, GR> {
    prior: &'a Distribution,
    likelihood: &'a Likelihood<S, GD, GR>,
}

impl<'a, S, GD, GR> Posterior<'a, S, GD, GR>
where
    S: ForwardSolver,
    GD: Geometry,
    GR: Geometry,
{
    /// Combines a prior and a likelihood over the same parameter space.
    ///
    /// Fails with [`Error::ShapeMismatch`] when the prior dimension differs
    /// from the model's domain dimension.
    pub fn new(
        prior: &'a Distribution,
        likelihood: &'a Likelihood<S, GD, GR>,
    ) -> Result<Self, Error> {
        if prior.dim() != likelihood.model().domain_dim() {
            return Err(Error::ShapeMismatch {
                prior: prior.dim(),
                model: likelihood.model().domain_dim(),
            });
        }
        Ok(Self { prior, likelihood })
    }

    /// Dimensionality of the parameter space.
    pub fn dim(&self) -> usize {
        self.prior.dim()
    }

    /// The borrowed prior.
    pub fn prior(&self) -> &Distribution {
        self.prior
    }

    /// The borrowed likelihood.
    pub fn likelihood(&self) -> &Likelihood<S, GD, GR> {
        self.likelihood
    }

    /// Unnormalized posterior log-density at `x`.
    pub fn logpdf(&self, x: &DVector<f64>) -> Result<f64, Error> {
        Ok(self.prior.logpdf(x)? + self.likelihood.loglikelihood(x)?)
    }
}
