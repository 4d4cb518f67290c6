/*!
The forward operator: a deterministic map from parameter coefficients to
predicted observation coefficients, via an external PDE solve.

The PDE discretization itself (mesh, basis functions, assembly, linear or
nonlinear solve) lives behind the [`ForwardSolver`] trait and is injected at
construction. This keeps the sampler and posterior isolated from any particular
discretization technology and lets tests substitute a mock solver. Fixed
boundary data is configuration of the collaborator and stays opaque to this
crate; the observation functional is likewise supplied by the collaborator,
composed with the range geometry's projection.

# Examples

```rust
use nalgebra::DVector;
use pde_bayes::error::Error;
use pde_bayes::geometry::Continuous1D;
use pde_bayes::model::{ForwardSolver, Model, Reparam};

/// A toy collaborator: "solves" by cumulative summation of the parameters.
struct CumSum;

impl ForwardSolver for CumSum {
    fn solve(&self, params: &DVector<f64>) -> Result<DVector<f64>, Error> {
        let mut acc = 0.0;
        Ok(params.map(|p| {
            acc += p;
            acc
        }))
    }
}

let domain = Continuous1D::equidistant(3, 0.0, 1.0);
let range = Continuous1D::equidistant(3, 0.0, 1.0);
let model = Model::new(CumSum, domain, range, Reparam::Identity);
let y = model.forward(&DVector::from_vec(vec![1.0, 2.0, 3.0])).unwrap();
assert_eq!(y, DVector::from_vec(vec![1.0, 3.0, 6.0]));
```
*/

use nalgebra::DVector;

use crate::error::Error;
use crate::geometry::Geometry;

/// The opaque external PDE-solve collaborator.
///
/// Given a (reparametrized) parameter vector, returns the solved field sampled
/// on the model's range geometry, or an [`Error::ForwardEvaluation`] when the
/// solve fails (e.g. solver non-convergence for that particular parameter).
pub trait ForwardSolver {
    /// Runs one forward solve.
    fn solve(&self, params: &DVector<f64>) -> Result<DVector<f64>, Error>;
}

/// Elementwise reparametrization applied to the coefficients before the solve.
#[derive(Debug, Clone, Copy)]
pub enum Reparam {
    /// Pass coefficients through unchanged.
    Identity,
    /// `exp` map, enforcing positivity of physical parameters such as
    /// conductivities.
    Exp,
    /// A collaborator-supplied elementwise map.
    Map(fn(f64) -> f64),
}

impl Reparam {
    /// Applies the map elementwise.
    pub fn apply(&self, x: &DVector<f64>) -> DVector<f64> {
        match self {
            Reparam::Identity => x.clone(),
            Reparam::Exp => x.map(f64::exp),
            Reparam::Map(f) => x.map(*f),
        }
    }
}

/// The forward operator `x -> G(m(x))`, composed of a reparametrization `m`,
/// an external solve `G`, and the range geometry's projection onto observation
/// coefficients.
///
/// `forward` is a pure function of `x`: repeated calls with the same input
/// yield the same output.
#[derive(Debug, Clone)]
pub struct Model<S, GD, GR> {
    solver: S,
    domain: GD,
    range: GR,
    reparam: Reparam,
}

impl<S, GD, GR> Model<S, GD, GR>
where
    S: ForwardSolver,
    GD: Geometry,
    GR: Geometry,
{
    /// Builds a forward operator from an injected solve collaborator.
    pub fn new(solver: S, domain: GD, range: GR, reparam: Reparam) -> Self {
        Self {
            solver,
            domain,
            range,
            reparam,
        }
    }

    /// Number of parameter coefficients.
    pub fn domain_dim(&self) -> usize {
        self.domain.dim()
    }

    /// Number of observation coefficients.
    pub fn range_dim(&self) -> usize {
        self.range.dim()
    }

    /// The geometry interpreting parameter coefficients.
    pub fn domain_geometry(&self) -> &GD {
        &self.domain
    }

    /// The geometry interpreting observation coefficients.
    pub fn range_geometry(&self) -> &GR {
        &self.range
    }

    /// Evaluates `G(m(x))`.
    ///
    /// Fails with [`Error::DimensionMismatch`] if `x` does not match the domain
    /// dimension, and propagates solve failures unchanged.
    pub fn forward(&self, x: &DVector<f64>) -> Result<DVector<f64>, Error> {
        if x.len() != self.domain.dim() {
            return Err(Error::DimensionMismatch {
                expected: self.domain.dim(),
                actual: x.len(),
            });
        }
        let params = self.reparam.apply(x);
        let field = self.solver.solve(&params)?;
        self.range.to_coeffs(&field)
    }
}
