/*!
Probability distributions over coefficient vectors: a dense-covariance Gaussian
and a Gaussian Markov Random Field (GMRF) prior whose precision matrix is
assembled from a discrete differential operator.

The family is a closed set of variants behind one capability surface
([`Distribution`]), so the posterior and the sampler are written once against
`logpdf` / `sample` / `perturbation` / `dim` rather than against open-ended
generics. Both variants validate themselves once at construction by attempting
a Cholesky factorization; per-call evaluation never re-validates.

# Examples

```rust
use nalgebra::{DMatrix, DVector};
use pde_bayes::distributions::{Boundary, Distribution, Gaussian, Gmrf};
use rand::{rngs::SmallRng, SeedableRng};

let mean = DVector::zeros(2);
let cov = DMatrix::from_row_slice(2, 2, &[4.0, 2.0, 2.0, 3.0]);
let gauss = Gaussian::new(mean, cov).unwrap();
let mut rng = SmallRng::seed_from_u64(42);
let x = gauss.sample(&mut rng);
println!("logpdf at draw: {}", gauss.logpdf(&x).unwrap());

let prior: Distribution = Gmrf::new(DVector::zeros(30), 25.0, 1, Boundary::Zero)
    .unwrap()
    .into();
assert_eq!(prior.dim(), 30);
```
*/

use nalgebra::{Cholesky, DMatrix, DVector, Dyn};
use rand::Rng;
use rand_distr::StandardNormal;
use std::f64::consts::PI;

use crate::error::Error;

/// Boundary handling for the GMRF finite-difference operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    /// Dirichlet zero padding beyond both ends.
    Zero,
    /// Indices wrap modulo the dimension.
    Periodic,
    /// One-sided differences at the ends.
    Neumann,
}

/// A multivariate Gaussian with explicit dense covariance.
///
/// The covariance is checked once at construction: it must be symmetric and
/// admit a Cholesky factor, otherwise [`Error::InvalidCovariance`] is returned.
#[derive(Debug, Clone)]
pub struct Gaussian {
    mean: DVector<f64>,
    chol: Cholesky<f64, Dyn>,
    factor_l: DMatrix<f64>,
    log_det_cov: f64,
}

impl Gaussian {
    /// Creates a Gaussian from a mean vector and a dense covariance matrix.
    pub fn new(mean: DVector<f64>, cov: DMatrix<f64>) -> Result<Self, Error> {
        let d = mean.len();
        if cov.nrows() != d || cov.ncols() != d {
            return Err(Error::DimensionMismatch {
                expected: d,
                actual: cov.nrows().max(cov.ncols()),
            });
        }
        let asym = (&cov - cov.transpose()).amax();
        if asym > 1e-10 * cov.amax().max(1.0) {
            return Err(Error::InvalidCovariance);
        }
        let chol = Cholesky::new(cov).ok_or(Error::InvalidCovariance)?;
        let factor_l = chol.l();
        let log_det_cov = 2.0 * factor_l.diagonal().map(f64::ln).sum();
        Ok(Self {
            mean,
            chol,
            factor_l,
            log_det_cov,
        })
    }

    /// Creates a Gaussian with covariance `var * I`.
    pub fn isotropic(mean: DVector<f64>, var: f64) -> Result<Self, Error> {
        let d = mean.len();
        Self::new(mean, DMatrix::identity(d, d) * var)
    }

    /// Dimensionality of the distribution.
    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    /// The mean vector.
    pub fn mean(&self) -> &DVector<f64> {
        &self.mean
    }

    /// Normalized log-density at `x`.
    pub fn logpdf(&self, x: &DVector<f64>) -> Result<f64, Error> {
        if x.len() != self.dim() {
            return Err(Error::DimensionMismatch {
                expected: self.dim(),
                actual: x.len(),
            });
        }
        let diff = x - &self.mean;
        let quad = diff.dot(&self.chol.solve(&diff));
        let d = self.dim() as f64;
        Ok(-0.5 * (quad + self.log_det_cov + d * (2.0 * PI).ln()))
    }

    /// Draws `mean + L z` with `z` standard normal.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> DVector<f64> {
        &self.mean + self.perturbation(rng)
    }

    /// Draws the zero-mean, covariance-scaled perturbation `L z`.
    pub fn perturbation<R: Rng>(&self, rng: &mut R) -> DVector<f64> {
        let z = DVector::from_fn(self.dim(), |_, _| rng.sample(StandardNormal));
        &self.factor_l * z
    }
}

/// A Gaussian Markov Random Field prior with precision
/// `P = precision_scale * D^T D`, where `D` is the finite-difference operator
/// of the requested order with the requested boundary handling.
///
/// With [`Boundary::Zero`] and order 1, `P = precision_scale * tridiag(-1,2,-1)`
/// and is positive-definite for every dimension >= 2. Periodic and Neumann
/// first differences annihilate constants, so those assemblies are singular and
/// construction fails with [`Error::SingularPrecision`].
#[derive(Debug, Clone)]
pub struct Gmrf {
    mean: DVector<f64>,
    precision: DMatrix<f64>,
    factor_lt: DMatrix<f64>,
    log_det_prec: f64,
}

impl Gmrf {
    /// Creates a GMRF of the given order (1 or 2) and boundary handling.
    ///
    /// The factorization attempt at construction rejects singular assemblies
    /// (and non-positive `precision_scale`) with [`Error::SingularPrecision`].
    pub fn new(
        mean: DVector<f64>,
        precision_scale: f64,
        order: usize,
        boundary: Boundary,
    ) -> Result<Self, Error> {
        assert!(
            order == 1 || order == 2,
            "GMRF difference operator order must be 1 or 2."
        );
        let dim = mean.len();
        assert!(dim >= 2, "GMRF requires dimension >= 2.");
        let diff = difference_operator(dim, order, boundary);
        let precision = diff.transpose() * diff * precision_scale;
        let chol = Cholesky::new(precision.clone()).ok_or(Error::SingularPrecision)?;
        let factor_l = chol.l();
        let log_det_prec = 2.0 * factor_l.diagonal().map(f64::ln).sum();
        Ok(Self {
            mean,
            precision,
            factor_lt: factor_l.transpose(),
            log_det_prec,
        })
    }

    /// Dimensionality of the distribution.
    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    /// The mean vector.
    pub fn mean(&self) -> &DVector<f64> {
        &self.mean
    }

    /// The assembled precision matrix.
    pub fn precision(&self) -> &DMatrix<f64> {
        &self.precision
    }

    /// Normalized log-density `-0.5 (x-mean)^T P (x-mean) + const`.
    pub fn logpdf(&self, x: &DVector<f64>) -> Result<f64, Error> {
        if x.len() != self.dim() {
            return Err(Error::DimensionMismatch {
                expected: self.dim(),
                actual: x.len(),
            });
        }
        let diff = x - &self.mean;
        let quad = diff.dot(&(&self.precision * &diff));
        let d = self.dim() as f64;
        Ok(-0.5 * (quad + d * (2.0 * PI).ln()) + 0.5 * self.log_det_prec)
    }

    /// Draws `mean + L^{-T} z` with `L` the Cholesky factor of the precision.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> DVector<f64> {
        &self.mean + self.perturbation(rng)
    }

    /// Draws the zero-mean perturbation `L^{-T} z`.
    pub fn perturbation<R: Rng>(&self, rng: &mut R) -> DVector<f64> {
        let z = DVector::from_fn(self.dim(), |_, _| rng.sample(StandardNormal));
        self.factor_lt
            .solve_upper_triangular(&z)
            .expect("Expecting the cached Cholesky factor to stay invertible.")
    }
}

/// Assembles the order-1 or order-2 finite-difference operator.
fn difference_operator(dim: usize, order: usize, boundary: Boundary) -> DMatrix<f64> {
    match (order, boundary) {
        (1, Boundary::Zero) => {
            // (dim + 1) x dim: differences against zero padding at both ends.
            DMatrix::from_fn(dim + 1, dim, |i, j| {
                if i == j {
                    1.0
                } else if i == j + 1 {
                    -1.0
                } else {
                    0.0
                }
            })
        }
        (1, Boundary::Periodic) => DMatrix::from_fn(dim, dim, |i, j| {
            if i == j {
                1.0
            } else if j == (i + dim - 1) % dim {
                -1.0
            } else {
                0.0
            }
        }),
        (1, Boundary::Neumann) => {
            // (dim - 1) x dim: interior differences only.
            DMatrix::from_fn(dim - 1, dim, |i, j| {
                if i == j {
                    -1.0
                } else if j == i + 1 {
                    1.0
                } else {
                    0.0
                }
            })
        }
        (2, Boundary::Zero) => DMatrix::from_fn(dim, dim, |i, j| {
            if i == j {
                2.0
            } else if i.abs_diff(j) == 1 {
                -1.0
            } else {
                0.0
            }
        }),
        (2, Boundary::Periodic) => DMatrix::from_fn(dim, dim, |i, j| {
            if i == j {
                2.0
            } else if j == (i + 1) % dim || j == (i + dim - 1) % dim {
                -1.0
            } else {
                0.0
            }
        }),
        (2, Boundary::Neumann) => DMatrix::from_fn(dim, dim, |i, j| {
            let deg = if i == 0 || i == dim - 1 { 1.0 } else { 2.0 };
            if i == j {
                deg
            } else if i.abs_diff(j) == 1 {
                -1.0
            } else {
                0.0
            }
        }),
        _ => unreachable!("order validated at construction"),
    }
}

/// The closed set of distribution variants the posterior and sampler target.
#[derive(Debug, Clone)]
pub enum Distribution {
    /// Dense-covariance Gaussian.
    Gaussian(Gaussian),
    /// Gaussian Markov Random Field.
    Gmrf(Gmrf),
}

impl Distribution {
    /// Dimensionality of the distribution.
    pub fn dim(&self) -> usize {
        match self {
            Distribution::Gaussian(g) => g.dim(),
            Distribution::Gmrf(g) => g.dim(),
        }
    }

    /// The mean vector.
    pub fn mean(&self) -> &DVector<f64> {
        match self {
            Distribution::Gaussian(g) => g.mean(),
            Distribution::Gmrf(g) => g.mean(),
        }
    }

    /// Normalized log-density at `x`.
    pub fn logpdf(&self, x: &DVector<f64>) -> Result<f64, Error> {
        match self {
            Distribution::Gaussian(g) => g.logpdf(x),
            Distribution::Gmrf(g) => g.logpdf(x),
        }
    }

    /// Draws one sample.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> DVector<f64> {
        match self {
            Distribution::Gaussian(g) => g.sample(rng),
            Distribution::Gmrf(g) => g.sample(rng),
        }
    }

    /// Draws the zero-mean, covariance-scaled perturbation used by the pCN
    /// proposal.
    pub fn perturbation<R: Rng>(&self, rng: &mut R) -> DVector<f64> {
        match self {
            Distribution::Gaussian(g) => g.perturbation(rng),
            Distribution::Gmrf(g) => g.perturbation(rng),
        }
    }
}

impl From<Gaussian> for Distribution {
    fn from(g: Gaussian) -> Self {
        Distribution::Gaussian(g)
    }
}

impl From<Gmrf> for Distribution {
    fn from(g: Gmrf) -> Self {
        Distribution::Gmrf(g)
    }
}
