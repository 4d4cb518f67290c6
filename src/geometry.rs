/*!
Geometries describe how a finite vector of real coefficients maps to and from a
spatial function representation. They are the leaf dependency shared (read-only)
by models, distributions and sample containers: a [`Model`](crate::model::Model)
uses its range geometry to project a solved field onto observation coefficients,
and [`Samples`](crate::samples::Samples) carries the domain geometry so that
downstream display can interpret chain states as functions.

Both built-in geometries represent a function by its values at a finite set of
points, so their coefficient/function conversions are length-checked identity
maps and the round-trip `to_coeffs(to_function(x)) == x` holds exactly.

# Examples

```rust
use nalgebra::DVector;
use pde_bayes::geometry::{Continuous1D, Geometry};

let geom = Continuous1D::equidistant(5, 0.0, 1.0);
let coeffs = DVector::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0]);
let field = geom.to_function(&coeffs).unwrap();
assert_eq!(geom.to_coeffs(&field).unwrap(), coeffs);
```
*/

use nalgebra::DVector;

use crate::error::Error;

/// Bidirectional conversion between coefficient vectors and function values.
///
/// Implementations are immutable after construction and cheap to clone.
pub trait Geometry: Clone {
    /// Number of coefficients this geometry represents.
    fn dim(&self) -> usize;

    /// Maps a coefficient vector to its function representation.
    fn to_function(&self, coeffs: &DVector<f64>) -> Result<DVector<f64>, Error>;

    /// Maps a function representation back to coefficients.
    fn to_coeffs(&self, field: &DVector<f64>) -> Result<DVector<f64>, Error>;

    /// Length check shared by both conversion directions.
    fn check_dim(&self, x: &DVector<f64>) -> Result<(), Error> {
        if x.len() != self.dim() {
            return Err(Error::DimensionMismatch {
                expected: self.dim(),
                actual: x.len(),
            });
        }
        Ok(())
    }
}

/// Nodal values of a function on an explicit one-dimensional grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Continuous1D {
    grid: Vec<f64>,
}

impl Continuous1D {
    /// Creates a geometry over an explicit grid. The grid must be non-empty.
    pub fn new(grid: Vec<f64>) -> Self {
        assert!(!grid.is_empty(), "Continuous1D requires a non-empty grid.");
        Self { grid }
    }

    /// Creates a geometry over `n` equidistant nodes spanning `[start, end]`.
    pub fn equidistant(n: usize, start: f64, end: f64) -> Self {
        assert!(n >= 2, "Equidistant grid requires at least two nodes.");
        let h = (end - start) / (n - 1) as f64;
        Self::new((0..n).map(|i| start + h * i as f64).collect())
    }

    /// The grid nodes.
    pub fn grid(&self) -> &[f64] {
        &self.grid
    }
}

impl Geometry for Continuous1D {
    fn dim(&self) -> usize {
        self.grid.len()
    }

    fn to_function(&self, coeffs: &DVector<f64>) -> Result<DVector<f64>, Error> {
        self.check_dim(coeffs)?;
        Ok(coeffs.clone())
    }

    fn to_coeffs(&self, field: &DVector<f64>) -> Result<DVector<f64>, Error> {
        self.check_dim(field)?;
        Ok(field.clone())
    }
}

/// A bag of unrelated coefficients with no spatial interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discrete {
    dim: usize,
}

impl Discrete {
    /// Creates a geometry over `dim` unrelated coefficients.
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

impl Geometry for Discrete {
    fn dim(&self) -> usize {
        self.dim
    }

    fn to_function(&self, coeffs: &DVector<f64>) -> Result<DVector<f64>, Error> {
        self.check_dim(coeffs)?;
        Ok(coeffs.clone())
    }

    fn to_coeffs(&self, field: &DVector<f64>) -> Result<DVector<f64>, Error> {
        self.check_dim(field)?;
        Ok(field.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_is_identity() {
        let geom = Continuous1D::equidistant(4, 0.0, 3.0);
        let x = DVector::from_vec(vec![-1.0, 0.5, 2.0, 7.0]);
        let round = geom.to_coeffs(&geom.to_function(&x).unwrap()).unwrap();
        assert_eq!(round, x);
    }

    #[test]
    fn equidistant_grid_endpoints() {
        let geom = Continuous1D::equidistant(11, 0.0, 1.0);
        assert_eq!(geom.dim(), 11);
        assert_eq!(geom.grid()[0], 0.0);
        assert_eq!(geom.grid()[10], 1.0);
    }

    #[test]
    fn wrong_length_is_rejected() {
        let geom = Discrete::new(3);
        let too_short = DVector::from_vec(vec![1.0, 2.0]);
        assert_eq!(
            geom.to_function(&too_short),
            Err(Error::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        );
    }
}
