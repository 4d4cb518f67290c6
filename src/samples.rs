/*!
The sample container produced by a finished chain, with the diagnostics
consumed downstream: burn-in/thinning, per-coefficient credible intervals,
chain traces, moments and effective sample sizes.

A [`Samples`] is immutable once sampling completes. All transformations are
pure: [`Samples::burnthin`] returns a new container and leaves the original
untouched.

# Examples

```rust
use ndarray::Array2;
use pde_bayes::geometry::Discrete;
use pde_bayes::samples::Samples;

let data = Array2::from_shape_fn((100, 2), |(i, j)| (i + j) as f64);
let samples = Samples::new(data, 0.5, Discrete::new(2));
let kept = samples.burnthin(10, 3).unwrap();
assert_eq!(kept.len(), 30);
```
*/

use ndarray::{Array1, Array2, Axis, Slice};
use num_traits::Float;
use rustfft::{num_complex::Complex, FftPlanner};

use crate::error::Error;
use crate::geometry::Geometry;

/// Per-coefficient credible interval bounds and median, in coefficient space.
#[derive(Debug, Clone, PartialEq)]
pub struct CredibleInterval {
    /// Lower percentile per coefficient.
    pub lower: Array1<f64>,
    /// Median per coefficient.
    pub median: Array1<f64>,
    /// Upper percentile per coefficient.
    pub upper: Array1<f64>,
    /// The credibility level in percent (e.g. 95.0).
    pub level: f64,
}

/// An ordered chain of retained states (one row per iteration), together with
/// the acceptance-rate diagnostic and the geometry interpreting the
/// coefficients.
#[derive(Debug, Clone)]
pub struct Samples<G> {
    data: Array2<f64>,
    acceptance_rate: f64,
    geometry: G,
}

impl<G: Geometry> Samples<G> {
    /// Wraps a finished chain. Rows are iterations, columns coefficients.
    pub fn new(data: Array2<f64>, acceptance_rate: f64, geometry: G) -> Self {
        assert_eq!(
            data.ncols(),
            geometry.dim(),
            "Sample matrix width must match the geometry dimension."
        );
        Self {
            data,
            acceptance_rate,
            geometry,
        }
    }

    /// Number of retained states.
    pub fn len(&self) -> usize {
        self.data.nrows()
    }

    /// Whether the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.data.nrows() == 0
    }

    /// Number of coefficients per state.
    pub fn dim(&self) -> usize {
        self.data.ncols()
    }

    /// Fraction of proposals accepted while these samples were collected.
    pub fn acceptance_rate(&self) -> f64 {
        self.acceptance_rate
    }

    /// The geometry interpreting the coefficients.
    pub fn geometry(&self) -> &G {
        &self.geometry
    }

    /// The raw chain matrix.
    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    /// Drops the first `burn` states and keeps every `thin`-th of the rest.
    ///
    /// Pure and non-mutating; the result has exactly
    /// `ceil((len - burn) / thin)` states, and `burnthin(0, 1)` returns a chain
    /// equal to the original. Fails with [`Error::InvalidRange`] when
    /// `burn >= len` or `thin == 0`.
    pub fn burnthin(&self, burn: usize, thin: usize) -> Result<Self, Error> {
        if thin == 0 || burn >= self.len() {
            return Err(Error::InvalidRange {
                burn,
                thin,
                len: self.len(),
            });
        }
        let data = self
            .data
            .slice_axis(Axis(0), Slice::new(burn as isize, None, thin as isize))
            .to_owned();
        Ok(Self {
            data,
            acceptance_rate: self.acceptance_rate,
            geometry: self.geometry.clone(),
        })
    }

    /// Per-coefficient sample mean.
    pub fn mean(&self) -> Array1<f64> {
        self.data
            .mean_axis(Axis(0))
            .expect("Expecting a non-empty chain when computing means.")
    }

    /// Per-coefficient sample variance (denominator `n - 1`).
    pub fn variance(&self) -> Array1<f64> {
        self.data.var_axis(Axis(0), 1.0)
    }

    /// Empirical credible interval at `level` percent (e.g. 95.0): for each
    /// coefficient the `(100 - level) / 2` and `100 - (100 - level) / 2`
    /// percentiles, plus the median.
    pub fn credible_interval(&self, level: f64) -> CredibleInterval {
        assert!(
            level > 0.0 && level < 100.0,
            "Credibility level must lie strictly between 0 and 100 percent."
        );
        assert!(!self.is_empty(), "Credible interval of an empty chain.");
        let tail = (100.0 - level) / 2.0;
        let dim = self.dim();
        let mut lower = Array1::zeros(dim);
        let mut median = Array1::zeros(dim);
        let mut upper = Array1::zeros(dim);
        for j in 0..dim {
            let mut column: Vec<f64> = self.data.column(j).to_vec();
            column.sort_unstable_by(|a, b| a.partial_cmp(b).expect("NaN in chain"));
            lower[j] = percentile(&column, tail);
            median[j] = percentile(&column, 50.0);
            upper[j] = percentile(&column, 100.0 - tail);
        }
        CredibleInterval {
            lower,
            median,
            upper,
            level,
        }
    }

    /// The ordered values of the selected coefficients across the full
    /// retained chain (one column per requested index). No burn-in is applied;
    /// pass an already burned chain if that is what should be displayed.
    pub fn trace(&self, indices: &[usize]) -> Array2<f64> {
        for &idx in indices {
            assert!(
                idx < self.dim(),
                "Trace index {idx} out of bounds for dimension {}.",
                self.dim()
            );
        }
        Array2::from_shape_fn((self.len(), indices.len()), |(i, k)| {
            self.data[(i, indices[k])]
        })
    }

    /// Maps every retained state through the geometry's `to_function` for
    /// downstream display in function space.
    pub fn to_function_values(&self) -> Result<Array2<f64>, Error> {
        let mut out = self.data.clone();
        for mut row in out.rows_mut() {
            let coeffs = nalgebra::DVector::from_iterator(self.dim(), row.iter().copied());
            let fun = self.geometry.to_function(&coeffs)?;
            row.iter_mut().zip(fun.iter()).for_each(|(o, &v)| *o = v);
        }
        Ok(out)
    }

    /// Per-coefficient effective sample size, estimated from the FFT
    /// autocorrelation with Geyer's initial positive sequence truncation.
    ///
    /// A coefficient whose chain never moved reports an effective size of 1.
    pub fn ess(&self) -> Array1<f64> {
        let n = self.len();
        let mut out = Array1::zeros(self.dim());
        let mut planner = FftPlanner::new();
        for j in 0..self.dim() {
            out[j] = column_ess(&self.data.column(j).to_vec(), n, &mut planner);
        }
        out
    }
}

/// Linear-interpolation percentile of an ascending-sorted slice, `p` in
/// `[0, 100]`.
fn percentile<T: Float>(sorted: &[T], p: T) -> T {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let hundred = T::from(100.0).expect("Expecting 100 to be representable.");
    let rank = p / hundred * T::from(n - 1).expect("Expecting n to be representable.");
    let lo = rank.floor();
    let frac = rank - lo;
    let lo = lo.to_usize().unwrap_or(0).min(n - 1);
    let hi = (lo + 1).min(n - 1);
    sorted[lo] + frac * (sorted[hi] - sorted[lo])
}

/// ESS of one coordinate series.
fn column_ess(series: &[f64], n: usize, planner: &mut FftPlanner<f64>) -> f64 {
    if n < 4 {
        return n as f64;
    }
    let mean = series.iter().sum::<f64>() / n as f64;
    let m = (2 * n).next_power_of_two();
    let mut buf: Vec<Complex<f64>> = series
        .iter()
        .map(|&v| Complex::new(v - mean, 0.0))
        .chain(std::iter::repeat(Complex::new(0.0, 0.0)).take(m - n))
        .collect();
    planner.plan_fft_forward(m).process(&mut buf);
    for v in buf.iter_mut() {
        *v = Complex::new(v.norm_sqr(), 0.0);
    }
    planner.plan_fft_inverse(m).process(&mut buf);
    let c0 = buf[0].re;
    if c0 <= f64::EPSILON * n as f64 {
        // Frozen chain: a single distinct value.
        return 1.0;
    }
    // Integrated autocorrelation time from pairwise sums, truncated at the
    // first non-positive pair.
    let rho = |t: usize| buf[t].re / c0;
    let mut tau = -1.0;
    let mut k = 0;
    while 2 * k + 1 < n {
        let pair = rho(2 * k) + rho(2 * k + 1);
        if pair <= 0.0 {
            break;
        }
        tau += 2.0 * pair;
        k += 1;
    }
    n as f64 / tau.max(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Discrete;
    use approx::assert_abs_diff_eq;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn ramp(n: usize, dim: usize) -> Samples<Discrete> {
        let data = Array2::from_shape_fn((n, dim), |(i, j)| i as f64 + 10.0 * j as f64);
        Samples::new(data, 0.4, Discrete::new(dim))
    }

    #[test]
    fn burnthin_length_follows_the_ceiling_law() {
        let samples = ramp(100, 2);
        for (burn, thin) in [(0, 1), (10, 1), (10, 3), (99, 1), (7, 13)] {
            let kept = samples.burnthin(burn, thin).unwrap();
            let expected = (100 - burn).div_ceil(thin);
            assert_eq!(kept.len(), expected, "burn={burn} thin={thin}");
        }
    }

    #[test]
    fn burnthin_zero_one_is_the_identity() {
        let samples = ramp(50, 3);
        let kept = samples.burnthin(0, 1).unwrap();
        assert_eq!(kept.data(), samples.data());
        assert_eq!(kept.acceptance_rate(), samples.acceptance_rate());
    }

    #[test]
    fn burnthin_rejects_invalid_arguments() {
        let samples = ramp(10, 1);
        assert!(matches!(
            samples.burnthin(10, 1),
            Err(Error::InvalidRange { burn: 10, .. })
        ));
        assert!(samples.burnthin(0, 0).is_err());
    }

    #[test]
    fn burnthin_keeps_every_thinth_state_after_the_burn() {
        let samples = ramp(10, 1);
        let kept = samples.burnthin(2, 4).unwrap();
        assert_eq!(
            kept.data().column(0).to_vec(),
            vec![2.0, 6.0] // states 2 and 6 of the original chain
        );
    }

    #[test]
    fn credible_interval_brackets_the_median() {
        let mut rng = SmallRng::seed_from_u64(1);
        let data = Array2::from_shape_fn((2000, 2), |_| rng.gen::<f64>());
        let samples = Samples::new(data, 1.0, Discrete::new(2));
        let ci = samples.credible_interval(95.0);
        for j in 0..2 {
            assert!(ci.lower[j] < ci.median[j] && ci.median[j] < ci.upper[j]);
            // Uniform(0,1): 2.5% / 50% / 97.5% percentiles.
            assert_abs_diff_eq!(ci.lower[j], 0.025, epsilon = 0.02);
            assert_abs_diff_eq!(ci.median[j], 0.5, epsilon = 0.05);
            assert_abs_diff_eq!(ci.upper[j], 0.975, epsilon = 0.02);
        }
    }

    #[test]
    fn percentile_interpolates_linearly() {
        let sorted = [0.0, 1.0, 2.0, 3.0];
        assert_abs_diff_eq!(percentile(&sorted, 0.0), 0.0);
        assert_abs_diff_eq!(percentile(&sorted, 100.0), 3.0);
        assert_abs_diff_eq!(percentile(&sorted, 50.0), 1.5);
    }

    #[test]
    fn trace_extracts_the_requested_columns_in_order() {
        let samples = ramp(5, 3);
        let trace = samples.trace(&[2, 0]);
        assert_eq!(trace.shape(), &[5, 2]);
        assert_eq!(trace[(4, 0)], 4.0 + 20.0);
        assert_eq!(trace[(4, 1)], 4.0);
    }

    #[test]
    fn ess_of_white_noise_is_close_to_the_chain_length() {
        let mut rng = SmallRng::seed_from_u64(9);
        let data = Array2::from_shape_fn((4096, 1), |_| rng.gen::<f64>() - 0.5);
        let samples = Samples::new(data, 1.0, Discrete::new(1));
        let ess = samples.ess()[0];
        assert!(
            ess > 2048.0 && ess <= 4096.0 * 1.2,
            "white-noise ESS should be near n, got {ess}"
        );
    }

    #[test]
    fn ess_of_a_frozen_chain_is_one() {
        let data = Array2::from_elem((256, 1), 3.7);
        let samples = Samples::new(data, 0.0, Discrete::new(1));
        assert_abs_diff_eq!(samples.ess()[0], 1.0);
    }

    #[test]
    fn function_values_of_nodal_geometries_are_the_coefficients() {
        let samples = ramp(4, 2);
        assert_eq!(&samples.to_function_values().unwrap(), samples.data());
    }

    #[test]
    fn mean_and_variance_match_hand_values() {
        let data = Array2::from_shape_vec((3, 1), vec![1.0, 2.0, 3.0]).unwrap();
        let samples = Samples::new(data, 1.0, Discrete::new(1));
        assert_abs_diff_eq!(samples.mean()[0], 2.0);
        assert_abs_diff_eq!(samples.variance()[0], 1.0);
    }
}
