//! Across-chain convergence statistics for completed sampling runs.

use ndarray::prelude::*;
use ndarray_stats::QuantileExt;

use crate::geometry::Geometry;
use crate::samples::Samples;

/// Potential scale reduction factor (split-free R-hat) per coefficient,
/// computed from two or more chains of equal length over the same geometry.
///
/// Values close to 1 indicate the chains have mixed into the same
/// distribution; see the [Stan Reference Manual][1] for the estimator.
///
/// [1]: https://mc-stan.org/docs/2_18/reference-manual/notation-for-samples-chains-and-draws.html
pub fn potential_scale_reduction<G: Geometry>(chains: &[Samples<G>]) -> Array1<f64> {
    assert!(
        chains.len() >= 2,
        "Potential scale reduction requires at least two chains."
    );
    let n = chains[0].len();
    let dim = chains[0].dim();
    assert!(n >= 2, "Potential scale reduction requires chain length >= 2.");
    for chain in chains {
        assert_eq!(chain.len(), n, "Chains must have equal length.");
        assert_eq!(chain.dim(), dim, "Chains must have equal dimension.");
    }

    let means: Vec<Array1<f64>> = chains.iter().map(Samples::mean).collect();
    let views: Vec<ArrayView1<f64>> = means.iter().map(Array1::view).collect();
    let means = ndarray::stack(Axis(0), &views).expect("Expected stacking means to succeed");

    let variances: Vec<Array1<f64>> = chains.iter().map(Samples::variance).collect();
    let views: Vec<ArrayView1<f64>> = variances.iter().map(Array1::view).collect();
    let variances =
        ndarray::stack(Axis(0), &views).expect("Expected stacking variances to succeed");

    let m = chains.len() as f64;
    let n = n as f64;
    let within = variances
        .mean_axis(Axis(0))
        .expect("Expected computing within-chain variances to succeed");
    let grand = means
        .mean_axis(Axis(0))
        .expect("Expected computing global means to succeed");
    let between = (&means - &grand.broadcast(means.raw_dim()).expect("broadcast"))
        .pow2()
        .sum_axis(Axis(0))
        * (n / (m - 1.0));

    let var = within.clone() * ((n - 1.0) / n) + between / n;
    (var / within).sqrt()
}

/// The largest per-coefficient potential scale reduction factor.
pub fn max_potential_scale_reduction<G: Geometry>(chains: &[Samples<G>]) -> f64 {
    let all = potential_scale_reduction(chains);
    *all.max()
        .expect("Expected a non-empty scale reduction vector")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Discrete;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn noise_chain(seed: u64, offset: f64, n: usize, dim: usize) -> Samples<Discrete> {
        let mut rng = SmallRng::seed_from_u64(seed);
        let data = Array2::from_shape_fn((n, dim), |_| offset + rng.gen::<f64>());
        Samples::new(data, 1.0, Discrete::new(dim))
    }

    #[test]
    fn well_mixed_chains_stay_near_one() {
        let chains = vec![
            noise_chain(0, 0.0, 500, 3),
            noise_chain(1, 0.0, 500, 3),
            noise_chain(2, 0.0, 500, 3),
        ];
        let rhat = potential_scale_reduction(&chains);
        for &r in rhat.iter() {
            assert!((0.9..1.1).contains(&r), "expected rhat near 1, got {r}");
        }
    }

    #[test]
    fn separated_chains_are_flagged() {
        let chains = vec![noise_chain(0, 0.0, 500, 2), noise_chain(1, 10.0, 500, 2)];
        assert!(max_potential_scale_reduction(&chains) > 5.0);
    }
}
