//! Infers a log-conductivity profile for 1-D steady-state diffusion from
//! noisy interior observations, printing the acceptance rate and the 95%
//! credible interval around the exact profile.

use nalgebra::{DMatrix, DVector};
use pde_bayes::distributions::{Boundary, Distribution, Gaussian, Gmrf};
use pde_bayes::error::Error;
use pde_bayes::geometry::Continuous1D;
use pde_bayes::likelihood::Likelihood;
use pde_bayes::model::{ForwardSolver, Model, Reparam};
use pde_bayes::pcn::{AdaptOptions, Pcn};
use pde_bayes::posterior::Posterior;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

const N_CELLS: usize = 30;

/// Finite-difference solve of `-d/ds(kappa du/ds) = 0`, `u(0)=1`, `u(1)=8`.
struct DiffusionSolver;

impl ForwardSolver for DiffusionSolver {
    fn solve(&self, kappa: &DVector<f64>) -> Result<DVector<f64>, Error> {
        if kappa.iter().any(|&k| !k.is_finite() || k <= 0.0) {
            return Err(Error::ForwardEvaluation(
                "non-positive conductivity".into(),
            ));
        }
        let n = kappa.len();
        let m = n - 1;
        let mut a = DMatrix::<f64>::zeros(m, m);
        let mut b = DVector::<f64>::zeros(m);
        for r in 0..m {
            a[(r, r)] = -(kappa[r] + kappa[r + 1]);
            if r > 0 {
                a[(r, r - 1)] = kappa[r];
            }
            if r + 1 < m {
                a[(r, r + 1)] = kappa[r + 1];
            }
        }
        b[0] = -kappa[0];
        b[m - 1] = -kappa[n - 1] * 8.0;
        a.lu()
            .solve(&b)
            .ok_or_else(|| Error::ForwardEvaluation("linear solve failed".into()))
    }
}

fn main() {
    let midpoints: Vec<f64> = (0..N_CELLS).map(|i| (i as f64 + 0.5) / N_CELLS as f64).collect();
    let truth = DVector::from_iterator(
        N_CELLS,
        midpoints
            .iter()
            .map(|s| 0.8 * (2.0 * std::f64::consts::PI * s).sin()),
    );

    let domain = Continuous1D::new(midpoints);
    let h = 1.0 / N_CELLS as f64;
    let range = Continuous1D::new((1..N_CELLS).map(|i| i as f64 * h).collect());
    let model = Model::new(DiffusionSolver, domain, range, Reparam::Exp);

    // Manufacture data at SNR 1000.
    let exact = model.forward(&truth).unwrap();
    let noise_std = (exact.dot(&exact) / exact.len() as f64).sqrt() / 1000.0;
    let mut rng = SmallRng::seed_from_u64(1234);
    let data = exact.map(|v| v + noise_std * rng.sample::<f64, _>(StandardNormal));

    let noise =
        Gaussian::isotropic(DVector::zeros(model.range_dim()), noise_std * noise_std).unwrap();
    let likelihood = Likelihood::new(model, noise.into(), data).unwrap();
    let prior: Distribution = Gmrf::new(DVector::zeros(N_CELLS), 1.0, 1, Boundary::Zero)
        .unwrap()
        .into();
    let posterior = Posterior::new(&prior, &likelihood).unwrap();

    let mut chain = Pcn::new(&posterior, DVector::zeros(N_CELLS), 0.01)
        .unwrap()
        .set_seed(0)
        .with_adaptation(AdaptOptions::default());
    let samples = chain.run(5000, 0).unwrap();

    println!(
        "acceptance rate: {:.3}, final scale: {:.2e}",
        samples.acceptance_rate(),
        chain.scale()
    );

    let burned = samples.burnthin(500, 1).unwrap();
    let ci = burned.credible_interval(95.0);
    let covered = (0..N_CELLS)
        .filter(|&j| ci.lower[j] <= truth[j] && truth[j] <= ci.upper[j])
        .count();
    println!("95% CI covers {covered}/{N_CELLS} exact coefficients");
    for j in (0..N_CELLS).step_by(5) {
        println!(
            "  m[{j:2}]  exact {:+.3}  median {:+.3}  ci [{:+.3}, {:+.3}]",
            truth[j], ci.median[j], ci.lower[j], ci.upper[j]
        );
    }
}
