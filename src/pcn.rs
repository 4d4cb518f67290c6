/*!
# Preconditioned Crank-Nicolson sampler

An adaptive random-walk MCMC sampler for posteriors over function-valued
parameters. The proposal

```text
x' = mean + sqrt(1 - beta^2) * (x - mean) + beta * xi,   xi ~ N(0, C_prior)
```

leaves the Gaussian prior invariant by construction, which is what keeps the
acceptance ratio well-behaved in high dimension where a naive random walk
collapses. The acceptance probability therefore depends on the likelihood
alone: `alpha = min(1, exp(ll' - ll))`.

Each chain owns its seeded random-number stream and its growing sample buffer,
so independent chains can run in parallel with no shared mutable state; the
[`PcnSampler`] front end does exactly that, seeding chain `i` with
`seed + i`.

A failed forward solve during a proposal is absorbed as an auto-rejection
(the chain re-emits its previous state); configuration errors such as
dimension mismatches are fatal and discard the in-progress chain.

## Example Usage

```rust
use nalgebra::DVector;
use pde_bayes::distributions::{Distribution, Gaussian};
use pde_bayes::error::Error;
use pde_bayes::geometry::Discrete;
use pde_bayes::likelihood::Likelihood;
use pde_bayes::model::{ForwardSolver, Model, Reparam};
use pde_bayes::pcn::Pcn;
use pde_bayes::posterior::Posterior;

struct IdentitySolver;

impl ForwardSolver for IdentitySolver {
    fn solve(&self, params: &DVector<f64>) -> Result<DVector<f64>, Error> {
        Ok(params.clone())
    }
}

let model = Model::new(
    IdentitySolver,
    Discrete::new(2),
    Discrete::new(2),
    Reparam::Identity,
);
let noise = Gaussian::isotropic(DVector::zeros(2), 0.1).unwrap();
let likelihood = Likelihood::new(model, noise.into(), DVector::from_vec(vec![1.0, -1.0])).unwrap();
let prior: Distribution = Gaussian::isotropic(DVector::zeros(2), 1.0).unwrap().into();
let posterior = Posterior::new(&prior, &likelihood).unwrap();

let mut chain = Pcn::new(&posterior, DVector::zeros(2), 0.2)
    .unwrap()
    .set_seed(42);
let samples = chain.run(1000, 100).unwrap();
assert_eq!(samples.len(), 1000);
```
*/

use indicatif::{MultiProgress, ProgressBar};
use nalgebra::DVector;
use rand::prelude::*;
use rayon::prelude::*;

use crate::core::{progress_style, run_chain, run_chain_with_progress, MarkovChain};
use crate::error::Error;
use crate::geometry::Geometry;
use crate::model::ForwardSolver;
use crate::posterior::Posterior;
use crate::samples::Samples;

/// Tuning of the acceptance-rate-driven scale adaptation.
///
/// Every `block` iterations during the first `adapt_iters` iterations, the
/// block's empirical acceptance rate moves the proposal scale multiplicatively
/// toward `target_accept`, clamped to `[min_scale, 1]` so the chain can
/// neither freeze nor leave the valid scale range.
#[derive(Debug, Clone, Copy)]
pub struct AdaptOptions {
    /// Acceptance rate the adaptation steers toward.
    pub target_accept: f64,
    /// Number of iterations per adaptation block.
    pub block: usize,
    /// Multiplicative scale update per block.
    pub factor: f64,
    /// Lower clamp for the scale.
    pub min_scale: f64,
    /// Adaptation stops after this many iterations.
    pub adapt_iters: usize,
}

impl Default for AdaptOptions {
    fn default() -> Self {
        Self {
            target_accept: 0.3,
            block: 50,
            factor: 1.1,
            min_scale: 1e-6,
            adapt_iters: usize::MAX,
        }
    }
}

/// A single preconditioned Crank-Nicolson Markov chain over a borrowed
/// posterior.
pub struct Pcn<'a, S, GD, GR> {
    target: &'a Posterior<'a, S, GD, GR>,
    current_state: DVector<f64>,
    current_ll: f64,
    scale: f64,
    adapt: Option<AdaptOptions>,
    /// The chain-specific random seed.
    pub seed: u64,
    rng: SmallRng,
    iter: usize,
    accepted: u64,
    block_accepted: usize,
    block_steps: usize,
}

impl<'a, S, GD, GR> Pcn<'a, S, GD, GR>
where
    S: ForwardSolver,
    GD: Geometry,
    GR: Geometry,
{
    /// Creates a chain at `initial` with proposal scale `scale` (in `(0, 1]`).
    ///
    /// The initial log-likelihood is evaluated here; a recoverable solve
    /// failure at the initial state leaves the chain at `-inf` until a
    /// feasible proposal is accepted.
    pub fn new(
        target: &'a Posterior<'a, S, GD, GR>,
        initial: DVector<f64>,
        scale: f64,
    ) -> Result<Self, Error> {
        if !(scale > 0.0 && scale <= 1.0) {
            return Err(Error::InvalidScale(scale));
        }
        if initial.len() != target.dim() {
            return Err(Error::DimensionMismatch {
                expected: target.dim(),
                actual: initial.len(),
            });
        }
        let current_ll = match target.likelihood().loglikelihood(&initial) {
            Ok(ll) => ll,
            Err(err) if err.is_recoverable() => f64::NEG_INFINITY,
            Err(fatal) => return Err(fatal),
        };
        let seed = thread_rng().gen::<u64>();
        Ok(Self {
            target,
            current_state: initial,
            current_ll,
            scale,
            adapt: None,
            seed,
            rng: SmallRng::seed_from_u64(seed),
            iter: 0,
            accepted: 0,
            block_accepted: 0,
            block_steps: 0,
        })
    }

    /// Sets the random seed, making the chain exactly reproducible.
    pub fn set_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self.rng = SmallRng::seed_from_u64(seed);
        self
    }

    /// Enables acceptance-rate-driven scale adaptation.
    pub fn with_adaptation(mut self, options: AdaptOptions) -> Self {
        self.adapt = Some(options);
        self
    }

    /// The current proposal scale.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Fraction of accepted proposals over the chain's whole history.
    pub fn acceptance_rate(&self) -> f64 {
        if self.iter == 0 {
            return 0.0;
        }
        self.accepted as f64 / self.iter as f64
    }

    /// One pCN transition. Returns whether the proposal was accepted.
    fn advance(&mut self) -> Result<bool, Error> {
        let prior = self.target.prior();
        let mean = prior.mean();
        let xi = prior.perturbation(&mut self.rng);
        let damp = (1.0 - self.scale * self.scale).sqrt();
        let proposed = mean + (&self.current_state - mean) * damp + xi * self.scale;

        let proposed_ll = match self.target.likelihood().loglikelihood(&proposed) {
            Ok(ll) => ll,
            Err(err) if err.is_recoverable() => f64::NEG_INFINITY,
            Err(fatal) => return Err(fatal),
        };

        // Acceptance depends on the likelihood alone; an infeasible proposal
        // is rejected without consuming a uniform draw.
        let mut accept = false;
        if proposed_ll > f64::NEG_INFINITY {
            let log_alpha = proposed_ll - self.current_ll;
            let u: f64 = self.rng.gen();
            accept = log_alpha > u.ln();
        }
        if accept {
            self.current_state = proposed;
            self.current_ll = proposed_ll;
            self.accepted += 1;
        }

        self.iter += 1;
        if let Some(options) = self.adapt {
            if self.iter <= options.adapt_iters {
                self.block_accepted += accept as usize;
                self.block_steps += 1;
                if self.block_steps == options.block {
                    let rate = self.block_accepted as f64 / options.block as f64;
                    self.scale = if rate > options.target_accept {
                        (self.scale * options.factor).min(1.0)
                    } else {
                        (self.scale / options.factor).max(options.min_scale)
                    };
                    self.block_accepted = 0;
                    self.block_steps = 0;
                }
            }
        }
        Ok(accept)
    }

    /// Runs `n_discard` warmup steps, then collects `n_collect` states.
    ///
    /// The returned acceptance rate covers the collection window. Fatal errors
    /// discard the in-progress chain.
    pub fn run(&mut self, n_collect: usize, n_discard: usize) -> Result<Samples<GD>, Error> {
        for _ in 0..n_discard {
            self.advance()?;
        }
        let accepted_before = self.accepted;
        let data = run_chain(self, n_collect)?;
        Ok(self.wrap(data, accepted_before, n_collect))
    }

    /// Like [`Pcn::run`], updating `pb` during collection.
    pub fn run_with_progress(
        &mut self,
        n_collect: usize,
        n_discard: usize,
        pb: &ProgressBar,
    ) -> Result<Samples<GD>, Error> {
        for _ in 0..n_discard {
            self.advance()?;
        }
        let accepted_before = self.accepted;
        let data = run_chain_with_progress(self, n_collect, pb)?;
        Ok(self.wrap(data, accepted_before, n_collect))
    }

    fn wrap(
        &self,
        data: ndarray::Array2<f64>,
        accepted_before: u64,
        n_collect: usize,
    ) -> Samples<GD> {
        let rate = (self.accepted - accepted_before) as f64 / n_collect.max(1) as f64;
        let geometry = self.target.likelihood().model().domain_geometry().clone();
        Samples::new(data, rate, geometry)
    }
}

impl<S, GD, GR> MarkovChain for Pcn<'_, S, GD, GR>
where
    S: ForwardSolver,
    GD: Geometry,
    GR: Geometry,
{
    fn step(&mut self) -> Result<&[f64], Error> {
        self.advance()?;
        Ok(self.current_state.as_slice())
    }

    fn current_state(&self) -> &[f64] {
        self.current_state.as_slice()
    }
}

/// A set of independent pCN chains over one posterior, run in parallel.
///
/// The chains share only the read-only posterior; each owns its RNG and its
/// buffer. Chain `i` is seeded with `seed + i`.
pub struct PcnSampler<'a, S, GD, GR> {
    /// The independent chains.
    pub chains: Vec<Pcn<'a, S, GD, GR>>,
    /// The global random seed.
    pub seed: u64,
}

impl<'a, S, GD, GR> PcnSampler<'a, S, GD, GR>
where
    S: ForwardSolver + Sync,
    GD: Geometry + Send + Sync,
    GR: Geometry + Sync,
{
    /// Creates `n_chains` chains, all starting at `initial`.
    pub fn new(
        target: &'a Posterior<'a, S, GD, GR>,
        initial: &DVector<f64>,
        scale: f64,
        n_chains: usize,
    ) -> Result<Self, Error> {
        let chains = (0..n_chains)
            .map(|_| Pcn::new(target, initial.clone(), scale))
            .collect::<Result<Vec<_>, Error>>()?;
        let seed = thread_rng().gen::<u64>();
        Ok(Self { chains, seed })
    }

    /// Sets a new global seed and re-seeds chain `i` with `seed + i`.
    pub fn set_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self.chains = self
            .chains
            .into_iter()
            .enumerate()
            .map(|(i, chain)| chain.set_seed(seed + i as u64))
            .collect();
        self
    }

    /// Enables the same adaptation on every chain.
    pub fn with_adaptation(mut self, options: AdaptOptions) -> Self {
        self.chains = self
            .chains
            .into_iter()
            .map(|chain| chain.with_adaptation(options))
            .collect();
        self
    }

    /// Runs all chains in parallel, one [`Samples`] per chain.
    pub fn run(
        &mut self,
        n_collect: usize,
        n_discard: usize,
    ) -> Result<Vec<Samples<GD>>, Error> {
        self.chains
            .par_iter_mut()
            .map(|chain| chain.run(n_collect, n_discard))
            .collect()
    }

    /// Runs all chains in parallel with one progress bar per chain.
    pub fn run_with_progress(
        &mut self,
        n_collect: usize,
        n_discard: usize,
    ) -> Result<Vec<Samples<GD>>, Error> {
        let multi = MultiProgress::new();
        let style = progress_style();
        self.chains
            .par_iter_mut()
            .enumerate()
            .map(|(i, chain)| {
                let pb = multi.add(ProgressBar::new(n_collect as u64));
                pb.set_prefix(format!("Chain {i}"));
                pb.set_style(style.clone());
                let samples = chain.run_with_progress(n_collect, n_discard, &pb);
                pb.finish_with_message("Done!");
                samples
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributions::{Distribution, Gaussian};
    use crate::geometry::Discrete;
    use crate::likelihood::Likelihood;
    use crate::model::{Model, Reparam};
    use approx::assert_abs_diff_eq;

    /// Collaborator that ignores the parameters, so the likelihood is constant.
    struct ConstSolver {
        value: DVector<f64>,
    }

    impl ForwardSolver for ConstSolver {
        fn solve(&self, _params: &DVector<f64>) -> Result<DVector<f64>, Error> {
            Ok(self.value.clone())
        }
    }

    /// Collaborator that only converges at one specific parameter vector.
    struct OnlyAt {
        good: DVector<f64>,
    }

    impl ForwardSolver for OnlyAt {
        fn solve(&self, params: &DVector<f64>) -> Result<DVector<f64>, Error> {
            if params == &self.good {
                Ok(params.clone())
            } else {
                Err(Error::ForwardEvaluation("solver diverged".into()))
            }
        }
    }

    fn constant_likelihood(dim: usize) -> Likelihood<ConstSolver, Discrete, Discrete> {
        let model = Model::new(
            ConstSolver {
                value: DVector::zeros(dim),
            },
            Discrete::new(dim),
            Discrete::new(dim),
            Reparam::Identity,
        );
        let noise = Gaussian::isotropic(DVector::zeros(dim), 1.0).unwrap();
        Likelihood::new(model, noise.into(), DVector::zeros(dim)).unwrap()
    }

    #[test]
    fn beta_one_with_constant_likelihood_reproduces_the_prior() {
        // With beta = 1 the proposal is an independent prior draw and every
        // proposal is accepted, so the chain is iid from the prior.
        let dim = 3;
        let prior: Distribution = Gaussian::isotropic(DVector::zeros(dim), 1.0).unwrap().into();
        let likelihood = constant_likelihood(dim);
        let posterior = Posterior::new(&prior, &likelihood).unwrap();

        let mut chain = Pcn::new(&posterior, DVector::zeros(dim), 1.0)
            .unwrap()
            .set_seed(0);
        let samples = chain.run(8000, 0).unwrap();

        assert_abs_diff_eq!(samples.acceptance_rate(), 1.0);
        for j in 0..dim {
            assert_abs_diff_eq!(samples.mean()[j], 0.0, epsilon = 0.06);
        }
    }

    #[test]
    fn chains_are_reproducible_given_a_seed() {
        let prior: Distribution = Gaussian::isotropic(DVector::zeros(2), 1.0).unwrap().into();
        let likelihood = constant_likelihood(2);
        let posterior = Posterior::new(&prior, &likelihood).unwrap();

        let run = |seed| {
            Pcn::new(&posterior, DVector::zeros(2), 0.5)
                .unwrap()
                .set_seed(seed)
                .run(200, 50)
                .unwrap()
        };
        assert_eq!(run(42).data(), run(42).data());
        assert_ne!(run(42).data(), run(43).data());
    }

    #[test]
    fn solve_failures_reject_without_terminating_the_chain() {
        let dim = 2;
        let initial = DVector::from_vec(vec![0.25, -0.75]);
        let model = Model::new(
            OnlyAt {
                good: initial.clone(),
            },
            Discrete::new(dim),
            Discrete::new(dim),
            Reparam::Identity,
        );
        let noise = Gaussian::isotropic(DVector::zeros(dim), 1.0).unwrap();
        let likelihood = Likelihood::new(model, noise.into(), DVector::zeros(dim)).unwrap();
        let prior: Distribution = Gaussian::isotropic(DVector::zeros(dim), 1.0).unwrap().into();
        let posterior = Posterior::new(&prior, &likelihood).unwrap();

        let mut chain = Pcn::new(&posterior, initial.clone(), 0.5)
            .unwrap()
            .set_seed(7);
        let samples = chain.run(100, 0).unwrap();

        // Every proposal failed to solve, so every step repeated the previous
        // state and the run still completed.
        assert_eq!(samples.len(), 100);
        assert_abs_diff_eq!(samples.acceptance_rate(), 0.0);
        for i in 0..samples.len() {
            for j in 0..dim {
                assert_abs_diff_eq!(samples.data()[(i, j)], initial[j]);
            }
        }
    }

    #[test]
    fn adaptation_raises_the_scale_under_certain_acceptance() {
        let prior: Distribution = Gaussian::isotropic(DVector::zeros(2), 1.0).unwrap().into();
        let likelihood = constant_likelihood(2);
        let posterior = Posterior::new(&prior, &likelihood).unwrap();

        // Constant likelihood: every proposal accepted, rate 1.0 > target,
        // so ten blocks multiply the scale by 1.1 each.
        let mut chain = Pcn::new(&posterior, DVector::zeros(2), 0.2)
            .unwrap()
            .set_seed(1)
            .with_adaptation(AdaptOptions::default());
        chain.run(500, 0).unwrap();
        assert_abs_diff_eq!(chain.scale(), 0.2 * 1.1_f64.powi(10), epsilon = 1e-12);
    }

    #[test]
    fn adaptation_lowers_the_scale_under_certain_rejection() {
        let dim = 2;
        let initial = DVector::zeros(dim);
        let model = Model::new(
            OnlyAt {
                good: initial.clone(),
            },
            Discrete::new(dim),
            Discrete::new(dim),
            Reparam::Identity,
        );
        let noise = Gaussian::isotropic(DVector::zeros(dim), 1.0).unwrap();
        let likelihood = Likelihood::new(model, noise.into(), DVector::zeros(dim)).unwrap();
        let prior: Distribution = Gaussian::isotropic(DVector::zeros(dim), 1.0).unwrap().into();
        let posterior = Posterior::new(&prior, &likelihood).unwrap();

        let mut chain = Pcn::new(&posterior, initial, 0.2)
            .unwrap()
            .set_seed(1)
            .with_adaptation(AdaptOptions::default());
        chain.run(500, 0).unwrap();
        assert_abs_diff_eq!(chain.scale(), 0.2 / 1.1_f64.powi(10), epsilon = 1e-12);
    }

    #[test]
    fn adaptation_respects_its_bounds() {
        let prior: Distribution = Gaussian::isotropic(DVector::zeros(2), 1.0).unwrap().into();
        let likelihood = constant_likelihood(2);
        let posterior = Posterior::new(&prior, &likelihood).unwrap();

        let mut chain = Pcn::new(&posterior, DVector::zeros(2), 0.9)
            .unwrap()
            .set_seed(1)
            .with_adaptation(AdaptOptions::default());
        chain.run(5000, 0).unwrap();
        assert_abs_diff_eq!(chain.scale(), 1.0);
    }

    #[test]
    fn invalid_scale_is_rejected_at_construction() {
        let prior: Distribution = Gaussian::isotropic(DVector::zeros(2), 1.0).unwrap().into();
        let likelihood = constant_likelihood(2);
        let posterior = Posterior::new(&prior, &likelihood).unwrap();

        for bad in [0.0, -0.1, 1.5] {
            assert!(matches!(
                Pcn::new(&posterior, DVector::zeros(2), bad),
                Err(Error::InvalidScale(_))
            ));
        }
    }

    #[test]
    fn multi_chain_sampler_seeds_chains_consecutively() {
        let prior: Distribution = Gaussian::isotropic(DVector::zeros(2), 1.0).unwrap().into();
        let likelihood = constant_likelihood(2);
        let posterior = Posterior::new(&prior, &likelihood).unwrap();

        let mut sampler = PcnSampler::new(&posterior, &DVector::zeros(2), 0.5, 3)
            .unwrap()
            .set_seed(42);
        assert_eq!(sampler.chains[0].seed, 42);
        assert_eq!(sampler.chains[2].seed, 44);

        let all = sampler.run(100, 10).unwrap();
        assert_eq!(all.len(), 3);
        assert_ne!(all[0].data(), all[1].data());
    }
}
