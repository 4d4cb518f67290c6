//! Chain-level plumbing shared by samplers: the [`MarkovChain`] abstraction and
//! helpers that advance a chain while collecting its states into a sample
//! matrix, with or without a progress bar.

use indicatif::{ProgressBar, ProgressStyle};
use ndarray::Array2;

use crate::error::Error;

/// One Markov chain advancing strictly sequentially.
pub trait MarkovChain {
    /// Does one iteration of the chain, returning the new current state.
    ///
    /// A fatal error aborts the run; recoverable per-proposal failures are
    /// handled inside the implementation (the chain re-emits its previous
    /// state).
    fn step(&mut self) -> Result<&[f64], Error>;

    /// The current state without stepping.
    fn current_state(&self) -> &[f64];
}

/// Advances `chain` for `n_steps`, collecting each post-step state as one row.
pub fn run_chain<M: MarkovChain>(chain: &mut M, n_steps: usize) -> Result<Array2<f64>, Error> {
    let dim = chain.current_state().len();
    let mut out = Array2::<f64>::zeros((n_steps, dim));
    for i in 0..n_steps {
        let state = chain.step()?;
        out.row_mut(i)
            .iter_mut()
            .zip(state)
            .for_each(|(o, &s)| *o = s);
    }
    Ok(out)
}

/// The progress-bar template used by all sampler front ends.
pub fn progress_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{prefix} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
        .expect("Expecting the progress bar template to parse.")
        .progress_chars("##-")
}

/// Like [`run_chain`], updating `pb` once per iteration.
pub fn run_chain_with_progress<M: MarkovChain>(
    chain: &mut M,
    n_steps: usize,
    pb: &ProgressBar,
) -> Result<Array2<f64>, Error> {
    let dim = chain.current_state().len();
    let mut out = Array2::<f64>::zeros((n_steps, dim));
    pb.set_length(n_steps as u64);
    for i in 0..n_steps {
        let state = chain.step()?;
        out.row_mut(i)
            .iter_mut()
            .zip(state)
            .for_each(|(o, &s)| *o = s);
        pb.inc(1);
    }
    Ok(out)
}
