//! Independent restarts over one shared instance.
//!
//! Every replica owns its own spins, temperature and random source; only
//! the problem (`J`, `h`) is shared, read-only, through an `Arc`. With the
//! `parallel` feature the replicas run on rayon's thread pool.

use std::sync::Arc;

use super::config::AnnealConfig;
use super::runner::{Annealer, RunResult};
use super::types::IsingProblem;
use crate::error::Result;

/// Runs one annealer per seed on `problem` and returns the results in seed
/// order.
///
/// `config.seed` is ignored; each replica uses its entry in `seeds`.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use u_ising::ising::{best_replica, run_replicas, AnnealConfig, IsingProblem};
///
/// let mut rng = rand::rng();
/// let problem = Arc::new(IsingProblem::random(12, &mut rng).unwrap());
/// let config = AnnealConfig::new(12, 5.0, 0.99, 500);
///
/// let results = run_replicas(&problem, &config, &[1, 2, 3, 4]).unwrap();
/// let best = best_replica(&results).unwrap();
/// assert!(results.iter().all(|r| best.best_energy <= r.best_energy));
/// ```
pub fn run_replicas(
    problem: &Arc<IsingProblem>,
    config: &AnnealConfig,
    seeds: &[u64],
) -> Result<Vec<RunResult>> {
    config.validate()?;

    let run_one = |&seed: &u64| -> Result<RunResult> {
        Annealer::with_problem(Arc::clone(problem), config.clone().with_seed(seed))?.run()
    };

    #[cfg(feature = "parallel")]
    let results: Result<Vec<RunResult>> = {
        use rayon::prelude::*;
        seeds.par_iter().map(run_one).collect()
    };

    #[cfg(not(feature = "parallel"))]
    let results: Result<Vec<RunResult>> = seeds.iter().map(run_one).collect();

    results
}

/// The replica with the lowest best energy.
pub fn best_replica(results: &[RunResult]) -> Option<&RunResult> {
    results
        .iter()
        .min_by(|a, b| a.best_energy.total_cmp(&b.best_energy))
}
