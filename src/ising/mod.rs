//! Simulated annealing for the Ising model.
//!
//! Minimizes `E(s) = -Σ_{i<j} J_ij s_i s_j - Σ_i h_i s_i` over spins
//! `s_i ∈ {+1, -1}` with single-spin-flip Metropolis moves under a
//! geometric temperature schedule. Each step evaluates the flip in O(N)
//! through the local field of the chosen spin instead of recomputing the
//! Hamiltonian.
//!
//! Two execution modes share one step kernel:
//!
//! - [`Annealer::run`]: blocks until every step has run.
//! - [`Annealer::run_cooperative`] / [`CooperativeRun`]: executes the run in
//!   bounded chunks and returns control to the host between them.
//!
//! # References
//!
//! - Kirkpatrick, Gelatt & Vecchi (1983), "Optimization by Simulated Annealing"
//! - Metropolis et al. (1953), "Equation of State Calculations by Fast
//!   Computing Machines"

mod config;
mod cooperative;
mod progress;
mod replicas;
mod runner;
mod task;
mod types;

pub use config::AnnealConfig;
pub use cooperative::CooperativeRun;
pub use progress::{Progress, ProgressSink};
pub use replicas::{best_replica, run_replicas};
pub use runner::{Annealer, RunResult, SpinRng, StateSnapshot, StopReason};
pub use task::AnnealTask;
pub use types::{IsingProblem, Spin};
