//! Simulated annealing for Ising-model spin systems.
//!
//! Searches for a spin assignment `s ∈ {+1, -1}^N` minimizing
//!
//! ```text
//! E(s) = -Σ_{i<j} J_ij s_i s_j - Σ_i h_i s_i
//! ```
//!
//! for a symmetric coupling matrix `J` and external field `h`, using
//! Metropolis acceptance and geometric cooling.
//!
//! - **Blocking runs** for batch jobs.
//! - **Cooperative runs** that execute in bounded chunks and yield between
//!   them, so a single-threaded host loop stays responsive.
//! - **Background runs** on a worker thread with a progress channel and
//!   cancellation.
//! - **Replicas**: independent restarts over one shared instance, optionally
//!   in parallel.
//!
//! Every run is reproducible from a seed or an injected random source.
//!
//! # Quick start
//!
//! ```
//! use u_ising::ising::{AnnealConfig, Annealer};
//!
//! let config = AnnealConfig::new(10, 100.0, 0.95, 1000).with_seed(42);
//! let annealer = Annealer::new(config)?;
//! let result = annealer.run()?;
//!
//! let exact = annealer.problem().energy(&result.best_spins);
//! assert!((result.best_energy - exact).abs() < 1e-9);
//! # Ok::<(), u_ising::error::AnnealError>(())
//! ```

pub mod error;
pub mod ising;
