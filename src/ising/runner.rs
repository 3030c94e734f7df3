//! Annealer state, Metropolis step kernel and blocking run.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::time::{Duration, Instant};

use rand::{Rng, RngCore};
use tracing::{debug, trace, warn};
use u_numflow::random::create_rng;

use super::config::AnnealConfig;
use super::progress::{Progress, ProgressSink};
use super::types::{random_spins, IsingProblem, Spin};
use crate::error::{AnnealError, Degeneracy, Result};

const MAX_PREALLOCATED_SAMPLES: usize = 1 << 16;

/// Random source owned by an [`Annealer`].
pub type SpinRng = Box<dyn RngCore + Send>;

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StopReason {
    /// All configured steps were executed.
    Completed,
    /// The cancellation flag was raised.
    Cancelled,
    /// The configured wall-clock budget ran out.
    TimeLimit,
}

/// Result of an annealing run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RunResult {
    /// Lowest-energy configuration seen.
    pub best_spins: Vec<Spin>,

    /// Energy of `best_spins`.
    pub best_energy: f64,

    /// Configuration when the run stopped.
    pub final_spins: Vec<Spin>,

    /// Energy of `final_spins`.
    pub final_energy: f64,

    /// Energy sampled every `history_interval` steps, starting with the
    /// initial energy.
    pub energy_history: Vec<f64>,

    /// Temperature sampled alongside `energy_history`.
    pub temperature_history: Vec<f64>,

    /// Completed-step count of each history sample.
    pub history_steps: Vec<usize>,

    /// Coupling matrix `J` of the annealed instance.
    pub interaction_matrix: Vec<Vec<f64>>,

    /// External field `h` of the annealed instance.
    pub external_field: Vec<f64>,

    /// Steps executed.
    pub steps_completed: usize,

    /// Number of accepted flips (including improvements).
    pub accepted_moves: usize,

    /// Number of accepted flips that lowered the energy.
    pub improving_moves: usize,

    /// Temperature when the run stopped.
    pub final_temperature: f64,

    /// Why the run stopped.
    pub stop_reason: StopReason,
}

impl RunResult {
    /// Whether the run was stopped before executing every step.
    pub fn cancelled(&self) -> bool {
        self.stop_reason != StopReason::Completed
    }
}

/// Copy of the annealer's live and best configurations.
#[derive(Debug, Clone, PartialEq)]
pub struct StateSnapshot {
    /// Live spin configuration.
    pub spins: Vec<Spin>,
    /// Energy of `spins`.
    pub energy: f64,
    /// Lowest-energy configuration seen so far.
    pub best_spins: Vec<Spin>,
    /// Energy of `best_spins`.
    pub best_energy: f64,
    /// Current temperature.
    pub temperature: f64,
}

/// Mutable search state. Only the step kernel writes to it.
pub(crate) struct SearchState {
    rng: SpinRng,
    spins: Vec<Spin>,
    current_energy: f64,
    best_spins: Vec<Spin>,
    best_energy: f64,
    temperature: f64,
    pub(crate) steps_done: usize,
    accepted_moves: usize,
    improving_moves: usize,
    energy_history: Vec<f64>,
    temperature_history: Vec<f64>,
    history_steps: Vec<usize>,
}

impl SearchState {
    fn new(problem: &IsingProblem, mut rng: SpinRng, config: &AnnealConfig) -> Self {
        let spins = random_spins(problem.spin_count(), &mut rng);
        let energy = problem.energy(&spins);

        Self {
            rng,
            best_spins: spins.clone(),
            spins,
            current_energy: energy,
            best_energy: energy,
            temperature: config.initial_temperature,
            steps_done: 0,
            accepted_moves: 0,
            improving_moves: 0,
            energy_history: Vec::new(),
            temperature_history: Vec::new(),
            history_steps: Vec::new(),
        }
    }

    /// Resets the schedule, counters and history for a fresh run.
    pub(crate) fn begin(&mut self, problem: &IsingProblem, config: &AnnealConfig) -> Result<()> {
        self.temperature = config.initial_temperature;
        self.steps_done = 0;
        self.accepted_moves = 0;
        self.improving_moves = 0;

        self.current_energy = problem.energy(&self.spins);
        if !self.current_energy.is_finite() {
            return Err(self.degenerate(Degeneracy::NonFiniteEnergy));
        }
        if self.current_energy < self.best_energy {
            self.best_spins.clone_from_slice(&self.spins);
            self.best_energy = self.current_energy;
        }

        let samples = (config.steps / config.history_interval + 2).min(MAX_PREALLOCATED_SAMPLES);
        self.energy_history = Vec::with_capacity(samples);
        self.temperature_history = Vec::with_capacity(samples);
        self.history_steps = Vec::with_capacity(samples);
        self.record_sample();
        Ok(())
    }

    /// One Metropolis move followed by one temperature decay.
    pub(crate) fn advance(&mut self, problem: &IsingProblem, config: &AnnealConfig) -> Result<()> {
        if self.temperature.is_nan() || self.temperature <= 0.0 {
            return Err(self.degenerate(Degeneracy::TemperatureUnderflow));
        }

        let step_index = self.steps_done;
        let index = self.rng.random_range(0..problem.spin_count());
        let delta = problem.energy_delta(&self.spins, index);
        if !delta.is_finite() {
            return Err(self.degenerate(Degeneracy::NonFiniteEnergy));
        }

        // Metropolis acceptance criterion
        let accept = if delta < 0.0 {
            self.improving_moves += 1;
            true
        } else {
            let probability = (-delta / self.temperature).exp();
            self.rng.random_range(0.0..1.0) < probability
        };

        if accept {
            self.spins[index] = -self.spins[index];
            self.current_energy += delta;
            self.accepted_moves += 1;

            if !self.current_energy.is_finite() {
                return Err(self.degenerate(Degeneracy::NonFiniteEnergy));
            }
            if self.current_energy < self.best_energy {
                self.best_spins.clone_from_slice(&self.spins);
                self.best_energy = self.current_energy;
            }
        }

        self.temperature *= config.cooling_rate;
        self.steps_done += 1;

        if let Some(every) = config.resync_interval {
            if self.steps_done % every == 0 {
                self.resync(problem);
            }
        }

        if step_index % config.history_interval == 0 {
            self.record_sample();
        }
        Ok(())
    }

    fn resync(&mut self, problem: &IsingProblem) {
        let exact = problem.energy(&self.spins);
        trace!(
            step = self.steps_done,
            drift = exact - self.current_energy,
            "energy resynchronized"
        );
        self.current_energy = exact;
        if self.current_energy < self.best_energy {
            self.best_spins.clone_from_slice(&self.spins);
            self.best_energy = self.current_energy;
        }
    }

    fn record_sample(&mut self) {
        self.energy_history.push(self.current_energy);
        self.temperature_history.push(self.temperature);
        self.history_steps.push(self.steps_done);
    }

    fn degenerate(&self, kind: Degeneracy) -> AnnealError {
        warn!(step = self.steps_done, %kind, "numeric degeneracy, aborting run");
        AnnealError::NumericDegeneracy {
            step: self.steps_done,
            kind,
        }
    }

    pub(crate) fn progress(&self, total_steps: usize) -> Progress {
        let percent = if total_steps == 0 {
            100.0
        } else {
            self.steps_done as f64 / total_steps as f64 * 100.0
        };
        Progress {
            step: self.steps_done,
            total_steps,
            current_energy: self.current_energy,
            best_energy: self.best_energy,
            temperature: self.temperature,
            percent,
        }
    }

    pub(crate) fn to_result(&self, problem: &IsingProblem, stop_reason: StopReason) -> RunResult {
        RunResult {
            best_spins: self.best_spins.clone(),
            best_energy: self.best_energy,
            final_spins: self.spins.clone(),
            final_energy: self.current_energy,
            energy_history: self.energy_history.clone(),
            temperature_history: self.temperature_history.clone(),
            history_steps: self.history_steps.clone(),
            interaction_matrix: problem.coupling_matrix(),
            external_field: problem.field().to_vec(),
            steps_completed: self.steps_done,
            accepted_moves: self.accepted_moves,
            improving_moves: self.improving_moves,
            final_temperature: self.temperature,
            stop_reason,
        }
    }

    fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            spins: self.spins.clone(),
            energy: self.current_energy,
            best_spins: self.best_spins.clone(),
            best_energy: self.best_energy,
            temperature: self.temperature,
        }
    }
}

/// Stop conditions polled at chunk boundaries.
pub(crate) struct StopCheck {
    cancel: Option<Arc<AtomicBool>>,
    deadline: Option<Instant>,
}

impl StopCheck {
    pub(crate) fn new(config: &AnnealConfig, cancel: Option<Arc<AtomicBool>>) -> Self {
        Self {
            cancel,
            deadline: config
                .time_limit_ms
                .map(|ms| Instant::now() + Duration::from_millis(ms)),
        }
    }

    pub(crate) fn poll(&self) -> Option<StopReason> {
        if let Some(ref flag) = self.cancel {
            if flag.load(Ordering::Relaxed) {
                return Some(StopReason::Cancelled);
            }
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(StopReason::TimeLimit),
            _ => None,
        }
    }
}

/// Marks an annealer as busy; released on drop.
pub(crate) struct RunClaim<'a> {
    running: &'a AtomicBool,
}

impl Drop for RunClaim<'_> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

/// Simulated annealer for one Ising problem instance.
///
/// Owns the problem (shared read-only behind an `Arc`), the live spin
/// configuration, the best configuration found and the random source.
/// A run claims the annealer for its whole duration; requesting a second
/// run (or a snapshot) while one is in flight fails with
/// [`AnnealError::ConcurrentRunConflict`].
///
/// # Examples
///
/// ```
/// use u_ising::ising::{AnnealConfig, Annealer};
///
/// let config = AnnealConfig::new(16, 5.0, 0.995, 2_000).with_seed(42);
/// let annealer = Annealer::new(config).unwrap();
/// let result = annealer.run().unwrap();
///
/// assert!(result.best_energy <= result.final_energy);
/// assert_eq!(result.steps_completed, 2_000);
/// ```
pub struct Annealer {
    config: AnnealConfig,
    problem: Arc<IsingProblem>,
    state: Mutex<SearchState>,
    running: AtomicBool,
}

impl fmt::Debug for Annealer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Annealer")
            .field("config", &self.config)
            .field("spin_count", &self.problem.spin_count())
            .finish_non_exhaustive()
    }
}

impl Annealer {
    /// Generates a random instance of `config.spin_count` spins and a random
    /// initial configuration.
    pub fn new(config: AnnealConfig) -> Result<Self> {
        config.validate()?;
        let rng = seeded_rng(config.seed);
        Self::with_rng(config, rng)
    }

    /// Like [`new`](Self::new), drawing everything from `rng` instead of
    /// the configured seed.
    pub fn with_rng<R: RngCore + Send + 'static>(config: AnnealConfig, rng: R) -> Result<Self> {
        config.validate()?;
        let mut rng: SpinRng = Box::new(rng);
        let problem = IsingProblem::random(config.spin_count, &mut rng)?;
        Ok(Self::assemble(config, Arc::new(problem), rng))
    }

    /// Anneals a caller-supplied instance. `config.spin_count` must match.
    pub fn with_problem(problem: impl Into<Arc<IsingProblem>>, config: AnnealConfig) -> Result<Self> {
        let rng = seeded_rng(config.seed);
        Self::with_problem_and_rng(problem, config, rng)
    }

    /// Anneals a caller-supplied instance with an injected random source.
    pub fn with_problem_and_rng<R: RngCore + Send + 'static>(
        problem: impl Into<Arc<IsingProblem>>,
        config: AnnealConfig,
        rng: R,
    ) -> Result<Self> {
        config.validate()?;
        let problem = problem.into();
        if problem.spin_count() != config.spin_count {
            return Err(AnnealError::invalid(format!(
                "spin_count is {} but the problem has {} spins",
                config.spin_count,
                problem.spin_count()
            )));
        }
        Ok(Self::assemble(config, problem, Box::new(rng)))
    }

    fn assemble(config: AnnealConfig, problem: Arc<IsingProblem>, rng: SpinRng) -> Self {
        let state = SearchState::new(&problem, rng, &config);
        Self {
            config,
            problem,
            state: Mutex::new(state),
            running: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &AnnealConfig {
        &self.config
    }

    pub fn problem(&self) -> &Arc<IsingProblem> {
        &self.problem
    }

    /// Copies the current and best configurations.
    ///
    /// Fails with [`AnnealError::ConcurrentRunConflict`] while a run is in
    /// flight.
    pub fn snapshot(&self) -> Result<StateSnapshot> {
        let _claim = self.claim()?;
        Ok(self.lock()?.snapshot())
    }

    /// Runs to completion, blocking the calling thread.
    pub fn run(&self) -> Result<RunResult> {
        self.run_with_cancel((), None)
    }

    /// Runs to completion, reporting every `progress_interval` steps.
    pub fn run_with_progress<S: ProgressSink>(&self, sink: S) -> Result<RunResult> {
        self.run_with_cancel(sink, None)
    }

    /// Runs with an optional cancellation token.
    ///
    /// The flag and the time limit are checked every `chunk_size` steps.
    /// A stopped run still returns the state reached, with
    /// [`RunResult::stop_reason`] set accordingly.
    pub fn run_with_cancel<S: ProgressSink>(
        &self,
        mut sink: S,
        cancel: Option<Arc<AtomicBool>>,
    ) -> Result<RunResult> {
        let _claim = self.claim()?;
        let mut state = self.lock()?;
        self.log_start("blocking");
        state.begin(&self.problem, &self.config)?;

        let stop = StopCheck::new(&self.config, cancel);
        let mut stop_reason = StopReason::Completed;

        while state.steps_done < self.config.steps {
            if state.steps_done % self.config.chunk_size == 0 {
                if let Some(reason) = stop.poll() {
                    stop_reason = reason;
                    break;
                }
            }

            let step_index = state.steps_done;
            state.advance(&self.problem, &self.config)?;

            if step_index % self.config.progress_interval == 0 {
                sink.report(&state.progress(self.config.steps));
            }
        }

        let result = state.to_result(&self.problem, stop_reason);
        log_finish(&result);
        Ok(result)
    }

    /// Marks the annealer busy, or fails if another run already did.
    pub(crate) fn claim(&self) -> Result<RunClaim<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .map_err(|_| AnnealError::ConcurrentRunConflict)?;
        Ok(RunClaim {
            running: &self.running,
        })
    }

    /// Locks the search state. Callers hold a [`RunClaim`] first.
    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, SearchState>> {
        match self.state.try_lock() {
            Ok(guard) => Ok(guard),
            Err(TryLockError::WouldBlock) => Err(AnnealError::ConcurrentRunConflict),
            // A panicking sink leaves the state at a step boundary.
            Err(TryLockError::Poisoned(poisoned)) => Ok(poisoned.into_inner()),
        }
    }

    pub(crate) fn log_start(&self, mode: &'static str) {
        debug!(
            spins = self.problem.spin_count(),
            steps = self.config.steps,
            initial_temperature = self.config.initial_temperature,
            cooling_rate = self.config.cooling_rate,
            mode,
            "annealing run started"
        );
    }
}

pub(crate) fn log_finish(result: &RunResult) {
    debug!(
        best_energy = result.best_energy,
        final_energy = result.final_energy,
        steps = result.steps_completed,
        accepted = result.accepted_moves,
        stop_reason = ?result.stop_reason,
        "annealing run finished"
    );
}

fn seeded_rng(seed: Option<u64>) -> impl RngCore + Send + 'static {
    match seed {
        Some(seed) => create_rng(seed),
        None => create_rng(rand::random()),
    }
}
