//! Annealer configuration.

use crate::error::{AnnealError, Result};

/// Configuration for an Ising annealing run.
///
/// The temperature follows a geometric schedule, `T_k = T_0 * r^k`, decayed
/// once per step regardless of whether the move was accepted.
///
/// # Examples
///
/// ```
/// use u_ising::ising::AnnealConfig;
///
/// let config = AnnealConfig::default()
///     .with_spin_count(32)
///     .with_initial_temperature(10.0)
///     .with_cooling_rate(0.999)
///     .with_steps(5_000)
///     .with_seed(7);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AnnealConfig {
    /// Number of spins `N`. Must be at least 2.
    pub spin_count: usize,

    /// Initial temperature `T_0`. Higher values allow more uphill moves early on.
    pub initial_temperature: f64,

    /// Geometric cooling factor in (0, 1). Higher = slower cooling.
    pub cooling_rate: f64,

    /// Number of Metropolis steps per run.
    pub steps: usize,

    /// Stride (in steps) at which energy and temperature are sampled.
    pub history_interval: usize,

    /// Stride (in steps) at which the blocking run reports progress.
    pub progress_interval: usize,

    /// Steps executed per scheduling quantum in cooperative mode.
    ///
    /// Stop conditions (cancellation, time limit) are checked at the same
    /// boundaries in both modes.
    pub chunk_size: usize,

    /// Random seed for reproducibility.
    pub seed: Option<u64>,

    /// Wall-clock budget for a single run, in milliseconds.
    ///
    /// Relies on `std::time::Instant`, which wasm32-unknown-unknown lacks;
    /// leave it unset there.
    pub time_limit_ms: Option<u64>,

    /// Replace the incrementally tracked energy with a full recomputation
    /// every `k` steps. `None` trusts the deltas for the whole run.
    pub resync_interval: Option<usize>,
}

impl Default for AnnealConfig {
    fn default() -> Self {
        Self {
            spin_count: 10,
            initial_temperature: 100.0,
            cooling_rate: 0.95,
            steps: 1000,
            history_interval: 10,
            progress_interval: 100,
            chunk_size: 10,
            seed: None,
            time_limit_ms: None,
            resync_interval: None,
        }
    }
}

impl AnnealConfig {
    /// Creates a configuration from the four core parameters, keeping
    /// default cadences.
    pub fn new(spin_count: usize, initial_temperature: f64, cooling_rate: f64, steps: usize) -> Self {
        Self {
            spin_count,
            initial_temperature,
            cooling_rate,
            steps,
            ..Self::default()
        }
    }

    pub fn with_spin_count(mut self, n: usize) -> Self {
        self.spin_count = n;
        self
    }

    pub fn with_initial_temperature(mut self, t: f64) -> Self {
        self.initial_temperature = t;
        self
    }

    pub fn with_cooling_rate(mut self, rate: f64) -> Self {
        self.cooling_rate = rate;
        self
    }

    pub fn with_steps(mut self, n: usize) -> Self {
        self.steps = n;
        self
    }

    pub fn with_history_interval(mut self, n: usize) -> Self {
        self.history_interval = n;
        self
    }

    pub fn with_progress_interval(mut self, n: usize) -> Self {
        self.progress_interval = n;
        self
    }

    pub fn with_chunk_size(mut self, n: usize) -> Self {
        self.chunk_size = n;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_time_limit_ms(mut self, ms: u64) -> Self {
        self.time_limit_ms = Some(ms);
        self
    }

    pub fn with_resync_interval(mut self, n: usize) -> Self {
        self.resync_interval = Some(n);
        self
    }

    /// Temperature expected after `k` steps of the geometric schedule.
    pub fn temperature_at(&self, k: usize) -> f64 {
        self.initial_temperature * self.cooling_rate.powf(k as f64)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.spin_count < 2 {
            return Err(AnnealError::invalid(format!(
                "spin_count must be at least 2, got {}",
                self.spin_count
            )));
        }
        if !(self.initial_temperature > 0.0 && self.initial_temperature.is_finite()) {
            return Err(AnnealError::invalid(format!(
                "initial_temperature must be positive and finite, got {}",
                self.initial_temperature
            )));
        }
        if !(self.cooling_rate > 0.0 && self.cooling_rate < 1.0) {
            return Err(AnnealError::invalid(format!(
                "cooling_rate must be in (0, 1), got {}",
                self.cooling_rate
            )));
        }
        if self.history_interval == 0 {
            return Err(AnnealError::invalid("history_interval must be positive"));
        }
        if self.progress_interval == 0 {
            return Err(AnnealError::invalid("progress_interval must be positive"));
        }
        if self.chunk_size == 0 {
            return Err(AnnealError::invalid("chunk_size must be positive"));
        }
        if self.time_limit_ms == Some(0) {
            return Err(AnnealError::invalid("time_limit_ms must be positive or None"));
        }
        if self.resync_interval == Some(0) {
            return Err(AnnealError::invalid("resync_interval must be positive or None"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AnnealConfig::default();
        assert_eq!(config.spin_count, 10);
        assert!((config.initial_temperature - 100.0).abs() < 1e-10);
        assert!((config.cooling_rate - 0.95).abs() < 1e-15);
        assert_eq!(config.steps, 1000);
        assert_eq!(config.history_interval, 10);
        assert_eq!(config.progress_interval, 100);
        assert_eq!(config.chunk_size, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_new_keeps_default_cadence() {
        let config = AnnealConfig::new(4, 2.0, 0.5, 0);
        assert_eq!(config.spin_count, 4);
        assert_eq!(config.steps, 0);
        assert_eq!(config.chunk_size, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_single_spin() {
        let err = AnnealConfig::default().with_spin_count(1).validate();
        assert!(matches!(err, Err(AnnealError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_validate_bad_temperature() {
        for t in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let config = AnnealConfig::default().with_initial_temperature(t);
            assert!(config.validate().is_err(), "accepted T0 = {t}");
        }
    }

    #[test]
    fn test_validate_bad_cooling_rate() {
        for r in [0.0, 1.0, 1.5, -0.2, f64::NAN] {
            let config = AnnealConfig::default().with_cooling_rate(r);
            assert!(config.validate().is_err(), "accepted rate = {r}");
        }
    }

    #[test]
    fn test_validate_zero_cadences() {
        assert!(AnnealConfig::default().with_history_interval(0).validate().is_err());
        assert!(AnnealConfig::default().with_progress_interval(0).validate().is_err());
        assert!(AnnealConfig::default().with_chunk_size(0).validate().is_err());
        assert!(AnnealConfig::default().with_time_limit_ms(0).validate().is_err());
        assert!(AnnealConfig::default().with_resync_interval(0).validate().is_err());
    }

    #[test]
    fn test_temperature_at() {
        let config = AnnealConfig::default()
            .with_initial_temperature(8.0)
            .with_cooling_rate(0.5);
        assert!((config.temperature_at(0) - 8.0).abs() < 1e-12);
        assert!((config.temperature_at(3) - 1.0).abs() < 1e-12);
    }
}
