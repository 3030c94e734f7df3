//! Error types for annealing runs.

use thiserror::Error;

/// Kind of numeric breakdown detected during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Degeneracy {
    /// The temperature decayed to zero (or was never positive).
    TemperatureUnderflow,
    /// An energy or energy delta stopped being finite.
    NonFiniteEnergy,
}

impl std::fmt::Display for Degeneracy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Degeneracy::TemperatureUnderflow => f.write_str("temperature underflowed to zero"),
            Degeneracy::NonFiniteEnergy => f.write_str("energy is not finite"),
        }
    }
}

/// Errors returned by the annealer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnnealError {
    /// Configuration or problem instance rejected before a run could start.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A run was requested while another run holds the annealer state.
    #[error("a run is already in progress on this annealer")]
    ConcurrentRunConflict,

    /// The search produced a value it cannot continue from.
    #[error("numeric degeneracy at step {step}: {kind}")]
    NumericDegeneracy {
        /// Number of steps completed when the problem was detected.
        step: usize,
        /// What went wrong.
        kind: Degeneracy,
    },

    /// The thread driving a background run panicked.
    #[error("annealing worker panicked")]
    WorkerPanicked,
}

impl AnnealError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        AnnealError::InvalidConfiguration(msg.into())
    }
}

/// Result type for annealing operations.
pub type Result<T> = std::result::Result<T, AnnealError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = AnnealError::invalid("cooling_rate must be in (0, 1), got 1");
        assert_eq!(
            err.to_string(),
            "invalid configuration: cooling_rate must be in (0, 1), got 1"
        );

        let err = AnnealError::NumericDegeneracy {
            step: 17,
            kind: Degeneracy::TemperatureUnderflow,
        };
        assert_eq!(
            err.to_string(),
            "numeric degeneracy at step 17: temperature underflowed to zero"
        );
    }
}
