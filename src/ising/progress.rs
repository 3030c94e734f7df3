//! Progress reporting.

use crossbeam::channel::Sender;

/// Snapshot of a run in flight, handed to a [`ProgressSink`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Progress {
    /// Steps completed so far, counting the step just executed.
    ///
    /// A blocking run reports after zero-based step indices 0, 100, 200, ...
    /// (with the default `progress_interval`), so it reads 1, 101, 201, ...
    /// A cooperative run reports at chunk ends: 10, 20, 30, ...
    pub step: usize,
    /// Steps configured for the run.
    pub total_steps: usize,
    /// Energy of the live configuration.
    pub current_energy: f64,
    /// Lowest energy seen so far.
    pub best_energy: f64,
    /// Temperature after the last decay.
    pub temperature: f64,
    /// `step / total_steps * 100`, or 100 for an empty run.
    pub percent: f64,
}

/// Receives progress updates from a running annealer.
///
/// Called synchronously on the thread driving the run: every
/// `progress_interval` steps in blocking mode, once per chunk in
/// cooperative mode. Any `FnMut(&Progress)` closure is a sink, `()`
/// discards every update and a `crossbeam` [`Sender`] forwards each one.
///
/// # Examples
///
/// ```
/// use u_ising::ising::{AnnealConfig, Annealer, Progress};
///
/// let annealer = Annealer::new(AnnealConfig::default().with_seed(1)).unwrap();
/// let mut reports = 0;
/// annealer.run_with_progress(|_: &Progress| reports += 1).unwrap();
/// assert_eq!(reports, 10);
/// ```
pub trait ProgressSink {
    /// Handles one progress update.
    fn report(&mut self, progress: &Progress);
}

impl<F: FnMut(&Progress)> ProgressSink for F {
    fn report(&mut self, progress: &Progress) {
        self(progress)
    }
}

impl ProgressSink for () {
    fn report(&mut self, _: &Progress) {}
}

impl ProgressSink for Sender<Progress> {
    fn report(&mut self, progress: &Progress) {
        // A dropped receiver does not stop the run.
        let _ = self.send(*progress);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ising::{AnnealConfig, Annealer};
    use crossbeam::channel;

    #[test]
    fn test_unit_sink_discards() {
        let annealer = Annealer::new(AnnealConfig::default().with_seed(4)).unwrap();
        let result = annealer.run_with_progress(()).unwrap();
        assert_eq!(result.steps_completed, 1000);
    }

    #[test]
    fn test_sender_sink_forwards_every_update() {
        let config = AnnealConfig::new(12, 5.0, 0.99, 250).with_seed(4);
        let annealer = Annealer::new(config).unwrap();

        let (tx, rx) = channel::unbounded::<Progress>();
        annealer.run_with_progress(tx).unwrap();

        let steps: Vec<usize> = rx.iter().map(|p| p.step).collect();
        assert_eq!(steps, vec![1, 101, 201]);
    }

    #[test]
    fn test_sender_sink_survives_dropped_receiver() {
        let (tx, rx) = channel::unbounded::<Progress>();
        drop(rx);

        let annealer = Annealer::new(AnnealConfig::default().with_seed(4)).unwrap();
        assert!(annealer.run_with_progress(tx).is_ok());
    }
}
