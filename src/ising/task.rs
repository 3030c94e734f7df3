//! Background runs on a dedicated thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver};

use super::progress::Progress;
use super::runner::{Annealer, RunResult};
use crate::error::{AnnealError, Result};

/// Handle to a blocking run executing on its own thread.
///
/// Progress updates arrive on [`progress`](Self::progress) at the blocking
/// run's cadence. The channel closes when the run ends.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use u_ising::ising::{AnnealConfig, Annealer};
///
/// let annealer = Arc::new(Annealer::new(AnnealConfig::default().with_seed(5)).unwrap());
/// let task = Arc::clone(&annealer).spawn();
///
/// let updates = task.progress().iter().count();
/// let result = task.join().unwrap();
///
/// assert_eq!(updates, 10);
/// assert_eq!(result.steps_completed, 1000);
/// ```
#[derive(Debug)]
pub struct AnnealTask {
    handle: JoinHandle<Result<RunResult>>,
    progress: Receiver<Progress>,
    cancel: Arc<AtomicBool>,
}

impl AnnealTask {
    /// Progress updates emitted by the run.
    pub fn progress(&self) -> &Receiver<Progress> {
        &self.progress
    }

    /// Asks the run to stop at the next chunk boundary.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Whether the worker thread has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the run and returns its result.
    pub fn join(self) -> Result<RunResult> {
        self.handle.join().map_err(|_| AnnealError::WorkerPanicked)?
    }
}

impl Annealer {
    /// Runs in blocking mode on a new thread.
    ///
    /// The annealer stays locked for the duration, so other runs requested
    /// on it fail with [`AnnealError::ConcurrentRunConflict`].
    pub fn spawn(self: Arc<Self>) -> AnnealTask {
        let (tx, rx) = channel::unbounded::<Progress>();
        let cancel = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancel);

        let handle = thread::spawn(move || self.run_with_cancel(tx, Some(flag)));

        AnnealTask {
            handle,
            progress: rx,
            cancel,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ising::{AnnealConfig, StopReason};

    #[test]
    fn test_spawn_matches_blocking_run() {
        let config = AnnealConfig::new(20, 5.0, 0.995, 2_000).with_seed(44);
        let expected = Annealer::new(config.clone()).unwrap().run().unwrap();

        let task = Arc::new(Annealer::new(config).unwrap()).spawn();
        let steps: Vec<usize> = task.progress().iter().map(|p| p.step).collect();
        let result = task.join().unwrap();

        assert_eq!(steps.len(), 20);
        assert_eq!(steps[0], 1);
        assert_eq!(result, expected);
    }

    #[test]
    fn test_spawn_cancel() {
        let config = AnnealConfig::new(50, 10.0, 0.999_999_999, 1_000_000_000).with_seed(1);
        let task = Arc::new(Annealer::new(config).unwrap()).spawn();

        task.cancel();
        let result = task.join().unwrap();

        assert_eq!(result.stop_reason, StopReason::Cancelled);
        assert!(result.steps_completed < 1_000_000_000);
    }

    #[test]
    fn test_spawn_while_locked_conflicts() {
        let annealer = Arc::new(Annealer::new(AnnealConfig::default().with_seed(2)).unwrap());
        let run = annealer.begin_cooperative(None).unwrap();

        let task = Arc::clone(&annealer).spawn();
        assert_eq!(task.join().unwrap_err(), AnnealError::ConcurrentRunConflict);

        drop(run);
        assert!(annealer.run().is_ok());
    }

    #[test]
    fn test_spawn_reports_degeneracy() {
        let config = AnnealConfig::new(4, 1e-300, 1e-30, 20).with_seed(2);
        let task = Arc::new(Annealer::new(config).unwrap()).spawn();

        assert!(matches!(
            task.join(),
            Err(AnnealError::NumericDegeneracy { .. })
        ));
    }
}
