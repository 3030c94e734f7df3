//! Cooperative (chunked) runs.
//!
//! A cooperative run executes `chunk_size` steps at a time and hands control
//! back to its host between chunks. It drives the same step kernel as the
//! blocking run, so for the same random sequence both produce the same
//! [`RunResult`].
//!
//! Hosts that own their own loop (an animation frame callback, a game tick)
//! use [`CooperativeRun`] directly. Async hosts await
//! [`Annealer::run_cooperative`], which yields to the executor after every
//! chunk.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::task::{Context, Poll};

use super::progress::{Progress, ProgressSink};
use super::runner::{log_finish, Annealer, RunClaim, RunResult, StopCheck, StopReason};
use crate::error::Result;

/// An in-flight cooperative run.
///
/// Keeps the annealer claimed until dropped or finished, so any other run
/// requested meanwhile fails with
/// [`AnnealError::ConcurrentRunConflict`](crate::error::AnnealError::ConcurrentRunConflict).
/// The state itself is only locked while a chunk executes, so the run (and
/// the future driving it) can move between threads.
///
/// # Examples
///
/// ```
/// use u_ising::ising::{AnnealConfig, Annealer};
///
/// let annealer = Annealer::new(AnnealConfig::default().with_seed(3)).unwrap();
/// let mut run = annealer.begin_cooperative(None).unwrap();
/// while !run.is_finished() {
///     let progress = run.advance().unwrap();
///     // hand control back to the host here
///     assert!(progress.best_energy <= progress.current_energy);
/// }
/// let result = run.finish().unwrap();
/// assert_eq!(result.steps_completed, 1000);
/// ```
pub struct CooperativeRun<'a> {
    annealer: &'a Annealer,
    _claim: RunClaim<'a>,
    stop: StopCheck,
    stop_reason: Option<StopReason>,
}

impl CooperativeRun<'_> {
    /// Executes one chunk and returns the progress at its end.
    ///
    /// Stop conditions are checked before the chunk starts. Once the run is
    /// finished this only reports the final progress.
    pub fn advance(&mut self) -> Result<Progress> {
        let annealer = self.annealer;
        let config = annealer.config();
        let mut state = annealer.lock()?;

        if self.stop_reason.is_none() {
            if state.steps_done >= config.steps {
                self.stop_reason = Some(StopReason::Completed);
            } else if let Some(reason) = self.stop.poll() {
                self.stop_reason = Some(reason);
            } else {
                let end = (state.steps_done + config.chunk_size).min(config.steps);
                while state.steps_done < end {
                    state.advance(annealer.problem(), config)?;
                }
                if state.steps_done >= config.steps {
                    self.stop_reason = Some(StopReason::Completed);
                }
            }
        }

        Ok(state.progress(config.steps))
    }

    /// Whether every step has run or a stop condition fired.
    pub fn is_finished(&self) -> bool {
        self.stop_reason.is_some()
    }

    /// Progress at the current chunk boundary.
    pub fn progress(&self) -> Result<Progress> {
        Ok(self.annealer.lock()?.progress(self.annealer.config().steps))
    }

    /// Builds the result and releases the annealer.
    ///
    /// Finishing a run that has not completed reports it as cancelled.
    pub fn finish(self) -> Result<RunResult> {
        let reason = self.stop_reason.unwrap_or(StopReason::Cancelled);
        let result = self.annealer.lock()?.to_result(self.annealer.problem(), reason);
        log_finish(&result);
        Ok(result)
    }
}

impl Annealer {
    /// Starts a cooperative run driven by the caller.
    pub fn begin_cooperative(&self, cancel: Option<Arc<AtomicBool>>) -> Result<CooperativeRun<'_>> {
        let claim = self.claim()?;
        self.log_start("cooperative");
        self.lock()?.begin(self.problem(), self.config())?;

        Ok(CooperativeRun {
            annealer: self,
            _claim: claim,
            stop: StopCheck::new(self.config(), cancel),
            stop_reason: None,
        })
    }

    /// Runs to completion, yielding to the executor after every chunk.
    ///
    /// Progress is reported once per chunk.
    pub async fn run_cooperative<S: ProgressSink>(&self, sink: S) -> Result<RunResult> {
        self.run_cooperative_with_cancel(sink, None).await
    }

    /// Cooperative run with an optional cancellation token, checked between
    /// chunks.
    pub async fn run_cooperative_with_cancel<S: ProgressSink>(
        &self,
        mut sink: S,
        cancel: Option<Arc<AtomicBool>>,
    ) -> Result<RunResult> {
        let mut run = self.begin_cooperative(cancel)?;
        loop {
            let progress = run.advance()?;
            sink.report(&progress);
            if run.is_finished() {
                break;
            }
            yield_now().await;
        }
        run.finish()
    }
}

/// Returns `Pending` once, waking itself, then completes.
fn yield_now() -> YieldNow {
    YieldNow { yielded: false }
}

struct YieldNow {
    yielded: bool,
}

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            return Poll::Ready(());
        }
        self.yielded = true;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}
