//! Background execution of a scan on its own thread.

use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::JoinHandle;

use tracing::warn;

use crate::error::{Result, UnsublyError};
use crate::provider::MailProvider;
use crate::timing::TimingTracker;

use super::cancel::CancelToken;
use super::controller::{ScanController, ScanOutcome, ScanRequest, ScanSettings};

/// Messages sent from the scan worker to its owner.
#[derive(Debug)]
pub enum ScanEvent {
    Progress { processed: usize, total: usize },
    Done(ScanOutcome),
    /// Setup failed before the scan started.
    Failed(UnsublyError),
}

/// Owner side of a running scan.
pub struct ScanHandle {
    cancel: CancelToken,
    events: Receiver<ScanEvent>,
    worker: JoinHandle<()>,
}

impl ScanHandle {
    /// Token that stops the worker at the next message boundary.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Event stream; ends after `Done` or `Failed`.
    pub fn events(&self) -> &Receiver<ScanEvent> {
        &self.events
    }

    /// Block until the scan ends, discarding progress events.
    pub fn wait(self) -> Result<ScanOutcome> {
        let mut result = None;
        for event in self.events.iter() {
            match event {
                ScanEvent::Progress { .. } => {}
                ScanEvent::Done(outcome) => result = Some(Ok(outcome)),
                ScanEvent::Failed(e) => result = Some(Err(e)),
            }
        }
        if self.worker.join().is_err() {
            return Err(UnsublyError::Provider("scan worker panicked".into()));
        }
        result.unwrap_or_else(|| {
            Err(UnsublyError::Provider(
                "scan worker exited without a result".into(),
            ))
        })
    }
}

/// Start a scan on a dedicated thread.
///
/// Progress and completion are delivered over an unbounded channel so the
/// worker never waits on its consumer. When `timing` is given, the elapsed
/// time is recorded before `Done` is sent.
pub fn spawn_scan<P>(
    provider: P,
    request: ScanRequest,
    settings: ScanSettings,
    cancel: CancelToken,
    timing: Option<TimingTracker>,
) -> std::io::Result<ScanHandle>
where
    P: MailProvider + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let worker_cancel = cancel.clone();

    let worker = std::thread::Builder::new()
        .name("unsubly-scan".into())
        .spawn(move || {
            let progress_tx = tx.clone();
            let mut controller = ScanController::new(provider, settings, worker_cancel);
            let result = controller.run(&request, &mut |processed, total| {
                let _ = progress_tx.send(ScanEvent::Progress { processed, total });
            });
            finish(&tx, result, timing.as_ref());
        })?;

    Ok(ScanHandle {
        cancel,
        events: rx,
        worker,
    })
}

fn finish(tx: &Sender<ScanEvent>, result: Result<ScanOutcome>, timing: Option<&TimingTracker>) {
    let event = match result {
        Ok(outcome) => {
            record_timing(timing, &outcome);
            ScanEvent::Done(outcome)
        }
        Err(e) => ScanEvent::Failed(e),
    };
    let _ = tx.send(event);
}

fn record_timing(timing: Option<&TimingTracker>, outcome: &ScanOutcome) {
    if let Some(tracker) = timing {
        if let Err(e) = tracker.record(outcome.elapsed, outcome.processed) {
            warn!(error = %e, "Could not record scan timing");
        }
    }
}

/// Callback-style entry point: run a scan in the background.
///
/// `on_progress(processed, total)` and `on_done(outcome)` run on the worker
/// thread and must return promptly. Timing is recorded before `on_done`.
/// Setup errors are returned through the join handle without calling
/// `on_done`.
pub fn run_scan<P, F, D>(
    provider: P,
    request: ScanRequest,
    settings: ScanSettings,
    cancel: CancelToken,
    timing: Option<TimingTracker>,
    mut on_progress: F,
    on_done: D,
) -> std::io::Result<JoinHandle<Result<()>>>
where
    P: MailProvider + Send + 'static,
    F: FnMut(usize, usize) + Send + 'static,
    D: FnOnce(ScanOutcome) + Send + 'static,
{
    std::thread::Builder::new()
        .name("unsubly-scan".into())
        .spawn(move || {
            let mut controller = ScanController::new(provider, settings, cancel);
            let outcome = controller.run(&request, &mut on_progress)?;
            record_timing(timing.as_ref(), &outcome);
            on_done(outcome);
            Ok(())
        })
}
