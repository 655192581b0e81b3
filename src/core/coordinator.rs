use crate::core::error::CoordinatorError;
use crate::core::events::QueueEvent;
use crate::core::model::{RunId, RunOutcome, RunState};
use crate::plugins::registry::{MusicClient, OperationSink};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError};
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Runs queued URLs against a [`MusicClient`] one at a time on a background
/// task.
///
/// At most one run is active. Cancellation is cooperative: the flag is
/// checked before each URL, before each nested sub-operation and before an
/// item is reported finished. An in-flight client call is never interrupted,
/// so a hung call also blocks [`Coordinator::stop`].
pub struct Coordinator {
    client: Arc<dyn MusicClient>,
    subscribers: Subscribers,
    active: Mutex<Option<ActiveRun>>,
}

/// Fan-out of run events. Every subscriber gets its own unbounded channel,
/// so a slow reader never loses a status change.
#[derive(Clone, Default)]
struct Subscribers(Arc<std::sync::Mutex<Vec<mpsc::UnboundedSender<QueueEvent>>>>);

impl Subscribers {
    fn add(&self) -> mpsc::UnboundedReceiver<QueueEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.0.lock().unwrap_or_else(PoisonError::into_inner).push(tx);
        rx
    }

    // Dropped receivers are pruned on the next send.
    fn send(&self, event: QueueEvent) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|tx| tx.send(event.clone()).is_ok());
    }
}

struct ActiveRun {
    run_id: RunId,
    cancel: Arc<AtomicBool>,
    done: watch::Receiver<Option<RunOutcome>>,
}

impl ActiveRun {
    fn is_finished(&self) -> bool {
        self.done.borrow().is_some()
    }
}

impl Coordinator {
    pub fn new(client: Arc<dyn MusicClient>) -> Self {
        Self { client, subscribers: Subscribers::default(), active: Mutex::new(None) }
    }

    /// Receives every event sent after this call, in order.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<QueueEvent> {
        self.subscribers.add()
    }

    pub async fn state(&self) -> RunState {
        match self.active.lock().await.as_ref() {
            Some(run) if !run.is_finished() => RunState::Running,
            _ => RunState::Idle,
        }
    }

    /// Starts a run over `urls` and returns without waiting for it.
    pub async fn start(&self, urls: Vec<String>) -> Result<RunId, CoordinatorError> {
        let mut active = self.active.lock().await;
        if let Some(run) = active.as_ref() {
            if !run.is_finished() {
                warn!(run_id = %run.run_id, "start ignored, run already active");
                return Err(CoordinatorError::AlreadyRunning);
            }
        }

        let run_id = Uuid::new_v4();
        let cancel = Arc::new(AtomicBool::new(false));
        let (done_tx, done_rx) = watch::channel(None);

        info!(%run_id, items = urls.len(), "run started");

        let worker = Worker {
            run_id,
            client: self.client.clone(),
            cancel: cancel.clone(),
            subscribers: self.subscribers.clone(),
        };
        tokio::spawn(async move {
            let subscribers = worker.subscribers.clone();
            // The loop runs in its own task so a panicking client still ends
            // the run with exactly one AllFinished.
            let outcome = match tokio::spawn(worker.run(urls)).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(%run_id, "worker aborted: {}", e);
                    RunOutcome::Aborted
                }
            };
            info!(%run_id, ?outcome, "run finished");
            subscribers.send(QueueEvent::AllFinished { run_id, outcome });
            let _ = done_tx.send(Some(outcome));
        });

        *active = Some(ActiveRun { run_id, cancel, done: done_rx });
        Ok(run_id)
    }

    /// Sets the cancel flag without waiting for the worker.
    pub async fn request_stop(&self) {
        if let Some(run) = self.active.lock().await.as_ref() {
            if !run.is_finished() {
                info!(run_id = %run.run_id, "stop requested");
            }
            run.cancel.store(true, Ordering::SeqCst);
        }
    }

    /// Cancels the active run and waits for the worker to exit.
    ///
    /// No event is sent after this returns. Calling it while idle, or twice,
    /// is harmless.
    pub async fn stop(&self) -> Option<RunOutcome> {
        self.request_stop().await;
        self.wait().await
    }

    /// Waits for the active run, if any, to end on its own.
    pub async fn wait(&self) -> Option<RunOutcome> {
        let mut done = {
            let active = self.active.lock().await;
            active.as_ref()?.done.clone()
        };
        let outcome = *done.wait_for(Option::is_some).await.ok()?;
        outcome
    }
}

struct Worker {
    run_id: RunId,
    client: Arc<dyn MusicClient>,
    cancel: Arc<AtomicBool>,
    subscribers: Subscribers,
}

impl Worker {
    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    fn emit(&self, event: QueueEvent) {
        self.subscribers.send(event);
    }

    fn report(&self, index: usize, err: &anyhow::Error) {
        warn!(run_id = %self.run_id, index, "item failed: {:#}", err);
        self.emit(QueueEvent::ItemError { run_id: self.run_id, index, message: format!("{:#}", err) });
    }

    async fn run(self, urls: Vec<String>) -> RunOutcome {
        if urls.is_empty() {
            info!(run_id = %self.run_id, "nothing to download");
            return RunOutcome::Completed;
        }

        for (index, url) in urls.iter().enumerate() {
            if self.cancelled() {
                return RunOutcome::Cancelled;
            }
            self.emit(QueueEvent::ItemStarted { run_id: self.run_id, index });
            debug!(run_id = %self.run_id, index, url = %url, "handling");

            let mut sink = OperationSink::new();
            if let Err(e) = self.client.handle(url, &mut sink).await {
                self.report(index, &e);
            }
            if !sink.is_empty() {
                debug!(run_id = %self.run_id, index, ops = sink.len(), "running sub-operations");
            }

            while let Some(op) = sink.pop() {
                if self.cancelled() {
                    return RunOutcome::Cancelled;
                }
                debug!(run_id = %self.run_id, index, op = %op.label, "sub-operation");
                let label = op.label.clone();
                if let Err(e) = op.run().await {
                    self.report(index, &e.context(label));
                }
            }

            if self.cancelled() {
                return RunOutcome::Cancelled;
            }
            self.emit(QueueEvent::ItemFinished { run_id: self.run_id, index });
        }

        RunOutcome::Completed
    }
}
