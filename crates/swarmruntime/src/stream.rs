use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use swarmcore::{RunError, RunEvent, RunId};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Event stream for one run.
///
/// Lazy, finite, non-restartable. Iterate until the stream ends, or call
/// `into_output` to discard intermediate events and wait for the terminal
/// result. Dropping the stream cancels the run.
pub struct RunStream {
    run_id: RunId,
    events: mpsc::Receiver<RunEvent>,
    cancellation: CancellationToken,
    driver: JoinHandle<Result<String, RunError>>,
}

impl RunStream {
    pub(crate) fn new(
        run_id: RunId,
        events: mpsc::Receiver<RunEvent>,
        cancellation: CancellationToken,
        driver: JoinHandle<Result<String, RunError>>,
    ) -> Self {
        Self {
            run_id,
            events,
            cancellation,
            driver,
        }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Cancel the run. All still-pending node tasks are aborted and any
    /// partially accumulated fan-in batches are discarded.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Next event, or `None` once the run has wound down.
    pub async fn next_event(&mut self) -> Option<RunEvent> {
        self.events.recv().await
    }

    /// Drain remaining events and return the run's terminal result.
    pub async fn into_output(mut self) -> Result<String, RunError> {
        while self.events.recv().await.is_some() {}
        match (&mut self.driver).await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(RunError::Cancelled),
            Err(e) => Err(RunError::Internal(format!("run driver failed: {e}"))),
        }
    }
}

impl Stream for RunStream {
    type Item = RunEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().events.poll_recv(cx)
    }
}

impl Drop for RunStream {
    fn drop(&mut self) {
        // A completed driver ignores this; an in-flight one winds down.
        self.cancellation.cancel();
    }
}
