use crate::stream::RunStream;
use chrono::Utc;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::Arc;
use swarmcore::{
    ChatMessage, NodeError, NodeId, Payload, RunContext, RunError, RunEvent, RunId,
    TaggedResponse, Workflow,
};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;

/// Configuration for the workflow engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Capacity of each run's event channel.
    pub event_buffer: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { event_buffer: 256 }
    }
}

/// Executes workflows with fan-out/fan-in barrier semantics.
///
/// The engine holds no per-run state; every run gets fresh barriers and its
/// own event channel, so a single engine can drive any number of concurrent
/// runs over shared workflows.
#[derive(Debug, Clone)]
pub struct WorkflowEngine {
    config: EngineConfig,
}

impl WorkflowEngine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Start a run and return its event stream.
    ///
    /// The stream is lazy, finite, and non-restartable: it yields
    /// `RunStarted`, any intermediate `NodeUpdate`s, and ends after `Output`
    /// or `RunFailed`. Dropping the stream cancels the run.
    pub fn run_stream(&self, workflow: Arc<Workflow>, input: Vec<ChatMessage>) -> RunStream {
        let run_id = RunId::new_v4();
        let (events, rx) = mpsc::channel(self.config.event_buffer);
        let cancellation = CancellationToken::new();
        let cancel = cancellation.clone();
        let driver =
            tokio::spawn(async move { drive(workflow, input, events, cancel, run_id).await });
        RunStream::new(run_id, rx, cancellation, driver)
    }

    /// Run to completion, discarding intermediate events.
    pub async fn run(
        &self,
        workflow: Arc<Workflow>,
        input: Vec<ChatMessage>,
    ) -> Result<String, RunError> {
        self.run_stream(workflow, input).into_output().await
    }
}

impl Default for WorkflowEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-run bookkeeping for one fan-in consumer.
struct Barrier {
    /// Producer ids still outstanding.
    pending: BTreeSet<NodeId>,
    /// Arrived outputs, keyed by producer id so batches are deterministically
    /// ordered regardless of completion order.
    arrived: BTreeMap<NodeId, String>,
    /// Set when the consumer has been scheduled; later arrivals are protocol
    /// errors.
    fired: bool,
}

type TaskOutcome = (Result<(), NodeError>, Vec<Payload>, Option<String>);
type RunningTask = BoxFuture<'static, (NodeId, Result<TaskOutcome, tokio::task::JoinError>)>;

async fn drive(
    workflow: Arc<Workflow>,
    input: Vec<ChatMessage>,
    events: mpsc::Sender<RunEvent>,
    cancel: CancellationToken,
    run_id: RunId,
) -> Result<String, RunError> {
    let _ = events
        .send(RunEvent::RunStarted {
            run_id,
            timestamp: Utc::now(),
        })
        .await;
    tracing::info!(%run_id, start = %workflow.start(), "run started");

    let result = execute(&workflow, input, &events, &cancel, run_id).await;
    match &result {
        Ok(_) => tracing::info!(%run_id, "run completed"),
        Err(e) => {
            tracing::error!(%run_id, error = %e, "run failed");
            let _ = events
                .send(RunEvent::RunFailed {
                    run_id,
                    error: e.to_string(),
                    timestamp: Utc::now(),
                })
                .await;
        }
    }
    result
}

async fn execute(
    workflow: &Arc<Workflow>,
    input: Vec<ChatMessage>,
    events: &mpsc::Sender<RunEvent>,
    cancel: &CancellationToken,
    run_id: RunId,
) -> Result<String, RunError> {
    // Fresh barrier state per run; nothing is shared with other runs.
    let mut barriers: HashMap<NodeId, Barrier> = workflow
        .fan_ins()
        .iter()
        .map(|(consumer, producers)| {
            (
                consumer.clone(),
                Barrier {
                    pending: producers.clone(),
                    arrived: BTreeMap::new(),
                    fired: false,
                },
            )
        })
        .collect();

    let mut queue: VecDeque<(NodeId, Payload)> = VecDeque::new();
    queue.push_back((workflow.start().clone(), Payload::Conversation(input)));

    let mut running: FuturesUnordered<RunningTask> = FuturesUnordered::new();
    let mut aborts: Vec<AbortHandle> = Vec::new();
    let mut final_output: Option<String> = None;

    loop {
        // All pending deliveries are queued before any of them is spawned,
        // so fan-out targets see the identical input.
        while let Some((target, payload)) = queue.pop_front() {
            let node = match workflow.node(&target) {
                Some(node) => Arc::clone(node),
                None => {
                    abort_all(&aborts);
                    return Err(RunError::UnknownNode(target));
                }
            };
            let mut ctx = RunContext::new(
                run_id,
                target.clone(),
                events.clone(),
                cancel.child_token(),
                workflow.downstream_count(&target),
            );
            tracing::debug!(node = %target, payload = payload.kind(), "delivering");
            let handle = tokio::spawn(async move {
                let result = node.run(payload, &mut ctx).await;
                let (outbound, output) = ctx.into_parts();
                (result, outbound, output)
            });
            aborts.push(handle.abort_handle());
            let id = target.clone();
            running.push(Box::pin(async move { (id, handle.await) }));
        }

        if running.is_empty() {
            break;
        }

        let joined = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                abort_all(&aborts);
                return Err(RunError::Cancelled);
            }
            joined = running.next() => joined,
        };

        let Some((node_id, joined)) = joined else {
            break;
        };
        let (result, outbound, yielded) = match joined {
            Ok(outcome) => outcome,
            Err(e) => {
                abort_all(&aborts);
                return Err(RunError::Internal(format!(
                    "task for node '{node_id}' did not complete: {e}"
                )));
            }
        };
        if let Err(source) = result {
            abort_all(&aborts);
            return Err(RunError::Node {
                node: node_id,
                source,
            });
        }

        if let Some(text) = yielded {
            let _ = events
                .send(RunEvent::Output {
                    run_id,
                    text: text.clone(),
                    timestamp: Utc::now(),
                })
                .await;
            final_output = Some(text);
        }

        for payload in outbound {
            if let Err(e) = route(workflow, &node_id, payload, &mut barriers, &mut queue) {
                abort_all(&aborts);
                return Err(e);
            }
        }
    }

    final_output.ok_or(RunError::NoOutput)
}

/// Route one payload sent by `from` along its outgoing edges.
///
/// Direct and fan-out targets get a clone queued immediately; fan-in
/// consumers get a barrier contribution and are queued only once their full
/// producer set has arrived.
fn route(
    workflow: &Workflow,
    from: &NodeId,
    payload: Payload,
    barriers: &mut HashMap<NodeId, Barrier>,
    queue: &mut VecDeque<(NodeId, Payload)>,
) -> Result<(), RunError> {
    let direct = workflow.successors(from);
    let consumers = workflow.fan_in_consumers(from);

    if direct.is_empty() && consumers.is_empty() {
        tracing::warn!(node = %from, "message has no outgoing edge; dropped");
        return Ok(());
    }

    for target in direct {
        queue.push_back((target.clone(), payload.clone()));
    }

    for consumer in consumers {
        let text = payload.to_text().ok_or_else(|| RunError::Node {
            node: from.clone(),
            source: NodeError::UnexpectedPayload {
                expected: "text",
                actual: payload.kind(),
            },
        })?;
        let barrier = barriers
            .get_mut(consumer)
            .ok_or_else(|| RunError::UnknownNode(consumer.clone()))?;
        if barrier.fired || barrier.arrived.contains_key(from) {
            return Err(RunError::DuplicateCompletion {
                producer: from.clone(),
                consumer: consumer.clone(),
            });
        }
        barrier.pending.remove(from);
        barrier.arrived.insert(from.clone(), text);
        if barrier.pending.is_empty() {
            barrier.fired = true;
            let batch: Vec<TaggedResponse> = barrier
                .arrived
                .iter()
                .map(|(producer, text)| TaggedResponse {
                    producer: producer.clone(),
                    text: text.clone(),
                })
                .collect();
            tracing::debug!(consumer = %consumer, producers = batch.len(), "barrier complete");
            queue.push_back((consumer.clone(), Payload::Batch(batch)));
        }
    }

    Ok(())
}

fn abort_all(aborts: &[AbortHandle]) {
    for handle in aborts {
        handle.abort();
    }
}
