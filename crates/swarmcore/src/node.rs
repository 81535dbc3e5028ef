use crate::{NodeError, NodeId, Payload, RunEvent, RunId};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Core trait that all executable nodes implement.
///
/// A node consumes one payload per delivery and communicates through the
/// context: `send_message` forwards payloads downstream, `yield_output`
/// produces the run's terminal output, `emit_update` publishes intermediate
/// events. Identity is assigned when the node is added to a workflow.
#[async_trait]
pub trait Node: Send + Sync {
    async fn run(&self, input: Payload, ctx: &mut RunContext) -> Result<(), NodeError>;
}

/// Per-delivery handle passed to a node.
///
/// Outbound messages are buffered here and routed by the engine after the
/// handler returns, so fan-out targets all receive the identical input before
/// any of them is scheduled.
pub struct RunContext {
    run_id: RunId,
    node: NodeId,
    events: mpsc::Sender<RunEvent>,
    cancellation: CancellationToken,
    downstream: usize,
    outbound: Vec<Payload>,
    output: Option<String>,
}

impl RunContext {
    pub fn new(
        run_id: RunId,
        node: NodeId,
        events: mpsc::Sender<RunEvent>,
        cancellation: CancellationToken,
        downstream: usize,
    ) -> Self {
        Self {
            run_id,
            node,
            events,
            cancellation,
            downstream,
            outbound: Vec::new(),
            output: None,
        }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Id of the node this context was handed to.
    pub fn node(&self) -> &NodeId {
        &self.node
    }

    /// Number of downstream targets registered for this node, counting both
    /// direct/fan-out successors and fan-in consumers.
    pub fn downstream_count(&self) -> usize {
        self.downstream
    }

    /// Token cancelled when the run is cancelled. Handlers awaiting external
    /// capabilities should select against it.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Emit an intermediate event attributable to this node.
    pub async fn emit_update(&self, text: impl Into<String>) {
        let event = RunEvent::NodeUpdate {
            run_id: self.run_id,
            node: self.node.clone(),
            text: text.into(),
            timestamp: Utc::now(),
        };
        if self.events.send(event).await.is_err() {
            tracing::debug!(node = %self.node, "event receiver dropped; update discarded");
        }
    }

    /// Queue a payload for downstream routing.
    pub fn send_message(&mut self, payload: impl Into<Payload>) {
        self.outbound.push(payload.into());
    }

    /// Set the run's terminal output. A later call replaces an earlier one.
    pub fn yield_output(&mut self, text: impl Into<String>) {
        self.output = Some(text.into());
    }

    pub fn into_parts(self) -> (Vec<Payload>, Option<String>) {
        (self.outbound, self.output)
    }
}
