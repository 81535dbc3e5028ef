use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use swarmcore::{Node, NodeError, Payload, RunContext};
use thiserror::Error;

/// Failure modes of the external agent capability.
///
/// The engine retries neither; an unrecovered failure is terminal for the
/// run. Retry policy, if any, belongs inside an `AgentInvoker`
/// implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AgentError {
    #[error("transient failure: {0}")]
    Transient(String),

    #[error("unrecoverable failure: {0}")]
    Unrecoverable(String),
}

impl From<AgentError> for NodeError {
    fn from(e: AgentError) -> Self {
        match e {
            AgentError::Transient(msg) => NodeError::Transient(msg),
            AgentError::Unrecoverable(msg) => NodeError::Unrecoverable(msg),
        }
    }
}

/// Boundary to the external agent capability.
///
/// Implementations wrap whatever actually answers the prompt (an LLM client,
/// a remote service, a canned script). Treated as a black box by the engine.
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    async fn invoke(&self, prompt: &str) -> Result<String, AgentError>;
}

/// Node wrapping an `AgentInvoker` behind an instruction preamble.
///
/// Emits the response as an intermediate update and forwards it downstream;
/// the engine tags it with this node's id when it crosses a fan-in edge.
pub struct AgentNode {
    invoker: Arc<dyn AgentInvoker>,
    instructions: String,
}

impl AgentNode {
    pub fn new(invoker: Arc<dyn AgentInvoker>, instructions: impl Into<String>) -> Self {
        Self {
            invoker,
            instructions: instructions.into(),
        }
    }
}

#[async_trait]
impl Node for AgentNode {
    async fn run(&self, input: Payload, ctx: &mut RunContext) -> Result<(), NodeError> {
        let prompt = match input {
            Payload::Text(text) => text,
            other => {
                return Err(NodeError::UnexpectedPayload {
                    expected: "text",
                    actual: other.kind(),
                })
            }
        };

        let full_prompt = format!("{}\n\n{}", self.instructions, prompt);
        tracing::debug!(node = %ctx.node(), "invoking agent");

        let response = tokio::select! {
            _ = ctx.cancellation().cancelled() => return Err(NodeError::Cancelled),
            result = self.invoker.invoke(&full_prompt) => result?,
        };

        ctx.emit_update(response.clone()).await;
        ctx.send_message(Payload::Text(response));
        Ok(())
    }
}

/// Canned invoker for demos and tests: returns a fixed response, optionally
/// after a delay to exercise completion-order interleavings.
pub struct ScriptedInvoker {
    response: String,
    delay: Duration,
}

impl ScriptedInvoker {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl AgentInvoker for ScriptedInvoker {
    async fn invoke(&self, _prompt: &str) -> Result<String, AgentError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.response.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarmcore::{NodeId, RunEvent, RunId};
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    struct FailingInvoker;

    #[async_trait]
    impl AgentInvoker for FailingInvoker {
        async fn invoke(&self, _prompt: &str) -> Result<String, AgentError> {
            Err(AgentError::Unrecoverable("model gone".to_string()))
        }
    }

    fn context() -> (RunContext, mpsc::Receiver<RunEvent>) {
        let (tx, rx) = mpsc::channel(8);
        let ctx = RunContext::new(
            RunId::new_v4(),
            NodeId::from("job_finder"),
            tx,
            CancellationToken::new(),
            1,
        );
        (ctx, rx)
    }

    #[tokio::test]
    async fn forwards_response_and_emits_update() {
        let (mut ctx, mut rx) = context();
        let node = AgentNode::new(
            Arc::new(ScriptedInvoker::new("findings")),
            "You are a job finder agent.",
        );
        node.run(Payload::Text("find X".to_string()), &mut ctx)
            .await
            .unwrap();

        let (outbound, output) = ctx.into_parts();
        assert_eq!(outbound, vec![Payload::Text("findings".to_string())]);
        assert_eq!(output, None);

        match rx.recv().await.unwrap() {
            RunEvent::NodeUpdate { node, text, .. } => {
                assert_eq!(node, NodeId::from("job_finder"));
                assert_eq!(text, "findings");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn surfaces_invoker_failure() {
        let (mut ctx, _rx) = context();
        let node = AgentNode::new(Arc::new(FailingInvoker), "instructions");
        let err = node
            .run(Payload::Text("find X".to_string()), &mut ctx)
            .await
            .unwrap_err();
        assert_eq!(err, NodeError::Unrecoverable("model gone".to_string()));
    }

    #[tokio::test]
    async fn rejects_non_text_payload() {
        let (mut ctx, _rx) = context();
        let node = AgentNode::new(Arc::new(ScriptedInvoker::new("x")), "instructions");
        let err = node.run(Payload::Batch(vec![]), &mut ctx).await.unwrap_err();
        assert!(matches!(err, NodeError::UnexpectedPayload { .. }));
    }
}
