use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use swarmagents::{AgentError, AgentInvoker, AgentNode, Aggregator, Dispatcher, ScriptedInvoker};
use swarmcore::{
    ChatMessage, Node, NodeError, NodeId, Payload, RunContext, RunError, RunEvent, Workflow,
    WorkflowBuilder,
};
use swarmruntime::WorkflowEngine;

const EXPECTED: &str = "Job Findings:\nJ\n\nCV Findings:\nC";

fn job_cv_workflow(job_delay_ms: u64, cv_delay_ms: u64) -> Arc<Workflow> {
    let job = ScriptedInvoker::new("J").with_delay(Duration::from_millis(job_delay_ms));
    let cv = ScriptedInvoker::new("C").with_delay(Duration::from_millis(cv_delay_ms));
    Arc::new(swarmagents::demo::job_search_workflow(Arc::new(job), Arc::new(cv)).unwrap())
}

/// Records every payload it receives, then forwards a fixed response.
struct RecordingAgent {
    response: String,
    seen: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Node for RecordingAgent {
    async fn run(&self, input: Payload, ctx: &mut RunContext) -> Result<(), NodeError> {
        let text = input.as_text().unwrap_or_default().to_string();
        self.seen.lock().unwrap().push(text);
        ctx.send_message(Payload::Text(self.response.clone()));
        Ok(())
    }
}

/// Misbehaving producer that completes twice for the same barrier.
struct DoubleSender;

#[async_trait]
impl Node for DoubleSender {
    async fn run(&self, _input: Payload, ctx: &mut RunContext) -> Result<(), NodeError> {
        ctx.send_message(Payload::Text("first".to_string()));
        ctx.send_message(Payload::Text("second".to_string()));
        Ok(())
    }
}

/// Terminal node that records whether it was ever invoked.
struct ProbeSink {
    invoked: Arc<AtomicBool>,
}

#[async_trait]
impl Node for ProbeSink {
    async fn run(&self, _input: Payload, ctx: &mut RunContext) -> Result<(), NodeError> {
        self.invoked.store(true, Ordering::SeqCst);
        ctx.yield_output("done");
        Ok(())
    }
}

struct HangingInvoker;

#[async_trait]
impl AgentInvoker for HangingInvoker {
    async fn invoke(&self, _prompt: &str) -> Result<String, AgentError> {
        std::future::pending::<()>().await;
        unreachable!()
    }
}

struct TransientInvoker;

#[async_trait]
impl AgentInvoker for TransientInvoker {
    async fn invoke(&self, _prompt: &str) -> Result<String, AgentError> {
        Err(AgentError::Transient("rate limited".to_string()))
    }
}

#[tokio::test]
async fn end_to_end_output_is_independent_of_completion_order() {
    let engine = WorkflowEngine::new();
    for (job_delay, cv_delay) in [(5u64, 40u64), (40, 5)] {
        let workflow = job_cv_workflow(job_delay, cv_delay);
        let output = engine
            .run(workflow, vec![ChatMessage::user("find X")])
            .await
            .unwrap();
        assert_eq!(output, EXPECTED);
    }
}

#[tokio::test]
async fn rebuilding_the_same_graph_is_deterministic() {
    let engine = WorkflowEngine::new();
    let first = engine
        .run(job_cv_workflow(0, 0), vec![ChatMessage::user("find X")])
        .await
        .unwrap();
    let second = engine
        .run(job_cv_workflow(0, 0), vec![ChatMessage::user("find X")])
        .await
        .unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn fan_out_delivers_identical_input_to_every_target() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut builder = WorkflowBuilder::new()
        .add_node("dispatcher", Dispatcher)
        .add_node(
            "collector",
            Aggregator::new()
                .section("a", "A")
                .section("b", "B")
                .section("c", "C"),
        );
    for id in ["a", "b", "c"] {
        builder = builder.add_node(
            id,
            RecordingAgent {
                response: id.to_uppercase(),
                seen: Arc::clone(&seen),
            },
        );
    }
    let workflow = Arc::new(
        builder
            .start_at("dispatcher")
            .add_fan_out_edges("dispatcher", ["a", "b", "c"])
            .add_fan_in_edges(["a", "b", "c"], "collector")
            .build()
            .unwrap(),
    );

    let output = WorkflowEngine::new()
        .run(workflow, vec![ChatMessage::user("the query")])
        .await
        .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 3);
    assert!(seen.iter().all(|text| text == "the query"));
    assert_eq!(output, "A:\nA\n\nB:\nB\n\nC:\nC");
}

#[tokio::test]
async fn duplicate_completion_halts_the_run() {
    let workflow = Arc::new(
        WorkflowBuilder::new()
            .add_node("dispatcher", Dispatcher)
            .add_node("dup", DoubleSender)
            .add_node(
                "other",
                AgentNode::new(Arc::new(ScriptedInvoker::new("ok")), "instructions"),
            )
            .add_node("aggregator", Aggregator::new().section("dup", "Dup"))
            .start_at("dispatcher")
            .add_fan_out_edges("dispatcher", ["dup", "other"])
            .add_fan_in_edges(["dup", "other"], "aggregator")
            .build()
            .unwrap(),
    );

    let err = WorkflowEngine::new()
        .run(workflow, vec![ChatMessage::user("go")])
        .await
        .unwrap_err();
    assert_eq!(
        err,
        RunError::DuplicateCompletion {
            producer: NodeId::from("dup"),
            consumer: NodeId::from("aggregator"),
        }
    );
}

#[tokio::test]
async fn cancellation_discards_partial_batches() {
    let invoked = Arc::new(AtomicBool::new(false));
    let workflow = Arc::new(
        WorkflowBuilder::new()
            .add_node("dispatcher", Dispatcher)
            .add_node(
                "fast",
                AgentNode::new(Arc::new(ScriptedInvoker::new("quick")), "instructions"),
            )
            .add_node(
                "stuck",
                AgentNode::new(Arc::new(HangingInvoker), "instructions"),
            )
            .add_node(
                "sink",
                ProbeSink {
                    invoked: Arc::clone(&invoked),
                },
            )
            .start_at("dispatcher")
            .add_fan_out_edges("dispatcher", ["fast", "stuck"])
            .add_fan_in_edges(["fast", "stuck"], "sink")
            .build()
            .unwrap(),
    );

    let mut stream = WorkflowEngine::new().run_stream(workflow, vec![ChatMessage::user("go")]);

    // Wait for the fast producer's update so the barrier is partially filled.
    loop {
        match stream.next_event().await.unwrap() {
            RunEvent::NodeUpdate { node, .. } if node == NodeId::from("fast") => break,
            RunEvent::Output { .. } | RunEvent::RunFailed { .. } => {
                panic!("run terminated before cancellation")
            }
            _ => {}
        }
    }

    stream.cancel();
    let err = stream.into_output().await.unwrap_err();
    assert_eq!(err, RunError::Cancelled);
    assert!(!invoked.load(Ordering::SeqCst));
}

#[tokio::test]
async fn agent_failure_is_terminal_and_attributed() {
    let workflow = Arc::new(
        swarmagents::demo::job_search_workflow(
            Arc::new(TransientInvoker),
            Arc::new(ScriptedInvoker::new("C")),
        )
        .unwrap(),
    );

    let err = WorkflowEngine::new()
        .run(workflow, vec![ChatMessage::user("find X")])
        .await
        .unwrap_err();
    assert_eq!(
        err,
        RunError::Node {
            node: NodeId::from("job_finder"),
            source: NodeError::Transient("rate limited".to_string()),
        }
    );
}

#[tokio::test]
async fn stream_yields_updates_then_terminal_output() {
    let mut stream = WorkflowEngine::new()
        .run_stream(job_cv_workflow(0, 0), vec![ChatMessage::user("find X")]);

    let mut events = Vec::new();
    while let Some(event) = stream.next_event().await {
        events.push(event);
    }

    assert!(matches!(events.first(), Some(RunEvent::RunStarted { .. })));
    let updates: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            RunEvent::NodeUpdate { node, .. } => Some(node.clone()),
            _ => None,
        })
        .collect();
    assert!(updates.contains(&NodeId::from("job_finder")));
    assert!(updates.contains(&NodeId::from("cv_finder")));
    match events.last() {
        Some(RunEvent::Output { text, .. }) => assert_eq!(text, EXPECTED),
        other => panic!("expected terminal output event, got {other:?}"),
    }
}

#[tokio::test]
async fn dispatcher_without_targets_fails_with_input_error() {
    let workflow = Arc::new(
        WorkflowBuilder::new()
            .add_node("dispatcher", Dispatcher)
            .start_at("dispatcher")
            .build()
            .unwrap(),
    );

    let err = WorkflowEngine::new()
        .run(workflow, vec![ChatMessage::user("go")])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RunError::Node {
            node,
            source: NodeError::Input(_),
        } if node == NodeId::from("dispatcher")
    ));
}

#[tokio::test]
async fn concurrent_runs_do_not_share_state() {
    let engine = WorkflowEngine::new();
    let workflow = job_cv_workflow(5, 5);
    let a = engine.run(Arc::clone(&workflow), vec![ChatMessage::user("one")]);
    let b = engine.run(Arc::clone(&workflow), vec![ChatMessage::user("two")]);
    let (a, b) = tokio::join!(a, b);
    assert_eq!(a.unwrap(), EXPECTED);
    assert_eq!(b.unwrap(), EXPECTED);
}
