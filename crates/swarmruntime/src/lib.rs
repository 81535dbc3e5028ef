//! Workflow execution runtime
//!
//! This crate drives workflows built with `swarmcore`: it schedules node
//! handlers as cooperative tasks on the tokio runtime, enforces fan-in
//! barrier semantics per run, and exposes streaming and one-shot execution
//! interfaces.

mod engine;
mod stream;

pub use engine::{EngineConfig, WorkflowEngine};
pub use stream::RunStream;
