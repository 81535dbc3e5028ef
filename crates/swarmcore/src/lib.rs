//! Core abstractions for the swarm workflow engine
//!
//! This crate provides the fundamental types and traits that all other
//! components depend on: message payloads, the node contract, the workflow
//! graph, and the error taxonomy. It contains no execution logic.

mod error;
mod events;
mod message;
mod node;
mod workflow;

pub use error::{ConfigurationError, NodeError, RunError};
pub use events::{RunEvent, RunId};
pub use message::{ChatMessage, Payload, Role, TaggedResponse};
pub use node::{Node, RunContext};
pub use workflow::{NodeId, Workflow, WorkflowBuilder};
