//! Built-in node library
//!
//! The three node types of the concurrent agent workflow pattern: a
//! dispatcher that fans a query out, agent nodes that wrap an external model
//! capability, and an aggregator that recombines the fan-in batch.

mod agent;
mod aggregator;
pub mod demo;
mod dispatcher;

pub use agent::{AgentError, AgentInvoker, AgentNode, ScriptedInvoker};
pub use aggregator::Aggregator;
pub use dispatcher::Dispatcher;
