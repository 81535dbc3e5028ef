//! The job-search demo workflow: one dispatcher fanning a query out to a job
//! finder and a CV finder, gathered back into a single labeled report.

use crate::{AgentInvoker, AgentNode, Aggregator, Dispatcher};
use std::sync::Arc;
use swarmcore::{ConfigurationError, Workflow, WorkflowBuilder};

pub const JOB_FINDER_INSTRUCTIONS: &str = "You are a job finder agent. Based on the user's query, \
    find and list relevant job opportunities. Include job titles, companies, requirements, and why \
    they match the query.";

pub const CV_FINDER_INSTRUCTIONS: &str = "You are a CV finder agent. Based on the user's query, \
    find and list relevant CVs or candidate profiles. Include candidate names, skills, experience, \
    and why they match the query.";

/// Build the concurrent job-search workflow:
/// dispatcher -> fan-out to both agents -> fan-in to aggregator.
pub fn job_search_workflow(
    job_invoker: Arc<dyn AgentInvoker>,
    cv_invoker: Arc<dyn AgentInvoker>,
) -> Result<Workflow, ConfigurationError> {
    WorkflowBuilder::new()
        .add_node("dispatcher", Dispatcher)
        .add_node("job_finder", AgentNode::new(job_invoker, JOB_FINDER_INSTRUCTIONS))
        .add_node("cv_finder", AgentNode::new(cv_invoker, CV_FINDER_INSTRUCTIONS))
        .add_node(
            "aggregator",
            Aggregator::new()
                .section("job_finder", "Job Findings")
                .section("cv_finder", "CV Findings"),
        )
        .start_at("dispatcher")
        .add_fan_out_edges("dispatcher", ["job_finder", "cv_finder"])
        .add_fan_in_edges(["job_finder", "cv_finder"], "aggregator")
        .build()
}
