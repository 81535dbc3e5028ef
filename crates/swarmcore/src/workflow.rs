use crate::{ConfigurationError, Node};
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

/// Stable identifier for a node within a workflow.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Declared edge, validated and flattened at build time.
enum EdgeSpec {
    Direct { from: NodeId, to: NodeId },
    FanOut { from: NodeId, to: Vec<NodeId> },
    FanIn { from: Vec<NodeId>, to: NodeId },
}

/// Builder for a workflow graph.
///
/// All validation happens in `build`; a workflow that builds successfully
/// never raises configuration errors at run time.
#[derive(Default)]
pub struct WorkflowBuilder {
    nodes: Vec<(NodeId, Arc<dyn Node>)>,
    edges: Vec<EdgeSpec>,
    start: Option<NodeId>,
}

impl WorkflowBuilder {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            start: None,
        }
    }

    pub fn add_node(mut self, id: impl Into<NodeId>, node: impl Node + 'static) -> Self {
        self.nodes.push((id.into(), Arc::new(node)));
        self
    }

    /// Declare the node that receives the run's initial input.
    pub fn start_at(mut self, id: impl Into<NodeId>) -> Self {
        self.start = Some(id.into());
        self
    }

    /// Point-to-point edge.
    pub fn add_edge(mut self, from: impl Into<NodeId>, to: impl Into<NodeId>) -> Self {
        self.edges.push(EdgeSpec::Direct {
            from: from.into(),
            to: to.into(),
        });
        self
    }

    /// One producer, many consumers; each receives the identical payload.
    pub fn add_fan_out_edges<I, T>(mut self, from: impl Into<NodeId>, to: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<NodeId>,
    {
        self.edges.push(EdgeSpec::FanOut {
            from: from.into(),
            to: to.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Many producers, one consumer; the consumer is invoked once with the
    /// completion-gathered batch.
    pub fn add_fan_in_edges<I, T>(mut self, from: I, to: impl Into<NodeId>) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<NodeId>,
    {
        self.edges.push(EdgeSpec::FanIn {
            from: from.into_iter().map(Into::into).collect(),
            to: to.into(),
        });
        self
    }

    pub fn build(self) -> Result<Workflow, ConfigurationError> {
        let mut nodes: HashMap<NodeId, Arc<dyn Node>> = HashMap::new();
        for (id, node) in self.nodes {
            if nodes.insert(id.clone(), node).is_some() {
                return Err(ConfigurationError::DuplicateNodeId(id));
            }
        }

        let start = self.start.ok_or(ConfigurationError::MissingStart)?;
        if !nodes.contains_key(&start) {
            return Err(ConfigurationError::UnknownNode(start));
        }

        let check = |id: &NodeId| -> Result<(), ConfigurationError> {
            if nodes.contains_key(id) {
                Ok(())
            } else {
                Err(ConfigurationError::UnknownNode(id.clone()))
            }
        };

        let mut successors: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        let mut fan_ins: HashMap<NodeId, BTreeSet<NodeId>> = HashMap::new();
        let mut pairs: Vec<(NodeId, NodeId)> = Vec::new();

        for edge in &self.edges {
            match edge {
                EdgeSpec::Direct { from, to } => {
                    check(from)?;
                    check(to)?;
                    successors.entry(from.clone()).or_default().push(to.clone());
                    pairs.push((from.clone(), to.clone()));
                }
                EdgeSpec::FanOut { from, to } => {
                    check(from)?;
                    if to.is_empty() {
                        return Err(ConfigurationError::EmptyFanOut {
                            producer: from.clone(),
                        });
                    }
                    for target in to {
                        check(target)?;
                        successors
                            .entry(from.clone())
                            .or_default()
                            .push(target.clone());
                        pairs.push((from.clone(), target.clone()));
                    }
                }
                EdgeSpec::FanIn { from, to } => {
                    check(to)?;
                    if from.is_empty() {
                        return Err(ConfigurationError::EmptyFanIn {
                            consumer: to.clone(),
                        });
                    }
                    let producers = fan_ins.entry(to.clone()).or_default();
                    for producer in from {
                        check(producer)?;
                        producers.insert(producer.clone());
                        pairs.push((producer.clone(), to.clone()));
                    }
                }
            }
        }

        // Reverse index for barrier routing.
        let mut fan_in_consumers: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for (consumer, producers) in &fan_ins {
            for producer in producers {
                fan_in_consumers
                    .entry(producer.clone())
                    .or_default()
                    .push(consumer.clone());
            }
        }

        // A cyclic graph would loop forever or deadlock its own barriers.
        let mut graph = DiGraph::<NodeId, ()>::new();
        let mut index = HashMap::new();
        for id in nodes.keys() {
            index.insert(id.clone(), graph.add_node(id.clone()));
        }
        for (from, to) in &pairs {
            graph.add_edge(index[from], index[to], ());
        }
        if toposort(&graph, None).is_err() {
            return Err(ConfigurationError::CyclicGraph);
        }

        Ok(Workflow {
            nodes,
            successors,
            fan_ins,
            fan_in_consumers,
            start,
        })
    }
}

/// Immutable compiled workflow graph.
///
/// Built once, executed many times; safe to share across concurrent runs
/// because nothing here is mutated after `build`.
pub struct Workflow {
    nodes: HashMap<NodeId, Arc<dyn Node>>,
    /// Direct and fan-out targets, flattened.
    successors: HashMap<NodeId, Vec<NodeId>>,
    /// Fan-in consumer -> full set of expected producers.
    fan_ins: HashMap<NodeId, BTreeSet<NodeId>>,
    /// Producer -> fan-in consumers it feeds.
    fan_in_consumers: HashMap<NodeId, Vec<NodeId>>,
    start: NodeId,
}

impl Workflow {
    pub fn start(&self) -> &NodeId {
        &self.start
    }

    pub fn node(&self, id: &NodeId) -> Option<&Arc<dyn Node>> {
        self.nodes.get(id)
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.keys()
    }

    pub fn successors(&self, id: &NodeId) -> &[NodeId] {
        self.successors.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn fan_in_consumers(&self, id: &NodeId) -> &[NodeId] {
        self.fan_in_consumers
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Fan-in consumer -> expected producer set, used to seed per-run barriers.
    pub fn fan_ins(&self) -> &HashMap<NodeId, BTreeSet<NodeId>> {
        &self.fan_ins
    }

    pub fn downstream_count(&self, id: &NodeId) -> usize {
        self.successors(id).len() + self.fan_in_consumers(id).len()
    }
}

impl fmt::Debug for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<_> = self.nodes.keys().collect();
        ids.sort();
        f.debug_struct("Workflow")
            .field("start", &self.start)
            .field("nodes", &ids)
            .field("successors", &self.successors)
            .field("fan_ins", &self.fan_ins)
            .finish()
    }
}
