use async_trait::async_trait;
use std::collections::HashMap;
use swarmcore::{Node, NodeError, NodeId, Payload, RunContext};

/// Recombines a fan-in batch into labeled sections and yields the combined
/// string as the run's terminal output.
///
/// Sections are resolved by producer id against a registry fixed at
/// construction time, never by arrival order: racing producers may complete
/// in any interleaving and the output is identical. A registered producer
/// missing from the batch yields an empty section; batch entries from
/// unregistered producers are ignored.
pub struct Aggregator {
    sections: Vec<Section>,
}

struct Section {
    producer: NodeId,
    label: String,
}

impl Aggregator {
    pub fn new() -> Self {
        Self {
            sections: Vec::new(),
        }
    }

    /// Register a producer and the label of its output section. Output
    /// sections appear in registration order.
    pub fn section(mut self, producer: impl Into<NodeId>, label: impl Into<String>) -> Self {
        self.sections.push(Section {
            producer: producer.into(),
            label: label.into(),
        });
        self
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Node for Aggregator {
    async fn run(&self, input: Payload, ctx: &mut RunContext) -> Result<(), NodeError> {
        let batch = match input {
            Payload::Batch(batch) => batch,
            other => {
                return Err(NodeError::UnexpectedPayload {
                    expected: "batch",
                    actual: other.kind(),
                })
            }
        };

        let by_producer: HashMap<&NodeId, &str> = batch
            .iter()
            .map(|response| (&response.producer, response.text.as_str()))
            .collect();

        let combined = self
            .sections
            .iter()
            .map(|section| {
                let text = by_producer
                    .get(&section.producer)
                    .copied()
                    .unwrap_or_default();
                format!("{}:\n{}", section.label, text)
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        ctx.yield_output(combined);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarmcore::{RunId, TaggedResponse};
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    fn context() -> RunContext {
        let (tx, _rx) = mpsc::channel(8);
        RunContext::new(
            RunId::new_v4(),
            NodeId::from("aggregator"),
            tx,
            CancellationToken::new(),
            0,
        )
    }

    fn tagged(producer: &str, text: &str) -> TaggedResponse {
        TaggedResponse {
            producer: producer.into(),
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn combines_sections_in_registration_order() {
        let aggregator = Aggregator::new()
            .section("job_finder", "Job Findings")
            .section("cv_finder", "CV Findings");
        let mut ctx = context();
        // Batch order is producer-id order, which differs from registration
        // order here; the registry decides.
        aggregator
            .run(
                Payload::Batch(vec![tagged("cv_finder", "C"), tagged("job_finder", "J")]),
                &mut ctx,
            )
            .await
            .unwrap();
        let (_, output) = ctx.into_parts();
        assert_eq!(output.unwrap(), "Job Findings:\nJ\n\nCV Findings:\nC");
    }

    #[tokio::test]
    async fn missing_producer_yields_empty_section() {
        let aggregator = Aggregator::new()
            .section("job_finder", "Job Findings")
            .section("cv_finder", "CV Findings");
        let mut ctx = context();
        aggregator
            .run(Payload::Batch(vec![tagged("job_finder", "J")]), &mut ctx)
            .await
            .unwrap();
        let (_, output) = ctx.into_parts();
        assert_eq!(output.unwrap(), "Job Findings:\nJ\n\nCV Findings:\n");
    }

    #[tokio::test]
    async fn unknown_producer_is_ignored() {
        let aggregator = Aggregator::new().section("job_finder", "Job Findings");
        let mut ctx = context();
        aggregator
            .run(
                Payload::Batch(vec![tagged("job_finder", "J"), tagged("stranger", "X")]),
                &mut ctx,
            )
            .await
            .unwrap();
        let (_, output) = ctx.into_parts();
        assert_eq!(output.unwrap(), "Job Findings:\nJ");
    }

    #[tokio::test]
    async fn rejects_non_batch_payload() {
        let aggregator = Aggregator::new().section("a", "A");
        let mut ctx = context();
        let err = aggregator
            .run(Payload::Text("loose".to_string()), &mut ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, NodeError::UnexpectedPayload { .. }));
    }
}
