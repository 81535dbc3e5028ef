use async_trait::async_trait;
use swarmcore::{Node, NodeError, Payload, RunContext};

/// Relays the latest message text unchanged to every downstream target.
///
/// The engine replicates the sent payload across the dispatcher's fan-out
/// edge, so all targets receive byte-identical input.
pub struct Dispatcher;

#[async_trait]
impl Node for Dispatcher {
    async fn run(&self, input: Payload, ctx: &mut RunContext) -> Result<(), NodeError> {
        if ctx.downstream_count() == 0 {
            return Err(NodeError::Input(
                "dispatcher has no downstream targets".to_string(),
            ));
        }

        let text = match input {
            Payload::Conversation(messages) => messages
                .last()
                .map(|m| m.text.clone())
                .unwrap_or_default(),
            Payload::Text(text) => text,
            other => {
                return Err(NodeError::UnexpectedPayload {
                    expected: "conversation",
                    actual: other.kind(),
                })
            }
        };

        ctx.send_message(Payload::Text(text));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarmcore::{ChatMessage, NodeId, RunId};
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    fn context(downstream: usize) -> RunContext {
        let (tx, _rx) = mpsc::channel(8);
        RunContext::new(
            RunId::new_v4(),
            NodeId::from("dispatcher"),
            tx,
            CancellationToken::new(),
            downstream,
        )
    }

    #[tokio::test]
    async fn forwards_latest_message_text() {
        let mut ctx = context(2);
        let input = Payload::Conversation(vec![
            ChatMessage::user("first"),
            ChatMessage::user("second"),
        ]);
        Dispatcher.run(input, &mut ctx).await.unwrap();
        let (outbound, output) = ctx.into_parts();
        assert_eq!(outbound, vec![Payload::Text("second".to_string())]);
        assert_eq!(output, None);
    }

    #[tokio::test]
    async fn empty_conversation_forwards_empty_text() {
        let mut ctx = context(1);
        Dispatcher
            .run(Payload::Conversation(vec![]), &mut ctx)
            .await
            .unwrap();
        let (outbound, _) = ctx.into_parts();
        assert_eq!(outbound, vec![Payload::Text(String::new())]);
    }

    #[tokio::test]
    async fn fails_without_downstream_targets() {
        let mut ctx = context(0);
        let err = Dispatcher
            .run(Payload::Conversation(vec![ChatMessage::user("hi")]), &mut ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, NodeError::Input(_)));
    }
}
