use std::sync::Arc;

use super::CommandResult;
use crate::link::BrokerLink;
use crate::model::AttributeValue;

/// Formats attribute writes as topic + payload and pushes them to the link.
#[derive(Clone)]
pub struct CommandPublisher {
    prefix: String,
    link: Arc<dyn BrokerLink>,
}

impl CommandPublisher {
    pub fn new(prefix: impl Into<String>, link: Arc<dyn BrokerLink>) -> Self {
        Self {
            prefix: prefix.into(),
            link,
        }
    }

    /// Publish one value to its attribute topic.
    pub async fn set(&self, value: AttributeValue) -> bool {
        let topic = value.attribute().topic(&self.prefix);
        let sent = self.link.publish(&topic, &value.wire()).await;
        if sent {
            tracing::debug!(%topic, payload = %value.wire(), "published");
        } else {
            tracing::warn!(%topic, payload = %value.wire(), "publish failed");
        }
        sent
    }

    /// Publish `plan` in order, stopping at the first failure.
    pub async fn run(&self, plan: Vec<AttributeValue>) -> CommandResult {
        if plan.is_empty() {
            return CommandResult::Unchanged;
        }

        let mut published = Vec::with_capacity(plan.len());
        for value in plan {
            if !self.set(value).await {
                return CommandResult::Failed {
                    attribute: value.attribute(),
                    published,
                };
            }
            published.push(value);
        }
        CommandResult::Sent { published }
    }
}

impl std::fmt::Debug for CommandPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandPublisher")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}
