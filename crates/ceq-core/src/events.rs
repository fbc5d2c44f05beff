use std::sync::Arc;

use async_trait::async_trait;
use ceq_model::Event;
use tracing::trace;

/// Receives pipeline lifecycle events.
#[async_trait]
pub trait Subscribe: Send + Sync {
    async fn on_event(&self, event: &Event);

    fn name(&self) -> &'static str;
}

/// Fan-out to subscribers, in registration order.
#[derive(Clone, Default)]
pub struct Bus {
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl Bus {
    pub fn new(subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        Self { subscribers }
    }

    pub fn push(&mut self, subscriber: Arc<dyn Subscribe>) {
        self.subscribers.push(subscriber);
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    pub async fn emit(&self, event: Event) {
        for s in &self.subscribers {
            trace!(subscriber = s.name(), kind = ?event.kind, "deliver");
            s.on_event(&event).await;
        }
    }
}
