use async_trait::async_trait;
use ceq_core::Subscribe;
use ceq_model::Event;

use crate::subscriber::view::log_event;

/// Writes pipeline events to the tracing log.
#[derive(Debug, Default, Clone, Copy)]
pub struct Journal;

impl Journal {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for Journal {
    async fn on_event(&self, event: &Event) {
        log_event(event);
    }

    fn name(&self) -> &'static str {
        "journal"
    }
}
