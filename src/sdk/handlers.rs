use super::events::{MessageEvent, ProtocolError, UsageRecord};

pub type MessageHandler = Box<dyn Fn(MessageEvent) + Send + Sync>;
pub type UsageHandler = Box<dyn Fn(UsageRecord) + Send + Sync>;
pub type ErrorHandler = Box<dyn Fn(ProtocolError) + Send + Sync>;

/// Caller callbacks. They run on the session task and must return quickly;
/// hand work off to another task if it may block.
#[derive(Default)]
pub struct EventHandlers {
    pub on_message: Option<MessageHandler>,
    pub on_usage: Option<UsageHandler>,
    pub on_error: Option<ErrorHandler>,
}

impl std::fmt::Debug for EventHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHandlers")
            .field("on_message", &self.on_message.is_some())
            .field("on_usage", &self.on_usage.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

impl EventHandlers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn on_message<F>(mut self, handler: F) -> Self
    where
        F: Fn(MessageEvent) + Send + Sync + 'static,
    {
        self.on_message = Some(Box::new(handler));
        self
    }

    #[must_use]
    pub fn on_usage<F>(mut self, handler: F) -> Self
    where
        F: Fn(UsageRecord) + Send + Sync + 'static,
    {
        self.on_usage = Some(Box::new(handler));
        self
    }

    #[must_use]
    pub fn on_error<F>(mut self, handler: F) -> Self
    where
        F: Fn(ProtocolError) + Send + Sync + 'static,
    {
        self.on_error = Some(Box::new(handler));
        self
    }

    pub(crate) fn message(&self, event: MessageEvent) {
        if let Some(handler) = &self.on_message {
            handler(event);
        }
    }

    pub(crate) fn usage(&self, record: UsageRecord) {
        if let Some(handler) = &self.on_usage {
            handler(record);
        }
    }

    pub(crate) fn error(&self, error: ProtocolError) {
        if let Some(handler) = &self.on_error {
            handler(error);
        }
    }
}
