//! Session orchestration on top of the protocol and transport layers.
//!
//! [`SessionOrchestrator`] owns one logical voice session: it connects,
//! pushes the caller's [`AgentConfig`], routes inbound events to
//! [`EventHandlers`], runs tool calls and reconnects with backoff.

mod builder;
pub mod codec;
mod config;
pub mod config_sync;
pub mod dispatcher;
pub mod events;
mod handlers;
mod orchestrator;
pub mod reconnect;
mod tools;

pub use builder::SessionBuilder;
pub use codec::{InboundEvent, Intent, ProtocolCodec};
pub use config::AgentConfig;
pub use config_sync::{ConfigSynchronizer, Synchronization};
pub use dispatcher::{DEFAULT_SETTLE_DELAY, DispatchEvent, ToolDispatcher};
pub use events::{MessageEvent, ProtocolError, UsageRecord};
pub use handlers::{ErrorHandler, EventHandlers, MessageHandler, UsageHandler};
pub use orchestrator::{ConnectionState, SessionOrchestrator, SessionStatus};
pub use reconnect::ReconnectPolicy;
pub use tools::{BoxFuture as ToolFuture, ToolCall, ToolDefinition, ToolHandler, ToolRegistry};
