use tokio::sync::watch;

use crate::Result;
use crate::protocol::models::SessionConfig;

use super::codec::Intent;
use super::config::AgentConfig;
use super::tools::ToolRegistry;

/// Intents produced by one synchronization pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Synchronization {
    pub intents: Vec<Intent>,
    /// True for the first successful pass since activation.
    pub first: bool,
}

/// Mirrors the caller's [`AgentConfig`] into the live session.
#[derive(Debug)]
pub struct ConfigSynchronizer {
    config: watch::Receiver<AgentConfig>,
    speak_on_ready: bool,
    active: bool,
    synced_once: bool,
    sender_gone: bool,
}

impl ConfigSynchronizer {
    #[must_use]
    pub const fn new(config: watch::Receiver<AgentConfig>, speak_on_ready: bool) -> Self {
        Self {
            config,
            speak_on_ready,
            active: false,
            synced_once: false,
            sender_gone: false,
        }
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    #[must_use]
    pub const fn speak_on_ready(&self) -> bool {
        self.speak_on_ready
    }

    /// Start watching. The caller is expected to run [`Self::sync`] right away.
    pub const fn activate(&mut self) {
        self.active = true;
    }

    /// Stop watching and forget that this connection was ever synchronized.
    pub const fn deactivate(&mut self) {
        self.active = false;
        self.synced_once = false;
    }

    /// Tools of the current configuration.
    #[must_use]
    pub fn tools(&self) -> ToolRegistry {
        self.config.borrow().tools.clone()
    }

    /// The current configuration in wire form, without marking it seen.
    ///
    /// # Errors
    /// Returns an error if the configuration cannot be converted.
    #[allow(clippy::result_large_err)]
    pub fn current(&self) -> Result<SessionConfig> {
        self.config.borrow().to_wire()
    }

    /// Encode the current configuration as a `session.update`, followed by a
    /// `response.create` on the first pass when speaking on ready.
    ///
    /// # Errors
    /// Returns an error if the configuration cannot be converted; the first
    /// pass is then retried on the next change.
    #[allow(clippy::result_large_err)]
    pub fn sync(&mut self) -> Result<Synchronization> {
        let session = self.config.borrow_and_update().to_wire()?;
        let first = !self.synced_once;
        self.synced_once = true;

        let mut intents = vec![Intent::SessionUpdate(Box::new(session))];
        if first && self.speak_on_ready {
            intents.push(Intent::ResponseCreate);
        }
        Ok(Synchronization { intents, first })
    }

    /// Resolves when the configuration changes while active. Stays pending
    /// while inactive or once the caller has dropped the sender.
    pub async fn changed(&mut self) {
        if !self.active || self.sender_gone {
            return std::future::pending().await;
        }
        if self.config.changed().await.is_err() {
            tracing::debug!("configuration sender dropped; no further updates");
            self.sender_gone = true;
            std::future::pending::<()>().await;
        }
    }
}
