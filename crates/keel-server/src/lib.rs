//! Keel server library logic.

pub mod config;
pub mod events;

use std::sync::Arc;

use config::Config;
use keel_db::{ConnectionFactory, WriterRegistry};
use keel_hooks::HookRegistry;

/// Process-wide services shared by every feature module.
///
/// Built once at startup and passed to the modules that need it. Feature
/// modules attach their hook callbacks through [`Core::hooks`] and open
/// their database handles through [`Core::factory`].
#[derive(Debug, Clone)]
pub struct Core {
    hooks: Arc<HookRegistry>,
    factory: ConnectionFactory,
}

impl Core {
    /// Builds the hook registry, writer registry and connection factory.
    ///
    /// Hook dispatch is enabled when `hooks.enabled` is set; SQL tracing
    /// follows `database.trace`.
    pub fn new(config: &Config) -> Self {
        let hooks = Arc::new(HookRegistry::new());
        if config.hooks.enabled {
            hooks.enable();
        }

        let writers = Arc::new(WriterRegistry::new());
        let factory = ConnectionFactory::new(writers, config.database.trace);

        Self { hooks, factory }
    }

    pub fn hooks(&self) -> &Arc<HookRegistry> {
        &self.hooks
    }

    pub fn factory(&self) -> &ConnectionFactory {
        &self.factory
    }

    pub fn writers(&self) -> &Arc<WriterRegistry> {
        self.factory.writers()
    }
}
