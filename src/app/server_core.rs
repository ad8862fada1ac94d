//! State shared by every request of one server.

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::app::offline::OfflineHandler;
use crate::config::WebConfig;
use crate::http::handler::{ExceptionHandle, HttpModule};
use crate::observability::ServerState;
use crate::pool::ResourcePool;
use crate::session::{SessionBinder, SessionError};

/// Shared core: configuration, counters, pools, sessions and the
/// application's hooks.
///
/// Hooks and handlers are frozen when the server is built; the configuration
/// can be swapped at runtime.
pub struct ServerCore {
    config: ArcSwap<WebConfig>,
    state: Arc<ServerState>,
    pool: ResourcePool,
    sessions: SessionBinder,
    modules: Vec<HttpModule>,
    exception_handler: Option<ExceptionHandle>,
    offline_handler: Arc<dyn OfflineHandler>,
}

impl ServerCore {
    pub(crate) fn new(
        config: WebConfig,
        sessions: SessionBinder,
        modules: Vec<HttpModule>,
        exception_handler: Option<ExceptionHandle>,
        offline_handler: Arc<dyn OfflineHandler>,
    ) -> Self {
        Self {
            config: ArcSwap::from_pointee(config),
            state: Arc::new(ServerState::new()),
            pool: ResourcePool::new(),
            sessions,
            modules,
            exception_handler,
            offline_handler,
        }
    }

    /// Current configuration snapshot.
    pub fn config(&self) -> Arc<WebConfig> {
        self.config.load_full()
    }

    /// Swap in a new configuration.
    ///
    /// Enabling sessions initializes the session manager first; if that
    /// fails the configuration is rejected and the old one stays in place.
    pub fn apply_config(&self, config: WebConfig) -> Result<(), SessionError> {
        if config.session.enabled {
            self.sessions.ensure_initialized(&config.session)?;
        }
        let previous = self.config.swap(Arc::new(config));
        let current = self.config.load();
        if previous.listener != current.listener || previous.admin != current.admin {
            tracing::warn!("Listener and admin changes take effect after a restart");
        }
        Ok(())
    }

    /// Toggle maintenance mode.
    pub fn set_offline(&self, offline: bool) {
        self.config.rcu(|current| {
            let mut next = WebConfig::clone(current);
            next.server.offline = offline;
            next
        });
        tracing::info!(offline, "Offline mode changed");
    }

    pub fn is_offline(&self) -> bool {
        self.config.load().server.offline
    }

    pub fn state(&self) -> &Arc<ServerState> {
        &self.state
    }

    pub fn pool(&self) -> &ResourcePool {
        &self.pool
    }

    pub fn sessions(&self) -> &SessionBinder {
        &self.sessions
    }

    pub fn modules(&self) -> &[HttpModule] {
        &self.modules
    }

    pub fn exception_handler(&self) -> Option<&ExceptionHandle> {
        self.exception_handler.as_ref()
    }

    pub fn offline_handler(&self) -> &dyn OfflineHandler {
        self.offline_handler.as_ref()
    }
}

impl fmt::Debug for ServerCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerCore")
            .field("state", &self.state)
            .field("pool", &self.pool)
            .field("sessions", &self.sessions)
            .field("modules", &self.modules.len())
            .field("exception_handler", &self.exception_handler.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use crate::app::App;
    use crate::config::WebConfig;

    #[test]
    fn offline_toggle_keeps_other_settings() {
        let mut config = WebConfig::default();
        config.server.offline_text = "back soon".into();
        let core = App::new(config).build().unwrap().core();

        core.set_offline(true);
        assert!(core.is_offline());
        assert_eq!(core.config().server.offline_text, "back soon");

        core.set_offline(false);
        assert!(!core.is_offline());
    }

    #[test]
    fn rejected_config_keeps_the_old_one() {
        let core = App::new(WebConfig::default()).build().unwrap().core();

        let mut next = WebConfig::default();
        next.session.enabled = true;
        next.session.store = "redis".into();
        assert!(core.apply_config(next).is_err());
        assert!(!core.config().session.enabled);

        let mut next = WebConfig::default();
        next.server.enabled_gzip = true;
        core.apply_config(next).unwrap();
        assert!(core.config().server.enabled_gzip);
    }
}
