//! Binds a session identifier to each request context.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::SessionConfig;
use crate::http::context::HttpContext;
use crate::http::response::Cookie;
use crate::session::manager::{escape, CookieSessionManager, SessionError, SessionManager};

/// Holds the session manager and binds identifiers to requests.
///
/// Readers share the lock; installing the manager is exclusive.
#[derive(Default)]
pub struct SessionBinder {
    manager: RwLock<Option<Arc<dyn SessionManager>>>,
}

impl SessionBinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// The installed manager, if any.
    pub fn manager(&self) -> Option<Arc<dyn SessionManager>> {
        self.manager.read().clone()
    }

    /// Install a custom manager, replacing any previous one.
    pub fn install(&self, manager: Arc<dyn SessionManager>) {
        *self.manager.write() = Some(manager);
    }

    /// Create the built-in manager unless one is already installed.
    ///
    /// Concurrent callers block on the write lock until the first one has
    /// finished, so nobody observes a half-initialized manager.
    pub fn ensure_initialized(
        &self,
        config: &SessionConfig,
    ) -> Result<Arc<dyn SessionManager>, SessionError> {
        if let Some(manager) = self.manager() {
            return Ok(manager);
        }

        let mut slot = self.manager.write();
        if let Some(manager) = slot.as_ref() {
            return Ok(Arc::clone(manager));
        }
        let manager: Arc<dyn SessionManager> = Arc::new(CookieSessionManager::from_config(config)?);
        *slot = Some(Arc::clone(&manager));
        tracing::info!(store = %config.store, cookie = %config.cookie_name, "Session manager initialized");
        Ok(manager)
    }

    /// Attach the client's session identifier, or mint one and set the cookie.
    ///
    /// Two concurrent first requests from the same client both mint an
    /// identifier; the last cookie written wins on the client.
    pub(crate) fn bind(&self, ctx: &mut HttpContext) {
        let Some(manager) = self.manager() else {
            tracing::warn!("sessions enabled but no session manager is installed");
            return;
        };

        let presented = match manager.client_session_id(ctx.headers()) {
            Ok(id) => id.filter(|id| !id.is_empty()),
            Err(err) => {
                tracing::debug!(error = %err, "ignoring unreadable session cookie");
                None
            }
        };

        match presented {
            Some(id) => ctx.set_session_id(id),
            None => {
                let id = manager.new_session_id();
                let cookie = Cookie::new(manager.cookie_name(), escape(&id)).with_path("/");
                if let Err(err) = ctx.set_cookie(&cookie) {
                    tracing::warn!(error = %err, "failed to emit session cookie");
                }
                ctx.set_session_id(id);
            }
        }
    }
}

impl std::fmt::Debug for SessionBinder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionBinder")
            .field("initialized", &self.manager.read().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initializes_once() {
        let binder = SessionBinder::new();
        let first = binder.ensure_initialized(&SessionConfig::default()).unwrap();
        let second = binder.ensure_initialized(&SessionConfig::default()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn failed_initialization_leaves_binder_empty() {
        let binder = SessionBinder::new();
        let config = SessionConfig {
            store: "redis".into(),
            ..SessionConfig::default()
        };
        assert!(binder.ensure_initialized(&config).is_err());
        assert!(binder.manager().is_none());
    }

    #[test]
    fn concurrent_initialization_yields_one_manager() {
        let binder = Arc::new(SessionBinder::new());
        let managers: Vec<_> = (0..8)
            .map(|_| {
                let binder = Arc::clone(&binder);
                std::thread::spawn(move || binder.ensure_initialized(&SessionConfig::default()).unwrap())
            })
            .map(|t| t.join().unwrap())
            .collect();
        assert!(managers.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }
}
