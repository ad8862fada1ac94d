//! Handler, hook and panic-handler signatures.
//!
//! Handlers borrow the pooled context for the duration of one boxed future:
//!
//! ```ignore
//! app.get("/", |ctx| Box::pin(async move {
//!     ctx.write_string("hello")?;
//!     Ok(())
//! }));
//! ```

use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::http::context::HttpContext;
use crate::http::fault::{Fault, HandlerResult};

/// A request handler stored by the router.
pub type HttpHandle =
    Arc<dyn for<'a> Fn(&'a mut HttpContext) -> BoxFuture<'a, HandlerResult> + Send + Sync>;

/// A synchronous hook run around every handler.
pub type HookFn = Arc<dyn Fn(&mut HttpContext) -> HandlerResult + Send + Sync>;

/// Application-level panic handler.
pub type ExceptionHandle = Arc<dyn Fn(&mut HttpContext, &Fault) + Send + Sync>;

/// Box a handler closure, fixing its higher-ranked signature.
pub fn handle<F>(f: F) -> HttpHandle
where
    F: for<'a> Fn(&'a mut HttpContext) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A pair of hooks; either side may be absent.
#[derive(Clone, Default)]
pub struct HttpModule {
    /// Runs before the handler, first event of the pipeline.
    pub on_begin_request: Option<HookFn>,
    /// Runs after the handler, last event of the pipeline.
    pub on_end_request: Option<HookFn>,
}

impl HttpModule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_begin<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut HttpContext) -> HandlerResult + Send + Sync + 'static,
    {
        self.on_begin_request = Some(Arc::new(f));
        self
    }

    pub fn on_end<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut HttpContext) -> HandlerResult + Send + Sync + 'static,
    {
        self.on_end_request = Some(Arc::new(f));
        self
    }

    pub(crate) fn begin(&self, ctx: &mut HttpContext) -> HandlerResult {
        match &self.on_begin_request {
            Some(hook) => hook(ctx),
            None => Ok(()),
        }
    }

    pub(crate) fn end(&self, ctx: &mut HttpContext) -> HandlerResult {
        match &self.on_end_request {
            Some(hook) => hook(ctx),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for HttpModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpModule")
            .field("on_begin_request", &self.on_begin_request.is_some())
            .field("on_end_request", &self.on_end_request.is_some())
            .finish()
    }
}
