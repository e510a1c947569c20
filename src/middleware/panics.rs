use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Once};

use futures::FutureExt;

use crate::web::{
    BoxFuture, BoxHandler, Handler, HandlerResult, Middleware, RequestContext, ResponseSink,
    WebError,
};

thread_local! {
    static LAST_BACKTRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

static HOOK: Once = Once::new();

/// Chains a hook in front of the current panic hook that stashes the
/// panicking thread's backtrace for [`Panics`] to pick up.
fn install_backtrace_hook() {
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let trace = Backtrace::force_capture().to_string();
            LAST_BACKTRACE.with(|slot| *slot.borrow_mut() = Some(trace));
            previous(info);
        }));
    });
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Panic recovery: converts a panic anywhere below it into
/// [`WebError::Panic`] carrying the message and the captured stack trace.
pub struct Panics;

impl Panics {
    pub fn new() -> Self {
        install_backtrace_hook();
        Self
    }
}

impl Default for Panics {
    fn default() -> Self {
        Self::new()
    }
}

impl Middleware for Panics {
    fn name(&self) -> &'static str {
        "panics"
    }

    fn wrap(&self, inner: BoxHandler) -> BoxHandler {
        Arc::new(PanicsHandler { inner })
    }
}

struct PanicsHandler {
    inner: BoxHandler,
}

impl Handler for PanicsHandler {
    fn call<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        sink: &'a mut ResponseSink,
        req: axum::extract::Request,
    ) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            match AssertUnwindSafe(self.inner.call(ctx, sink, req))
                .catch_unwind()
                .await
            {
                Ok(result) => result,
                Err(payload) => {
                    let backtrace = LAST_BACKTRACE
                        .with(|slot| slot.borrow_mut().take())
                        .unwrap_or_default();
                    Err(WebError::Panic {
                        message: format!("panic: {}", panic_message(payload.as_ref())),
                        backtrace,
                    })
                }
            }
        })
    }
}
