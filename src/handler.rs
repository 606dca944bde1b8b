use crate::event::Event;
use std::future::Future;

/// Reacts to dispatched events.
///
/// Handlers are fire-and-forget: there is no return channel, so a handler logs its own
/// failures. Invocations for distinct events may run concurrently.
#[async_trait::async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &Event);

    /// Name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Adapts an async closure into an [`EventHandler`].
pub struct HandlerFn<F> {
    name: &'static str,
    f: F,
}

/// ```
/// use user_event_core::{handler_fn, EventHandler};
///
/// let handler = handler_fn("audit", |event| async move {
///     tracing::info!(event_type = %event.event_type(), "seen");
/// });
/// assert_eq!(handler.name(), "audit");
/// ```
pub fn handler_fn<F, Fut>(name: &'static str, f: F) -> HandlerFn<F>
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    HandlerFn { name, f }
}

#[async_trait::async_trait]
impl<F, Fut> EventHandler for HandlerFn<F>
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn handle(&self, event: &Event) {
        (self.f)(event.clone()).await
    }

    fn name(&self) -> &str {
        self.name
    }
}
