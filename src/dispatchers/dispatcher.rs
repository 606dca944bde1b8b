use crate::broker::{EventStream, Publisher};
use crate::config::DispatcherConfig;
use crate::dispatchers::merge_streams;
use crate::errors::EventError;
use crate::event::{Event, EventType};
use crate::handler::EventHandler;
use futures::{FutureExt, StreamExt};
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, instrument, warn};

/// In-process pub/sub hub.
///
/// Every dispatched event is first handed to the [`Publisher`] for durable delivery, then
/// fanned out to the handlers subscribed to its type, at most `max_concurrency` of them
/// running at once for that event.
///
/// Events are not ordered per aggregate: two events dispatched by separate `dispatch` calls
/// run through independent tasks, so a handler may observe an older update after a newer
/// one. Handlers that need ordering must serialize on their side.
pub struct Dispatcher {
    publisher: Arc<dyn Publisher>,
    max_concurrency: usize,
    handlers: RwLock<HashMap<EventType, Vec<Arc<dyn EventHandler>>>>,
    sources: Mutex<Vec<EventStream>>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(publisher: Arc<dyn Publisher>, config: DispatcherConfig) -> Self {
        let max_concurrency = if config.max_concurrency == 0 {
            warn!("max_concurrency of 0 would stall every dispatch, using 1");
            1
        } else {
            config.max_concurrency.min(Semaphore::MAX_PERMITS)
        };
        Self {
            publisher,
            max_concurrency,
            handlers: RwLock::new(HashMap::new()),
            sources: Mutex::new(Vec::new()),
        }
    }

    /// Registers `handler` for each of `event_types`.
    ///
    /// Subscribing the same handler twice makes it run twice per matching event.
    pub fn subscribe(&self, handler: Arc<dyn EventHandler>, event_types: &[EventType]) {
        let mut handlers = self
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        for event_type in event_types {
            debug!(handler = handler.name(), %event_type, "Handler subscribed");
            handlers
                .entry(event_type.clone())
                .or_default()
                .push(handler.clone());
        }
    }

    /// Gets the handlers subscribed to `event_type`, in subscription order.
    pub fn handlers(&self, event_type: &EventType) -> Vec<Arc<dyn EventHandler>> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(event_type)
            .cloned()
            .unwrap_or_default()
    }

    /// Registers streams whose events [`Dispatcher::run`] dispatches.
    /// This is a wiring step and has to happen before `run`.
    pub fn add_event_sources(&mut self, sources: impl IntoIterator<Item = EventStream>) {
        self.sources
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(sources);
    }

    /// Publishes `event` and starts every handler subscribed to its type.
    ///
    /// Fails, without running any handler, when the event cannot be handed to the publisher:
    /// no handler may act on an event the rest of the system will never see. Returns once
    /// every handler has been started; handlers are not awaited. A handler that panics is
    /// logged and does not affect the others.
    #[instrument(skip_all, fields(event_type = %event.event_type(), aggregate_id = %event.aggregate_id()))]
    pub async fn dispatch(&self, event: Event) -> Result<(), EventError> {
        if let Err(error) = self.publisher.resilient_publish(&event) {
            error!(%error, "Failed to publish event, handlers not invoked");
            return Err(error);
        }

        let handlers = self.handlers(event.event_type());
        if handlers.is_empty() {
            debug!("No handler subscribed");
            return Ok(());
        }

        let event = Arc::new(event);
        let limit = Arc::new(Semaphore::new(self.max_concurrency));
        let count = handlers.len();
        for handler in handlers {
            let Ok(permit) = limit.clone().acquire_owned().await else {
                break;
            };
            let event = event.clone();
            tokio::spawn(
                async move {
                    let outcome = AssertUnwindSafe(handler.handle(&event)).catch_unwind().await;
                    if outcome.is_err() {
                        error!(handler = handler.name(), "Event handler panicked");
                    }
                    drop(permit);
                }
                .in_current_span(),
            );
        }

        debug!(handlers = count, "Event dispatched");
        Ok(())
    }

    /// Dispatches events from the registered sources until `token` is cancelled.
    ///
    /// Returns right after cancellation without waiting for running handlers. An event that
    /// cannot be published stops the loop with that error. Once every source has ended the
    /// loop idles until cancellation.
    pub async fn run(&self, token: &CancellationToken) -> Result<(), EventError> {
        let sources = std::mem::take(
            &mut *self.sources.lock().unwrap_or_else(PoisonError::into_inner),
        );
        info!(sources = sources.len(), "Dispatcher started");
        let mut events = merge_streams(sources);

        loop {
            let next = tokio::select! {
                _ = token.cancelled() => break,
                next = events.next() => next,
            };
            match next {
                Some(event) => self.dispatch(event).await?,
                None => {
                    debug!("All event sources ended");
                    token.cancelled().await;
                    break;
                }
            }
        }

        info!("Dispatcher stopped");
        Ok(())
    }
}
