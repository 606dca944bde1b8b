use crate::broker::{Closer, Consumer, EventStream, Message, MessageStream, Publisher, Transport};
use crate::config::{BrokerConfig, RetryPolicy};
use crate::errors::EventError;
use crate::event::{Event, EventType};
use crate::route::Route;
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, instrument, warn};

/// Adapts [`Event`]s to a [`Transport`].
///
/// Resilient publishes go through an in-process FIFO drained by a single retry worker, so
/// messages reach the transport in the order they were handed over. Closing the broker
/// flushes that FIFO for as long as the transport accepts messages; only what is still
/// queued when a publish fails during close is given up. The worker and the consume pumps
/// are spawned on the current tokio runtime, hence [`MessageBroker::new`] must be called
/// from within one.
pub struct MessageBroker<T: Transport> {
    transport: Arc<T>,
    config: BrokerConfig,
    outbox: Mutex<Option<mpsc::UnboundedSender<Message>>>,
    shutdown: CancellationToken,
    closed: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Transport> MessageBroker<T> {
    pub fn new(transport: T, config: BrokerConfig) -> Self {
        let transport = Arc::new(transport);
        let shutdown = CancellationToken::new();
        let (outbox, pending) = mpsc::unbounded_channel();

        let span = info_span!("resilient_publish", consumer = %config.consumer);
        let worker = tokio::spawn(
            retry_worker(transport.clone(), pending, config.retry, shutdown.clone())
                .instrument(span),
        );

        Self {
            transport,
            config,
            outbox: Mutex::new(Some(outbox)),
            shutdown,
            closed: AtomicBool::new(false),
            worker: Mutex::new(Some(worker)),
        }
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    fn ensure_open(&self) -> Result<(), EventError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(EventError::BrokerClosed);
        }
        Ok(())
    }
}

impl<T: Transport> Drop for MessageBroker<T> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Publishes queued messages in order until every sender is gone.
///
/// `shutdown` only interrupts the wait between two attempts: once it is cancelled the first
/// failed publish gives up on that message and on whatever is still queued.
async fn retry_worker<T: Transport>(
    transport: Arc<T>,
    mut pending: mpsc::UnboundedReceiver<Message>,
    retry: RetryPolicy,
    shutdown: CancellationToken,
) {
    let mut dropped = 0usize;
    while let Some(message) = pending.recv().await {
        if !deliver(transport.as_ref(), &message, retry, &shutdown).await {
            dropped += 1;
            break;
        }
    }

    pending.close();
    while pending.try_recv().is_ok() {
        dropped += 1;
    }
    if dropped > 0 {
        warn!(dropped, "Broker closed with undelivered messages");
    }
}

/// Retries `message` with backoff. Returns `false` when shutdown interrupted the retries.
async fn deliver<T: Transport>(
    transport: &T,
    message: &Message,
    retry: RetryPolicy,
    shutdown: &CancellationToken,
) -> bool {
    let mut backoff = retry.backoff();
    loop {
        let error = match transport.publish(message).await {
            Ok(()) => {
                debug!(route = %message.route, "Message published");
                return true;
            }
            Err(error) => error,
        };

        let delay = backoff.next_delay();
        warn!(route = %message.route, %error, retry_in = ?delay, "Failed to publish message, retrying");
        tokio::select! {
            _ = shutdown.cancelled() => {
                warn!(route = %message.route, "Broker closed before the message could be published");
                return false;
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

#[async_trait::async_trait]
impl<T: Transport> Closer for MessageBroker<T> {
    async fn close(&self) -> Result<(), EventError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        // The worker flushes what is queued, then sees the channel closed.
        drop(self.outbox.lock().unwrap_or_else(PoisonError::into_inner).take());
        self.shutdown.cancel();

        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            let _ = worker.await;
        }

        self.transport.close().await?;
        info!(consumer = %self.config.consumer, "Broker closed");
        Ok(())
    }
}

#[async_trait::async_trait]
impl<T: Transport> Publisher for MessageBroker<T> {
    #[instrument(skip_all, fields(event_type = %event.event_type()))]
    async fn publish(&self, event: &Event) -> Result<(), EventError> {
        self.ensure_open()?;
        let message = Message::from_event(event)?;
        self.transport.publish(&message).await
    }

    fn resilient_publish(&self, event: &Event) -> Result<(), EventError> {
        self.ensure_open()?;
        let message = Message::from_event(event)?;
        self.outbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .ok_or(EventError::BrokerClosed)?
            .send(message)
            .map_err(|_| EventError::BrokerClosed)
    }
}

#[async_trait::async_trait]
impl<T: Transport> Consumer for MessageBroker<T> {
    #[instrument(skip(self, token), fields(consumer = %self.config.consumer))]
    async fn consume(
        &self,
        token: &CancellationToken,
        queue: &str,
        event_type: &EventType,
    ) -> Result<EventStream, EventError> {
        self.ensure_open()?;
        let route = Route::from_event_type(event_type)?;
        let messages = self.transport.subscribe(queue, &route).await?;

        let (events, received) = mpsc::channel(self.config.consume_buffer.max(1));
        let span = info_span!("consume", consumer = %self.config.consumer, queue, %event_type);
        tokio::spawn(
            pump(
                messages,
                events,
                event_type.clone(),
                token.clone(),
                self.shutdown.clone(),
            )
            .instrument(span),
        );

        debug!(route = %route, "Consumer started");
        Ok(Box::pin(ReceiverStream::new(received)))
    }
}

/// Decodes messages into events until cancelled, skipping anything malformed.
async fn pump(
    mut messages: MessageStream,
    events: mpsc::Sender<Event>,
    event_type: EventType,
    token: CancellationToken,
    shutdown: CancellationToken,
) {
    loop {
        let message = tokio::select! {
            _ = token.cancelled() => break,
            _ = shutdown.cancelled() => break,
            message = messages.next() => match message {
                Some(message) => message,
                None => break,
            },
        };

        let event = match message.to_event() {
            Ok(event) => event,
            Err(error) => {
                warn!(%error, route = %message.route, "Failed to process message");
                continue;
            }
        };
        if event.event_type() != &event_type {
            warn!(received = %event.event_type(), "Dropping message of unexpected type");
            continue;
        }

        tokio::select! {
            _ = token.cancelled() => break,
            _ = shutdown.cancelled() => break,
            sent = events.send(event) => if sent.is_err() {
                // The stream was dropped by its reader.
                break;
            },
        }
    }
    debug!("Consumer stopped");
}
