use crate::broker::{Message, MessageStream, Transport};
use crate::errors::EventError;
use crate::route::Route;
use futures::StreamExt;
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::{debug, warn};

/// A simple in-memory transport.
/// Useful for testing, local development or wiring several components of one process.
///
/// Every `(exchange, routing key)` pair is a broadcast channel: each subscription gets its own
/// copy of the messages published after it was made, whatever its queue name. Messages
/// published while nobody listens are dropped, like an exchange without bound queues.
#[derive(Clone)]
pub struct InMemoryTransport {
    inner: Arc<Inner>,
}

struct Inner {
    capacity: usize,
    exchanges: Mutex<HashMap<(String, String), broadcast::Sender<Message>>>,
    published: Mutex<Vec<Message>>,
    attempts: AtomicUsize,
    online: AtomicBool,
    closed: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl InMemoryTransport {
    /// Creates a new transport, `capacity` bounds how far a subscriber may lag behind.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                capacity: capacity.max(1),
                exchanges: Mutex::new(HashMap::new()),
                published: Mutex::new(Vec::new()),
                attempts: AtomicUsize::new(0),
                online: AtomicBool::new(true),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Simulates the remote end going away (`false`) or coming back (`true`).
    pub fn set_online(&self, online: bool) {
        self.inner.online.store(online, Ordering::SeqCst);
    }

    /// Gets all messages accepted so far, in publish order.
    pub fn published(&self) -> Vec<Message> {
        lock(&self.inner.published).clone()
    }

    /// Number of publish calls, failed ones included.
    pub fn publish_attempts(&self) -> usize {
        self.inner.attempts.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    fn ensure_available(&self) -> Result<(), EventError> {
        if self.is_closed() {
            return Err(EventError::transport_error(io::Error::new(
                io::ErrorKind::NotConnected,
                "connection closed",
            )));
        }
        if !self.inner.online.load(Ordering::SeqCst) {
            return Err(EventError::transport_error(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "transport unavailable",
            )));
        }
        Ok(())
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait::async_trait]
impl Transport for InMemoryTransport {
    async fn publish(&self, message: &Message) -> Result<(), EventError> {
        self.inner.attempts.fetch_add(1, Ordering::SeqCst);
        self.ensure_available()?;

        lock(&self.inner.published).push(message.clone());
        let key = (
            message.route.exchange_name.clone(),
            message.route.routing_key.clone(),
        );
        if let Some(sender) = lock(&self.inner.exchanges).get(&key) {
            // No receiver left is not an error for a topic exchange.
            let _ = sender.send(message.clone());
        }
        debug!(route = %message.route, "Message published to in-memory transport");
        Ok(())
    }

    async fn subscribe(&self, queue: &str, route: &Route) -> Result<MessageStream, EventError> {
        self.ensure_available()?;

        let receiver = lock(&self.inner.exchanges)
            .entry((route.exchange_name.clone(), route.routing_key.clone()))
            .or_insert_with(|| broadcast::channel(self.inner.capacity).0)
            .subscribe();
        debug!(queue, route = %route, "Queue bound to in-memory exchange");

        let queue = queue.to_string();
        let stream = BroadcastStream::new(receiver).filter_map(move |received| {
            let message = match received {
                Ok(message) => Some(message),
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(queue = %queue, skipped, "Subscriber lagged behind, messages lost");
                    None
                }
            };
            futures::future::ready(message)
        });
        Ok(Box::pin(stream))
    }

    async fn close(&self) -> Result<(), EventError> {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        // Dropping the senders ends every subscription stream.
        lock(&self.inner.exchanges).clear();
        debug!("In-memory transport closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Event, EventType};

    fn message(event_type: EventType) -> Message {
        Message::from_event(&Event::new("user", event_type, "42").unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_subscription_receives_matching_route_only() {
        let transport = InMemoryTransport::default();
        let route = Route::from_event_type(&EventType::USER_CREATED).unwrap();
        let mut stream = transport.subscribe("q", &route).await.unwrap();

        transport.publish(&message(EventType::USER_DELETED)).await.unwrap();
        let created = message(EventType::USER_CREATED);
        transport.publish(&created).await.unwrap();

        assert_eq!(stream.next().await, Some(created));
        assert_eq!(transport.published().len(), 2);
    }

    #[tokio::test]
    async fn test_offline_transport_rejects_calls() {
        let transport = InMemoryTransport::default();
        transport.set_online(false);

        let err = transport
            .publish(&message(EventType::USER_CREATED))
            .await
            .unwrap_err();
        assert!(matches!(err, EventError::TransportError(_)));

        let route = Route::from_event_type(&EventType::USER_CREATED).unwrap();
        assert!(transport.subscribe("q", &route).await.is_err());
        assert_eq!(transport.publish_attempts(), 1);
        assert!(transport.published().is_empty());

        transport.set_online(true);
        transport.publish(&message(EventType::USER_CREATED)).await.unwrap();
        assert_eq!(transport.published().len(), 1);
    }

    #[tokio::test]
    async fn test_close_ends_subscriptions() {
        let transport = InMemoryTransport::default();
        let route = Route::from_event_type(&EventType::USER_CREATED).unwrap();
        let mut stream = transport.subscribe("q", &route).await.unwrap();

        transport.close().await.unwrap();
        transport.close().await.unwrap();

        assert_eq!(stream.next().await, None);
        assert!(transport.is_closed());
        assert!(
            transport
                .publish(&message(EventType::USER_CREATED))
                .await
                .is_err()
        );
    }
}
