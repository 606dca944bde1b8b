use crate::broker::Message;
use crate::errors::EventError;
use crate::route::Route;
use futures::stream::BoxStream;

pub type MessageStream = BoxStream<'static, Message>;

/// An external durable pub/sub system (AMQP-like: topic exchanges, routing keys, queues).
///
/// Implementations are owned by a single [`MessageBroker`](crate::broker::MessageBroker)
/// and must not be shared with other components.
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn publish(&self, message: &Message) -> Result<(), EventError>;

    /// Binds `queue` to `route` and streams the messages it receives. The stream ends when
    /// the subscription is dropped by the transport.
    async fn subscribe(&self, queue: &str, route: &Route) -> Result<MessageStream, EventError>;

    async fn close(&self) -> Result<(), EventError>;
}
