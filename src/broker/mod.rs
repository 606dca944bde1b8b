//! Boundary between the event model and an external publish/subscribe transport.
//!
//! [`Publisher`] and [`Consumer`] are what the rest of the crate depends on,
//! [`MessageBroker`] implements both on top of any [`Transport`].

mod memory;
pub use memory::*;
mod message;
pub use message::*;
mod message_broker;
pub use message_broker::*;
mod transport;
pub use transport::*;

use crate::errors::EventError;
use crate::event::{Event, EventType};
use futures::stream::BoxStream;
use tokio_util::sync::CancellationToken;

/// A live, possibly infinite sequence of events.
pub type EventStream = BoxStream<'static, Event>;

#[async_trait::async_trait]
pub trait Closer: Send + Sync {
    /// Releases the underlying connection. Calling it more than once is harmless.
    async fn close(&self) -> Result<(), EventError>;
}

#[async_trait::async_trait]
pub trait Publisher: Closer {
    /// Publishes right away and reports any transport failure. No retry.
    async fn publish(&self, event: &Event) -> Result<(), EventError>;

    /// Hands the event over for delivery and returns without waiting for the transport.
    ///
    /// Only fails when the event cannot be turned into a message (or the publisher is
    /// closed). Transport failures are retried in the background until the message goes
    /// through, so `Ok` means the event will eventually reach the transport, not that it
    /// already has.
    fn resilient_publish(&self, event: &Event) -> Result<(), EventError>;
}

#[async_trait::async_trait]
pub trait Consumer: Closer {
    /// Subscribes to events of `event_type` on `queue`.
    ///
    /// Subscription failures are returned right away. Once the stream is live it ends only
    /// when `token` is cancelled or the transport goes away; malformed messages are logged
    /// and skipped.
    async fn consume(
        &self,
        token: &CancellationToken,
        queue: &str,
        event_type: &EventType,
    ) -> Result<EventStream, EventError>;
}

pub trait Broker: Publisher + Consumer {}

impl<T: Publisher + Consumer> Broker for T {}
