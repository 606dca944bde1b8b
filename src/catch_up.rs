use crate::config::CatchUpConfig;
use crate::entity::{Entity, EntityEvent};
use crate::errors::EventError;
use crate::event::{Action, Event, EventType};
use crate::handler::EventHandler;
use crate::read::Writer;
use std::future::Future;
use std::marker::PhantomData;
use tracing::{debug, error, instrument};

/// Keeps a read store in line with the events of one entity kind.
///
/// `<noun>-created` and `<noun>-updated` carry the whole entity and become
/// [`Writer::create`] and [`Writer::update`], `<noun>-deleted` carries the id and becomes
/// [`Writer::delete`]. Other events are ignored. Failures are logged with the event and
/// never retried.
pub struct CatchUp<W, E> {
    store: W,
    config: CatchUpConfig,
    _entity: PhantomData<fn() -> E>,
}

impl<W, E> CatchUp<W, E>
where
    W: Writer<E>,
    E: Entity,
{
    #[must_use]
    pub fn new(store: W, config: CatchUpConfig) -> Self {
        Self {
            store,
            config,
            _entity: PhantomData,
        }
    }

    /// The event types this handler has to be subscribed to.
    pub fn event_types() -> Vec<EventType> {
        Action::ALL
            .into_iter()
            .map(|action| EventType::of(E::NOUN, action))
            .collect()
    }

    async fn apply(&self, change: EntityEvent<E>) -> Result<(), EventError> {
        match change {
            EntityEvent::Created(entity) => self.bounded(self.store.create(entity)).await,
            EntityEvent::Updated(entity) => self.bounded(self.store.update(entity)).await,
            EntityEvent::Deleted(id) => self.bounded(self.store.delete(&id)).await,
        }
    }

    async fn bounded(
        &self,
        call: impl Future<Output = Result<(), EventError>>,
    ) -> Result<(), EventError> {
        tokio::time::timeout(self.config.timeout, call)
            .await
            .map_err(|_| EventError::Timeout)?
    }
}

#[async_trait::async_trait]
impl<W, E> EventHandler for CatchUp<W, E>
where
    W: Writer<E>,
    E: Entity,
{
    #[instrument(skip_all, fields(noun = E::NOUN, event_type = %event.event_type()))]
    async fn handle(&self, event: &Event) {
        let change = match EntityEvent::<E>::from_event(event) {
            Ok(Some(change)) => change,
            Ok(None) => {
                debug!("Event ignored");
                return;
            }
            Err(error) => {
                error!(%error, ?event, "Failed to parse event");
                return;
            }
        };

        let action = change.action();
        match self.apply(change).await {
            Ok(()) => debug!(action = action.verb(), "Read model updated"),
            Err(error) => {
                error!(%error, action = action.verb(), ?event, "Failed to apply event to read model")
            }
        }
    }

    fn name(&self) -> &str {
        "catch_up"
    }
}
