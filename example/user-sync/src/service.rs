use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use user_event_core::broker::{Closer, Consumer, InMemoryTransport, MessageBroker, Publisher};
use user_event_core::read::InMemoryReadStore;
use user_event_core::{
    BrokerConfig, CatchUp, CatchUpConfig, Dispatcher, DispatcherConfig, EntityEvent, EventError,
    User, handler_fn,
};

pub struct ServiceConfig {
    pub queue: String,
    pub broker: BrokerConfig,
    pub dispatcher: DispatcherConfig,
    pub catch_up: CatchUpConfig,
    /// Users written by the simulated write path.
    pub users: usize,
    pub write_interval: Duration,
}

/// Runs the synchronization service until `token` is cancelled.
///
/// The authoritative store is simulated by a writer task publishing `user-*` events on its
/// own feed. The dispatcher consumes that feed, republishes every event on the outward
/// broker and keeps the in-memory read model up to date.
pub async fn start(config: ServiceConfig, token: CancellationToken) -> Result<(), EventError> {
    let feed = Arc::new(MessageBroker::new(
        InMemoryTransport::default(),
        config.broker.clone(),
    ));
    let outward = Arc::new(MessageBroker::new(
        InMemoryTransport::default(),
        config.broker.clone(),
    ));

    let read_store = InMemoryReadStore::<User>::new();
    let catch_up = Arc::new(CatchUp::new(read_store.clone(), config.catch_up));
    let event_types = CatchUp::<InMemoryReadStore<User>, User>::event_types();

    let mut dispatcher = Dispatcher::new(outward.clone(), config.dispatcher);
    dispatcher.subscribe(catch_up, &event_types);
    dispatcher.subscribe(
        Arc::new(handler_fn("audit", |event| async move {
            info!(event_type = %event.event_type(), aggregate_id = %event.aggregate_id(), "Event seen");
        })),
        &event_types,
    );

    let mut sources = Vec::with_capacity(event_types.len());
    for event_type in &event_types {
        sources.push(feed.consume(&token, &config.queue, event_type).await?);
    }
    dispatcher.add_event_sources(sources);

    let writer = tokio::spawn(simulate_writes(
        feed.clone(),
        config.users,
        config.write_interval,
        token.clone(),
    ));

    info!(queue = %config.queue, "User sync started");
    let outcome = dispatcher.run(&token).await;
    token.cancel();
    if let Err(error) = writer.await {
        warn!(%error, "Write simulation aborted");
    }

    feed.close().await?;
    outward.close().await?;
    info!(users = read_store.len(), "User sync stopped");
    outcome
}

/// Creates, renames and finally deletes `users` users, one event per tick.
async fn simulate_writes(
    feed: Arc<MessageBroker<InMemoryTransport>>,
    users: usize,
    interval: Duration,
    token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    for n in 0..users {
        let user = User {
            id: format!("user-{n}"),
            name: format!("User {n}"),
            email: format!("user{n}@example.com"),
            password: String::new(),
        };
        let renamed = User {
            name: format!("{} (renamed)", user.name),
            ..user.clone()
        };

        let changes = [
            EntityEvent::Created(user),
            EntityEvent::Updated(renamed),
            EntityEvent::Deleted(format!("user-{n}")),
        ];
        for change in changes {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = ticker.tick() => {}
            }
            let published = match change.to_event() {
                Ok(event) => feed.publish(&event).await,
                Err(error) => Err(error),
            };
            if let Err(error) = published {
                warn!(%error, "Failed to write event");
            }
        }
    }
    info!(users, "Write simulation done");
}
