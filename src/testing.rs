use crate::broker::{Closer, Publisher};
use crate::errors::EventError;
use crate::event::Event;
use crate::handler::EventHandler;
use crate::read::Writer;
use crate::User;
use rand::Rng;
use rand::distr::Alphanumeric;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

pub fn random_string(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

pub fn random_user() -> User {
    User {
        id: uuid::Uuid::new_v4().to_string(),
        name: random_string(12),
        email: format!("{}@example.com", random_string(8).to_lowercase()),
        password: random_string(16),
    }
}

/// Polls `condition` until it holds, panicking after two seconds.
pub async fn wait_for(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not met in time");
}

/// Publisher keeping every event it was handed.
#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<Event>>,
    failing: AtomicBool,
}

impl RecordingPublisher {
    /// Makes every following publish fail as a closed broker would.
    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn published(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, event: &Event) -> Result<(), EventError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(EventError::BrokerClosed);
        }
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
        Ok(())
    }
}

#[async_trait::async_trait]
impl Closer for RecordingPublisher {
    async fn close(&self) -> Result<(), EventError> {
        Ok(())
    }
}

#[async_trait::async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, event: &Event) -> Result<(), EventError> {
        self.record(event)
    }

    fn resilient_publish(&self, event: &Event) -> Result<(), EventError> {
        self.record(event)
    }
}

/// Handler remembering the events it received.
#[derive(Default)]
pub struct SpyHandler {
    events: Mutex<Vec<Event>>,
}

impl SpyHandler {
    pub fn count(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait::async_trait]
impl EventHandler for SpyHandler {
    async fn handle(&self, event: &Event) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    Create(User),
    Update(User),
    Delete(String),
}

/// Read store double recording the calls it gets.
#[derive(Default)]
pub struct RecordingWriter {
    writes: Mutex<Vec<Write>>,
    failing: AtomicBool,
    delay: Mutex<Option<Duration>>,
}

impl RecordingWriter {
    pub fn writes(&self) -> Vec<Write> {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Makes every call sleep for `delay` before recording.
    pub fn delay(&self, delay: Duration) {
        *self.delay.lock().unwrap_or_else(PoisonError::into_inner) = Some(delay);
    }

    async fn record(&self, write: Write) -> Result<(), EventError> {
        let delay = *self.delay.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(write);
        if self.failing.load(Ordering::SeqCst) {
            return Err(EventError::storage_error(std::io::Error::other(
                "store unavailable",
            )));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Writer<User> for RecordingWriter {
    async fn create(&self, entity: User) -> Result<(), EventError> {
        self.record(Write::Create(entity)).await
    }

    async fn update(&self, entity: User) -> Result<(), EventError> {
        self.record(Write::Update(entity)).await
    }

    async fn delete(&self, id: &str) -> Result<(), EventError> {
        self.record(Write::Delete(id.to_string())).await
    }
}
