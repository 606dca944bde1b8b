use crate::errors::EventError;
use crate::event::Event;
use crate::route::Route;
use chrono::{DateTime, Utc};

pub const CONTENT_TYPE_JSON: &str = "application/json";

/// A message as handed to the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub body: Vec<u8>,
    pub content_type: &'static str,
    pub route: Route,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Encodes the whole event envelope as JSON and addresses it by the event type.
    pub fn from_event(event: &Event) -> Result<Self, EventError> {
        let route = Route::from_event_type(event.event_type())?;
        let body = serde_json::to_vec(event)?;
        Ok(Self {
            body,
            content_type: CONTENT_TYPE_JSON,
            route,
            timestamp: event.timestamp(),
        })
    }

    pub fn to_event(&self) -> Result<Event, EventError> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}
