use crate::errors::EventError;
use crate::event::{Action, Event, EventType};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// A domain entity whose changes are published as events.
pub trait Entity: Debug + Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Noun used in event types and as aggregate id, e.g. `user`.
    const NOUN: &'static str;

    fn id(&self) -> &str;
}

/// A user record as carried in event bodies.
///
/// Field names are PascalCase on the wire to stay compatible with the services that
/// already consume `user-*` events. Lowercase names are accepted as well when decoding.
/// `Id` is required, the other fields default to empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct User {
    #[serde(alias = "id", alias = "ID")]
    pub id: String,
    #[serde(alias = "name", default)]
    pub name: String,
    #[serde(alias = "email", default)]
    pub email: String,
    #[serde(alias = "password", default)]
    pub password: String,
}

impl Entity for User {
    const NOUN: &'static str = "user";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Closed set of events produced for an entity. On the wire they become an [`Event`] whose
/// type is `<noun>-created`, `<noun>-updated` or `<noun>-deleted`.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityEvent<E: Entity> {
    Created(E),
    Updated(E),
    /// Deletions only carry the id.
    Deleted(String),
}

impl<E: Entity> EntityEvent<E> {
    pub fn action(&self) -> Action {
        match self {
            EntityEvent::Created(_) => Action::Created,
            EntityEvent::Updated(_) => Action::Updated,
            EntityEvent::Deleted(_) => Action::Deleted,
        }
    }

    pub fn event_type(&self) -> EventType {
        EventType::of(E::NOUN, self.action())
    }

    /// Serializes the variant into an event addressed to the entity's noun.
    pub fn to_event(&self) -> Result<Event, EventError> {
        let event_type = self.event_type();
        match self {
            EntityEvent::Created(entity) | EntityEvent::Updated(entity) => {
                Event::new(E::NOUN, event_type, entity)
            }
            EntityEvent::Deleted(id) => Event::new(E::NOUN, event_type, id),
        }
    }

    /// Decodes an event produced for this entity.
    ///
    /// Returns `Ok(None)` for types that do not belong to `E` or carry an unknown verb, so
    /// new event types can be added without breaking existing consumers.
    pub fn from_event(event: &Event) -> Result<Option<Self>, EventError> {
        let Some((noun, verb)) = event.event_type().split() else {
            return Ok(None);
        };
        if noun != E::NOUN {
            return Ok(None);
        }
        let decoded = match Action::from_verb(verb) {
            Some(Action::Created) => EntityEvent::Created(event.decode_body()?),
            Some(Action::Updated) => EntityEvent::Updated(event.decode_body()?),
            Some(Action::Deleted) => EntityEvent::Deleted(event.decode_body()?),
            None => return Ok(None),
        };
        Ok(Some(decoded))
    }
}
