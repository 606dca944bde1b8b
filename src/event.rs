use crate::errors::EventError;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt::{Display, Formatter};

/// Separator between the noun and the verb of an event type.
pub const TYPE_SEPARATOR: char = '-';

/// Name of an event, on the wire a plain string of the form `<noun>-<verb>`.
///
/// Verbs are lowercase, multi-word nouns use underscores
/// (e.g. `changed_password_notification-sent`). The set is open: types this service does
/// not know about deserialize fine and are simply ignored by handlers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventType(Cow<'static, str>);

impl EventType {
    pub const ARTICLE_CREATED: EventType = EventType::from_static("article-created");
    pub const ARTICLE_UPDATED: EventType = EventType::from_static("article-updated");
    pub const ARTICLE_DELETED: EventType = EventType::from_static("article-deleted");

    pub const USER_CREATED: EventType = EventType::from_static("user-created");
    pub const USER_UPDATED: EventType = EventType::from_static("user-updated");
    pub const USER_DELETED: EventType = EventType::from_static("user-deleted");

    pub const fn from_static(value: &'static str) -> Self {
        Self(Cow::Borrowed(value))
    }

    pub fn new(value: impl Into<String>) -> Self {
        Self(Cow::Owned(value.into()))
    }

    /// Builds `<noun>-<verb>` for an action on the given noun.
    pub fn of(noun: &str, action: Action) -> Self {
        Self::new(format!("{noun}{TYPE_SEPARATOR}{}", action.verb()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Splits the type on its first separator.
    /// Returns `None` when either side would be empty.
    pub fn split(&self) -> Option<(&str, &str)> {
        match self.0.split_once(TYPE_SEPARATOR) {
            Some((noun, verb)) if !noun.is_empty() && !verb.is_empty() => Some((noun, verb)),
            _ => None,
        }
    }
}

impl Display for EventType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for EventType {
    fn from(value: &'static str) -> Self {
        Self::from_static(value)
    }
}

impl From<String> for EventType {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// The closed set of verbs this service produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Created,
    Updated,
    Deleted,
}

impl Action {
    pub const ALL: [Action; 3] = [Action::Created, Action::Updated, Action::Deleted];

    pub fn verb(&self) -> &'static str {
        match self {
            Action::Created => "created",
            Action::Updated => "updated",
            Action::Deleted => "deleted",
        }
    }

    pub fn from_verb(verb: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.verb() == verb)
    }
}

/// An immutable fact describing a change to an aggregate.
///
/// Events are sent to the broker as JSON. `body` holds the payload already serialized to
/// JSON; in the envelope it is carried as a base64 string, the encoding the other services
/// use for raw bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default)]
    aggregate_id: String,
    #[serde(rename = "type", default)]
    event_type: EventType,
    #[serde(with = "base64_body", default)]
    body: Vec<u8>,
    #[serde(default)]
    timestamp: DateTime<Utc>,
}

impl Event {
    /// Serializes `payload` and wraps it in a new event stamped with the current time.
    ///
    /// Fails without producing anything when the payload cannot be encoded; that usually
    /// means a type was registered for an event it cannot represent, so the caller should
    /// propagate the error rather than try to recover.
    pub fn new<P: Serialize + ?Sized>(
        aggregate_id: impl Into<String>,
        event_type: EventType,
        payload: &P,
    ) -> Result<Self, EventError> {
        let body = serde_json::to_vec(payload)?;
        Ok(Self {
            aggregate_id: aggregate_id.into(),
            event_type,
            body,
            timestamp: Utc::now(),
        })
    }

    /// Assembles an event out of already serialized parts.
    pub fn from_parts(
        aggregate_id: impl Into<String>,
        event_type: EventType,
        body: Vec<u8>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            aggregate_id: aggregate_id.into(),
            event_type,
            body,
            timestamp,
        }
    }

    pub fn aggregate_id(&self) -> &str {
        &self.aggregate_id
    }

    pub fn event_type(&self) -> &EventType {
        &self.event_type
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Decodes the body with the encoding agreed for this event type.
    pub fn decode_body<T: DeserializeOwned>(&self) -> Result<T, EventError> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

mod base64_body {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(body))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::random_user;
    use crate::User;

    #[test]
    fn test_new_serializes_payload() {
        let before = Utc::now();
        let event = Event::new("user", EventType::ARTICLE_CREATED, "some-string").unwrap();

        assert_eq!(event.aggregate_id(), "user");
        assert_eq!(event.event_type(), &EventType::ARTICLE_CREATED);
        assert_eq!(event.body(), br#""some-string""#);
        assert!(event.timestamp() >= before);
        assert!(event.timestamp() <= Utc::now());
    }

    #[test]
    fn test_new_round_trips_body() {
        let user = random_user();
        let event = Event::new("user", EventType::USER_CREATED, &user).unwrap();

        let decoded: User = event.decode_body().unwrap();
        assert_eq!(decoded, user);
    }

    #[test]
    fn test_new_fails_atomically_on_unserializable_payload() {
        // Maps with non-string keys have no JSON representation.
        let payload = std::collections::HashMap::from([((1, 2), "value")]);
        let err = Event::new("user", EventType::USER_CREATED, &payload).unwrap_err();
        assert!(matches!(err, EventError::SerializationError(_)));
    }

    #[test]
    fn test_envelope_carries_body_as_base64() {
        let event = Event::new("user", EventType::USER_DELETED, "42").unwrap();
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();

        assert_eq!(json["aggregate_id"], "user");
        assert_eq!(json["type"], "user-deleted");
        // base64 of `"42"`
        assert_eq!(json["body"], "IjQyIg==");

        let back: Event = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_missing_fields_default() {
        let event: Event = serde_json::from_str(r#"{"type":"user-created"}"#).unwrap();
        assert_eq!(event.event_type(), &EventType::USER_CREATED);
        assert!(event.body().is_empty());
        assert_eq!(event.aggregate_id(), "");
    }

    #[test]
    fn test_event_type_split() {
        assert_eq!(EventType::USER_CREATED.split(), Some(("user", "created")));
        assert_eq!(
            EventType::new("changed_password_notification-sent").split(),
            Some(("changed_password_notification", "sent"))
        );
        assert_eq!(EventType::new("a-b-c").split(), Some(("a", "b-c")));
        assert_eq!(EventType::new("user").split(), None);
        assert_eq!(EventType::new("-created").split(), None);
        assert_eq!(EventType::new("user-").split(), None);
    }

    #[test]
    fn test_event_type_of_action() {
        assert_eq!(EventType::of("user", Action::Created), EventType::USER_CREATED);
        assert_eq!(EventType::of("user", Action::Updated), EventType::USER_UPDATED);
        assert_eq!(EventType::of("user", Action::Deleted), EventType::USER_DELETED);
        assert_eq!(Action::from_verb("deleted"), Some(Action::Deleted));
        assert_eq!(Action::from_verb("sent"), None);
    }
}
