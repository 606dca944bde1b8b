use crate::errors::EventError;
use crate::event::EventType;
use std::fmt::{Display, Formatter};

pub const EXCHANGE_TOPIC: &str = "topic";

/// Where a message is published on the transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Route {
    pub exchange_name: String,
    pub exchange_type: &'static str,
    pub routing_key: String,
}

impl Route {
    /// Derives the route of an event type: the noun names a topic exchange and the verb ends
    /// up in the routing key, `user-created` → (`user`, `user.event.created`).
    ///
    /// The mapping is pure. A type without a `<noun>-<verb>` shape has no route.
    pub fn from_event_type(event_type: &EventType) -> Result<Self, EventError> {
        let (noun, verb) = event_type
            .split()
            .ok_or_else(|| EventError::InvalidEventType(event_type.to_string()))?;

        Ok(Self {
            exchange_name: noun.to_string(),
            exchange_type: EXCHANGE_TOPIC,
            routing_key: format!("{noun}.event.{verb}"),
        })
    }
}

impl Display for Route {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.exchange_name, self.routing_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_from_event_type() {
        let route = Route::from_event_type(&EventType::USER_CREATED).unwrap();
        assert_eq!(
            route,
            Route {
                exchange_name: "user".to_string(),
                exchange_type: "topic",
                routing_key: "user.event.created".to_string(),
            }
        );

        let route = Route::from_event_type(&EventType::ARTICLE_DELETED).unwrap();
        assert_eq!(route.exchange_name, "article");
        assert_eq!(route.routing_key, "article.event.deleted");
    }

    #[test]
    fn test_route_is_deterministic() {
        let owned = EventType::new(String::from("user-updated"));
        assert_eq!(
            Route::from_event_type(&owned).unwrap(),
            Route::from_event_type(&EventType::USER_UPDATED).unwrap()
        );
    }

    #[test]
    fn test_route_multi_word_noun() {
        let route =
            Route::from_event_type(&EventType::new("changed_password_notification-sent")).unwrap();
        assert_eq!(route.exchange_name, "changed_password_notification");
        assert_eq!(route.routing_key, "changed_password_notification.event.sent");
    }

    #[test]
    fn test_route_requires_separator() {
        for invalid in ["user", "", "-created", "user-"] {
            let err = Route::from_event_type(&EventType::new(invalid)).unwrap_err();
            assert!(matches!(err, EventError::InvalidEventType(t) if t == invalid));
        }
    }
}
