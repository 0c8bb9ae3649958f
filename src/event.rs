use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One unit of data to ship.
///
/// The dispatcher never modifies an event; it only moves it into one of the
/// delivered, retriable or dropped buckets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "@timestamp", default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    pub fields: Value,
    /// Events marked guaranteed escalate encode failures to error level.
    #[serde(default, skip_serializing)]
    pub guaranteed: bool,
}

impl Event {
    pub fn new(fields: Value) -> Self {
        Self {
            timestamp: Utc::now(),
            fields,
            guaranteed: false,
        }
    }

    pub fn with_guaranteed(mut self, guaranteed: bool) -> Self {
        self.guaranteed = guaranteed;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Looks up a dotted field path, e.g. `"user.profile.email"`.
    pub fn get_value(&self, field_path: &str) -> Option<&Value> {
        field_path
            .split('.')
            .try_fold(&self.fields, |current, part| current.get(part))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_value_nested() {
        let event = Event::new(json!({
            "user": {
                "profile": {
                    "email": "john@example.com"
                }
            }
        }));

        assert_eq!(
            event.get_value("user.profile.email"),
            Some(&json!("john@example.com"))
        );
        assert_eq!(event.get_value("user.missing"), None);
        assert_eq!(event.get_value("user.profile.email.deeper"), None);
    }

    #[test]
    fn test_deserialize_defaults() {
        let event: Event = serde_json::from_str(r#"{"fields": {"a": 1}}"#).unwrap();
        assert!(!event.guaranteed);
        assert_eq!(event.get_value("a"), Some(&json!(1)));
    }
}
