use crate::event::Event;
use crate::{Error, Result};
use serde_json::{Map, Value};

/// Turns an event into the bytes shipped as a record payload.
pub trait Codec: Send + Sync {
    fn encode(&self, source: &str, event: &Event) -> Result<Vec<u8>>;
}

/// Encodes an event as a single-line JSON document.
///
/// The document holds the event fields plus `@timestamp` and an
/// `@metadata.source` entry naming the shipping process. Event fields named
/// `@timestamp` or `@metadata` are overwritten.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl JsonCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Codec for JsonCodec {
    fn encode(&self, source: &str, event: &Event) -> Result<Vec<u8>> {
        let mut document = match &event.fields {
            Value::Object(fields) => fields.clone(),
            Value::Null => Map::new(),
            other => {
                return Err(Error::Encode {
                    message: format!("event fields must be a JSON object, got {}", other),
                })
            }
        };

        document.insert(
            "@timestamp".to_string(),
            Value::String(event.timestamp.to_rfc3339()),
        );

        let mut metadata = Map::new();
        metadata.insert("source".to_string(), Value::String(source.to_string()));
        metadata.insert(
            "version".to_string(),
            Value::String(env!("CARGO_PKG_VERSION").to_string()),
        );
        document.insert("@metadata".to_string(), Value::Object(metadata));

        Ok(serde_json::to_vec(&Value::Object(document))?)
    }
}
