use crate::config::StreamConfig;
use crate::error::PartitionKeyError;
use crate::event::Event;
use crate::{Error, Result};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

/// How a record's partition key is derived from its event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartitionKeyProvider {
    /// Read a string from a (dotted) field path of the event.
    Field(String),
    /// Ignore the event and generate a fresh unique id.
    Generated,
}

impl PartitionKeyProvider {
    pub fn from_config(config: &StreamConfig) -> Result<Self> {
        if config.uses_key_generator() {
            return Ok(PartitionKeyProvider::Generated);
        }

        match config.partition_key.as_deref() {
            Some(field) if !field.is_empty() => Ok(PartitionKeyProvider::Field(field.to_string())),
            _ => Err(Error::Config(
                "partition_key must be set when no partition_key_provider is configured"
                    .to_string(),
            )),
        }
    }

    pub fn partition_key_for(&self, event: &Event) -> std::result::Result<String, PartitionKeyError> {
        match self {
            PartitionKeyProvider::Field(field) => extract_string_field(event, field),
            PartitionKeyProvider::Generated => Ok(Uuid::new_v4().to_string()),
        }
    }
}

fn extract_string_field(
    event: &Event,
    field: &str,
) -> std::result::Result<String, PartitionKeyError> {
    match event.get_value(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(PartitionKeyError::TypeMismatch {
            field: field.to_string(),
            value: other.to_string(),
        }),
        None => {
            debug!("Field '{}' not found in event", field);
            Err(PartitionKeyError::MissingField {
                field: field.to_string(),
            })
        }
    }
}
