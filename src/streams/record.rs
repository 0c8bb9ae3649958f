use super::codec::Codec;
use super::partition_key::PartitionKeyProvider;
use crate::error::PartitionKeyError;
use crate::event::Event;
use bytes::{BufMut, Bytes, BytesMut};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, warn};

/// An encoded, newline-terminated payload ready to be put on the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedRecord {
    pub data: Bytes,
    pub partition_key: String,
}

impl MappedRecord {
    pub fn new(data: impl Into<Bytes>, partition_key: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            partition_key: partition_key.into(),
        }
    }

    /// Size in bytes, trailing newline included.
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Why an event could not be turned into a record. Either way the event is
/// dropped, never retried.
#[derive(Error, Debug)]
pub enum MapError {
    #[error("failed to encode event: {0}")]
    Encode(#[source] crate::Error),

    #[error("failed to get partition key: {0}")]
    PartitionKey(#[from] PartitionKeyError),
}

/// Maps events to [`MappedRecord`]s using a codec and a partition key provider.
#[derive(Clone)]
pub struct RecordMapper {
    codec: Arc<dyn Codec>,
    partition_key_provider: PartitionKeyProvider,
    source_name: String,
}

impl RecordMapper {
    pub fn new(
        codec: Arc<dyn Codec>,
        partition_key_provider: PartitionKeyProvider,
        source_name: impl Into<String>,
    ) -> Self {
        Self {
            codec,
            partition_key_provider,
            source_name: source_name.into(),
        }
    }

    pub fn map_event(&self, event: &Event) -> Result<MappedRecord, MapError> {
        let encoded = match self.codec.encode(&self.source_name, event) {
            Ok(encoded) => encoded,
            Err(e) => {
                if event.guaranteed {
                    error!("Unable to encode guaranteed event: {}", e);
                } else {
                    debug!("Unable to encode event: {}", e);
                }
                return Err(MapError::Encode(e));
            }
        };

        let partition_key = match self.partition_key_provider.partition_key_for(event) {
            Ok(key) => key,
            Err(e) => {
                warn!("Dropping event without partition key: {}", e);
                return Err(MapError::PartitionKey(e));
            }
        };

        // Line-oriented consumers downstream need one record per line.
        let mut data = BytesMut::with_capacity(encoded.len() + 1);
        data.put_slice(&encoded);
        data.put_u8(b'\n');

        Ok(MappedRecord::new(data.freeze(), partition_key))
    }
}

impl std::fmt::Debug for RecordMapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordMapper")
            .field("partition_key_provider", &self.partition_key_provider)
            .field("source_name", &self.source_name)
            .finish()
    }
}
