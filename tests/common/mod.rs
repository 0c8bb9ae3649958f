#![allow(dead_code)]

use async_trait::async_trait;
use kinesis_shipper::backoff::Backoff;
use kinesis_shipper::config::{BackoffConfig, Config, StreamConfig};
use kinesis_shipper::streams::{
    BatchPacker, BatchSubmitter, Codec, MappedRecord, PartitionKeyProvider, PutRecordsResponse,
    RecordMapper, RecordResult, Transport, TransportError,
};
use kinesis_shipper::{Dispatcher, Error, Event, Result};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const KEY_FIELD: &str = "mypartitionkey";

/// Encodes an event as `size - 1` filler bytes so that the mapped record,
/// newline included, is exactly `size` bytes. Events without a `size` field
/// fail to encode.
pub struct SizedCodec;

impl Codec for SizedCodec {
    fn encode(&self, _source: &str, event: &Event) -> Result<Vec<u8>> {
        let size = event
            .get_value("size")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| Error::Encode {
                message: "event has no size".to_string(),
            })?;
        Ok(vec![b'x'; size.saturating_sub(1) as usize])
    }
}

type Scripted = std::result::Result<PutRecordsResponse, TransportError>;

/// Transport that replays scripted responses in order and records every call.
/// Once the script runs out, every record succeeds.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Scripted>>,
    calls: Mutex<Vec<Vec<MappedRecord>>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Scripted>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn succeeding() -> Arc<Self> {
        Self::new(Vec::new())
    }

    pub fn calls(&self) -> Vec<Vec<MappedRecord>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_sizes(&self) -> Vec<usize> {
        self.calls().iter().map(Vec::len).collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn put_records(
        &self,
        _stream_name: &str,
        records: &[MappedRecord],
    ) -> std::result::Result<PutRecordsResponse, TransportError> {
        self.calls.lock().unwrap().push(records.to_vec());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(PutRecordsResponse::all_succeeded(records.len())))
    }
}

pub fn sized_event(id: u64, size: u64) -> Event {
    Event::new(json!({ "id": id, "size": size, KEY_FIELD: format!("key-{}", id) }))
}

pub fn ids(events: &[Event]) -> Vec<u64> {
    events
        .iter()
        .map(|e| e.get_value("id").and_then(|v| v.as_u64()).unwrap())
        .collect()
}

pub fn rejected(codes: &[&str]) -> PutRecordsResponse {
    let records: Vec<Option<RecordResult>> = codes
        .iter()
        .map(|code| {
            Some(if code.is_empty() {
                RecordResult::success()
            } else {
                RecordResult::failure(*code)
            })
        })
        .collect();
    PutRecordsResponse {
        failed_record_count: codes.iter().filter(|c| !c.is_empty()).count(),
        records,
    }
}

pub fn test_backoff() -> Backoff {
    Backoff::new(Duration::from_millis(100), Duration::from_secs(1), false)
}

fn field_mapper() -> RecordMapper {
    RecordMapper::new(
        Arc::new(SizedCodec),
        PartitionKeyProvider::Field(KEY_FIELD.to_string()),
        "test",
    )
}

pub fn create_dispatcher(
    transport: Arc<ScriptedTransport>,
    max_count: usize,
    max_bytes: usize,
) -> Dispatcher {
    Dispatcher::new(
        field_mapper(),
        BatchPacker::new(max_count, max_bytes),
        BatchSubmitter::new(transport, "test-stream"),
        test_backoff(),
    )
}

pub fn create_dispatcher_with_backoff(
    transport: Arc<ScriptedTransport>,
    backoff: Arc<tokio::sync::Mutex<Backoff>>,
) -> Dispatcher {
    Dispatcher::with_shared_backoff(
        field_mapper(),
        BatchPacker::new(500, 5_000_000),
        BatchSubmitter::new(transport, "test-stream"),
        backoff,
    )
}

/// Configuration used by tests that wire the dispatcher from config.
pub fn get_test_config() -> Config {
    Config {
        stream: StreamConfig {
            region: "eu-central-1".to_string(),
            stream_name: format!("test_{}", std::process::id()),
            partition_key: None,
            partition_key_provider: Some("uuid".to_string()),
            batch_size: 50,
            batch_size_bytes: 5 * 1024 * 1024 - 1,
            max_retries: 3,
            timeout_secs: 5,
            source_name: "kinesis-shipper-test".to_string(),
        },
        backoff: BackoffConfig {
            min_ms: 10,
            max_ms: 100,
            factor: 2.0,
            jitter: false,
        },
    }
}
