use super::record::MappedRecord;
use super::transport::{
    FailureClass, PutRecordsResponse, RecordResult, Transport, TransportError,
};
use crate::config::StreamConfig;
use async_trait::async_trait;
use aws_config::timeout::TimeoutConfig;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_kinesis::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_kinesis::operation::put_records::{PutRecordsError, PutRecordsOutput};
use aws_sdk_kinesis::primitives::Blob;
use aws_sdk_kinesis::types::PutRecordsRequestEntry;
use aws_sdk_kinesis::Client;
use tracing::{debug, instrument};

/// [`Transport`] backed by the Kinesis Data Streams `PutRecords` API.
#[derive(Debug, Clone)]
pub struct KinesisTransport {
    client: Client,
}

impl KinesisTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds a client for the configured region, with credentials from the
    /// default provider chain and the configured per-call timeout.
    pub async fn from_config(config: &StreamConfig) -> Self {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .timeout_config(
                TimeoutConfig::builder()
                    .operation_timeout(config.timeout())
                    .build(),
            )
            .load()
            .await;

        Self::new(Client::new(&sdk_config))
    }
}

#[async_trait]
impl Transport for KinesisTransport {
    #[instrument(skip(self, records), fields(records = records.len()))]
    async fn put_records(
        &self,
        stream_name: &str,
        records: &[MappedRecord],
    ) -> Result<PutRecordsResponse, TransportError> {
        let entries = records
            .iter()
            .map(|record| {
                PutRecordsRequestEntry::builder()
                    .data(Blob::new(record.data.to_vec()))
                    .partition_key(record.partition_key.clone())
                    .build()
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| TransportError::permanent(format!("invalid record: {}", e)))?;

        let output = self
            .client
            .put_records()
            .stream_name(stream_name)
            .set_records(Some(entries))
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;

        let response = into_response(&output);
        debug!(
            failed = response.failed_record_count,
            "PutRecords returned {} results",
            response.records.len()
        );
        Ok(response)
    }
}

fn into_response(output: &PutRecordsOutput) -> PutRecordsResponse {
    let records = output
        .records()
        .iter()
        .map(|entry| {
            // Kinesis omits ErrorCode on records it accepted.
            Some(RecordResult {
                error_code: Some(entry.error_code().unwrap_or_default().to_string()),
                error_message: entry.error_message().map(str::to_string),
                sequence_number: entry.sequence_number().map(str::to_string),
                shard_id: entry.shard_id().map(str::to_string),
            })
        })
        .collect();

    PutRecordsResponse {
        failed_record_count: output.failed_record_count().unwrap_or(0).max(0) as usize,
        records,
    }
}

fn classify_sdk_error(err: &SdkError<PutRecordsError>) -> TransportError {
    let message = DisplayErrorContext(err).to_string();

    match err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            TransportError::transient(message)
        }
        SdkError::ConstructionFailure(_) => TransportError::permanent(message),
        SdkError::ServiceError(service) => match service.err().code() {
            Some(code) => TransportError::from_code(code, message),
            None => TransportError::new(FailureClass::Unknown, message),
        },
        _ => TransportError::new(FailureClass::Unknown, message),
    }
}
