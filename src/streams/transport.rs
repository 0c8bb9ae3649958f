use super::record::MappedRecord;
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// How a failed `PutRecords` call should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// The service is busy or throttling; the whole batch can be retried.
    Transient,
    /// The request itself is wrong (validation, auth, missing stream).
    /// Retrying it unchanged will fail again.
    Permanent,
    /// The error code is not in the known list.
    Unknown,
}

impl FailureClass {
    pub fn is_retriable(self) -> bool {
        !matches!(self, FailureClass::Permanent)
    }
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureClass::Transient => "transient",
            FailureClass::Permanent => "permanent",
            FailureClass::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Error codes returned by Kinesis for throttling and service-side faults.
pub const TRANSIENT_ERROR_CODES: &[&str] = &[
    "ProvisionedThroughputExceededException",
    "LimitExceededException",
    "InternalFailure",
    "InternalFailureException",
    "ServiceUnavailable",
    "ServiceUnavailableException",
    "KMSThrottlingException",
    "ThrottlingException",
    "RequestTimeout",
    "RequestTimeoutException",
];

/// Error codes returned by Kinesis for requests that cannot succeed as sent.
pub const PERMANENT_ERROR_CODES: &[&str] = &[
    "ValidationException",
    "InvalidArgumentException",
    "ResourceNotFoundException",
    "ResourceInUseException",
    "AccessDeniedException",
    "UnrecognizedClientException",
    "InvalidSignatureException",
    "ExpiredTokenException",
    "MissingAuthenticationToken",
    "KMSAccessDeniedException",
    "KMSDisabledException",
    "KMSInvalidStateException",
    "KMSNotFoundException",
    "KMSOptInRequired",
];

/// Maps a service error code to its [`FailureClass`].
pub fn classify_error_code(code: &str) -> FailureClass {
    if TRANSIENT_ERROR_CODES.contains(&code) {
        FailureClass::Transient
    } else if PERMANENT_ERROR_CODES.contains(&code) {
        FailureClass::Permanent
    } else {
        FailureClass::Unknown
    }
}

/// A `PutRecords` call that produced no response at all.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("failed to put records ({class}): {message}")]
pub struct TransportError {
    pub class: FailureClass,
    pub code: Option<String>,
    pub message: String,
}

impl TransportError {
    pub fn new(class: FailureClass, message: impl Into<String>) -> Self {
        Self {
            class,
            code: None,
            message: message.into(),
        }
    }

    /// Builds an error from a service error code, classifying it.
    pub fn from_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        let code = code.into();
        Self {
            class: classify_error_code(&code),
            code: Some(code),
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(FailureClass::Transient, message)
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::new(FailureClass::Permanent, message)
    }
}

/// Per-record result, positionally matching the submitted records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordResult {
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub sequence_number: Option<String>,
    pub shard_id: Option<String>,
}

impl RecordResult {
    pub fn success() -> Self {
        Self {
            error_code: Some(String::new()),
            ..Self::default()
        }
    }

    pub fn failure(code: impl Into<String>) -> Self {
        Self {
            error_code: Some(code.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutRecordsResponse {
    pub failed_record_count: usize,
    /// `None` marks a result the service did not return for that position.
    pub records: Vec<Option<RecordResult>>,
}

impl PutRecordsResponse {
    pub fn all_succeeded(count: usize) -> Self {
        Self {
            failed_record_count: 0,
            records: (0..count).map(|_| Some(RecordResult::success())).collect(),
        }
    }
}

/// Submits one batch of records to a stream.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn put_records(
        &self,
        stream_name: &str,
        records: &[MappedRecord],
    ) -> Result<PutRecordsResponse, TransportError>;
}
