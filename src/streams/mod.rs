pub mod batch;
pub mod codec;
pub mod kinesis;
pub mod partition_key;
pub mod record;
pub mod submit;
pub mod transport;


pub use batch::{Batch, BatchPacker, Packed};
pub use codec::{Codec, JsonCodec};
pub use kinesis::KinesisTransport;
pub use partition_key::PartitionKeyProvider;
pub use record::{MapError, MappedRecord, RecordMapper};
pub use submit::{BatchSubmitter, SubmissionOutcome};
pub use transport::{
    classify_error_code, FailureClass, PutRecordsResponse, RecordResult, Transport,
    TransportError,
};
