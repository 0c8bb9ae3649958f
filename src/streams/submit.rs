use super::batch::Batch;
use super::transport::{PutRecordsResponse, Transport, TransportError};
use crate::event::Event;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

const THROUGHPUT_EXCEEDED: &str = "ProvisionedThroughputExceededException";

/// What happened to the events of one submitted batch.
///
/// Every event of the batch is either in `delivered`, in `retriable`, or
/// counted in one of `discarded`, `unconfirmed` or `permanently_failed`.
#[derive(Debug, Default)]
pub struct SubmissionOutcome {
    pub delivered: Vec<Event>,
    pub retriable: Vec<Event>,
    /// Events that failed to map and were never sent.
    pub discarded: usize,
    /// Events whose result was missing or carried no error code.
    pub unconfirmed: usize,
    /// Events lost to a permanent transport failure.
    pub permanently_failed: usize,
    pub transport_error: Option<TransportError>,
}

impl SubmissionOutcome {
    /// True when nothing has to be retried and the transport answered.
    pub fn is_success(&self) -> bool {
        self.retriable.is_empty() && self.transport_error.is_none()
    }
}

/// Sends batches to a stream and sorts their events by outcome.
#[derive(Clone)]
pub struct BatchSubmitter {
    transport: Arc<dyn Transport>,
    stream_name: String,
}

impl BatchSubmitter {
    pub fn new(transport: Arc<dyn Transport>, stream_name: impl Into<String>) -> Self {
        Self {
            transport,
            stream_name: stream_name.into(),
        }
    }

    pub fn stream_name(&self) -> &str {
        &self.stream_name
    }

    #[instrument(skip_all, fields(stream = %self.stream_name, records = batch.len(), bytes = batch.bytes(), dropped = batch.dropped()))]
    pub async fn submit(&self, batch: Batch) -> SubmissionOutcome {
        let mut outcome = SubmissionOutcome {
            discarded: batch.dropped(),
            ..SubmissionOutcome::default()
        };

        if batch.is_empty() {
            debug!("Skipping batch without records");
            return outcome;
        }

        let (records, events) = batch.into_parts();

        let response = match self.transport.put_records(&self.stream_name, &records).await {
            Ok(response) => response,
            Err(e) if e.class.is_retriable() => {
                info!(class = %e.class, "Retrying {} events on error: {}", events.len(), e);
                // Events that failed to map go back to the caller too.
                outcome.discarded = 0;
                outcome.retriable = events.into_iter().map(|(event, _)| event).collect();
                outcome.transport_error = Some(e);
                return outcome;
            }
            Err(e) => {
                error!("Permanently failed to send {} records: {}", records.len(), e);
                outcome.permanently_failed = records.len();
                outcome.transport_error = Some(e);
                return outcome;
            }
        };

        let ok_events = events
            .into_iter()
            .filter_map(|(event, mapped)| mapped.then_some(event));
        collect_results(response, ok_events, &mut outcome);

        if !outcome.retriable.is_empty() {
            warn!("Retrying {} events", outcome.retriable.len());
        }

        outcome
    }
}

/// Matches per-record results to the events that produced the records.
fn collect_results(
    response: PutRecordsResponse,
    ok_events: impl Iterator<Item = Event>,
    outcome: &mut SubmissionOutcome,
) {
    if response.failed_record_count == 0 {
        outcome.delivered.extend(ok_events);
        return;
    }

    let mut results = response.records.into_iter();
    for event in ok_events {
        let result = match results.next().flatten() {
            Some(result) => result,
            None => {
                warn!(?event, "No record returned for event");
                outcome.unconfirmed += 1;
                continue;
            }
        };

        match result.error_code.as_deref() {
            None => {
                warn!(?event, "Record returned without an error code");
                outcome.unconfirmed += 1;
            }
            Some("") => outcome.delivered.push(event),
            Some(code) => {
                if code == THROUGHPUT_EXCEEDED {
                    debug!("Record throttled by shard throughput limit");
                } else {
                    debug!(
                        code,
                        message = result.error_message.as_deref().unwrap_or(""),
                        "Record rejected"
                    );
                }
                outcome.retriable.push(event);
            }
        }
    }

    let extra = results.count();
    if extra > 0 {
        warn!("{} more record results returned than records sent", extra);
    }
}
