//! Ships a sequence of events to a stream, batch by batch.
//!
//! The [`Dispatcher`] packs events with a [`BatchPacker`], submits the
//! batches strictly in order and collects everything that has to be retried.
//! Between a failing batch and the next one it sleeps for the delay handed
//! out by its [`Backoff`]; a fully delivered batch resets the backoff.
//!
//! ```rust,no_run
//! use kinesis_shipper::{Config, Dispatcher, Event};
//! use serde_json::json;
//!
//! # async fn example() -> kinesis_shipper::Result<()> {
//! let config = Config::from_file("config.toml")?;
//! let dispatcher = Dispatcher::from_config(&config).await?;
//!
//! let events = vec![Event::new(json!({"user": "alice", "action": "login"}))];
//! let dispatched = dispatcher.dispatch(events).await;
//! if !dispatched.is_complete() {
//!     println!("{} events to retry", dispatched.retriable.len());
//! }
//! # Ok(())
//! # }
//! ```

use crate::backoff::Backoff;
use crate::config::Config;
use crate::event::Event;
use crate::observer::{NoopObserver, Observer};
use crate::streams::{
    BatchPacker, BatchSubmitter, JsonCodec, KinesisTransport, PartitionKeyProvider, RecordMapper,
    Transport, TransportError,
};
use crate::{Error, Result};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// The aggregate result of one [`Dispatcher::dispatch`] call.
#[derive(Debug, Default)]
pub struct Dispatched {
    /// Events the caller should submit again, in batch order.
    pub retriable: Vec<Event>,
    /// Number of events the stream accepted.
    pub delivered: usize,
    /// Events lost for good: mapping failures, unconfirmed results and
    /// permanent transport failures.
    pub dropped: usize,
    /// Events whose record alone exceeds the batch byte limit.
    pub oversized: Vec<Event>,
    /// Set when at least one batch failed at the transport level.
    pub error: Option<Error>,
}

impl Dispatched {
    /// True when nothing needs to be retried; the caller can acknowledge the
    /// whole input.
    pub fn is_complete(&self) -> bool {
        self.retriable.is_empty()
    }
}

pub struct Dispatcher {
    mapper: RecordMapper,
    packer: BatchPacker,
    submitter: BatchSubmitter,
    backoff: Arc<Mutex<Backoff>>,
    observer: Arc<dyn Observer>,
}

impl Dispatcher {
    pub fn new(
        mapper: RecordMapper,
        packer: BatchPacker,
        submitter: BatchSubmitter,
        backoff: Backoff,
    ) -> Self {
        Self::with_shared_backoff(mapper, packer, submitter, Arc::new(Mutex::new(backoff)))
    }

    /// Builds a dispatcher whose backoff is shared with others, so failures
    /// seen by any of them slow all of them down.
    pub fn with_shared_backoff(
        mapper: RecordMapper,
        packer: BatchPacker,
        submitter: BatchSubmitter,
        backoff: Arc<Mutex<Backoff>>,
    ) -> Self {
        Self {
            mapper,
            packer,
            submitter,
            backoff,
            observer: Arc::new(NoopObserver),
        }
    }

    /// Wires a dispatcher from configuration with the JSON codec and the
    /// given transport.
    pub fn from_config_with_transport(config: &Config, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;

        let mapper = RecordMapper::new(
            Arc::new(JsonCodec::new()),
            PartitionKeyProvider::from_config(&config.stream)?,
            config.stream.source_name.clone(),
        );
        let packer = BatchPacker::new(config.stream.batch_size, config.stream.batch_size_bytes);
        let submitter = BatchSubmitter::new(transport, config.stream.stream_name.clone());

        Ok(Self::new(
            mapper,
            packer,
            submitter,
            Backoff::from_config(&config.backoff),
        ))
    }

    /// Wires a dispatcher that ships to Kinesis.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let transport = KinesisTransport::from_config(&config.stream).await;
        Self::from_config_with_transport(config, Arc::new(transport))
    }

    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = observer;
        self
    }

    pub fn backoff(&self) -> Arc<Mutex<Backoff>> {
        Arc::clone(&self.backoff)
    }

    /// Ships `events` and returns what has to be retried.
    ///
    /// Batches are sent one after another. A failing batch never stops the
    /// ones after it. Dropping the returned future cancels any pending
    /// backoff sleep.
    #[instrument(skip_all, fields(stream = %self.submitter.stream_name(), events = events.len()))]
    pub async fn dispatch(&self, events: Vec<Event>) -> Dispatched {
        debug!("Received {} events", events.len());

        let packed = self.packer.pack(&self.mapper, events);
        debug!(
            batches = packed.batches.len(),
            dropped = packed.dropped(),
            oversized = packed.oversized.len(),
            "Packed events"
        );
        let mut dispatched = Dispatched::default();
        let mut first_error: Option<TransportError> = None;
        let mut failed_batches = 0;

        if !packed.oversized.is_empty() {
            self.observer.dropped(packed.oversized.len());
        }
        dispatched.oversized = packed.oversized;

        let batch_count = packed.batches.len();
        for (index, batch) in packed.batches.into_iter().enumerate() {
            self.observer.new_batch(batch.events().len());

            // Nothing is sent, so the backoff neither resets nor advances.
            if batch.is_empty() {
                debug!(batch = index, dropped = batch.dropped(), "Skipping batch without records");
                self.observer.dropped(batch.dropped());
                dispatched.dropped += batch.dropped();
                continue;
            }

            let outcome = self.submitter.submit(batch).await;

            if outcome.discarded > 0 {
                self.observer.dropped(outcome.discarded);
            }
            self.observer.acked(outcome.delivered.len());
            if !outcome.retriable.is_empty() {
                self.observer.failed(outcome.retriable.len());
            }
            let lost = outcome.unconfirmed + outcome.permanently_failed;
            if lost > 0 {
                self.observer.permanently_failed(lost);
            }

            dispatched.delivered += outcome.delivered.len();
            dispatched.dropped += outcome.discarded + lost;

            let success = outcome.is_success();
            dispatched.retriable.extend(outcome.retriable);

            if let Some(e) = outcome.transport_error {
                failed_batches += 1;
                first_error.get_or_insert(e);
            }

            if success {
                self.backoff.lock().await.reset();
                continue;
            }

            let delay = self.backoff.lock().await.next();
            if index + 1 < batch_count {
                warn!(
                    batch = index,
                    delay_ms = delay.as_millis() as u64,
                    "Batch not fully delivered, backing off"
                );
            } else {
                debug!(
                    delay_ms = delay.as_millis() as u64,
                    "Last batch not fully delivered, backing off"
                );
            }
            tokio::time::sleep(delay).await;
        }

        if let Some(source) = first_error {
            dispatched.error = Some(Error::Dispatch {
                failed_batches,
                source,
            });
        }

        info!(
            delivered = dispatched.delivered,
            retriable = dispatched.retriable.len(),
            dropped = dispatched.dropped,
            oversized = dispatched.oversized.len(),
            "Dispatch finished"
        );

        dispatched
    }
}
