//! Packing of events into `PutRecords`-sized batches.
//!
//! [`BatchPacker::pack`] maps every event and groups the results in a single
//! order-preserving pass. A batch is closed as soon as adding the next record
//! would bring its payload to `max_bytes` or more, or once it holds
//! `max_count` records. Events that fail to map still travel with the batch
//! (so the caller sees every event exactly once) but contribute no record.

use super::record::{MappedRecord, RecordMapper};
use crate::event::Event;
use std::mem;
use tracing::{debug, error};

/// A group of records submitted in one transport call, together with every
/// event that was packed into it.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    records: Vec<MappedRecord>,
    events: Vec<Event>,
    /// Index into `events` of the event behind each record.
    ok: Vec<usize>,
    dropped: usize,
    bytes: usize,
}

impl Batch {
    pub fn records(&self) -> &[MappedRecord] {
        &self.records
    }

    /// All events packed into this batch, including ones that failed to map.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Total payload size of the records.
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Splits the batch into its records and, for every packed event, whether
    /// it produced a record. The flags keep the original event order.
    pub fn into_parts(self) -> (Vec<MappedRecord>, Vec<(Event, bool)>) {
        let mut mapped = vec![false; self.events.len()];
        for &i in &self.ok {
            mapped[i] = true;
        }
        let events = self.events.into_iter().zip(mapped).collect();
        (self.records, events)
    }
}

/// Accumulates one batch. Replaced by a fresh builder at every boundary.
#[derive(Debug, Default)]
struct BatchBuilder {
    batch: Batch,
}

impl BatchBuilder {
    fn new() -> Self {
        Self::default()
    }

    fn fits(&self, size: usize, max_bytes: usize) -> bool {
        self.batch.bytes + size < max_bytes
    }

    fn push_record(&mut self, event: Event, record: MappedRecord) {
        self.batch.ok.push(self.batch.events.len());
        self.batch.bytes += record.size();
        self.batch.records.push(record);
        self.batch.events.push(event);
    }

    fn push_dropped(&mut self, event: Event) {
        self.batch.dropped += 1;
        self.batch.events.push(event);
    }

    fn record_count(&self) -> usize {
        self.batch.records.len()
    }

    fn has_events(&self) -> bool {
        !self.batch.events.is_empty()
    }

    fn has_records(&self) -> bool {
        !self.batch.records.is_empty()
    }

    fn build(self) -> Batch {
        self.batch
    }
}

/// The result of packing a sequence of events.
#[derive(Debug, Default)]
pub struct Packed {
    pub batches: Vec<Batch>,
    /// Events whose record alone reaches the byte limit. These can never be
    /// sent and are not part of any batch.
    pub oversized: Vec<Event>,
}

impl Packed {
    pub fn dropped(&self) -> usize {
        self.batches.iter().map(Batch::dropped).sum()
    }
}

/// Groups mapped records into batches bounded by count and byte size.
#[derive(Debug, Clone, Copy)]
pub struct BatchPacker {
    max_count: usize,
    max_bytes: usize,
}

impl BatchPacker {
    /// Both limits are clamped to at least 1.
    pub fn new(max_count: usize, max_bytes: usize) -> Self {
        Self {
            max_count: max_count.max(1),
            max_bytes: max_bytes.max(1),
        }
    }

    pub fn pack<I>(&self, mapper: &RecordMapper, events: I) -> Packed
    where
        I: IntoIterator<Item = Event>,
    {
        let mut packed = Packed::default();
        let mut current = BatchBuilder::new();

        for event in events {
            let record = match mapper.map_event(&event) {
                Ok(record) => record,
                Err(e) => {
                    debug!("Failed to map event: {}", e);
                    current.push_dropped(event);
                    continue;
                }
            };

            let size = record.size();
            if size >= self.max_bytes {
                error!(
                    size,
                    max_bytes = self.max_bytes,
                    "Dropping record that can never fit in a batch; raise batch_size_bytes or shrink the event"
                );
                packed.oversized.push(event);
                continue;
            }

            if current.has_records() && !current.fits(size, self.max_bytes) {
                packed
                    .batches
                    .push(mem::replace(&mut current, BatchBuilder::new()).build());
            }

            current.push_record(event, record);

            if current.record_count() >= self.max_count {
                packed
                    .batches
                    .push(mem::replace(&mut current, BatchBuilder::new()).build());
            }
        }

        if current.has_events() {
            packed.batches.push(current.build());
        }

        packed
    }
}
