//! 🎬 *[a queue fills with events. somewhere, a consumer waits.]*
//! *[the clock on the wall reads 2:47am.]*
//! *[nobody asked for this much telemetry. and yet, here we are.]*
//!
//! 🛢️ The BatchingConsumer module — patient, tireless, and deeply unbothered
//! by the chaos happening upstream. It pulls records. It buffers records.
//! It flushes when the policy says flush. It is, in many ways, the most
//! emotionally stable part of this entire codebase.
//!
//! 🦆 (the duck has no comment at this time)
//!
//! One loop, one owner, zero locks: the consumer holds the buffer map
//! exclusively, so three flush triggers can fight over the same mutable
//! state without a Mutex ever entering the conversation.

use std::collections::HashMap;
use std::time::Instant;

use anyhow::{Context, Result};
use async_channel::Receiver;
use regex::Regex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::backends::{Store, StoreBackend};
use crate::buffer::CollectionBuffer;
use crate::event::EventRecord;
use crate::policy::{FlushPolicy, FlushTrigger};
use crate::telemetry::ThroughputLog;

/// 🏗️ A background worker, that does work. duh.
///
/// The trait all workers must implement, like a social contract but
/// enforced by the compiler instead of polite society.
pub(crate) trait Worker {
    /// What the worker hands back when its queue finally closes.
    type Summary;

    /// 🚀 Start the worker. Returns a JoinHandle because we trust
    /// but verify. Mostly verify. Okay, we don't trust at all.
    fn start(self) -> JoinHandle<Result<Self::Summary>>;
}

/// 🧾 What a consumer has to show for itself once its queue closes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerSummary {
    pub worker_id: usize,
    /// Data records consumed. Heartbeats are signals, not records; they
    /// are not in this number and never were.
    pub records: u64,
    /// Drain passes performed (a pass over all-empty buffers still counts —
    /// the policy fired, the buffers just had nothing to say).
    pub flushes: u64,
    /// Actual bulk-insert calls issued to the store.
    pub bulk_inserts: u64,
}

/// 🛢️ The BatchingConsumer: one queue in, one store out, buffers in between.
///
/// Two states, forever: WAITING (blocked on the queue) and PROCESSING
/// (route, decide, maybe drain). Per iteration it:
///
/// 1. arms the pull deadline (`now + max_wait`) — before the pull, always,
///    because the deadline measures *this* pull and nothing else
/// 2. blocks on the queue
/// 3. routes the record — heartbeats bypass the buffers and the counter
///    entirely; data records increment the counter and join their
///    collection's buffer (creating its store handle on first sighting)
/// 4. asks the policy for a verdict and, on a flush, drains every
///    non-empty buffer through the store — one bulk insert per collection,
///    empty buffers skipped, no no-op writes
/// 5. for data records, feeds the telemetry log
///
/// A store failure is fatal to the worker: the error (naming the
/// collection that failed) propagates out of the loop, no retry, no
/// partial-buffer recovery. A telemetry failure is a warning. The
/// difference is the whole error-handling design, in one sentence.
#[derive(Debug)]
pub(crate) struct BatchingConsumer {
    worker_id: usize,
    rx: Receiver<EventRecord>,
    store: StoreBackend,
    heartbeat: Regex,
    policy: FlushPolicy,
    telemetry: ThroughputLog,
    /// 🗺️ The buffer set: one entry per collection ever sighted, never
    /// evicted. Bounded in practice because collection names come from a
    /// small, slowly-changing set — do not point a firehose of
    /// attacker-chosen names at this map.
    buffers: HashMap<String, CollectionBuffer>,
    record_count: u64,
    flushes: u64,
    bulk_inserts: u64,
}

impl BatchingConsumer {
    pub(crate) fn new(
        worker_id: usize,
        rx: Receiver<EventRecord>,
        store: StoreBackend,
        heartbeat: Regex,
        policy: FlushPolicy,
        telemetry: ThroughputLog,
    ) -> Self {
        Self {
            worker_id,
            rx,
            store,
            heartbeat,
            policy,
            telemetry,
            buffers: HashMap::new(),
            record_count: 0,
            flushes: 0,
            bulk_inserts: 0,
        }
    }

    async fn run(mut self) -> Result<ConsumerSummary> {
        debug!(worker = self.worker_id, "📥 consumer started draining queue...");
        loop {
            // deadline first, then block — the order IS the semantics
            let deadline = self.policy.arm(Instant::now());
            let record = match self.rx.recv().await {
                Ok(record) => record,
                Err(_) => {
                    // Channel is empty and closed
                    debug!(worker = self.worker_id, "🏁 queue closed — shutting down");
                    break;
                }
            };

            let heartbeat = self.heartbeat.is_match(&record.collection_id);
            if heartbeat {
                debug!(worker = self.worker_id, "🫀 heartbeat — flush requested");
            } else {
                self.record_count += 1;
                self.buffer(record).await?;
            }

            if let Some(trigger) =
                self.policy
                    .decide(heartbeat, self.record_count, deadline, Instant::now())
            {
                self.flush_all(trigger).await?;
            }

            if !heartbeat {
                self.telemetry.observe(self.record_count).await;
            }
        }
        self.teardown().await
    }

    /// 🗺️ Route one data record into its collection's buffer, creating the
    /// store handle on first sighting. Creation is idempotent by key and
    /// memoized here — the store is asked exactly once per collection per
    /// worker lifetime.
    async fn buffer(&mut self, record: EventRecord) -> Result<()> {
        if !self.buffers.contains_key(&record.collection_id) {
            let handle = self
                .store
                .collection(&record.collection_id)
                .await
                .with_context(|| {
                    format!(
                        "worker {} could not resolve collection '{}'",
                        self.worker_id, record.collection_id
                    )
                })?;
            self.buffers
                .insert(record.collection_id.clone(), CollectionBuffer::new(handle));
        }
        if let Some(buffer) = self.buffers.get_mut(&record.collection_id) {
            buffer.push(record.document);
        }
        Ok(())
    }

    /// 🚚 Drain every non-empty buffer: one bulk insert per collection,
    /// then reset it to empty. Empty buffers are skipped — no no-op writes,
    /// which also makes a second trigger in the same iteration a harmless
    /// nothing (the buffers are already empty by the time it would run).
    async fn flush_all(&mut self, trigger: FlushTrigger) -> Result<()> {
        self.flushes += 1;
        debug!(worker = self.worker_id, ?trigger, "🚚 draining non-empty buffers");
        for buffer in self.buffers.values_mut() {
            if buffer.is_empty() {
                continue;
            }
            let documents = buffer.drain();
            let batch_len = documents.len();
            let handle = buffer.handle();
            self.store
                .insert_many(handle, documents)
                .await
                .with_context(|| {
                    format!(
                        "bulk insert of {} documents into collection '{}' failed — the worker stops here",
                        batch_len,
                        handle.name()
                    )
                })?;
            self.bulk_inserts += 1;
        }
        Ok(())
    }

    /// 🏁 Orderly teardown: surface anything still buffered (it will NOT be
    /// written — a graceful producer sends a final heartbeat before closing
    /// the queue), close the telemetry file, close the store.
    async fn teardown(mut self) -> Result<ConsumerSummary> {
        for (name, buffer) in self.buffers.iter() {
            if !buffer.is_empty() {
                warn!(
                    worker = self.worker_id,
                    collection = %name,
                    documents = buffer.len(),
                    "queue closed with documents still buffered — they will not be written"
                );
            }
        }
        self.telemetry.close().await;
        self.store
            .close()
            .await
            .context("failed to close the store connection during teardown")?;
        debug!(
            worker = self.worker_id,
            records = self.record_count,
            flushes = self.flushes,
            bulk_inserts = self.bulk_inserts,
            "🧾 consumer done"
        );
        Ok(ConsumerSummary {
            worker_id: self.worker_id,
            records: self.record_count,
            flushes: self.flushes,
            bulk_inserts: self.bulk_inserts,
        })
    }
}

impl Worker for BatchingConsumer {
    type Summary = ConsumerSummary;

    fn start(self) -> JoinHandle<Result<ConsumerSummary>> {
        tokio::spawn(self.run())
    }
}
