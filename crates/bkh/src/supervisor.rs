//! 🎬 *[camera pans across a dimly lit server room]*
//! 🎬 "In a world where consumers toil endlessly..."
//! 🎬 "One supervisor dared to spawn them all." *[record scratch]* 🦆
//!
//! 📦 The Supervisor validates the config once, then stands up N fully
//! independent consumers: each gets its own bounded queue, its own store
//! connection, and its own telemetry file. They share nothing mutable —
//! not a buffer, not a counter, not a lock — which is why this module
//! contains exactly zero synchronization primitives and sleeps well at night.

use std::time::Duration;

use anyhow::{Context, Result, ensure};
use async_channel::Sender;
use futures::future::join_all;
use regex::Regex;
use tokio::task::JoinHandle;
use tracing::info;

use crate::app_config::AppConfig;
use crate::backends::StoreBackend;
use crate::consumer::{BatchingConsumer, ConsumerSummary, Worker};
use crate::event::EventRecord;
use crate::policy::FlushPolicy;
use crate::telemetry::ThroughputLog;

/// 🧵 The running fleet: one queue sender per consumer, one join handle per
/// consumer. Hand the senders to whatever produces events; call [`join`]
/// when the stream is done.
///
/// [`join`]: SinkSet::join
pub struct SinkSet {
    senders: Vec<Sender<EventRecord>>,
    handles: Vec<JoinHandle<Result<ConsumerSummary>>>,
}

impl SinkSet {
    /// 📬 The per-worker queue senders, in worker-id order. Clone them
    /// freely — but remember that a queue only closes once EVERY clone
    /// (including the one held in here) is gone, which is what `join` is for.
    pub fn queues(&self) -> &[Sender<EventRecord>] {
        &self.senders
    }

    pub fn worker_count(&self) -> usize {
        self.senders.len()
    }

    /// 🏁 Drop our senders (closing every queue whose external clones are
    /// already gone) and wait for all consumers to finish their teardown.
    /// Summaries come back in worker-id order.
    pub async fn join(self) -> Result<Vec<ConsumerSummary>> {
        let SinkSet { senders, handles } = self;
        drop(senders);
        let mut summaries = Vec::with_capacity(handles.len());
        for joined in join_all(handles).await {
            let summary = joined.context("a consumer task panicked or was aborted")??;
            summaries.push(summary);
        }
        Ok(summaries)
    }
}

/// 📦 The Supervisor: because even async tasks need someone to hand them a
/// queue, a store, and a firm set of expectations before they clock in.
pub struct Supervisor {
    app_config: AppConfig,
}

impl Supervisor {
    pub fn new(app_config: AppConfig) -> Self {
        Self { app_config }
    }

    /// 🧵 Unleash the workers! Like releasing the Kraken, but with more
    /// structured concurrency and fewer tentacles.
    ///
    /// Validates every knob first — a zero `bulk_size` is a division by
    /// zero wearing a trench coat, and a bad heartbeat regex would
    /// otherwise surface on record one instead of at startup.
    pub async fn spawn(&self) -> Result<SinkSet> {
        let consumer_config = &self.app_config.consumer;
        let runtime = &self.app_config.runtime;
        ensure!(
            consumer_config.bulk_size > 0,
            "💀 consumer.bulk_size must be positive — a flush every zero records is not a cadence, it is a cry for help"
        );
        ensure!(
            consumer_config.max_wait_ms > 0,
            "💀 consumer.max_wait_ms must be positive — an idle gap of zero would flush on every single record"
        );
        ensure!(
            consumer_config.log_size > 0,
            "💀 consumer.log_size must be positive — telemetry every zero records is just an infinite loop with extra steps"
        );
        ensure!(
            runtime.consumer_parallelism > 0,
            "💀 runtime.consumer_parallelism must be positive — zero consumers consume zero events, which is technically a bug-free system"
        );
        ensure!(
            runtime.queue_capacity > 0,
            "💀 runtime.queue_capacity must be positive — a zero-slot queue blocks everyone forever, like a meeting with no agenda"
        );
        let heartbeat = Regex::new(&consumer_config.heartbeat_pattern).context(format!(
            "💀 consumer.heartbeat_pattern '{}' is not a valid regex. The control records would go unrecognized and the buffers would grow old waiting.",
            consumer_config.heartbeat_pattern
        ))?;

        let mut senders = Vec::with_capacity(runtime.consumer_parallelism);
        let mut handles = Vec::with_capacity(runtime.consumer_parallelism);
        for worker_id in 0..runtime.consumer_parallelism {
            let (tx, rx) = async_channel::bounded(runtime.queue_capacity);
            // each worker gets its OWN store connection — shared nothing, locked nothing
            let store = StoreBackend::from_config(&self.app_config.store_config)
                .await
                .with_context(|| {
                    format!("worker {worker_id}: failed to stand up the store backend")
                })?;
            let telemetry =
                ThroughputLog::new(&consumer_config.telemetry, consumer_config.log_size, worker_id)
                    .await
                    .with_context(|| {
                        format!("worker {worker_id}: failed to open the telemetry destination")
                    })?;
            let policy = FlushPolicy::new(
                consumer_config.bulk_size,
                Duration::from_millis(consumer_config.max_wait_ms),
            );
            let worker = BatchingConsumer::new(
                worker_id,
                rx,
                store,
                heartbeat.clone(),
                policy,
                telemetry,
            );
            handles.push(worker.start());
            senders.push(tx);
        }
        info!(
            workers = handles.len(),
            bulk_size = consumer_config.bulk_size,
            max_wait_ms = consumer_config.max_wait_ms,
            "🚀 consumers spawned and draining"
        );
        Ok(SinkSet { senders, handles })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_config::{ConsumerConfig, RuntimeConfig, StoreConfig};

    fn in_memory_config() -> AppConfig {
        AppConfig {
            consumer: ConsumerConfig::default(),
            store_config: StoreConfig::InMemory,
            runtime: RuntimeConfig::default(),
        }
    }

    #[tokio::test]
    async fn the_one_where_zero_bulk_size_is_shown_the_door() {
        let mut config = in_memory_config();
        config.consumer.bulk_size = 0;
        let result = Supervisor::new(config).spawn().await;
        assert!(result.is_err(), "bulk_size = 0 must be rejected at spawn time");
    }

    #[tokio::test]
    async fn the_one_where_a_broken_heartbeat_pattern_fails_fast() {
        let mut config = in_memory_config();
        config.consumer.heartbeat_pattern = "([unclosed".to_string();
        let result = Supervisor::new(config).spawn().await;
        assert!(result.is_err(), "an invalid regex must be rejected at spawn time");
    }

    #[tokio::test]
    async fn the_one_where_two_workers_drain_their_own_queues() {
        let mut config = in_memory_config();
        config.runtime.consumer_parallelism = 2;
        let sink_set = Supervisor::new(config)
            .spawn()
            .await
            .expect("💀 A valid config should spawn.");
        assert_eq!(sink_set.worker_count(), 2);

        let queues = sink_set.queues().to_vec();
        for n in 0..3 {
            queues[0]
                .send(EventRecord::data("alpha", format!("a{n}")))
                .await
                .expect("💀 worker 0's queue should accept");
        }
        queues[1]
            .send(EventRecord::data("beta", "b0"))
            .await
            .expect("💀 worker 1's queue should accept");
        for queue in &queues {
            queue
                .send(EventRecord::heartbeat())
                .await
                .expect("💀 the terminating heartbeat should send");
        }
        drop(queues);

        let summaries = sink_set.join().await.expect("💀 both workers should exit cleanly");
        assert_eq!(summaries.len(), 2);
        // summaries come back in worker-id order
        assert_eq!(summaries[0].worker_id, 0);
        assert_eq!(summaries[0].records, 3);
        assert_eq!(summaries[1].records, 1);
        // each worker's terminating heartbeat flushed its lone collection
        assert_eq!(summaries[0].bulk_inserts, 1);
        assert_eq!(summaries[1].bulk_inserts, 1);
    }
}
