//! 🛢️ bulkhead — a batching sink for event documents.
//!
//! Events flow in through bounded queues, accumulate in per-collection
//! buffers, and leave as bulk inserts when one of three triggers fires:
//! a heartbeat control record, a bulk-size boundary, or an idle gap on the
//! queue. Latency is traded for throughput; staleness is bounded; the
//! borrow checker is appeased. Everybody wins. 🦆

pub mod app_config;
mod backends;
mod buffer;
mod consumer;
pub mod event;
pub mod policy;
mod supervisor;
mod telemetry;

use anyhow::{Context, Result};

pub use app_config::{AppConfig, ConsumerConfig, RuntimeConfig, StoreConfig, load_config};
pub use backends::{CollectionRef, CouchStoreConfig, FileStoreConfig};
pub use consumer::ConsumerSummary;
pub use event::EventRecord;
pub use supervisor::{SinkSet, Supervisor};
pub use telemetry::TelemetryConfig;

/// 🚀 Validate the config and stand up the consumer fleet.
///
/// Returns a [`SinkSet`]: queue senders to feed, join handles to await.
/// The producer side is yours; send a final [`EventRecord::heartbeat`] per
/// queue before dropping your senders if you want the last partial batches
/// written rather than logged and lost.
pub async fn spawn(app_config: AppConfig) -> Result<SinkSet> {
    Supervisor::new(app_config)
        .spawn()
        .await
        .context("Failed to start consumers")
}
