//! 🔧 App Configuration — the sacred TOML-to-struct pipeline.
//!
//! 📡 "Config not found: We looked everywhere. Under the couch. Behind the
//! fridge. In the junk drawer. Nothing." — every developer at 3am 🦆
//!
//! 🏗️ Powered by Figment, because manually parsing env vars is a form of
//! self-harm that even the borrow checker wouldn't approve of.

use std::path::Path;

use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use tracing::info;

use crate::backends::{CouchStoreConfig, FileStoreConfig};
use crate::event::DEFAULT_HEARTBEAT_PATTERN;
use crate::telemetry::TelemetryConfig;

/// 📦 The AppConfig: one struct to rule them all, one struct to find them,
/// one struct to bring them all, and in the Figment bind them.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// ⚖️ How shall the consumers batch? Configurable, unlike my children.
    #[serde(default)]
    pub consumer: ConsumerConfig,
    /// 🔌 Which store the batches land in. Required — defaulting a data
    /// destination is how other people's data ends up in your couch.
    pub store_config: StoreConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

/// ⚖️ The knobs the flush engine actually reads. All defaulted, all
/// overridable, all validated (positively positive) at spawn time.
#[derive(Debug, Deserialize, Clone)]
pub struct ConsumerConfig {
    /// 🔢 Count-trigger period: flush after every `bulk_size`-th data record.
    #[serde(default = "default_bulk_size")]
    pub bulk_size: u64,
    /// ⏳ Idle-gap threshold in milliseconds: flush when one pull blocked
    /// longer than this. NOT a periodic timer — see the policy docs.
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: u64,
    /// 📊 Telemetry period: one throughput reading per `log_size` data records.
    #[serde(default = "default_log_size")]
    pub log_size: u64,
    /// 🫀 Regex that marks a record as a heartbeat. Keep it anchored, or
    /// enjoy flushing on every collection that contains the word.
    #[serde(default = "default_heartbeat_pattern")]
    pub heartbeat_pattern: String,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            bulk_size: default_bulk_size(),
            max_wait_ms: default_max_wait_ms(),
            log_size: default_log_size(),
            heartbeat_pattern: default_heartbeat_pattern(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

fn default_bulk_size() -> u64 {
    1000
}

fn default_max_wait_ms() -> u64 {
    5000
}

fn default_log_size() -> u64 {
    10_000
}

fn default_heartbeat_pattern() -> String {
    DEFAULT_HEARTBEAT_PATTERN.to_string()
}

/// 🎭 The many faces of a store config — one variant per backend.
/// Serde's external tagging gives the TOML a pleasant shape:
/// `[store_config.Couch]`, `[store_config.File]`, or the minimalist
/// `store_config = "InMemory"` for tests and dry runs.
#[derive(Debug, Deserialize, Clone)]
pub enum StoreConfig {
    InMemory,
    File(FileStoreConfig),
    Couch(CouchStoreConfig),
}

/// 🧵 Runtime shape: how many parallel consumers, and how much slack the
/// queues have before producers start blocking. The queue bound IS the
/// backpressure story — there is no other throttle anywhere.
#[derive(Debug, Deserialize, Clone)]
pub struct RuntimeConfig {
    #[serde(default = "default_consumer_parallelism", alias = "num_consumers")]
    pub consumer_parallelism: usize,
    #[serde(default = "default_queue_capacity", alias = "channel_size")]
    pub queue_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            consumer_parallelism: default_consumer_parallelism(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_consumer_parallelism() -> usize {
    1
}

fn default_queue_capacity() -> usize {
    1024
}

/// 🚀 Load the config — from a file, from env vars, or from the sheer power of hoping.
///
/// 🔧 Merges environment variables (BKH_*) with an optional TOML file.
///
/// 📐 DESIGN NOTE (no cap, this is tribal knowledge):
///   - If `config_file_name` is None  → env vars only. No file. No assumptions.
///   - If `config_file_name` is Some  → env vars + TOML file, merged. TOML wins on conflicts.
///
/// 💀 Returns an error if config is unparseable. Which it will be. Check the
/// error message though — it's contextual, informative, and written with
/// love. Or despair. Hard to tell at 3am.
pub fn load_config(config_file_name: Option<&Path>) -> anyhow::Result<AppConfig> {
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file_name.unwrap_or(Path::new(""))
    );

    // 🏗️ Env vars as the base layer — like a good sourdough starter.
    // ALL BKH_* vars accepted. No ID required. No velvet rope. Everyone's invited.
    let config = Figment::new().merge(Env::prefixed("BKH_"));

    // 🎯 Conditionally layer in TOML only if a file was actually provided.
    let config = match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    };

    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}' and environment variables (BKH_*). \
             The file exists in our hearts, but apparently not on disk.",
            path.display()
        ),
        None => "💀 Failed to parse configuration from environment variables (BKH_*). \
                 No file was provided — this one's all on the environment. Classic."
            .to_string(),
    };

    config.extract().context(context_msg)
}
