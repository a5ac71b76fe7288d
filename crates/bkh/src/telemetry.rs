//! 📊 Throughput telemetry — "how fast are we going?" deserves a better
//! answer than "uh... fast?"
//!
//! Every `log_size`-th data record the consumer asks this module to take a
//! reading: records per second since the last reading, computed the boring
//! way (`log_size * 1000 / elapsed_ms`). The reading always goes to the
//! structured log; when file telemetry is enabled it also lands as a
//! `count,rate` line in a per-worker CSV, flushed immediately, because a
//! benchmark line that is still sitting in a buffer when the process dies
//! tells you nothing at 3am.
//!
//! ⚠️ Telemetry failures never take down the data path. A lost CSV line is
//! a `warn!`; a lost batch is an incident. We know which one we are.

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::fs::{File, OpenOptions};
use tokio::io::{self, AsyncWriteExt};
use tracing::{info, warn};

/// 🔧 Telemetry knobs. Off by default — most deployments only want the
/// structured log lines, not a CSV growing quietly in a corner.
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    /// 📝 Write `count,rate` lines to a per-worker CSV file?
    #[serde(default)]
    pub enabled: bool,
    /// 📁 Where the CSV files live. Each worker gets its own file — parallel
    /// workers interleaving into one destination is how you get CSV soup.
    #[serde(default = "default_directory")]
    pub directory: String,
}

fn default_directory() -> String {
    ".".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            directory: default_directory(),
        }
    }
}

/// 📊 The rolling throughput reporter owned by one consumer.
///
/// Holds the start of the current measurement window and, when file output
/// is enabled, an append-mode writer to `bulkhead_throughput_<worker>.csv`.
#[derive(Debug)]
pub(crate) struct ThroughputLog {
    worker_id: usize,
    log_size: u64,
    window_start: Instant,
    writer: Option<io::BufWriter<File>>,
}

impl ThroughputLog {
    pub(crate) async fn new(
        config: &TelemetryConfig,
        log_size: u64,
        worker_id: usize,
    ) -> Result<Self> {
        let writer = if config.enabled {
            let path =
                Path::new(&config.directory).join(format!("bulkhead_throughput_{worker_id}.csv"));
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await
                .context(format!(
                    "💀 The telemetry file '{}' refused to open. The throughput will remain a mystery, and so will the reason.",
                    path.display()
                ))?;
            Some(io::BufWriter::new(file))
        } else {
            None
        };
        Ok(Self {
            worker_id,
            log_size,
            window_start: Instant::now(),
            writer,
        })
    }

    /// 📊 Feed the cumulative data-record count after each data record.
    ///
    /// Emits a reading on every nonzero multiple of `log_size` — exactly
    /// once per multiple, because the count only ever moves forward and we
    /// are only called once per record. A zero-length window is skipped
    /// rather than divided by; the window stays open until a reading
    /// actually lands.
    pub(crate) async fn observe(&mut self, record_count: u64) {
        if record_count == 0 || record_count % self.log_size != 0 {
            return;
        }
        let now = Instant::now();
        let elapsed_ms = now.duration_since(self.window_start).as_millis();
        if elapsed_ms == 0 {
            return;
        }
        let rate = (self.log_size as u128 * 1000) / elapsed_ms;
        self.window_start = now;

        info!(
            worker = self.worker_id,
            records = record_count,
            rate_per_sec = rate as u64,
            "📊 throughput checkpoint"
        );

        if let Some(writer) = self.writer.as_mut() {
            let line = format!("{record_count},{rate}\n");
            if let Err(error) = append_line(writer, &line).await {
                // non-fatal: the batch pipeline does not stop for a lost CSV line
                warn!(
                    worker = self.worker_id,
                    %error,
                    "telemetry line went missing in action — continuing without it"
                );
            }
        }
    }

    /// 🗑️ Flush and release the CSV writer. Failures here are logged and
    /// swallowed — we are already tearing down, and the data path owes
    /// nothing to a benchmark file.
    pub(crate) async fn close(&mut self) {
        if let Some(writer) = self.writer.as_mut() {
            if let Err(error) = writer.shutdown().await {
                warn!(
                    worker = self.worker_id,
                    %error,
                    "telemetry file did not close cleanly — shrugging and moving on"
                );
            }
        }
    }
}

async fn append_line(writer: &mut io::BufWriter<File>, line: &str) -> Result<()> {
    writer.write_all(line.as_bytes()).await?;
    // flush per report: an append-only benchmark log you can tail, not a buffer
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn the_one_where_readings_land_on_every_multiple() {
        let dir = tempfile::tempdir().expect("💀 tempdir said no.");
        let config = TelemetryConfig {
            enabled: true,
            directory: dir.path().display().to_string(),
        };
        let mut log = ThroughputLog::new(&config, 2, 7)
            .await
            .expect("💀 The telemetry file should open in a fresh tempdir.");

        for count in 1..=4u64 {
            // keep every measurement window comfortably nonzero
            tokio::time::sleep(Duration::from_millis(5)).await;
            log.observe(count).await;
        }
        log.close().await;

        let contents =
            std::fs::read_to_string(dir.path().join("bulkhead_throughput_7.csv"))
                .expect("💀 The per-worker CSV should exist.");
        let counts: Vec<u64> = contents
            .lines()
            .map(|line| {
                line.split(',')
                    .next()
                    .expect("💀 Every line is count,rate.")
                    .parse()
                    .expect("💀 The count column should be a number.")
            })
            .collect();
        // one reading per multiple of log_size, cumulative counts non-decreasing
        assert_eq!(counts, vec![2, 4]);
        for line in contents.lines() {
            let rate: u64 = line
                .split(',')
                .nth(1)
                .expect("💀 Every line is count,rate.")
                .parse()
                .expect("💀 The rate column should be a number.");
            assert!(rate > 0);
        }
    }

    #[tokio::test]
    async fn the_one_where_telemetry_is_disabled_and_nothing_is_written() {
        let dir = tempfile::tempdir().expect("💀 tempdir said no.");
        let config = TelemetryConfig {
            enabled: false,
            directory: dir.path().display().to_string(),
        };
        let mut log = ThroughputLog::new(&config, 2, 0)
            .await
            .expect("💀 Disabled telemetry should construct without touching disk.");
        log.observe(2).await;
        log.close().await;
        assert!(!dir.path().join("bulkhead_throughput_0.csv").exists());
    }

    #[tokio::test]
    async fn the_one_where_off_multiples_stay_quiet() {
        let dir = tempfile::tempdir().expect("💀 tempdir said no.");
        let config = TelemetryConfig {
            enabled: true,
            directory: dir.path().display().to_string(),
        };
        let mut log = ThroughputLog::new(&config, 100, 3)
            .await
            .expect("💀 The telemetry file should open.");
        tokio::time::sleep(Duration::from_millis(5)).await;
        log.observe(57).await;
        log.close().await;
        let contents = std::fs::read_to_string(dir.path().join("bulkhead_throughput_3.csv"))
            .expect("💀 The file exists — it was opened at construction.");
        assert!(contents.is_empty());
    }
}
