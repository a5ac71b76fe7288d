//! 🚀 bkh-cli — the front door, the bouncer, the maitre d' of bulkhead.
//!
//! 🎬 *[narrator voice]* "It all started with a simple main() function..."
//! 📦 This binary crate is the thin CLI wrapper that loads config, sets up
//! logging, pipes stdin into the consumer queues, and prints a summary
//! table at the end. Like a manager. 🦆
//!
//! Input is NDJSON envelopes, one per line:
//! `{"collection": "sensor.events", "document": {"temp": 21.5}}`
//! The document travels byte-for-byte — we never re-render your JSON.

use anyhow::{Context, Result};
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table};
use serde::Deserialize;
use serde_json::value::RawValue;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use bkh::{AppConfig, ConsumerSummary, EventRecord};

/// ✉️ One stdin line: a destination and an uninterpreted document.
/// `RawValue` keeps the document bytes exactly as they arrived — no
/// parse-then-reserialize, no key reordering, no float massaging.
#[derive(Debug, Deserialize)]
struct Envelope {
    collection: String,
    document: Box<RawValue>,
}

/// 🚀 main() — where it all begins. The genesis. The big bang.
///
/// 🔧 Steps:
/// 1. Init tracing (so we can see what goes wrong, and when)
/// 2. Resolve the config path (argv[1], default `bkh.toml`, env-only if absent)
/// 3. Spawn the consumers (the moment of truth)
/// 4. Pump stdin into the queues (send it and pray 🙏)
/// 5. Heartbeat, join, print the table (take a bow)
#[tokio::main]
async fn main() -> Result<()> {
    // 📡 Set up tracing — because println! debugging is a lifestyle choice
    // we're trying to move past, like flip phones and cargo shorts
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().collect();
    let path_arg = match args.get(1) {
        Some(s) => s.as_str(),
        None => "bkh.toml", // 🔧 default: the ol' reliable
    };

    // 🔒 Validate the config file exists before we get too emotionally attached
    let config_file = std::path::Path::new(path_arg);
    let config_path = match config_file.try_exists().context(format!(
        "💀 Couldn't even check whether '{}' exists. If you're using a relative path, maybe use an absolute one, to be absolutely certain.",
        config_file.display()
    ))? {
        true => Some(config_file), // ✅ Found it! Better than finding my car keys
        false => None,             // 💤 Not there. Env-only mode. Like my motivation on Mondays.
    };

    let app_config = bkh::load_config(config_path).context(
        "💀 Couldn't load the config. Take a look at the file, make sure it's correct, and make sure you didn't forget something obvious.",
    )?;

    let result = run(app_config).await;

    // 💀 Error handling: the part where we find out what went wrong
    // and print it in a way that's helpful at 3am
    if let Err(err) = result {
        error!("💀 error: {}", err);
        // 🧅 peel the onion of sadness, one tear-jerking layer at a time
        let mut the_vibes_are_giving_connection_issues = false;
        for cause in err.chain().skip(1) {
            error!("⚠️  cause: {}", cause);
            let cause_str = cause.to_string();
            if cause_str.contains("error sending request")
                || cause_str.contains("connection refused")
                || cause_str.contains("Connection refused")
                || cause_str.contains("tcp connect error")
                || cause_str.contains("dns error")
            {
                the_vibes_are_giving_connection_issues = true;
            }
        }
        // 📡 if it smells like a connection problem, it's probably a connection problem
        if the_vibes_are_giving_connection_issues {
            error!(
                "📡 This looks like a connectivity problem. Check that the store is running, the URL is right, and the network likes you today."
            );
        }
        std::process::exit(1);
    }
    Ok(())
}

async fn run(app_config: AppConfig) -> Result<()> {
    let sink_set = bkh::spawn(app_config).await?;
    let queues = sink_set.queues().to_vec();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut routed = 0u64;
    let mut skipped = 0u64;
    let mut next_worker = 0usize;
    while let Some(line) = lines
        .next_line()
        .await
        .context("💀 Reading stdin went sideways. The pipe giveth, the pipe taketh away.")?
    {
        if line.trim().is_empty() {
            continue;
        }
        let envelope: Envelope = match serde_json::from_str(&line) {
            Ok(envelope) => envelope,
            Err(parse_error) => {
                // a bad line is the producer's problem, not a reason to stop the stream
                skipped += 1;
                warn!(%parse_error, "↩️ skipping a line that refused to parse as an envelope");
                continue;
            }
        };
        let record = EventRecord::data(envelope.collection, envelope.document.get());
        if queues[next_worker].send(record).await.is_err() {
            anyhow::bail!(
                "💀 Worker {next_worker}'s queue closed while events were still flowing — the consumer died mid-stream. Its error follows in the join."
            );
        }
        routed += 1;
        next_worker = (next_worker + 1) % queues.len();
    }

    info!(
        records = routed,
        skipped, "📭 stdin drained — sending the final heartbeat to every worker"
    );
    for (worker, queue) in queues.iter().enumerate() {
        if queue.send(EventRecord::heartbeat()).await.is_err() {
            warn!(worker, "queue already closed before the final heartbeat");
        }
    }
    drop(queues);

    let summaries = sink_set.join().await?;
    println!("{}", summary_table(&summaries));
    Ok(())
}

/// 🍽️ One row per worker, right-aligned numbers, served on a comfy table.
fn summary_table(summaries: &[ConsumerSummary]) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["worker", "records", "flushes", "bulk inserts"]);
    for summary in summaries {
        table.add_row(vec![
            Cell::new(summary.worker_id).set_alignment(CellAlignment::Right),
            Cell::new(summary.records).set_alignment(CellAlignment::Right),
            Cell::new(summary.flushes).set_alignment(CellAlignment::Right),
            Cell::new(summary.bulk_inserts).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}
