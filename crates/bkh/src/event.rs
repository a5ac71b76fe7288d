//! 📦 Event records — the building blocks of bulkhead.
//!
//! Every record that flows through this system is one of two things:
//! a data record (a document with a destination) or a heartbeat (a record
//! with no document, no destination, and exactly one job: make the consumer
//! flush everything it's been hoarding). The heartbeat is identified by its
//! collection id, which carries a reserved sentinel value instead of a real
//! collection name. Yes, we smuggle control flow through a data field.
//! No, we're not proud of it. Yes, it works great. 🦆

use serde::{Deserialize, Serialize};

/// 🫀 The reserved collection id that marks a control record.
///
/// The leading underscore keeps it out of any sane collection namespace —
/// no backend will ever see it, because heartbeats never reach a backend.
pub const HEARTBEAT_COLLECTION_ID: &str = "_heartbeat";

/// 🔍 The default pattern used to recognize heartbeats on the wire.
///
/// Anchored on both ends. `Regex::is_match` is a substring search, and a
/// substring search that matched `my_heartbeat_metrics` would flush every
/// buffer each time someone stored telemetry about their fitness tracker.
pub const DEFAULT_HEARTBEAT_PATTERN: &str = "^_heartbeat$";

/// 🎯 One record, one destination, zero guarantees.
///
/// This is the atomic unit of the pipeline: a raw JSON document plus the
/// name of the collection it wants to end up in. The document is a `String`
/// because we pass it through byte-for-byte — no parsing, no re-rendering,
/// no opinions. The consumer buffers it, the store writes it, nobody reads it.
///
/// A record is consumed exactly once: it arrives on the queue, gets placed
/// into (or, for heartbeats, deliberately walks past) a buffer, and is never
/// seen again. Short life. Honest work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// 📡 The logical destination — or the heartbeat sentinel.
    pub collection_id: String,
    /// 📦 The raw document payload. Opaque. Untouched. Trusted implicitly.
    pub document: String,
}

impl EventRecord {
    /// 🏗️ A data record bound for `collection_id`, carrying `document` verbatim.
    pub fn data(collection_id: impl Into<String>, document: impl Into<String>) -> Self {
        Self {
            collection_id: collection_id.into(),
            document: document.into(),
        }
    }

    /// 🫀 A heartbeat — the record equivalent of a manager walking the floor
    /// shouting "SHIP WHAT YOU HAVE". Carries no document, touches no buffer,
    /// increments no counter. Pure signal.
    pub fn heartbeat() -> Self {
        Self {
            collection_id: HEARTBEAT_COLLECTION_ID.to_string(),
            document: String::new(),
        }
    }
}
