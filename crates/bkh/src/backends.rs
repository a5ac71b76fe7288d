//! 🔌 Store backends — where the documents actually land.
//!
//! 🚰 The consumer buffers, the policy decides, and then a `Store` gets a
//! fully formed batch and one job: persist it. Stores do I/O. Just I/O.
//! HTTP POST, file append, memory push. No buffering. No flush logic.
//! Ancient proverb: "He who puts batching logic in the Store, debugs the
//! same bug in three places." 🦆

use anyhow::Result;
use async_trait::async_trait;

mod couch;
mod file;
mod in_mem;

// 🎯 Config structs ride up to the crate surface so operators can reach
// them as `bkh::CouchStoreConfig` instead of spelunking through modules.
pub use couch::CouchStoreConfig;
pub use file::FileStoreConfig;

pub(crate) use couch::CouchStore;
pub(crate) use file::FileStore;
pub(crate) use in_mem::InMemoryStore;

use crate::app_config::StoreConfig;

/// 🎫 A handle to one named collection inside a store.
///
/// Handed out once per collection by [`Store::collection`], memoized by the
/// consumer, and presented back with every bulk insert. The `locator` is
/// whatever the backend resolved the name to — a database URL, a file path,
/// or just the name again for the backend that lives in RAM and has no
/// concept of "where".
#[derive(Debug, Clone)]
pub struct CollectionRef {
    name: String,
    locator: String,
}

impl CollectionRef {
    pub(crate) fn new(name: impl Into<String>, locator: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            locator: locator.into(),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn locator(&self) -> &str {
        &self.locator
    }
}

/// 🕳️ The downstream collaborator, reduced to the three verbs we need.
///
/// # Contract 📜
/// - `collection` is idempotent by name: the first call does the backend's
///   create-if-absent dance, every later call is a cheap re-resolve. Either
///   way you get a handle you can keep forever.
/// - `insert_many` writes one ordered batch to one collection in one round
///   trip. It does not retry. It does not split. It does not return until
///   the backend acknowledged (or refused) the whole batch.
/// - `close` flushes and finalizes. MUST be called at teardown. Skipping
///   `close` is a bug. It is also considered rude.
#[async_trait]
pub(crate) trait Store: std::fmt::Debug {
    /// 🎫 Resolve (and on first sight, create) a named collection.
    async fn collection(&mut self, name: &str) -> Result<CollectionRef>;

    /// 📦 Persist one ordered batch of raw documents into one collection.
    async fn insert_many(&mut self, collection: &CollectionRef, documents: Vec<String>)
    -> Result<()>;

    /// 🗑️ Flush, finalize, and release. Always. No exceptions. Not even on Fridays.
    async fn close(&mut self) -> Result<()>;
}

/// 🎭 The many faces of a Store — a polymorphic casting call for data
/// destinations. The enum dispatches to the concrete type, keeping the
/// consumer blissfully ignorant of where documents actually land.
/// Ignorance is a feature. It's called "abstraction".
#[derive(Debug)]
pub(crate) enum StoreBackend {
    InMemory(InMemoryStore),
    File(FileStore),
    Couch(CouchStore),
}

impl StoreBackend {
    /// 🏗️ Stand up a backend from its config. Couch pings its server here,
    /// File creates its directory here — by the time this returns, the
    /// backend is ready to take batches, not just ready to disappoint you
    /// ten thousand documents in.
    pub(crate) async fn from_config(config: &StoreConfig) -> Result<StoreBackend> {
        match config {
            StoreConfig::InMemory => Ok(StoreBackend::InMemory(InMemoryStore::new())),
            StoreConfig::File(file_config) => {
                Ok(StoreBackend::File(FileStore::new(file_config.clone()).await?))
            }
            StoreConfig::Couch(couch_config) => {
                Ok(StoreBackend::Couch(CouchStore::new(couch_config.clone()).await?))
            }
        }
    }
}

#[async_trait]
impl Store for StoreBackend {
    async fn collection(&mut self, name: &str) -> Result<CollectionRef> {
        match self {
            StoreBackend::InMemory(store) => store.collection(name).await,
            StoreBackend::File(store) => store.collection(name).await,
            StoreBackend::Couch(store) => store.collection(name).await,
        }
    }

    async fn insert_many(
        &mut self,
        collection: &CollectionRef,
        documents: Vec<String>,
    ) -> Result<()> {
        match self {
            StoreBackend::InMemory(store) => store.insert_many(collection, documents).await,
            StoreBackend::File(store) => store.insert_many(collection, documents).await,
            StoreBackend::Couch(store) => store.insert_many(collection, documents).await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self {
            StoreBackend::InMemory(store) => store.close().await,
            StoreBackend::File(store) => store.close().await,
            StoreBackend::Couch(store) => store.close().await,
        }
    }
}
