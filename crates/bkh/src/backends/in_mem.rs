use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::backends::{CollectionRef, Store};

/// 📼 One recorded bulk-insert call: which collection, which documents, in
/// which order. The evidence locker of the test suite.
#[derive(Debug, Clone)]
pub(crate) struct RecordedInsert {
    pub(crate) collection: String,
    pub(crate) documents: Vec<String>,
}

/// 📦 A store that never forgets. Unlike my dad, who forgot my soccer game in 1998.
///
/// `InMemoryStore` records every collection it was asked to create and every
/// bulk-insert call it received, in call order, so tests can assert on
/// exactly what the consumer did and when.
///
/// 🔒 The `Arc<Mutex<Vec<...>>>` is an existential nesting doll: "I need to
/// share ownership of a thing that must be accessed one task at a time."
/// Clone-able because tests need to peek inside after handing the store off
/// to a consumer. The `Arc` means everyone shares the same ledger.
/// Communist data, but in a good way. The borrow checker approved. Barely.
///
/// The `poisoned` flag turns the next insert into a failure, because a test
/// suite that never watches anything die has not really tested anything.
#[derive(Debug, Default, Clone)]
pub(crate) struct InMemoryStore {
    /// 🎫 Every collection name ever resolved, in first-sighting order.
    pub(crate) collections: Arc<Mutex<Vec<String>>>,
    /// 📼 Every bulk-insert call, in call order.
    pub(crate) inserts: Arc<Mutex<Vec<RecordedInsert>>>,
    /// ☠️ When set, `insert_many` fails. For tests that enjoy tragedy.
    poisoned: Arc<AtomicBool>,
}

impl InMemoryStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// ☠️ Make every future insert fail. There is no antidote.
    #[cfg(test)]
    pub(crate) fn poison(&self) {
        self.poisoned.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn collection(&mut self, name: &str) -> Result<CollectionRef> {
        let mut collections = self.collections.lock().await;
        if !collections.iter().any(|existing| existing == name) {
            collections.push(name.to_string());
        }
        // the locator is just the name — RAM has no addressing scheme worth printing
        Ok(CollectionRef::new(name, name))
    }

    async fn insert_many(
        &mut self,
        collection: &CollectionRef,
        documents: Vec<String>,
    ) -> Result<()> {
        if self.poisoned.load(Ordering::SeqCst) {
            anyhow::bail!(
                "💀 The in-memory store was poisoned and collection '{}' drank first.",
                collection.name()
            );
        }
        self.inserts.lock().await.push(RecordedInsert {
            collection: collection.name().to_string(),
            documents,
        });
        Ok(())
    }

    /// 🗑️ Closes with all the ceremony of closing a browser tab. We live in
    /// RAM; when this drops, the OS reclaims everything faster than HR
    /// reclaims your badge on your last day.
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_collections_once_and_inserts_in_order() {
        let store = InMemoryStore::new();
        let mut handle = store.clone();

        let alpha = handle.collection("alpha").await.expect("💀 resolve failed");
        handle.collection("alpha").await.expect("💀 re-resolve failed");
        handle
            .insert_many(&alpha, vec!["one".to_string()])
            .await
            .expect("💀 insert failed");
        handle
            .insert_many(&alpha, vec!["two".to_string()])
            .await
            .expect("💀 insert failed");

        assert_eq!(*store.collections.lock().await, vec!["alpha"]);
        let inserts = store.inserts.lock().await;
        assert_eq!(inserts.len(), 2);
        assert_eq!(inserts[0].documents, vec!["one"]);
        assert_eq!(inserts[1].documents, vec!["two"]);
    }

    #[tokio::test]
    async fn poison_makes_inserts_fail() {
        let store = InMemoryStore::new();
        let mut handle = store.clone();
        let alpha = handle.collection("alpha").await.expect("💀 resolve failed");
        store.poison();
        assert!(handle.insert_many(&alpha, vec!["{}".to_string()]).await.is_err());
    }
}
