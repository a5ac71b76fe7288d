use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{self, AsyncWriteExt};
use tracing::trace;

use crate::backends::{CollectionRef, Store};

/// 🚰 Config for the file-backed store. One directory, one NDJSON file per
/// collection inside it. That's the whole data model.
#[derive(Debug, Deserialize, Clone)]
pub struct FileStoreConfig {
    pub directory: String,
}

/// 🚰 FileStore — each collection becomes `<directory>/<name>.ndjson`,
/// opened in append mode and written one document per line.
///
/// ⚠️ Append, not truncate. A sink that accumulates bulk inserts over the
/// lifetime of a stream must not obliterate the batches it wrote an hour
/// ago. He who opens with `File::create` here, re-ingests in shame.
///
/// Writers are memoized per collection — the file is opened once, on first
/// sighting, and the BufWriter lives until `close`. Every bulk insert ends
/// with an explicit flush, so an acknowledged batch is actually on disk and
/// not warm and cozy in a buffer, like a letter you wrote but never sent.
#[derive(Debug)]
pub(crate) struct FileStore {
    config: FileStoreConfig,
    writers: HashMap<String, io::BufWriter<File>>,
}

impl FileStore {
    pub(crate) async fn new(config: FileStoreConfig) -> Result<Self> {
        // 🏗️ make the directory exist before anyone asks for a collection —
        // create_dir_all is idempotent, so an existing directory is fine
        fs::create_dir_all(&config.directory).await.context(format!(
            "💀 The store directory '{}' could not be conjured into existence. We stared at the path. The path stared back.",
            config.directory
        ))?;
        Ok(Self {
            config,
            writers: HashMap::new(),
        })
    }

    fn collection_path(&self, name: &str) -> PathBuf {
        Path::new(&self.config.directory).join(format!("{name}.ndjson"))
    }
}

#[async_trait]
impl Store for FileStore {
    async fn collection(&mut self, name: &str) -> Result<CollectionRef> {
        let path = self.collection_path(name);
        if !self.writers.contains_key(name) {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await
                .context(format!(
                    "💀 The collection file '{}' refused to open. Perhaps permissions were set by someone who really, truly, did not want this file to exist.",
                    path.display()
                ))?;
            // 📦 BufWriter: because issuing one syscall per document is a war crime.
            self.writers
                .insert(name.to_string(), io::BufWriter::new(file));
        }
        Ok(CollectionRef::new(name, path.display().to_string()))
    }

    async fn insert_many(
        &mut self,
        collection: &CollectionRef,
        documents: Vec<String>,
    ) -> Result<()> {
        let writer = self
            .writers
            .get_mut(collection.name())
            .with_context(|| {
                format!(
                    "💀 No open file for collection '{}' — the handle outlived the writer, which should be impossible. Congratulations on the impossible.",
                    collection.name()
                )
            })?;
        trace!(
            collection = collection.name(),
            documents = documents.len(),
            "📬 batch walked into the file store — writing it all down"
        );
        for document in &documents {
            writer.write_all(document.as_bytes()).await?;
            writer.write_all(b"\n").await?;
        }
        // a bulk insert is acknowledged durable-ish, so the buffer empties now
        writer.flush().await.context(format!(
            "💀 Error flushing collection '{}' — the bytes could SEE the disk and then the flush failed. A tragedy in one line.",
            collection.name()
        ))?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        // 🎬 final flush, per writer, because async Drop is still not a thing
        for (name, writer) in self.writers.iter_mut() {
            writer.flush().await.context(format!(
                "💀 Error flushing collection '{name}' during close — she gave everything she had, every byte, and the last one didn't land."
            ))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_lines(path: &Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .expect("💀 The collection file should exist after an insert.")
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[tokio::test]
    async fn the_one_where_documents_land_one_per_line() {
        let dir = tempfile::tempdir().expect("💀 tempdir said no. The filesystem has trust issues.");
        let mut store = FileStore::new(FileStoreConfig {
            directory: dir.path().display().to_string(),
        })
        .await
        .expect("💀 The store directory exists; construction should succeed.");

        let collection = store.collection("alpha").await.expect("💀 open failed");
        store
            .insert_many(
                &collection,
                vec![r#"{"n":1}"#.to_string(), r#"{"n":2}"#.to_string()],
            )
            .await
            .expect("💀 insert failed");
        store.close().await.expect("💀 close failed");

        let lines = read_lines(&dir.path().join("alpha.ndjson"));
        assert_eq!(lines, vec![r#"{"n":1}"#, r#"{"n":2}"#]);
    }

    #[tokio::test]
    async fn the_one_where_the_second_batch_appends_instead_of_obliterating() {
        let dir = tempfile::tempdir().expect("💀 tempdir said no.");
        let mut store = FileStore::new(FileStoreConfig {
            directory: dir.path().display().to_string(),
        })
        .await
        .expect("💀 construction failed");

        let collection = store.collection("alpha").await.expect("💀 open failed");
        store
            .insert_many(&collection, vec!["first".to_string()])
            .await
            .expect("💀 insert failed");
        // a second resolve of the same collection must not reopen or truncate
        let collection_again = store.collection("alpha").await.expect("💀 re-open failed");
        store
            .insert_many(&collection_again, vec!["second".to_string()])
            .await
            .expect("💀 insert failed");
        store.close().await.expect("💀 close failed");

        let lines = read_lines(&dir.path().join("alpha.ndjson"));
        assert_eq!(lines, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn the_one_where_collections_get_separate_files() {
        let dir = tempfile::tempdir().expect("💀 tempdir said no.");
        let mut store = FileStore::new(FileStoreConfig {
            directory: dir.path().display().to_string(),
        })
        .await
        .expect("💀 construction failed");

        let alpha = store.collection("alpha").await.expect("💀 open failed");
        let beta = store.collection("beta").await.expect("💀 open failed");
        store
            .insert_many(&alpha, vec!["a".to_string()])
            .await
            .expect("💀 insert failed");
        store
            .insert_many(&beta, vec!["b".to_string()])
            .await
            .expect("💀 insert failed");
        store.close().await.expect("💀 close failed");

        assert_eq!(read_lines(&dir.path().join("alpha.ndjson")), vec!["a"]);
        assert_eq!(read_lines(&dir.path().join("beta.ndjson")), vec!["b"]);
    }
}
