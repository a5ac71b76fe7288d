use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, trace};

use crate::backends::{CollectionRef, Store};

/// 🛋️ Config for the CouchDB-shaped HTTP store.
#[derive(Debug, Deserialize, Clone)]
pub struct CouchStoreConfig {
    /// 📡 Where to send the bodies. Uh. The documents. Where to send the documents.
    pub url: String,
    /// 🔒 Username. The bouncer at the club. Except the club is a database.
    #[serde(default)]
    pub username: Option<String>,
    /// 🔒 Password. "password123" is not a password. It is a confession.
    #[serde(default)]
    pub password: Option<String>,
    /// 🏷️ Prefix prepended to every collection name when naming its database.
    /// Couch has no collections-inside-a-database, so each collection gets its
    /// own database and the prefix plays the role the database name used to.
    #[serde(default)]
    pub database_prefix: String,
}

/// 🛋️ The Couch store — pure I/O against a CouchDB-compatible HTTP API.
///
/// `collection()` is a `PUT /{db}` (create-if-absent; 412 means "already
/// there", which is exactly what idempotent means). `insert_many()` is a
/// `POST /{db}/_bulk_docs` with the raw document strings spliced into a
/// `{"docs":[...]}` envelope — the documents travel byte-for-byte, we never
/// parse them, we barely even look at them.
///
/// Internally holds:
/// - `client`: the HTTP muscle 💪 — reused across requests
/// - `config`: auth and URL targeting info
///
/// 🚰 Think of this as the drain at the end of the pipeline. The last stop.
/// Knock knock. Who's there? HTTP POST. HTTP POST who? HTTP POST your batch
/// and hope the server's in a good mood.
#[derive(Debug)]
pub(crate) struct CouchStore {
    client: reqwest::Client,
    config: CouchStoreConfig,
}

impl CouchStore {
    /// 🚀 Stand up a new `CouchStore`, fully wired and ready to receive batches.
    ///
    /// Builds the `reqwest::Client` with sane timeouts (10s connect, 30s
    /// read — like a polite person, we will wait, but not forever), then
    /// pings the server root with a GET to confirm it's alive and talking
    /// to us. If the URL is wrong we want to find out here, loudly, not
    /// ten thousand documents into the stream.
    pub(crate) async fn new(config: CouchStoreConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .context("💀 The HTTP client refused to be born. The TLS stack wept. Probably a missing cert or a cursed system OpenSSL. Either way: tragic.")?;

        // 📡 Connectivity ping — "Hello? Is this thing on?" — a developer, gesturing at a database.
        let ping = authed(&config, client.get(config.url.trim_end_matches('/')))
            .send()
            .await
            .context(format!(
                "💀 Could not reach the document store at '{}'. We knocked. Nobody answered. Check the URL, check the network, check that the database is actually running.",
                config.url
            ))?;
        let status = ping.status();
        if !status.is_success() {
            anyhow::bail!(
                "💀 The document store at '{}' answered the ping with '{}'. It is alive, but it does not like us. Check your credentials.",
                config.url,
                status
            );
        }
        debug!("✅ document store is up and accepting visitors — welcome mat is out");

        Ok(Self { client, config })
    }

    /// 📡 `{url}/{prefix}{collection}` — one database per collection.
    /// trim_end_matches('/') — the "/" hygiene you didn't know you needed.
    fn database_url(&self, name: &str) -> String {
        format!(
            "{}/{}{}",
            self.config.url.trim_end_matches('/'),
            self.config.database_prefix,
            name
        )
    }
}

/// 🔒 Apply basic auth when the config carries a username. Free-standing so
/// the constructor can use it before `self` exists.
fn authed(config: &CouchStoreConfig, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    match config.username {
        Some(ref username) => request.basic_auth(username, config.password.as_ref()),
        None => request,
    }
}

#[async_trait]
impl Store for CouchStore {
    /// 🎫 PUT the database into existence, or confirm it already exists.
    ///
    /// 201/202 = freshly created. 412 = already there. Both are success:
    /// the caller asked for "a collection with this name", not "a brand new
    /// collection with this name". Anything else is a hard stop — writing
    /// into a collection we couldn't create is chaos, and we are the wall.
    async fn collection(&mut self, name: &str) -> Result<CollectionRef> {
        let url = self.database_url(name);
        let response = authed(&self.config, self.client.put(&url))
            .send()
            .await
            .context(format!(
                "💀 Reached out to create collection '{name}'. Got ghosted. The network is giving us the silent treatment."
            ))?;
        let status = response.status();
        if status.is_success() || status.as_u16() == 412 {
            debug!(collection = name, "🎫 collection handle resolved");
            Ok(CollectionRef::new(name, url))
        } else {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "💀 The store refused to create collection '{}' at '{}': status '{}', body '{}'. We have no one to blame but ourselves, and possibly whoever configured the permissions.",
                name,
                url,
                status,
                body
            )
        }
    }

    /// 📦 POST one ordered batch to `_bulk_docs`. Pure I/O. No retries.
    ///
    /// The documents are already rendered JSON; we splice them into the
    /// `{"docs":[...]}` envelope without parsing them. 🔄 This function does
    /// not retry. Retries are the caller's problem. Good luck.
    async fn insert_many(
        &mut self,
        collection: &CollectionRef,
        documents: Vec<String>,
    ) -> Result<()> {
        let batch_len = documents.len();
        let body = format!("{{\"docs\":[{}]}}", documents.join(","));
        trace!(
            collection = collection.name(),
            documents = batch_len,
            bytes = body.len(),
            "📡 bulk insert leaving the building, Elvis-style"
        );

        let bulk_url = format!("{}/_bulk_docs", collection.locator());
        let response = authed(&self.config, self.client.post(&bulk_url))
            // ⚠️ Content-Type matters — _bulk_docs wants application/json or it sulks.
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .context(format!(
                "💀 The bulk insert for collection '{}' never made it to the store. We launched {} documents into the network and the network responded with what can only be described as 'not vibing with it.'",
                collection.name(),
                batch_len
            ))?;

        let status = response.status();
        if !status.is_success() {
            // 💀 We got a response! It just... wasn't good news. The body is
            // fetched for context — it usually says which document offended.
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "💀 The store looked at our batch of {} documents for collection '{}' and said '{}'. The body of the response read: '{}'.",
                batch_len,
                collection.name(),
                status,
                body
            );
        }
        Ok(())
    }

    /// 🗑️ Nothing to flush — every bulk insert was acknowledged before we
    /// moved on. The HTTP client drops cleanly. The connection pool says
    /// goodbye. Knock knock. Who's there? Nobody. The store is closed. 🦆
    async fn close(&mut self) -> Result<()> {
        debug!("🗑️ couch store closing — no buffer to flush, just vibes to release");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn store_against(server: &MockServer) -> CouchStore {
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200))
            .mount(server)
            .await;
        CouchStore::new(CouchStoreConfig {
            url: server.uri(),
            username: None,
            password: None,
            database_prefix: String::new(),
        })
        .await
        .expect("💀 The store should come up against a mock that answers pings.")
    }

    #[tokio::test]
    async fn the_one_where_the_batch_arrives_byte_for_byte() {
        let server = MockServer::start().await;
        let mut store = store_against(&server).await;

        Mock::given(method("PUT"))
            .and(path("/sensor.events"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/sensor.events/_bulk_docs"))
            .and(body_string(r#"{"docs":[{"a":1},{"b":2}]}"#))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let collection = store
            .collection("sensor.events")
            .await
            .expect("💀 PUT returned 201; the handle should exist.");
        store
            .insert_many(
                &collection,
                vec![r#"{"a":1}"#.to_string(), r#"{"b":2}"#.to_string()],
            )
            .await
            .expect("💀 The mock accepted the batch; insert_many should agree.");
    }

    #[tokio::test]
    async fn the_one_where_the_collection_already_exists_and_nobody_minds() {
        let server = MockServer::start().await;
        let mut store = store_against(&server).await;

        // 412 Precondition Failed is Couch for "that database already exists"
        Mock::given(method("PUT"))
            .and(path("/telemetry"))
            .respond_with(ResponseTemplate::new(412))
            .mount(&server)
            .await;

        let collection = store
            .collection("telemetry")
            .await
            .expect("💀 412 means the collection exists — that is success, not failure.");
        assert_eq!(collection.name(), "telemetry");
    }

    #[tokio::test]
    async fn the_one_where_the_prefix_namespaces_the_database() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/factory_sensor.events"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let mut store = CouchStore::new(CouchStoreConfig {
            url: server.uri(),
            username: None,
            password: None,
            database_prefix: "factory_".to_string(),
        })
        .await
        .expect("💀 The store should come up against a mock that answers pings.");
        store
            .collection("sensor.events")
            .await
            .expect("💀 The prefixed PUT was mocked; the handle should resolve.");
    }

    #[tokio::test]
    async fn the_one_where_the_store_says_no_and_we_take_it_seriously() {
        let server = MockServer::start().await;
        let mut store = store_against(&server).await;

        Mock::given(method("PUT"))
            .and(path("/grumpy"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/grumpy/_bulk_docs"))
            .respond_with(ResponseTemplate::new(500).set_body_string("shard is having a rough morning"))
            .mount(&server)
            .await;

        let collection = store.collection("grumpy").await.expect("💀 PUT was mocked.");
        let error = store
            .insert_many(&collection, vec!["{}".to_string()])
            .await
            .expect_err("💀 A 500 from _bulk_docs must surface as an error, not a shrug.");
        let message = format!("{error:#}");
        assert!(message.contains("grumpy"), "error should name the collection: {message}");
    }

    #[tokio::test]
    async fn the_one_where_the_server_is_simply_not_there() {
        // nothing listens on this port; the ping should fail the constructor
        let result = CouchStore::new(CouchStoreConfig {
            url: "http://127.0.0.1:9".to_string(),
            username: None,
            password: None,
            database_prefix: String::new(),
        })
        .await;
        assert!(result.is_err(), "a dead endpoint must fail at construction time");
    }
}
