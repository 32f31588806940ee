// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sitestore_core::domain::cache::{Cache, CacheError};
use sitestore_core::domain::file_storage::{FileStorage, SavedFile, StorageError, StoredFile};
use sitestore_core::domain::publisher::{PublishError, Publisher};
use sitestore_core::domain::settings::EnvSettings;
use sitestore_core::infrastructure::db_log::{DbLogger, LogEvent, LogSink, Severity};
use sitestore_core::{append_site_ulid, sql_args, Datastore, DatastoreError};
use sqlx::postgres::PgPoolOptions;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct MemoryCache {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl Cache for MemoryCache {
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        self.set_bytes(key, value.as_bytes(), ttl).await
    }
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .get(key)
            .map(|b| String::from_utf8_lossy(b).into_owned()))
    }
    async fn expire(&self, key: &str) -> Result<(), CacheError> {
        self.del(key).await
    }
    async fn del(&self, key: &str) -> Result<(), CacheError> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }
    async fn set_bytes(&self, key: &str, value: &[u8], _ttl: Option<Duration>) -> Result<(), CacheError> {
        self.entries.lock().unwrap().insert(key.to_string(), value.to_vec());
        Ok(())
    }
    async fn flush_db(&self) -> Result<(), CacheError> {
        self.entries.lock().unwrap().clear();
        Ok(())
    }
}

#[derive(Default)]
struct RecordingPublisher {
    sent: Mutex<Vec<(String, String, String, Vec<String>)>>,
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(
        &self,
        site_ulid: &str,
        entity: &str,
        message_type: &str,
        ids: &[String],
    ) -> Result<(), PublishError> {
        self.sent.lock().unwrap().push((
            site_ulid.to_string(),
            entity.to_string(),
            message_type.to_string(),
            ids.to_vec(),
        ));
        Ok(())
    }
}

struct ClosedPublisher;

#[async_trait]
impl Publisher for ClosedPublisher {
    async fn publish(&self, _: &str, _: &str, _: &str, _: &[String]) -> Result<(), PublishError> {
        Err(PublishError::Closed)
    }
}

struct StaticStorage;

#[async_trait]
impl FileStorage for StaticStorage {
    async fn open_file(&self, file_identifier: &str) -> Result<StoredFile, StorageError> {
        Err(StorageError::NotFound(file_identifier.to_string()))
    }
    fn get_url(&self, file_identifier: &str) -> String {
        format!("https://files.example.test/{file_identifier}")
    }
    async fn save_file(&self, file_identifier: &str, _bytes: Vec<u8>, _sanitize_path: bool) -> Result<SavedFile, StorageError> {
        Ok(SavedFile {
            file_id: file_identifier.to_string(),
            url: self.get_url(file_identifier),
        })
    }
}

#[derive(Default)]
struct MemorySink {
    events: Mutex<Vec<LogEvent>>,
}

impl LogSink for MemorySink {
    fn emit(&self, event: &LogEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

#[derive(Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
struct Page {
    slug: String,
    title: String,
}

// Pool pointed at a closed port; any statement that reaches it fails fast.
fn unreachable_store() -> Datastore {
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_millis(100))
        .connect_lazy("postgres://app:pw@127.0.0.1:1/sites")
        .unwrap();
    Datastore::from_pool(pool, Arc::new(EnvSettings::new()))
}

#[tokio::test]
async fn test_cached_select_served_without_database() {
    let cache = Arc::new(MemoryCache::default());
    let cached = vec![Page {
        slug: "home".into(),
        title: "Home".into(),
    }];
    cache
        .set_bytes("pages:site-a", &serde_json::to_vec(&cached).unwrap(), None)
        .await
        .unwrap();

    let sink = Arc::new(MemorySink::default());
    let store = unreachable_store()
        .with_cache(cache)
        .with_logger(DbLogger::new(sink.clone()));

    let pages: Vec<Page> = store
        .select_cached("pages:site-a", None, "select slug, title from page", &[])
        .await
        .unwrap();
    assert_eq!(pages, cached);

    let events = sink.events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].field("cache"), Some(&serde_json::json!("hit")));
}

#[tokio::test]
async fn test_cache_miss_falls_through_to_database() {
    let store = unreachable_store().with_cache(Arc::new(MemoryCache::default()));

    let result: Result<Vec<Page>, _> = store
        .select_cached("pages:site-b", None, "select slug, title from page", &[])
        .await;
    assert!(matches!(result, Err(DatastoreError::Database(_))));
}

#[tokio::test]
async fn test_scoped_statement_reaches_driver_and_logs_args() {
    let sink = Arc::new(MemorySink::default());
    let store = unreachable_store()
        .with_strict(true)
        .with_logger(DbLogger::new(sink.clone()));

    let (clause, args) =
        append_site_ulid("01HZSITE", "status = $1 $SITEULID", sql_args!["live"]).unwrap();
    let sql = format!("update page set archived = true where {clause}");
    assert!(store.execute(&sql, &args).await.is_err());

    let events = sink.events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].severity, Severity::Error);
    assert_eq!(
        events[0].field("args"),
        Some(&serde_json::json!(["live", "01HZSITE"]))
    );
}

#[tokio::test]
async fn test_publish_forwards_to_publisher() {
    let publisher = Arc::new(RecordingPublisher::default());
    let store = unreachable_store().with_publisher(publisher.clone());

    store
        .publish("site-a", "page", "updated", &["p1".to_string(), "p2".to_string()])
        .await
        .unwrap();

    let sent = publisher.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "site-a");
    assert_eq!(sent[0].3, vec!["p1".to_string(), "p2".to_string()]);
}

#[tokio::test]
async fn test_publish_error_is_surfaced() {
    let store = unreachable_store().with_publisher(Arc::new(ClosedPublisher));
    let err = store.publish("site-a", "page", "deleted", &[]).await.unwrap_err();
    assert!(matches!(err, DatastoreError::Publish(PublishError::Closed)));
}

#[tokio::test]
async fn test_collaborators_are_exposed() {
    let store = unreachable_store().with_file_storage(Arc::new(StaticStorage));
    let storage = store.file_storage().unwrap();
    assert_eq!(storage.get_url("a/b.png"), "https://files.example.test/a/b.png");
    let saved = storage.save_file("a/b.png", vec![1, 2, 3], true).await.unwrap();
    assert_eq!(saved.file_id, "a/b.png");

    assert!(store.cache().is_none());
    assert!(!store.is_strict());
    assert!(store.migration_error().is_none());
    store.close().await;
}
