//! In-memory backend used by the integration tests: JSON tables, a scripted
//! change feed with presence, and an instantly-completing blob store.
//!
//! Table mutations replicate onto every channel subscribed to the table,
//! like the real change feed does.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use eyeball::SharedObservable;
use futures::stream::BoxStream;
use serde_json::{Value, json};
use tokio::sync::broadcast;
use url::Url;

use chat_ui_core::backend::realtime::{EventStream, PresenceStream};
use chat_ui_core::backend::storage::UploadStream;
use chat_ui_core::{
    BackendError, BlobStore, ChangeEvent, ChangeFeed, ChangeKind, ChannelSpec, ChannelState,
    ChatBackend, ConnectionState, EventChannel, PaginationToken, PresenceDiff, PresenceState,
    QueryRequest, TableQuery, UploadEvent,
};

pub struct MockBackend {
    tables: Mutex<HashMap<String, Vec<Value>>>,
    next_id: AtomicI64,
    now: Mutex<String>,
    connection: SharedObservable<ConnectionState>,
    channels: Mutex<Vec<Arc<MockChannel>>>,
    /// When set, the next select fails with a network error.
    pub fail_next_select: AtomicBool,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
            next_id: AtomicI64::new(1000),
            now: Mutex::new("2024-01-03T12:00:00+00:00".to_owned()),
            connection: SharedObservable::new(ConnectionState::Disconnected),
            channels: Mutex::new(Vec::new()),
            fail_next_select: AtomicBool::new(false),
        }
    }

    pub fn seed(&self, table: &str, rows: Vec<Value>) {
        self.tables
            .lock()
            .unwrap()
            .entry(table.to_owned())
            .or_default()
            .extend(rows);
    }

    pub fn set_now(&self, timestamp: &str) {
        *self.now.lock().unwrap() = timestamp.to_owned();
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn row_by_id(&self, table: &str, id: i64) -> Option<Value> {
        self.rows(table)
            .into_iter()
            .find(|row| row.get("id").and_then(Value::as_i64) == Some(id))
    }

    /// Delivers a change event to every channel subscribed to its table.
    pub fn emit(&self, event: ChangeEvent) {
        for channel in self.channels.lock().unwrap().iter() {
            if channel.spec.table == event.table {
                let _ = channel.events_tx.send(event.clone());
            }
        }
    }

    /// Delivers a presence diff to every channel.
    pub fn emit_presence(&self, diff: PresenceDiff) {
        for channel in self.channels.lock().unwrap().iter() {
            let _ = channel.presence_tx.send(diff.clone());
        }
    }

    /// Every presence payload tracked on channels of the given topic.
    pub fn tracked(&self, topic: &str) -> Vec<PresenceState> {
        self.channels
            .lock()
            .unwrap()
            .iter()
            .filter(|channel| channel.spec.topic == topic)
            .flat_map(|channel| channel.tracked.lock().unwrap().clone())
            .collect()
    }
}

fn matches_filters(row: &Value, filters: &[(String, Value)]) -> bool {
    filters
        .iter()
        .all(|(column, value)| row.get(column) == Some(value))
}

fn cmp_column(a: &Value, b: &Value) -> std::cmp::Ordering {
    match (a.as_i64(), b.as_i64()) {
        (Some(x), Some(y)) => x.cmp(&y),
        _ => a.as_str().unwrap_or("").cmp(b.as_str().unwrap_or("")),
    }
}

fn token_value(token: &PaginationToken) -> Value {
    match token {
        PaginationToken::Id(id) => json!(id),
        PaginationToken::Timestamp(ts) => json!(ts),
    }
}

#[async_trait]
impl TableQuery for MockBackend {
    async fn select(&self, table: &str, request: QueryRequest) -> Result<Vec<Value>, BackendError> {
        if self.fail_next_select.swap(false, Ordering::SeqCst) {
            return Err(BackendError::Network("simulated connection loss".to_owned()));
        }
        let mut rows: Vec<Value> = self
            .rows(table)
            .into_iter()
            .filter(|row| matches_filters(row, &request.filters))
            .filter(|row| {
                request.any_filters.is_empty()
                    || request
                        .any_filters
                        .iter()
                        .any(|(column, value)| row.get(column) == Some(value))
            })
            .filter(|row| match &request.before {
                Some((column, token)) => {
                    let bound = token_value(token);
                    row.get(column)
                        .is_some_and(|value| cmp_column(value, &bound).is_lt())
                }
                None => true,
            })
            .collect();
        if let Some(column) = &request.order_desc {
            rows.sort_by(|a, b| {
                let empty = json!(null);
                cmp_column(b.get(column).unwrap_or(&empty), a.get(column).unwrap_or(&empty))
            });
        }
        if let Some(limit) = request.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn insert(&self, table: &str, mut row: Value) -> Result<Value, BackendError> {
        let stored = {
            let object = row
                .as_object_mut()
                .ok_or_else(|| BackendError::Api("row must be an object".to_owned()))?;
            if !object.contains_key("id") {
                object.insert(
                    "id".to_owned(),
                    json!(self.next_id.fetch_add(1, Ordering::SeqCst)),
                );
            }
            let now = self.now.lock().unwrap().clone();
            object
                .entry("created_at")
                .or_insert_with(|| json!(now.clone()));
            object.entry("updated_at").or_insert_with(|| json!(now.clone()));
            row.clone()
        };
        self.tables
            .lock()
            .unwrap()
            .entry(table.to_owned())
            .or_default()
            .push(stored.clone());
        self.emit(ChangeEvent {
            kind: ChangeKind::Insert,
            table: table.to_owned(),
            record: stored.clone(),
            old_record: None,
        });
        Ok(stored)
    }

    async fn update(
        &self,
        table: &str,
        patch: Value,
        filters: Vec<(String, Value)>,
    ) -> Result<(), BackendError> {
        let patch = patch
            .as_object()
            .ok_or_else(|| BackendError::Api("patch must be an object".to_owned()))?
            .clone();
        let mut changed = Vec::new();
        {
            let mut tables = self.tables.lock().unwrap();
            let Some(rows) = tables.get_mut(table) else {
                return Ok(());
            };
            for row in rows.iter_mut() {
                if matches_filters(row, &filters) {
                    let old = row.clone();
                    let object = row.as_object_mut().expect("seeded rows are objects");
                    for (key, value) in &patch {
                        object.insert(key.clone(), value.clone());
                    }
                    changed.push((old, row.clone()));
                }
            }
        }
        for (old, new) in changed {
            self.emit(ChangeEvent {
                kind: ChangeKind::Update,
                table: table.to_owned(),
                record: new,
                old_record: Some(old),
            });
        }
        Ok(())
    }

    async fn delete(
        &self,
        table: &str,
        filters: Vec<(String, Value)>,
    ) -> Result<(), BackendError> {
        let mut removed = Vec::new();
        {
            let mut tables = self.tables.lock().unwrap();
            let Some(rows) = tables.get_mut(table) else {
                return Ok(());
            };
            rows.retain(|row| {
                if matches_filters(row, &filters) {
                    removed.push(row.clone());
                    false
                } else {
                    true
                }
            });
        }
        for old in removed {
            self.emit(ChangeEvent {
                kind: ChangeKind::Delete,
                table: table.to_owned(),
                record: json!({}),
                old_record: Some(old),
            });
        }
        Ok(())
    }
}

pub struct MockChannel {
    spec: ChannelSpec,
    state: SharedObservable<ChannelState>,
    connection: SharedObservable<ConnectionState>,
    events_tx: broadcast::Sender<ChangeEvent>,
    presence_tx: broadcast::Sender<PresenceDiff>,
    pub tracked: Mutex<Vec<PresenceState>>,
}

#[async_trait]
impl EventChannel for MockChannel {
    async fn join(&self) -> Result<(), BackendError> {
        if self.connection.get() != ConnectionState::Connected {
            self.state.set(ChannelState::Errored);
            return Err(BackendError::Network(
                "cannot join while disconnected".to_owned(),
            ));
        }
        self.state.set(ChannelState::Joining);
        self.state.set(ChannelState::Joined);
        Ok(())
    }

    async fn leave(&self) -> Result<(), BackendError> {
        self.state.set(ChannelState::Left);
        Ok(())
    }

    fn state(&self) -> eyeball::Subscriber<ChannelState> {
        self.state.subscribe()
    }

    fn events(&self) -> EventStream {
        let receiver = self.events_tx.subscribe();
        Box::pin(futures::stream::unfold(receiver, |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => return Some((event, receiver)),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        }))
    }

    fn presence(&self) -> PresenceStream {
        let receiver = self.presence_tx.subscribe();
        Box::pin(futures::stream::unfold(receiver, |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(diff) => return Some((diff, receiver)),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        }))
    }

    async fn track(&self, state: PresenceState) -> Result<(), BackendError> {
        self.tracked.lock().unwrap().push(state);
        Ok(())
    }
}

#[async_trait]
impl ChangeFeed for MockBackend {
    async fn connect(&self) -> Result<(), BackendError> {
        self.connection.set(ConnectionState::Connecting);
        self.connection.set(ConnectionState::Connected);
        Ok(())
    }

    async fn disconnect(&self) {
        self.connection.set(ConnectionState::Disconnected);
        // Channels fall back to idle and must be rejoined by their owners.
        for channel in self.channels.lock().unwrap().iter() {
            channel.state.set(ChannelState::Idle);
        }
    }

    fn connection_state(&self) -> eyeball::Subscriber<ConnectionState> {
        self.connection.subscribe()
    }

    fn channel(&self, spec: ChannelSpec) -> Arc<dyn EventChannel> {
        let (events_tx, _) = broadcast::channel(64);
        let (presence_tx, _) = broadcast::channel(64);
        let channel = Arc::new(MockChannel {
            spec,
            state: SharedObservable::new(ChannelState::Idle),
            connection: self.connection.clone(),
            events_tx,
            presence_tx,
            tracked: Mutex::new(Vec::new()),
        });
        self.channels.lock().unwrap().push(channel.clone());
        channel
    }
}

#[async_trait]
impl BlobStore for MockBackend {
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        _bytes: Vec<u8>,
        _content_type: mime::Mime,
    ) -> Result<UploadStream, BackendError> {
        let url = self.public_url(bucket, key)?;
        Ok(Box::pin(futures::stream::iter(vec![
            Ok(UploadEvent::Progress(0.5)),
            Ok(UploadEvent::Complete(url)),
        ])))
    }

    fn public_url(&self, bucket: &str, key: &str) -> Result<Url, BackendError> {
        Url::parse(&format!("https://storage.mock/object/public/{bucket}/{key}"))
            .map_err(|err| BackendError::Api(err.to_string()))
    }
}

impl ChatBackend for MockBackend {
    fn query(&self) -> &dyn TableQuery {
        self
    }

    fn realtime(&self) -> &dyn ChangeFeed {
        self
    }

    fn storage(&self) -> &dyn BlobStore {
        self
    }
}

// Row builders

pub fn message_row(
    id: i64,
    chat_id: i64,
    author_id: &str,
    content: &str,
    created_at: &str,
    seen: bool,
) -> Value {
    json!({
        "id": id,
        "chat_id": chat_id,
        "author_id": author_id,
        "content": content,
        "type": "Text",
        "created_at": created_at,
        "seen": seen,
    })
}

pub fn chat_row(id: i64, me: &str, peer: &str, peer_name: &str, updated_at: &str) -> Value {
    json!({
        "id": id,
        "user1": me,
        "user2": peer,
        "name": peer_name,
        "created_at": updated_at,
        "updated_at": updated_at,
    })
}

/// Polls until the condition holds or a couple of seconds pass.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

// Process-wide fixtures. The core keeps its backend client and worker in
// singletons, so every test of one binary runs against the same initialized
// instance, on one shared runtime that outlives the individual tests.

pub fn test_runtime() -> &'static tokio::runtime::Runtime {
    static RT: std::sync::OnceLock<tokio::runtime::Runtime> = std::sync::OnceLock::new();
    RT.get_or_init(|| tokio::runtime::Runtime::new().expect("runtime"))
}

pub fn shared_backend() -> Arc<MockBackend> {
    static BACKEND: std::sync::OnceLock<Arc<MockBackend>> = std::sync::OnceLock::new();
    BACKEND.get_or_init(|| Arc::new(MockBackend::new())).clone()
}

/// Initializes the core once per test binary, logged in as "me".
pub fn init_core() {
    static INIT: std::sync::OnceLock<()> = std::sync::OnceLock::new();
    INIT.get_or_init(|| {
        let backend = shared_backend();
        test_runtime().block_on(async {
            chat_ui_core::init::init(backend, "me").await.expect("init");
        });
    });
}
