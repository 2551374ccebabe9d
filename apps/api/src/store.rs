//! Result Store and Session Store.
//!
//! Both live for the process lifetime: no eviction, no size bound, nothing
//! persisted. A session only takes space once it is opened by a login or
//! written to. Each store serialises access behind one `RwLock`, and
//! read-modify-write goes through `update` so concurrent writers to the same
//! record cannot interleave.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::ResumeRecord;

/// In-place edit applied to a stored record under the write lock.
pub type RecordUpdate = Box<dyn for<'r> FnOnce(&'r mut ResumeRecord) + Send>;

/// Keyed storage for generated résumés, injected into handlers through `AppState`.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Stores the record under its own id, replacing any previous value.
    async fn put(&self, record: ResumeRecord) -> Uuid;

    async fn get(&self, id: Uuid) -> Option<ResumeRecord>;

    async fn delete(&self, id: Uuid) -> Option<ResumeRecord>;

    /// Applies `apply` under the write lock and returns the updated record.
    async fn update(&self, id: Uuid, apply: RecordUpdate) -> Option<ResumeRecord>;
}

#[derive(Debug, Default)]
pub struct InMemoryResultStore {
    records: RwLock<HashMap<Uuid, ResumeRecord>>,
}

impl InMemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResultStore for InMemoryResultStore {
    async fn put(&self, record: ResumeRecord) -> Uuid {
        let id = record.id;
        self.records.write().await.insert(id, record);
        id
    }

    async fn get(&self, id: Uuid) -> Option<ResumeRecord> {
        self.records.read().await.get(&id).cloned()
    }

    async fn delete(&self, id: Uuid) -> Option<ResumeRecord> {
        self.records.write().await.remove(&id)
    }

    async fn update(&self, id: Uuid, apply: RecordUpdate) -> Option<ResumeRecord> {
        let mut records = self.records.write().await;
        let record = records.get_mut(&id)?;
        apply(record);
        record.touch();
        Some(record.clone())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Sessions
// ────────────────────────────────────────────────────────────────────────────

/// Per-visitor state behind the session cookie.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionData {
    pub main_resume: Option<String>,
    pub current_resume_id: Option<Uuid>,
    pub current_base_resume_id: Option<Uuid>,
}

#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionData>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh token. Nothing is stored until the session is opened or written.
    pub fn new_token() -> String {
        Uuid::new_v4().simple().to_string()
    }

    /// Opens an empty session and returns its token.
    pub async fn create(&self) -> String {
        let token = Self::new_token();
        self.sessions
            .write()
            .await
            .insert(token.clone(), SessionData::default());
        token
    }

    pub async fn get(&self, token: &str) -> Option<SessionData> {
        self.sessions.read().await.get(token).cloned()
    }

    pub async fn contains(&self, token: &str) -> bool {
        self.sessions.read().await.contains_key(token)
    }

    /// Returns false when the session does not exist.
    pub async fn update(&self, token: &str, apply: impl FnOnce(&mut SessionData)) -> bool {
        match self.sessions.write().await.get_mut(token) {
            Some(session) => {
                apply(session);
                true
            }
            None => false,
        }
    }

    /// Like `update`, but opens the session first when it does not exist yet.
    pub async fn upsert(&self, token: &str, apply: impl FnOnce(&mut SessionData)) {
        let mut sessions = self.sessions.write().await;
        apply(sessions.entry(token.to_string()).or_default());
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn remove(&self, token: &str) {
        self.sessions.write().await.remove(token);
    }
}
