//! Uploaded dataset sessions
//!
//! A session ties one immutable dataset to its inferred schema. Sessions are
//! created once and shared read-only; removing one does not affect callers
//! still holding its `Arc`.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::dataset::Dataset;
use crate::error::{AutoMlError, Result};
use crate::schema::Schema;

#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub dataset: Dataset,
    pub schema: Schema,
    /// Structural warnings raised while loading
    pub warnings: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Append-once store of sessions keyed by generated ids
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generate_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Store a dataset under a fresh id
    pub fn create(&self, dataset: Dataset, schema: Schema, warnings: Vec<String>) -> Arc<Session> {
        let session = Arc::new(Session {
            id: Self::generate_id(),
            dataset,
            schema,
            warnings,
            created_at: Utc::now(),
        });
        self.sessions
            .write()
            .insert(session.id.clone(), Arc::clone(&session));
        session
    }

    /// Store a session under a caller-chosen id; existing ids fail with `DuplicateIdentifier`
    pub fn insert(&self, session: Session) -> Result<Arc<Session>> {
        let mut sessions = self.sessions.write();
        if sessions.contains_key(&session.id) {
            return Err(AutoMlError::DuplicateIdentifier(session.id));
        }
        let session = Arc::new(session);
        sessions.insert(session.id.clone(), Arc::clone(&session));
        Ok(session)
    }

    pub fn get(&self, id: &str) -> Result<Arc<Session>> {
        self.sessions
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| AutoMlError::SessionNotFound(id.to_string()))
    }

    pub fn remove(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.write().remove(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}
