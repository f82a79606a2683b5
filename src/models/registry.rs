//! In-memory index of tokens seen launching since startup.

use std::sync::Mutex;

use chrono::{DateTime, Utc};

/// A token address paired with the wall-clock time it was first seen.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedTokenRecord {
    pub token: String,
    pub created_at: DateTime<Utc>,
}

/// Ordered registry of created tokens.
///
/// Auxiliary only: records are appended on every decoded create and never
/// pruned by time, only cleared in bulk.
#[derive(Default)]
pub struct TokenRegistry {
    tokens: Mutex<Vec<CreatedTokenRecord>>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, token: String) {
        self.tokens.lock().unwrap().push(CreatedTokenRecord {
            token,
            created_at: Utc::now(),
        });
    }

    pub fn len(&self) -> usize {
        self.tokens.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.lock().unwrap().is_empty()
    }

    pub fn snapshot(&self) -> Vec<CreatedTokenRecord> {
        self.tokens.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.tokens.lock().unwrap().clear();
    }
}
