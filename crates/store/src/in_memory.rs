//! In-memory store: useful for testing and ephemeral sessions.

use async_trait::async_trait;
use remindly_core::error::StoreError;
use remindly_core::store::{Store, UserId, UserRecord};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Keeps every user record in a map. Nothing survives the process.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    records: Arc<RwLock<HashMap<UserId, UserRecord>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn load(&self, user: &UserId) -> Result<UserRecord, StoreError> {
        Ok(self.records.read().await.get(user).cloned().unwrap_or_default())
    }

    async fn save(&self, user: &UserId, record: &UserRecord) -> Result<(), StoreError> {
        self.records.write().await.insert(user.clone(), record.clone());
        Ok(())
    }

    async fn users(&self) -> Result<Vec<UserId>, StoreError> {
        let mut users: Vec<UserId> = self.records.read().await.keys().cloned().collect();
        users.sort();
        Ok(users)
    }
}
