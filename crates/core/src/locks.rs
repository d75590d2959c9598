//! Per-user serialization.
//!
//! The scheduler tick and live turns both read-modify-write the same user
//! record. Holding a user's guard makes those critical sections mutually
//! exclusive; different users never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::store::UserId;

#[derive(Debug, Default, Clone)]
pub struct UserLocks {
    inner: Arc<Mutex<HashMap<UserId, Arc<AsyncMutex<()>>>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, user: &UserId) -> Arc<AsyncMutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        map.entry(user.clone()).or_default().clone()
    }

    /// Wait for exclusive access to `user`'s record.
    pub async fn lock(&self, user: &UserId) -> OwnedMutexGuard<()> {
        self.slot(user).lock_owned().await
    }

    /// Exclusive access if nobody else holds it right now.
    pub fn try_lock(&self, user: &UserId) -> Option<OwnedMutexGuard<()>> {
        self.slot(user).try_lock_owned().ok()
    }
}
