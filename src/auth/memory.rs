//! In-process stores, used by tests and local runs without Postgres.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::{
    repo::{LoginHistoryRepository, StoreError, StoreResult, UserRepository},
    repo_types::{LoginHistoryEntry, NewLoginAttempt, NewUser, User},
};

#[derive(Default)]
pub struct InMemoryUserRepository {
    by_email: RwLock<HashMap<String, User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.by_email.read().await.get(&email.to_lowercase()).cloned())
    }

    async fn create(&self, user: NewUser) -> StoreResult<User> {
        let key = user.email.to_lowercase();
        // check and insert under one write guard
        let mut users = self.by_email.write().await;
        if users.contains_key(&key) {
            return Err(StoreError::DuplicateEmail);
        }
        let user = User {
            id: Uuid::new_v4(),
            email: key.clone(),
            full_name: user.full_name,
            password_hash: user.password_hash,
            role: user.role,
            created_at: user.created_at,
        };
        users.insert(key, user.clone());
        Ok(user)
    }
}

#[derive(Default)]
pub struct InMemoryLoginHistoryRepository {
    entries: RwLock<Vec<LoginHistoryEntry>>,
}

impl InMemoryLoginHistoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    async fn newest_first<F>(&self, limit: i64, pred: F) -> Vec<LoginHistoryEntry>
    where
        F: Fn(&LoginHistoryEntry) -> bool,
    {
        let limit = usize::try_from(limit).unwrap_or(0);
        let entries = self.entries.read().await;
        // later appends win ties on attempted_at
        let mut out: Vec<_> = entries.iter().rev().filter(|e| pred(e)).cloned().collect();
        out.sort_by(|a, b| b.attempted_at.cmp(&a.attempted_at));
        out.truncate(limit);
        out
    }
}

#[async_trait]
impl LoginHistoryRepository for InMemoryLoginHistoryRepository {
    async fn create(&self, attempt: NewLoginAttempt) -> StoreResult<LoginHistoryEntry> {
        let entry = LoginHistoryEntry {
            id: Uuid::new_v4(),
            user_id: attempt.user_id,
            email: attempt.email.to_lowercase(),
            success: attempt.success,
            ip_address: attempt.ip_address,
            user_agent: attempt.user_agent,
            attempted_at: attempt.attempted_at,
        };
        self.entries.write().await.push(entry.clone());
        Ok(entry)
    }

    async fn find_by_user_id(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> StoreResult<Vec<LoginHistoryEntry>> {
        Ok(self
            .newest_first(limit, |e| e.user_id == Some(user_id))
            .await)
    }

    async fn find_by_email(&self, email: &str, limit: i64) -> StoreResult<Vec<LoginHistoryEntry>> {
        let email = email.to_lowercase();
        Ok(self.newest_first(limit, |e| e.email == email).await)
    }
}
