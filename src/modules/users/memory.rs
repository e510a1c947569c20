use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use financify_core::PaginationParams;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::model::{NewUser, UpdateUser, User};
use super::service::{UserError, UserStore, apply_update, new_record};

/// Lowest cost bcrypt accepts. Keeps hashing cheap in tests.
pub const TEST_HASH_COST: u32 = 4;

/// [`UserStore`] backed by a map, with the same email uniqueness rule as
/// the database.
#[derive(Debug)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
    hash_cost: u32,
    healthy: AtomicBool,
}

impl Default for InMemoryUserStore {
    fn default() -> Self {
        Self::with_cost(TEST_HASH_COST)
    }
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cost(hash_cost: u32) -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            hash_cost,
            healthy: AtomicBool::new(true),
        }
    }

    /// Makes [`UserStore::status_check`] fail, to exercise readiness.
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

fn email_taken(users: &HashMap<Uuid, User>, email: &str, except: Option<Uuid>) -> bool {
    users
        .values()
        .any(|u| u.email == email && Some(u.id) != except)
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn create(&self, new_user: NewUser, now: DateTime<Utc>) -> Result<User, UserError> {
        let user = new_record(new_user, self.hash_cost, now)?;

        let mut users = self.users.write().await;
        if email_taken(&users, &user.email, None) {
            return Err(anyhow!("duplicate key value violates unique constraint on email").into());
        }
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update(&self, id: Uuid, update: UpdateUser, now: DateTime<Utc>) -> Result<(), UserError> {
        let mut users = self.users.write().await;
        let mut user = users.get(&id).cloned().ok_or(UserError::NotFound)?;
        apply_update(&mut user, update, self.hash_cost, now)?;

        if email_taken(&users, &user.email, Some(id)) {
            return Err(anyhow!("duplicate key value violates unique constraint on email").into());
        }
        users.insert(id, user);
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), UserError> {
        self.users.write().await.remove(&id);
        Ok(())
    }

    async fn query(&self, page: &PaginationParams) -> Result<Vec<User>, UserError> {
        let users = self.users.read().await;
        let mut all: Vec<User> = users.values().cloned().collect();
        all.sort_by(|a, b| a.date_created.cmp(&b.date_created).then(a.id.cmp(&b.id)));

        Ok(all
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect())
    }

    async fn query_by_id(&self, id: Uuid) -> Result<User, UserError> {
        self.users
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(UserError::NotFound)
    }

    async fn query_by_email(&self, email: &str) -> Result<User, UserError> {
        self.users
            .read()
            .await
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or(UserError::NotFound)
    }

    async fn status_check(&self) -> Result<(), UserError> {
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(anyhow!("store unavailable").into())
        }
    }
}
