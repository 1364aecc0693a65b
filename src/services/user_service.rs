// src/services/user_service.rs
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::{
    errors::{DispatchError as AppError, DispatchResult},
    models::user::UserProfile,
};

/// User directory collaborator: requester and driver accounts with their
/// push tokens and running ratings.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_user(&self, user_id: &str) -> DispatchResult<Option<UserProfile>>;
    async fn update_rating(&self, user_id: &str, rating: f64, count: u32) -> DispatchResult<()>;
}

/// In-memory directory for development and testing.
#[derive(Default)]
pub struct MemoryUserDirectory {
    users: RwLock<HashMap<String, UserProfile>>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, profile: UserProfile) {
        self.users.write().await.insert(profile.id.clone(), profile);
    }

    pub async fn remove(&self, user_id: &str) {
        self.users.write().await.remove(user_id);
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn get_user(&self, user_id: &str) -> DispatchResult<Option<UserProfile>> {
        Ok(self.users.read().await.get(user_id).cloned())
    }

    async fn update_rating(&self, user_id: &str, rating: f64, count: u32) -> DispatchResult<()> {
        let mut users = self.users.write().await;
        let profile = users
            .get_mut(user_id)
            .ok_or_else(|| AppError::user_not_found(user_id))?;
        profile.rating = rating;
        profile.rating_count = count;
        Ok(())
    }
}
