use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

use crate::models::{Card, UserInventory, UserProfile};
use crate::services::appwrite::AppwriteError;

/// Errors that abort loading inventories
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("Inventory backend unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Appwrite(#[from] AppwriteError),
}

/// Source of user profiles and card listings
#[async_trait]
pub trait InventoryProvider: Send + Sync {
    /// Profile for a user, `None` if the user has none
    async fn user_profile(&self, user_id: &str) -> Result<Option<UserProfile>, InventoryError>;

    /// Every card (trade and want) listed by a user
    async fn user_cards(&self, user_id: &str) -> Result<Vec<Card>, InventoryError>;

    /// Every other user with their profile and cards
    async fn other_users_with_cards(&self, excluding_user_id: &str) -> Result<Vec<UserInventory>, InventoryError>;

    /// Profile and cards of one user
    async fn user_inventory(&self, user_id: &str) -> Result<UserInventory, InventoryError> {
        let profile = self.user_profile(user_id).await?;
        let cards = self.user_cards(user_id).await?;

        Ok(UserInventory {
            user_id: user_id.to_string(),
            profile,
            cards,
        })
    }
}

/// Fixed inventory held in process memory
#[derive(Debug, Default)]
pub struct InMemoryInventory {
    users: HashMap<String, UserInventory>,
}

impl InMemoryInventory {
    pub fn with_users(users: impl IntoIterator<Item = UserInventory>) -> Self {
        let users = users
            .into_iter()
            .map(|inventory| (inventory.user_id.clone(), inventory))
            .collect();

        Self { users }
    }
}

#[async_trait]
impl InventoryProvider for InMemoryInventory {
    async fn user_profile(&self, user_id: &str) -> Result<Option<UserProfile>, InventoryError> {
        Ok(self.users.get(user_id).and_then(|u| u.profile.clone()))
    }

    async fn user_cards(&self, user_id: &str) -> Result<Vec<Card>, InventoryError> {
        Ok(self.users.get(user_id).map(|u| u.cards.clone()).unwrap_or_default())
    }

    async fn other_users_with_cards(&self, excluding_user_id: &str) -> Result<Vec<UserInventory>, InventoryError> {
        let mut others: Vec<UserInventory> = self
            .users
            .values()
            .filter(|u| u.user_id != excluding_user_id)
            .cloned()
            .collect();

        // HashMap order is random; keep runs reproducible
        others.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(others)
    }
}
