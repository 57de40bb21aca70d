use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

use crate::models::{Card, UserInventory, UserProfile};
use crate::services::inventory::{InventoryError, InventoryProvider};

/// Documents requested per page
const PAGE_SIZE: usize = 1000;

/// Errors that can occur when interacting with Appwrite
#[derive(Debug, Error)]
pub enum AppwriteError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error: {0}")]
    ApiError(String),

    #[error("Unauthorized: invalid API key or token")]
    Unauthorized,

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

/// Appwrite API client
///
/// Reads the marketplace's user profiles and card listings:
/// - Fetching a single profile
/// - Fetching a user's cards
/// - Loading every other user's profile and cards
pub struct AppwriteClient {
    base_url: String,
    api_key: String,
    project_id: String,
    database_id: String,
    client: Client,
    collections: AppwriteCollections,
    page_size: usize,
}

/// One page of a document listing
struct DocumentPage {
    total: Option<usize>,
    documents: Vec<Value>,
}

/// Collection IDs in Appwrite
#[derive(Debug, Clone)]
pub struct AppwriteCollections {
    pub user_profiles: String,
    pub cards: String,
}

impl AppwriteClient {
    /// Create a new Appwrite client
    pub fn new(
        base_url: String,
        api_key: String,
        project_id: String,
        database_id: String,
        collections: AppwriteCollections,
    ) -> Result<Self, AppwriteError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            base_url,
            api_key,
            project_id,
            database_id,
            client,
            collections,
            page_size: PAGE_SIZE,
        })
    }

    /// List every document of a collection matching the given queries
    ///
    /// Pages through the collection until the reported `total` is reached.
    /// Documents that fail to parse are skipped with a warning.
    async fn list_documents<T: DeserializeOwned>(
        &self,
        collection: &str,
        queries: Vec<String>,
    ) -> Result<Vec<T>, AppwriteError> {
        let mut parsed = Vec::new();
        let mut offset = 0;

        loop {
            let page = self.list_page(collection, &queries, offset).await?;
            let fetched = page.documents.len();
            offset += fetched;

            parsed.extend(page.documents.iter().filter_map(|doc| {
                let data = doc.get("data").unwrap_or(doc);
                match serde_json::from_value::<T>(data.clone()) {
                    Ok(value) => Some(value),
                    Err(e) => {
                        tracing::warn!(
                            "Skipping malformed {} document {}: {}",
                            collection,
                            doc.get("$id").and_then(|id| id.as_str()).unwrap_or("<unknown>"),
                            e
                        );
                        None
                    }
                }
            }));

            match page.total {
                Some(total) if offset >= total => break,
                Some(total) if fetched < self.page_size => {
                    tracing::warn!(
                        "Appwrite reported {} {} documents but only {} were returned",
                        total,
                        collection,
                        offset
                    );
                    break;
                }
                None if fetched < self.page_size => break,
                _ if fetched == 0 => break,
                _ => {}
            }
        }

        Ok(parsed)
    }

    /// Fetch one page of documents starting at `offset`
    async fn list_page(
        &self,
        collection: &str,
        queries: &[String],
        offset: usize,
    ) -> Result<DocumentPage, AppwriteError> {
        let url = format!(
            "{}/databases/{}/collections/{}/documents",
            self.base_url.trim_end_matches('/'),
            self.database_id,
            collection
        );
        let query_string = queries
            .iter()
            .cloned()
            .chain([format!("limit({})", self.page_size), format!("offset({})", offset)])
            .map(|q| format!("queries[]={}", urlencoding::encode(&q)))
            .collect::<Vec<_>>()
            .join("&");
        let full_url = format!("{}?{}", url, query_string);

        tracing::debug!("Listing {} documents from offset {}", collection, offset);

        let response = self
            .client
            .get(&full_url)
            .header("X-Appwrite-Key", &self.api_key)
            .header("X-Appwrite-Project", &self.project_id)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(AppwriteError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "Unable to read body".to_string());
            tracing::error!("Failed to list {}: {} - {}", collection, status, body);
            return Err(AppwriteError::ApiError(format!(
                "Failed to list {}: {}",
                collection, status
            )));
        }

        let mut json: Value = response.json().await?;

        let total = json.get("total").and_then(|t| t.as_u64()).map(|t| t as usize);
        let documents = match json.get_mut("documents").map(Value::take) {
            Some(Value::Array(documents)) => documents,
            _ => return Err(AppwriteError::InvalidResponse("Missing documents array".into())),
        };

        Ok(DocumentPage { total, documents })
    }

    /// Get a single profile by user ID
    pub async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>, AppwriteError> {
        let profiles: Vec<UserProfile> = self
            .list_documents(
                &self.collections.user_profiles,
                vec![format!("equal(\"userId\", [\"{}\"])", user_id)],
            )
            .await?;

        Ok(profiles.into_iter().next())
    }

    /// Get every card a user has listed
    pub async fn get_cards(&self, user_id: &str) -> Result<Vec<Card>, AppwriteError> {
        self.list_documents(
            &self.collections.cards,
            vec![format!("equal(\"ownerId\", [\"{}\"])", user_id)],
        )
        .await
    }

    /// Load every other user's profile and cards, grouped by owner
    pub async fn get_other_inventories(&self, user_id: &str) -> Result<Vec<UserInventory>, AppwriteError> {
        let exclude = format!("notEqual(\"userId\", [\"{}\"])", user_id);
        let profiles: Vec<UserProfile> = self
            .list_documents(&self.collections.user_profiles, vec![exclude])
            .await?;
        let cards: Vec<Card> = self
            .list_documents(
                &self.collections.cards,
                vec![format!("notEqual(\"ownerId\", [\"{}\"])", user_id)],
            )
            .await?;

        // BTreeMap keeps owners in a stable order between runs
        let mut inventories: BTreeMap<String, UserInventory> = BTreeMap::new();
        for profile in profiles {
            inventories.insert(
                profile.user_id.clone(),
                UserInventory {
                    user_id: profile.user_id.clone(),
                    profile: Some(profile),
                    cards: Vec::new(),
                },
            );
        }
        for card in cards {
            inventories
                .entry(card.owner_id.clone())
                .or_insert_with(|| UserInventory {
                    user_id: card.owner_id.clone(),
                    profile: None,
                    cards: Vec::new(),
                })
                .cards
                .push(card);
        }

        tracing::debug!("Loaded {} counterparty inventories", inventories.len());

        Ok(inventories.into_values().collect())
    }
}

#[async_trait]
impl InventoryProvider for AppwriteClient {
    async fn user_profile(&self, user_id: &str) -> Result<Option<UserProfile>, InventoryError> {
        Ok(self.get_profile(user_id).await?)
    }

    async fn user_cards(&self, user_id: &str) -> Result<Vec<Card>, InventoryError> {
        Ok(self.get_cards(user_id).await?)
    }

    async fn other_users_with_cards(&self, excluding_user_id: &str) -> Result<Vec<UserInventory>, InventoryError> {
        Ok(self.get_other_inventories(excluding_user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(url: String) -> AppwriteClient {
        let collections = AppwriteCollections {
            user_profiles: "user_profiles".to_string(),
            cards: "cards".to_string(),
        };

        AppwriteClient::new(url, "test_key".to_string(), "test_project".to_string(), "test_db".to_string(), collections)
            .unwrap()
    }

    #[test]
    fn test_appwrite_client_creation() {
        let client = client("https://appwrite.test/v1".to_string());

        assert_eq!(client.base_url, "https://appwrite.test/v1");
        assert_eq!(client.api_key, "test_key");
    }

    #[tokio::test]
    async fn test_other_inventories_grouped_by_owner() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", mockito::Matcher::Regex(r"collections/user_profiles/documents".to_string()))
            .with_status(200)
            .with_body(r#"{"total":1,"documents":[{"$id":"p1","userId":"bob","displayName":"Bob","totalTrades":12}]}"#)
            .create_async()
            .await;
        server
            .mock("GET", mockito::Matcher::Regex(r"collections/cards/documents".to_string()))
            .with_status(200)
            .with_body(
                r#"{"total":3,"documents":[
                    {"$id":"c1","ownerId":"bob","name":"Charizard","listType":"trade","marketPrice":25},
                    {"$id":"c2","ownerId":"carol","name":"Pikachu","listType":"want"},
                    {"$id":"c3","ownerId":"bob","name":"Broken","listType":"sideways"}
                ]}"#,
            )
            .create_async()
            .await;

        let inventories = client(server.url()).get_other_inventories("alice").await.unwrap();

        assert_eq!(inventories.len(), 2);
        assert_eq!(inventories[0].user_id, "bob");
        assert_eq!(inventories[0].cards.len(), 1);
        assert_eq!(inventories[0].profile.as_ref().map(|p| p.total_trades), Some(12));
        assert_eq!(inventories[1].user_id, "carol");
        assert!(inventories[1].profile.is_none());
    }

    #[tokio::test]
    async fn test_want_card_without_price_is_kept() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", mockito::Matcher::Regex(r"collections/cards/documents".to_string()))
            .with_status(200)
            .with_body(
                r#"{"total":2,"documents":[
                    {"$id":"w1","ownerId":"alice","name":"Mewtwo","listType":"want","marketPrice":null,"setName":null,"condition":null,"quantity":null},
                    {"$id":"t1","ownerId":"alice","name":"Pikachu","listType":"trade","marketPrice":20,"setName":"Jungle"}
                ]}"#,
            )
            .create_async()
            .await;

        let cards = client(server.url()).get_cards("alice").await.unwrap();

        let ids: Vec<&str> = cards.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["w1", "t1"]);
        assert_eq!(cards[0].market_price, 0.0);
        assert_eq!(cards[0].set_name, "");
    }

    #[tokio::test]
    async fn test_listing_follows_pages_until_total() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", mockito::Matcher::Regex(r"collections/user_profiles/documents".to_string()))
            .with_status(200)
            .with_body(r#"{"total":0,"documents":[]}"#)
            .create_async()
            .await;
        let first = server
            .mock("GET", mockito::Matcher::Regex(r"collections/cards/documents.*offset%280%29".to_string()))
            .with_status(200)
            .with_body(
                r#"{"total":3,"documents":[
                    {"$id":"c1","ownerId":"bob","name":"Charizard","listType":"trade"},
                    {"$id":"c2","ownerId":"bob","name":"Pikachu","listType":"want"}
                ]}"#,
            )
            .expect(1)
            .create_async()
            .await;
        let second = server
            .mock("GET", mockito::Matcher::Regex(r"collections/cards/documents.*offset%282%29".to_string()))
            .with_status(200)
            .with_body(r#"{"total":3,"documents":[{"$id":"c3","ownerId":"carol","name":"Mewtwo","listType":"trade"}]}"#)
            .expect(1)
            .create_async()
            .await;

        let mut client = client(server.url());
        client.page_size = 2;
        let inventories = client.get_other_inventories("alice").await.unwrap();

        first.assert_async().await;
        second.assert_async().await;
        assert_eq!(inventories.len(), 2);
        assert_eq!(inventories[0].cards.len(), 2);
        assert_eq!(inventories[1].user_id, "carol");
    }

    #[tokio::test]
    async fn test_short_page_ends_listing() {
        let mut server = mockito::Server::new_async().await;
        let listing = server
            .mock("GET", mockito::Matcher::Regex(r"collections/cards/documents".to_string()))
            .with_status(200)
            .with_body(r#"{"total":9000,"documents":[{"$id":"c1","ownerId":"alice","name":"Charizard","listType":"trade"}]}"#)
            .expect(1)
            .create_async()
            .await;

        let cards = client(server.url()).get_cards("alice").await.unwrap();

        listing.assert_async().await;
        assert_eq!(cards.len(), 1);
    }

    #[tokio::test]
    async fn test_unauthorized_is_reported() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", mockito::Matcher::Any)
            .with_status(401)
            .create_async()
            .await;

        let err = client(server.url()).get_cards("alice").await.unwrap_err();
        assert!(matches!(err, AppwriteError::Unauthorized));
    }
}
