// Service exports
pub mod appwrite;
pub mod cache;
pub mod inventory;
pub mod postgres;
pub mod pricing;
pub mod store;

pub use appwrite::{AppwriteClient, AppwriteCollections, AppwriteError};
pub use cache::{CacheError, CacheKey, CacheManager};
pub use inventory::{InMemoryInventory, InventoryError, InventoryProvider};
pub use postgres::{PostgresClient, PostgresError};
pub use pricing::{CachedPricingOracle, DisabledPricing, FixedPriceOracle, PokemonTcgClient};
pub use store::{InMemoryMatchStore, MatchStore, StoreError};
