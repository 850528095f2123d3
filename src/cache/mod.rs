// Cache management module
// Author: kelexine (https://github.com/kelexine)

pub mod key;
pub mod manager;
pub mod models;
pub mod store;

pub use key::CacheKey;
pub use manager::TtlCache;
pub use models::{CacheEntry, CacheOptions, CacheStats};
pub use store::{CacheStore, JsonFileStore, PersistedEntry};
