pub mod key;
pub mod store;
pub mod ttl;

pub use key::{derive_key, CacheKey, KeyRequest};
pub use store::{KeyValueStore, MemoryStore};
pub use ttl::{CacheEntry, EvictionHandle, TtlCache};
