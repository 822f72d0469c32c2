//! Store implementations for the collaborator traits.

mod memory;
#[cfg(feature = "redis")]
mod redis;
mod sqlite;

pub use memory::MemoryExpiringStore;
#[cfg(feature = "redis")]
pub use self::redis::RedisExpiringStore;
pub use sqlite::SqliteFinanceStore;
