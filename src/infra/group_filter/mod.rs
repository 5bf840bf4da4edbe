// Implementations for the group filter store.

pub mod sqlite_group_store;

pub use sqlite_group_store::SqliteGroupStore;
