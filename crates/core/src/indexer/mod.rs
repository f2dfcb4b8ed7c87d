//! Indexer descriptors, canonical categories and the registry that holds them.

mod categories;
mod registry;
mod sqlite;
mod types;

pub use categories::{categories_match, CategoryId, CategoryMap, STANDARD_CATEGORIES};
pub use registry::{IndexerRegistry, IndexerStore, RegistryError};
pub use sqlite::SqliteIndexerStore;
pub use types::*;
