use std::sync::{Arc, RwLock};

use thiserror::Error;

use super::types::IndexerDescriptor;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Indexer not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid indexer: {0}")]
    Invalid(String),
}

/// Source of indexer descriptors.
///
/// `list_enabled` is the only read performed by a search, and it returns an
/// owned snapshot: later mutations never reach an in-flight search.
pub trait IndexerStore: Send + Sync {
    /// All descriptors ordered by priority, then id.
    fn list(&self) -> Result<Vec<IndexerDescriptor>, RegistryError>;

    fn list_enabled(&self) -> Result<Vec<IndexerDescriptor>, RegistryError> {
        Ok(self.list()?.into_iter().filter(|d| d.enabled).collect())
    }

    fn get(&self, id: &str) -> Result<IndexerDescriptor, RegistryError>;

    /// Insert or replace by id.
    fn upsert(&self, descriptor: IndexerDescriptor) -> Result<(), RegistryError>;

    fn set_enabled(&self, id: &str, enabled: bool) -> Result<(), RegistryError>;

    fn set_priority(&self, id: &str, priority: i32) -> Result<(), RegistryError>;

    fn remove(&self, id: &str) -> Result<(), RegistryError>;
}

pub(crate) fn check_descriptor(descriptor: &IndexerDescriptor) -> Result<(), RegistryError> {
    if descriptor.id.trim().is_empty() {
        return Err(RegistryError::Invalid("id cannot be empty".to_string()));
    }
    if descriptor.effective_base_url().is_none() {
        return Err(RegistryError::Invalid(format!(
            "indexer '{}' has no base URL or mirror",
            descriptor.id
        )));
    }
    Ok(())
}

pub(crate) fn sort_descriptors(list: &mut [IndexerDescriptor]) {
    list.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));
}

/// In-memory registry with copy-on-write snapshots.
#[derive(Debug, Default)]
pub struct IndexerRegistry {
    current: RwLock<Arc<Vec<IndexerDescriptor>>>,
}

impl IndexerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_descriptors(
        descriptors: impl IntoIterator<Item = IndexerDescriptor>,
    ) -> Result<Self, RegistryError> {
        let registry = Self::new();
        for d in descriptors {
            registry.upsert(d)?;
        }
        Ok(registry)
    }

    /// Shared handle to the current list; cheap to take.
    pub fn snapshot(&self) -> Arc<Vec<IndexerDescriptor>> {
        Arc::clone(&self.current.read().unwrap())
    }

    fn modify<T>(
        &self,
        f: impl FnOnce(&mut Vec<IndexerDescriptor>) -> Result<T, RegistryError>,
    ) -> Result<T, RegistryError> {
        let mut guard = self.current.write().unwrap();
        let mut next = guard.as_ref().clone();
        let out = f(&mut next)?;
        sort_descriptors(&mut next);
        *guard = Arc::new(next);
        Ok(out)
    }

    fn modify_one(
        &self,
        id: &str,
        f: impl FnOnce(&mut IndexerDescriptor),
    ) -> Result<(), RegistryError> {
        self.modify(|list| {
            let d = list
                .iter_mut()
                .find(|d| d.id == id)
                .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
            f(d);
            Ok(())
        })
    }
}

impl IndexerStore for IndexerRegistry {
    fn list(&self) -> Result<Vec<IndexerDescriptor>, RegistryError> {
        Ok(self.snapshot().as_ref().clone())
    }

    fn get(&self, id: &str) -> Result<IndexerDescriptor, RegistryError> {
        self.snapshot()
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    fn upsert(&self, descriptor: IndexerDescriptor) -> Result<(), RegistryError> {
        check_descriptor(&descriptor)?;
        self.modify(|list| {
            list.retain(|d| d.id != descriptor.id);
            list.push(descriptor);
            Ok(())
        })
    }

    fn set_enabled(&self, id: &str, enabled: bool) -> Result<(), RegistryError> {
        self.modify_one(id, |d| d.enabled = enabled)
    }

    fn set_priority(&self, id: &str, priority: i32) -> Result<(), RegistryError> {
        self.modify_one(id, |d| d.priority = priority)
    }

    fn remove(&self, id: &str) -> Result<(), RegistryError> {
        self.modify(|list| {
            let before = list.len();
            list.retain(|d| d.id != id);
            if list.len() == before {
                return Err(RegistryError::NotFound(id.to_string()));
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::IndexerKind;

    fn descriptor(id: &str, priority: i32) -> IndexerDescriptor {
        let mut d = IndexerDescriptor::new(id, IndexerKind::Torznab, "http://localhost:9117");
        d.priority = priority;
        d
    }

    #[test]
    fn test_list_sorted_by_priority_then_id() {
        let registry = IndexerRegistry::from_descriptors(vec![
            descriptor("c", 10),
            descriptor("a", 25),
            descriptor("b", 10),
        ])
        .unwrap();
        let ids: Vec<_> = registry.list().unwrap().into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_list_enabled_filters() {
        let registry =
            IndexerRegistry::from_descriptors(vec![descriptor("a", 1), descriptor("b", 2)])
                .unwrap();
        registry.set_enabled("a", false).unwrap();
        let enabled = registry.list_enabled().unwrap();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].id, "b");
    }

    #[test]
    fn test_snapshot_unaffected_by_later_writes() {
        let registry = IndexerRegistry::from_descriptors(vec![descriptor("a", 1)]).unwrap();
        let snapshot = registry.snapshot();

        registry.set_priority("a", 99).unwrap();
        registry.upsert(descriptor("b", 2)).unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].priority, 1);
        assert_eq!(registry.get("a").unwrap().priority, 99);
    }

    #[test]
    fn test_upsert_replaces() {
        let registry = IndexerRegistry::new();
        registry.upsert(descriptor("a", 1)).unwrap();
        registry.upsert(descriptor("a", 7)).unwrap();
        assert_eq!(registry.list().unwrap().len(), 1);
        assert_eq!(registry.get("a").unwrap().priority, 7);
    }

    #[test]
    fn test_upsert_rejects_missing_url() {
        let registry = IndexerRegistry::new();
        let d = IndexerDescriptor::new("a", IndexerKind::Newznab, "");
        assert!(matches!(registry.upsert(d), Err(RegistryError::Invalid(_))));
    }

    #[test]
    fn test_missing_ids() {
        let registry = IndexerRegistry::new();
        assert!(matches!(registry.get("x"), Err(RegistryError::NotFound(_))));
        assert!(matches!(registry.set_enabled("x", true), Err(RegistryError::NotFound(_))));
        assert!(matches!(registry.remove("x"), Err(RegistryError::NotFound(_))));
    }
}
