//! In-memory geocell index.
//!
//! Every entity is tagged with the cells containing its location at all 13
//! resolutions, the same tagging a persistent store would keep alongside the
//! entity. Lookups by cell set then behave like the membership filter a
//! database query engine would run, which makes this index a working
//! [`QueryEngine`] for tests, demos and small datasets.

use crate::cell::{generate_geocells, is_valid};
use crate::error::{GeocellError, Result};
use crate::search::{GeocellQuery, Located, QueryEngine};
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};

/// Thread-safe map from keys to located entities, bucketed by geocell.
pub struct MemoryCellIndex<T> {
    inner: RwLock<IndexInner<T>>,
}

struct IndexInner<T> {
    entries: FxHashMap<String, IndexedEntity<T>>,
    /// Keys of the entities tagged with each geocell
    cells: FxHashMap<String, FxHashSet<String>>,
}

struct IndexedEntity<T> {
    entity_type: String,
    labels: Vec<String>,
    entity: T,
    geocells: Vec<String>,
}

impl<T> IndexedEntity<T> {
    fn matches(&self, query: &GeocellQuery) -> bool {
        (query.entity_type.is_empty() || query.entity_type == self.entity_type)
            && query.labels.iter().all(|l| self.labels.contains(l))
    }
}

/// Statistics about a [`MemoryCellIndex`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexStats {
    pub entities: usize,
    /// Distinct geocells with at least one entity
    pub cells: usize,
}

impl<T> IndexInner<T> {
    fn new() -> Self {
        Self {
            entries: FxHashMap::default(),
            cells: FxHashMap::default(),
        }
    }

    fn remove(&mut self, key: &str) -> Option<IndexedEntity<T>> {
        let removed = self.entries.remove(key)?;
        for cell in &removed.geocells {
            if let Some(bucket) = self.cells.get_mut(cell) {
                bucket.remove(key);
                if bucket.is_empty() {
                    self.cells.remove(cell);
                }
            }
        }
        Some(removed)
    }
}

impl<T: Located + Clone> MemoryCellIndex<T> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(IndexInner::new()),
        }
    }

    /// Insert or replace the entity stored under `key`.
    ///
    /// Returns the entity previously stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// [`GeocellError::InvalidInput`] if the entity's location is not a valid
    /// latitude/longitude.
    pub fn insert(
        &self,
        key: impl Into<String>,
        entity_type: impl Into<String>,
        entity: T,
        labels: Vec<String>,
    ) -> Result<Option<T>> {
        let key = key.into();
        let geocells = generate_geocells(&entity.location())?;

        let mut inner = self.inner.write();
        let previous = inner.remove(&key).map(|e| e.entity);
        for cell in &geocells {
            inner
                .cells
                .entry(cell.clone())
                .or_default()
                .insert(key.clone());
        }
        inner.entries.insert(
            key,
            IndexedEntity {
                entity_type: entity_type.into(),
                labels,
                entity,
                geocells,
            },
        );
        Ok(previous)
    }

    pub fn remove(&self, key: &str) -> Option<T> {
        self.inner.write().remove(key).map(|e| e.entity)
    }

    pub fn get(&self, key: &str) -> Option<T> {
        self.inner.read().entries.get(key).map(|e| e.entity.clone())
    }

    /// Geocells the entity under `key` is tagged with, coarsest first.
    pub fn geocells(&self, key: &str) -> Option<Vec<String>> {
        self.inner.read().entries.get(key).map(|e| e.geocells.clone())
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.entries.clear();
        inner.cells.clear();
    }

    pub fn stats(&self) -> IndexStats {
        let inner = self.inner.read();
        IndexStats {
            entities: inner.entries.len(),
            cells: inner.cells.len(),
        }
    }
}

impl<T: Located + Clone> Default for MemoryCellIndex<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Located + Clone> QueryEngine<T> for MemoryCellIndex<T> {
    fn query(&self, base_query: &GeocellQuery, cells: &[String]) -> Result<Vec<T>> {
        if let Some(bad) = cells.iter().find(|c| !is_valid(c)) {
            return Err(GeocellError::InvalidGeocell(bad.clone()));
        }

        let inner = self.inner.read();
        let mut seen: FxHashSet<&str> = FxHashSet::default();
        let mut found = Vec::new();

        for cell in cells {
            let Some(keys) = inner.cells.get(cell) else {
                continue;
            };
            for key in keys {
                if !seen.insert(key.as_str()) {
                    continue;
                }
                if let Some(indexed) = inner.entries.get(key) {
                    if indexed.matches(base_query) {
                        found.push(indexed.entity.clone());
                    }
                }
            }
        }

        log::trace!(
            "Index matched {} entities across {} cells",
            found.len(),
            cells.len()
        );
        Ok(found)
    }
}
