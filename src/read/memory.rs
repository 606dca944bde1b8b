use crate::entity::Entity;
use crate::errors::EventError;
use crate::read::{Getter, Writer};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// A simple in-memory read store that can be used for testing or simple applications.
///
/// Writes are serialized by a single lock, so conflicting writes to the same id are applied
/// one at a time.
#[derive(Debug, Clone)]
pub struct InMemoryReadStore<E: Entity> {
    entities: Arc<Mutex<BTreeMap<String, E>>>,
}

impl<E: Entity> InMemoryReadStore<E> {
    /// Creates a new in-memory read store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entities: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    fn entities(&self) -> MutexGuard<'_, BTreeMap<String, E>> {
        self.entities.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Gets all entities in the store, keyed by id.
    pub fn get_all(&self) -> BTreeMap<String, E> {
        self.entities().clone()
    }

    pub fn len(&self) -> usize {
        self.entities().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities().is_empty()
    }

    /// Clears all entities from the store.
    pub fn clear(&self) {
        self.entities().clear();
    }
}

impl<E: Entity> Default for InMemoryReadStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl<E: Entity> Writer<E> for InMemoryReadStore<E> {
    async fn create(&self, entity: E) -> Result<(), EventError> {
        let mut entities = self.entities();
        if entities.contains_key(entity.id()) {
            return Err(EventError::storage(format!(
                "{} {} already exists",
                E::NOUN,
                entity.id()
            )));
        }
        debug!(id = entity.id(), "Entity created");
        entities.insert(entity.id().to_string(), entity);
        Ok(())
    }

    async fn update(&self, entity: E) -> Result<(), EventError> {
        let mut entities = self.entities();
        match entities.get_mut(entity.id()) {
            Some(current) => {
                debug!(id = entity.id(), "Entity updated");
                *current = entity;
                Ok(())
            }
            None => Err(EventError::storage(format!(
                "{} {} not found",
                E::NOUN,
                entity.id()
            ))),
        }
    }

    async fn delete(&self, id: &str) -> Result<(), EventError> {
        if self.entities().remove(id).is_some() {
            debug!(id, "Entity deleted");
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl<E: Entity> Getter<E> for InMemoryReadStore<E> {
    async fn get(&self, id: &str) -> Result<Option<E>, EventError> {
        Ok(self.entities().get(id).cloned())
    }

    async fn get_multiple(&self, offset: usize, limit: usize) -> Result<Vec<E>, EventError> {
        Ok(self
            .entities()
            .values()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }
}
