use crate::entity::Entity;
use crate::errors::EventError;

/// Write side of a store holding entities of type `E`.
///
/// Implementations must tolerate concurrent calls for distinct ids. If they do not serialize
/// conflicting writes to the same id themselves, that discipline belongs here, at the store
/// boundary.
#[async_trait::async_trait]
pub trait Writer<E: Entity>: Send + Sync {
    async fn create(&self, entity: E) -> Result<(), EventError>;
    async fn update(&self, entity: E) -> Result<(), EventError>;
    async fn delete(&self, id: &str) -> Result<(), EventError>;
}

/// Query side of a store holding entities of type `E`.
#[async_trait::async_trait]
pub trait Getter<E: Entity>: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<E>, EventError>;

    /// Gets up to `limit` entities ordered by id, skipping the first `offset`.
    async fn get_multiple(&self, offset: usize, limit: usize) -> Result<Vec<E>, EventError>;
}

#[async_trait::async_trait]
impl<E: Entity, W: Writer<E> + ?Sized> Writer<E> for std::sync::Arc<W> {
    async fn create(&self, entity: E) -> Result<(), EventError> {
        (**self).create(entity).await
    }

    async fn update(&self, entity: E) -> Result<(), EventError> {
        (**self).update(entity).await
    }

    async fn delete(&self, id: &str) -> Result<(), EventError> {
        (**self).delete(id).await
    }
}
