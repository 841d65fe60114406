//! Persistence for vehicle documents.
//!
//! - **VehicleStore**: the vehicles collection
//! - **IdAllocator**: per-collection sequential counters
//! - **MemoryStore**: in-process backend for tests and throwaway servers
//! - **SqliteStore**: JSON documents in a SQLite table

use crate::engine::model::{CharacterId, NewVehicle, VehicleId, VehicleRecord, Vec3};
use crate::error::AppResult;
use async_trait::async_trait;

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Collection name used when none is configured.
pub const DEFAULT_COLLECTION: &str = "vehicles";

/// The vehicles collection.
///
/// Key-holder mutations are field-level and atomic per record: concurrent
/// grants against the same vehicle never overwrite each other.
#[async_trait]
pub trait VehicleStore: Send + Sync {
    /// Persist a new document. The store mints the document id.
    async fn create(
        &self,
        vehicle: NewVehicle,
        uid: u64,
        plate: String,
    ) -> AppResult<VehicleRecord>;

    async fn get(&self, id: VehicleId) -> AppResult<Option<VehicleRecord>>;

    /// Every vehicle the character owns or holds a key to, ordered by uid.
    async fn accessible_to(&self, character: &CharacterId) -> AppResult<Vec<VehicleRecord>>;

    async fn plate_exists(&self, plate: &str) -> AppResult<bool>;

    /// Merge a new position and rotation into the stored document.
    async fn update_placement(
        &self,
        id: VehicleId,
        position: Vec3,
        rotation: Vec3,
    ) -> AppResult<()>;

    /// Add a key holder unless already present. Returns the stored list.
    async fn add_key_holder(
        &self,
        id: VehicleId,
        character: &CharacterId,
    ) -> AppResult<Vec<CharacterId>>;

    /// Remove every occurrence of a key holder. Returns the stored list.
    async fn remove_key_holder(
        &self,
        id: VehicleId,
        character: &CharacterId,
    ) -> AppResult<Vec<CharacterId>>;

    /// Delete a document. Returns `false` when it did not exist.
    async fn destroy(&self, id: VehicleId) -> AppResult<bool>;

    /// Store name for logging
    fn name(&self) -> &str;
}

/// Monotonic per-collection counters.
#[async_trait]
pub trait IdAllocator: Send + Sync {
    async fn next_id(&self, collection: &str) -> AppResult<u64>;
}

pub(crate) fn add_unique(keys: &mut Vec<CharacterId>, character: &CharacterId) {
    if !keys.contains(character) {
        keys.push(character.clone());
    }
}

pub(crate) fn remove_all(keys: &mut Vec<CharacterId>, character: &CharacterId) {
    keys.retain(|k| k != character);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_unique_skips_existing_holder() {
        let a = CharacterId::new("a");
        let mut keys = vec![a.clone()];
        add_unique(&mut keys, &a);
        add_unique(&mut keys, &CharacterId::new("b"));
        assert_eq!(keys, vec![a, CharacterId::new("b")]);
    }

    #[test]
    fn remove_all_drops_legacy_duplicates() {
        let a = CharacterId::new("a");
        let b = CharacterId::new("b");
        let mut keys = vec![a.clone(), b.clone(), a.clone()];
        remove_all(&mut keys, &a);
        assert_eq!(keys, vec![b]);
    }
}
