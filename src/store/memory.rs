use super::{IdAllocator, VehicleStore, add_unique, remove_all};
use crate::engine::model::{CharacterId, NewVehicle, VehicleId, VehicleRecord, Vec3};
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::{Mutex, RwLock};

/// In-memory vehicles collection.
#[derive(Debug, Default)]
pub struct MemoryStore {
    vehicles: RwLock<HashMap<VehicleId, VehicleRecord>>,
    counters: Mutex<HashMap<String, u64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn mutate_keys<F>(&self, id: VehicleId, f: F) -> AppResult<Vec<CharacterId>>
    where
        F: FnOnce(&mut Vec<CharacterId>) + Send,
    {
        let mut vehicles = self.vehicles.write().await;
        let record = vehicles
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("vehicle {id}")))?;
        f(&mut record.key_holder_ids);
        Ok(record.key_holder_ids.clone())
    }
}

#[async_trait]
impl VehicleStore for MemoryStore {
    async fn create(
        &self,
        vehicle: NewVehicle,
        uid: u64,
        plate: String,
    ) -> AppResult<VehicleRecord> {
        let record = vehicle.into_record(VehicleId::new(), uid, plate);
        self.vehicles.write().await.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get(&self, id: VehicleId) -> AppResult<Option<VehicleRecord>> {
        Ok(self.vehicles.read().await.get(&id).cloned())
    }

    async fn accessible_to(&self, character: &CharacterId) -> AppResult<Vec<VehicleRecord>> {
        let vehicles = self.vehicles.read().await;
        let mut found: Vec<_> = vehicles
            .values()
            .filter(|r| r.owner_id == *character || r.key_holder_ids.contains(character))
            .cloned()
            .collect();
        found.sort_by_key(|r| r.uid);
        Ok(found)
    }

    async fn plate_exists(&self, plate: &str) -> AppResult<bool> {
        Ok(self.vehicles.read().await.values().any(|r| r.plate == plate))
    }

    async fn update_placement(
        &self,
        id: VehicleId,
        position: Vec3,
        rotation: Vec3,
    ) -> AppResult<()> {
        let mut vehicles = self.vehicles.write().await;
        let record = vehicles
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("vehicle {id}")))?;
        record.position = position;
        record.rotation = rotation;
        Ok(())
    }

    async fn add_key_holder(
        &self,
        id: VehicleId,
        character: &CharacterId,
    ) -> AppResult<Vec<CharacterId>> {
        self.mutate_keys(id, |keys| add_unique(keys, character)).await
    }

    async fn remove_key_holder(
        &self,
        id: VehicleId,
        character: &CharacterId,
    ) -> AppResult<Vec<CharacterId>> {
        self.mutate_keys(id, |keys| remove_all(keys, character)).await
    }

    async fn destroy(&self, id: VehicleId) -> AppResult<bool> {
        Ok(self.vehicles.write().await.remove(&id).is_some())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[async_trait]
impl IdAllocator for MemoryStore {
    async fn next_id(&self, collection: &str) -> AppResult<u64> {
        let mut counters = self.counters.lock().await;
        let next = counters.entry(collection.to_string()).or_insert(0);
        *next += 1;
        Ok(*next)
    }
}
