//! One live entity per vehicle document.
//!
//! The binder keeps a side table from document id to entity handle, plus a
//! snapshot of the bound document keyed by handle. Documents never point at
//! entities. Every mutation here is synchronous and is expected to run under
//! the same lock as the [`World`] it touches, so checking for an existing
//! entity and creating one cannot interleave with another bind.
//!
//! Removal marks a document as retiring before its delete is awaited. A
//! retiring document cannot be bound, so a spawn racing the delete cannot
//! leave an entity behind for a record that is gone.

use crate::engine::model::{VehicleId, VehicleRecord, Vec3};
use crate::engine::world::{EntityHandle, World};
use crate::error::{AppError, AppResult};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindOutcome {
    Spawned(EntityHandle),
    Despawned(EntityHandle),
    /// Bound already and no toggle was requested.
    Unchanged(EntityHandle),
}

#[derive(Debug, Default)]
pub struct EntityBinder {
    entities: HashMap<VehicleId, EntityHandle>,
    records: HashMap<EntityHandle, VehicleRecord>,
    retiring: HashSet<VehicleId>,
}

impl EntityBinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn the record's entity if none is bound; otherwise despawn it when
    /// `toggle` is set. Retiring records are reported as not found.
    pub fn bind(
        &mut self,
        world: &mut World,
        record: &VehicleRecord,
        toggle: bool,
    ) -> AppResult<BindOutcome> {
        if self.retiring.contains(&record.id) {
            return Err(AppError::NotFound(format!("vehicle {} is being removed", record.id)));
        }
        match self.resolve(world, record.id)? {
            None => {
                let handle = world.spawn_vehicle(
                    &record.model,
                    record.position,
                    record.rotation,
                    record.dimension,
                )?;
                if let Some(vehicle) = world.vehicle_mut(handle) {
                    vehicle.apply_state_props(&record.state_props);
                }
                self.entities.insert(record.id, handle);
                self.records.insert(handle, record.clone());
                info!(
                    vehicle = %record.id,
                    entity = %handle,
                    model = %record.model,
                    "Vehicle spawned"
                );
                Ok(BindOutcome::Spawned(handle))
            }
            Some(handle) if toggle => {
                self.release(world, record.id, handle);
                Ok(BindOutcome::Despawned(handle))
            }
            Some(handle) => Ok(BindOutcome::Unchanged(handle)),
        }
    }

    /// Destroy the entity bound to `id`, if any.
    pub fn unbind(&mut self, world: &mut World, id: VehicleId) -> AppResult<Option<EntityHandle>> {
        let handle = self.resolve(world, id)?;
        if let Some(handle) = handle {
            self.release(world, id, handle);
        }
        Ok(handle)
    }

    /// Mark `id` as retiring and destroy its entity. Until
    /// [`finish_removal`](Self::finish_removal) or
    /// [`abort_removal`](Self::abort_removal) the record cannot be bound.
    pub fn begin_removal(
        &mut self,
        world: &mut World,
        id: VehicleId,
    ) -> AppResult<Option<EntityHandle>> {
        let handle = self.unbind(world, id)?;
        self.retiring.insert(id);
        Ok(handle)
    }

    /// The document is deleted: drop anything still bound and the mark.
    pub fn finish_removal(
        &mut self,
        world: &mut World,
        id: VehicleId,
    ) -> AppResult<Option<EntityHandle>> {
        self.retiring.remove(&id);
        self.unbind(world, id)
    }

    /// The delete failed; the record may be bound again.
    pub fn abort_removal(&mut self, id: VehicleId) {
        self.retiring.remove(&id);
    }

    pub fn is_retiring(&self, id: VehicleId) -> bool {
        self.retiring.contains(&id)
    }

    /// The entity bound to `id`. Bindings whose entity the world no longer
    /// has are dropped on the way.
    pub fn resolve(&mut self, world: &World, id: VehicleId) -> AppResult<Option<EntityHandle>> {
        let bound = self.records.values().filter(|r| r.id == id).count();
        if bound > 1 {
            return Err(AppError::BindConflict {
                vehicle: id.to_string(),
                count: bound,
            });
        }
        match self.entities.get(&id).copied() {
            Some(handle) if world.vehicle(handle).is_some() => Ok(Some(handle)),
            Some(handle) => {
                debug!(vehicle = %id, entity = %handle, "Dropping binding to vanished entity");
                self.entities.remove(&id);
                self.records.remove(&handle);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Snapshot of the document bound to an entity. `None` means the entity
    /// is not a registry vehicle.
    pub fn record_for(&self, handle: EntityHandle) -> Option<&VehicleRecord> {
        self.records.get(&handle)
    }

    pub fn is_bound(&self, handle: EntityHandle) -> bool {
        self.records.contains_key(&handle)
    }

    pub fn bound_count(&self) -> usize {
        self.entities.len()
    }

    /// Replace the snapshot of a bound document after it was persisted.
    pub fn refresh(&mut self, record: &VehicleRecord) {
        if let Some(handle) = self.entities.get(&record.id)
            && let Some(snapshot) = self.records.get_mut(handle)
        {
            *snapshot = record.clone();
        }
    }

    pub fn refresh_placement(&mut self, id: VehicleId, position: Vec3, rotation: Vec3) {
        if let Some(handle) = self.entities.get(&id)
            && let Some(snapshot) = self.records.get_mut(handle)
        {
            snapshot.position = position;
            snapshot.rotation = rotation;
        }
    }

    fn release(&mut self, world: &mut World, id: VehicleId, handle: EntityHandle) {
        world.destroy_vehicle(handle);
        self.entities.remove(&id);
        self.records.remove(&handle);
        info!(vehicle = %id, entity = %handle, "Vehicle despawned");
    }

    #[cfg(test)]
    pub(crate) fn force_bind(&mut self, handle: EntityHandle, record: VehicleRecord) {
        self.entities.insert(record.id, handle);
        self.records.insert(handle, record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::model::sample_record;
    use crate::engine::world::LockState;
    use serde_json::json;

    #[test]
    fn toggle_creates_destroys_and_recreates_exactly_one_entity() {
        let mut world = World::default();
        let mut binder = EntityBinder::new();
        let record = sample_record("charA");

        let first = binder.bind(&mut world, &record, true).unwrap();
        assert!(matches!(first, BindOutcome::Spawned(_)));
        assert_eq!(world.vehicle_count(), 1);

        let second = binder.bind(&mut world, &record, true).unwrap();
        assert!(matches!(second, BindOutcome::Despawned(_)));
        assert_eq!(world.vehicle_count(), 0);
        assert_eq!(binder.bound_count(), 0);

        let third = binder.bind(&mut world, &record, true).unwrap();
        assert!(matches!(third, BindOutcome::Spawned(_)));
        assert_eq!(world.vehicle_count(), 1);
        assert_eq!(binder.bound_count(), 1);
    }

    #[test]
    fn bind_without_toggle_is_idempotent() {
        let mut world = World::default();
        let mut binder = EntityBinder::new();
        let record = sample_record("charA");

        let BindOutcome::Spawned(handle) = binder.bind(&mut world, &record, false).unwrap() else {
            panic!("expected a spawn");
        };
        assert_eq!(
            binder.bind(&mut world, &record, false).unwrap(),
            BindOutcome::Unchanged(handle)
        );
        assert_eq!(world.vehicle_count(), 1);
    }

    #[test]
    fn spawned_entity_takes_record_placement_and_state() {
        let mut world = World::default();
        let mut binder = EntityBinder::new();
        let mut record = sample_record("charA");
        record.position = Vec3::new(5.0, 6.0, 7.0);
        record.dimension = 3;
        record.state_props = json!({ "lockState": "unlocked" }).as_object().cloned().unwrap();

        let BindOutcome::Spawned(handle) = binder.bind(&mut world, &record, true).unwrap() else {
            panic!("expected a spawn");
        };
        let vehicle = world.vehicle(handle).unwrap();
        assert_eq!(vehicle.position, record.position);
        assert_eq!(vehicle.dimension, 3);
        assert_eq!(vehicle.model, "sultan");
        assert_eq!(vehicle.lock_state, LockState::Unlocked);
        assert_eq!(binder.record_for(handle), Some(&record));
    }

    #[test]
    fn invalid_model_leaves_no_binding() {
        let mut world = World::new(vec!["comet".to_string()]);
        let mut binder = EntityBinder::new();
        let record = sample_record("charA");

        let err = binder.bind(&mut world, &record, true).unwrap_err();
        assert!(matches!(err, AppError::InvalidModel(_)));
        assert_eq!(binder.bound_count(), 0);
        assert_eq!(world.vehicle_count(), 0);
    }

    #[test]
    fn duplicate_binding_is_reported_as_conflict() {
        let mut world = World::default();
        let mut binder = EntityBinder::new();
        let record = sample_record("charA");
        binder.bind(&mut world, &record, true).unwrap();

        let rogue = world
            .spawn_vehicle("sultan", Vec3::ZERO, Vec3::ZERO, 0)
            .unwrap();
        binder.force_bind(rogue, record.clone());

        let err = binder.bind(&mut world, &record, true).unwrap_err();
        assert!(matches!(err, AppError::BindConflict { count: 2, .. }));
    }

    #[test]
    fn vanished_entities_are_rebound() {
        let mut world = World::default();
        let mut binder = EntityBinder::new();
        let record = sample_record("charA");
        let BindOutcome::Spawned(handle) = binder.bind(&mut world, &record, true).unwrap() else {
            panic!("expected a spawn");
        };

        world.destroy_vehicle(handle);
        assert!(matches!(
            binder.bind(&mut world, &record, true).unwrap(),
            BindOutcome::Spawned(_)
        ));
        assert_eq!(binder.bound_count(), 1);
    }

    #[test]
    fn retiring_records_cannot_be_bound_until_released() {
        let mut world = World::default();
        let mut binder = EntityBinder::new();
        let record = sample_record("charA");
        let BindOutcome::Spawned(handle) = binder.bind(&mut world, &record, true).unwrap() else {
            panic!("expected a spawn");
        };

        assert_eq!(binder.begin_removal(&mut world, record.id).unwrap(), Some(handle));
        assert!(binder.is_retiring(record.id));
        assert_eq!(world.vehicle_count(), 0);
        assert!(matches!(
            binder.bind(&mut world, &record, true),
            Err(AppError::NotFound(_))
        ));
        assert_eq!(world.vehicle_count(), 0);

        binder.abort_removal(record.id);
        assert!(matches!(
            binder.bind(&mut world, &record, true).unwrap(),
            BindOutcome::Spawned(_)
        ));

        binder.begin_removal(&mut world, record.id).unwrap();
        assert_eq!(binder.finish_removal(&mut world, record.id).unwrap(), None);
        assert!(!binder.is_retiring(record.id));
        assert_eq!(binder.bound_count(), 0);
    }

    #[test]
    fn unbind_and_refresh() {
        let mut world = World::default();
        let mut binder = EntityBinder::new();
        let mut record = sample_record("charA");
        let BindOutcome::Spawned(handle) = binder.bind(&mut world, &record, true).unwrap() else {
            panic!("expected a spawn");
        };

        record.key_holder_ids.push(crate::engine::model::CharacterId::new("charB"));
        binder.refresh(&record);
        assert_eq!(binder.record_for(handle).unwrap().key_holder_ids.len(), 1);

        let moved = Vec3::new(1.0, 1.0, 1.0);
        binder.refresh_placement(record.id, moved, Vec3::ZERO);
        assert_eq!(binder.record_for(handle).unwrap().position, moved);

        assert_eq!(binder.unbind(&mut world, record.id).unwrap(), Some(handle));
        assert_eq!(binder.unbind(&mut world, record.id).unwrap(), None);
        assert!(!binder.is_bound(handle));
        assert_eq!(world.vehicle_count(), 0);
    }
}
