//! The live world: spawned vehicle entities and connected player states.
//!
//! Vehicles live in a generational arena. An [`EntityHandle`] is an index
//! plus the generation of the slot it was issued for, so a handle to a
//! destroyed vehicle never resolves to whatever later reuses the slot.

use crate::engine::model::{Dimension, PlayerId, StateProps, Vec3};
use crate::error::{AppError, AppResult};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Doors addressable by players, indices `0..DOOR_COUNT`.
pub const DOOR_COUNT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityHandle {
    index: u32,
    generation: u32,
}

impl fmt::Display for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Unlocked,
    Locked,
}

impl LockState {
    pub fn toggled(self) -> Self {
        match self {
            Self::Unlocked => Self::Locked,
            Self::Locked => Self::Unlocked,
        }
    }

    /// Accepts `"locked"`/`"unlocked"` as well as the numeric lock codes
    /// older documents carry (1 = unlocked, 2 = locked).
    fn from_prop(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if s.eq_ignore_ascii_case("locked") => Some(Self::Locked),
            Value::String(s) if s.eq_ignore_ascii_case("unlocked") => Some(Self::Unlocked),
            Value::Bool(locked) => Some(if *locked { Self::Locked } else { Self::Unlocked }),
            Value::Number(n) => match n.as_u64()? {
                1 => Some(Self::Unlocked),
                2 => Some(Self::Locked),
                _ => None,
            },
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoorState {
    Closed,
    Open,
}

impl DoorState {
    pub fn toggled(self) -> Self {
        match self {
            Self::Closed => Self::Open,
            Self::Open => Self::Closed,
        }
    }

    fn from_prop(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(open) => Some(if *open { Self::Open } else { Self::Closed }),
            Value::Number(n) => Some(if n.as_f64()? == 0.0 { Self::Closed } else { Self::Open }),
            Value::String(s) if s.eq_ignore_ascii_case("open") => Some(Self::Open),
            Value::String(s) if s.eq_ignore_ascii_case("closed") => Some(Self::Closed),
            _ => None,
        }
    }
}

/// A vehicle instantiated in the world.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveVehicle {
    pub model: String,
    pub position: Vec3,
    pub rotation: Vec3,
    pub dimension: Dimension,
    pub lock_state: LockState,
    pub engine_on: bool,
    pub doors: [DoorState; DOOR_COUNT],
    /// State props this world has no field for, kept as supplied.
    pub extra: StateProps,
}

impl LiveVehicle {
    fn new(model: &str, position: Vec3, rotation: Vec3, dimension: Dimension) -> Self {
        Self {
            model: model.to_string(),
            position,
            rotation,
            dimension,
            lock_state: LockState::Locked,
            engine_on: false,
            doors: [DoorState::Closed; DOOR_COUNT],
            extra: StateProps::new(),
        }
    }

    /// Merge stored state props over the current physical state. Keys that
    /// do not parse are kept in `extra` rather than dropped.
    pub fn apply_state_props(&mut self, props: &StateProps) {
        for (key, value) in props {
            let applied = match key.as_str() {
                "lockState" => LockState::from_prop(value).map(|s| self.lock_state = s),
                "engineOn" => value.as_bool().map(|on| self.engine_on = on),
                "doors" => value.as_array().map(|doors| {
                    for (slot, door) in self.doors.iter_mut().zip(doors) {
                        if let Some(state) = DoorState::from_prop(door) {
                            *slot = state;
                        }
                    }
                }),
                _ => None,
            };
            if applied.is_none() {
                self.extra.insert(key.clone(), value.clone());
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seat {
    Driver,
    Passenger(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Riding {
    pub vehicle: EntityHandle,
    pub seat: Seat,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub position: Vec3,
    pub rotation: Vec3,
    pub dimension: Dimension,
    pub riding: Option<Riding>,
}

impl PlayerState {
    pub fn at(position: Vec3, dimension: Dimension) -> Self {
        Self {
            position,
            rotation: Vec3::ZERO,
            dimension,
            riding: None,
        }
    }

    /// The vehicle this player is driving, if any.
    pub fn driving(&self) -> Option<EntityHandle> {
        self.riding
            .filter(|r| r.seat == Seat::Driver)
            .map(|r| r.vehicle)
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    vehicle: Option<LiveVehicle>,
}

#[derive(Debug, Default)]
pub struct World {
    slots: Vec<Slot>,
    free: Vec<u32>,
    players: HashMap<PlayerId, PlayerState>,
    allowed_models: HashSet<String>,
}

impl World {
    /// An empty `allowed_models` accepts any non-empty model name.
    pub fn new(allowed_models: impl IntoIterator<Item = String>) -> Self {
        Self {
            allowed_models: allowed_models.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn can_create(&self, model: &str) -> bool {
        !model.trim().is_empty()
            && (self.allowed_models.is_empty() || self.allowed_models.contains(model))
    }

    pub fn spawn_vehicle(
        &mut self,
        model: &str,
        position: Vec3,
        rotation: Vec3,
        dimension: Dimension,
    ) -> AppResult<EntityHandle> {
        if !self.can_create(model) {
            return Err(AppError::InvalidModel(model.to_string()));
        }
        let vehicle = LiveVehicle::new(model, position, rotation, dimension);
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot::default());
                (self.slots.len() - 1) as u32
            }
        };
        let slot = &mut self.slots[index as usize];
        slot.vehicle = Some(vehicle);
        Ok(EntityHandle {
            index,
            generation: slot.generation,
        })
    }

    /// Remove a vehicle and eject anyone riding in it.
    pub fn destroy_vehicle(&mut self, handle: EntityHandle) -> Option<LiveVehicle> {
        let slot = self
            .slots
            .get_mut(handle.index as usize)
            .filter(|s| s.generation == handle.generation)?;
        let vehicle = slot.vehicle.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        for player in self.players.values_mut() {
            if player.riding.is_some_and(|r| r.vehicle == handle) {
                player.riding = None;
            }
        }
        Some(vehicle)
    }

    pub fn vehicle(&self, handle: EntityHandle) -> Option<&LiveVehicle> {
        self.slots
            .get(handle.index as usize)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.vehicle.as_ref())
    }

    pub fn vehicle_mut(&mut self, handle: EntityHandle) -> Option<&mut LiveVehicle> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.vehicle.as_mut())
    }

    /// All live vehicles in arena order.
    pub fn vehicles(&self) -> impl Iterator<Item = (EntityHandle, &LiveVehicle)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.vehicle.as_ref().map(|v| {
                (
                    EntityHandle {
                        index: index as u32,
                        generation: slot.generation,
                    },
                    v,
                )
            })
        })
    }

    pub fn vehicle_count(&self) -> usize {
        self.slots.iter().filter(|s| s.vehicle.is_some()).count()
    }

    /// Move a vehicle and everyone riding it.
    pub fn move_vehicle(
        &mut self,
        handle: EntityHandle,
        position: Vec3,
        rotation: Vec3,
    ) -> AppResult<()> {
        let vehicle = self
            .vehicle_mut(handle)
            .ok_or_else(|| AppError::NotFound(format!("entity {handle}")))?;
        vehicle.position = position;
        vehicle.rotation = rotation;
        let dimension = vehicle.dimension;
        for player in self.players.values_mut() {
            if player.riding.is_some_and(|r| r.vehicle == handle) {
                player.position = position;
                player.rotation = rotation;
                player.dimension = dimension;
            }
        }
        Ok(())
    }

    pub fn upsert_player(&mut self, player: PlayerId, state: PlayerState) {
        self.players.insert(player, state);
    }

    pub fn remove_player(&mut self, player: PlayerId) -> Option<PlayerState> {
        self.players.remove(&player)
    }

    pub fn player(&self, player: PlayerId) -> Option<&PlayerState> {
        self.players.get(&player)
    }

    pub fn player_mut(&mut self, player: PlayerId) -> Option<&mut PlayerState> {
        self.players.get_mut(&player)
    }

    /// Seat a player in a vehicle. Locked vehicles cannot be entered, and
    /// the driver seat holds one player.
    pub fn enter_vehicle(
        &mut self,
        player: PlayerId,
        handle: EntityHandle,
        seat: Seat,
    ) -> AppResult<()> {
        let vehicle = self
            .vehicle(handle)
            .ok_or_else(|| AppError::NotFound(format!("entity {handle}")))?;
        if vehicle.lock_state == LockState::Locked {
            return Err(AppError::AccessDenied("Vehicle is locked".to_string()));
        }
        let (position, rotation, dimension) =
            (vehicle.position, vehicle.rotation, vehicle.dimension);
        let taken = self.players.iter().any(|(id, p)| {
            *id != player && p.riding == Some(Riding { vehicle: handle, seat })
        });
        if taken {
            return Err(AppError::InvalidInput("Seat is taken".to_string()));
        }
        let state = self
            .players
            .get_mut(&player)
            .ok_or_else(|| AppError::NotFound(format!("player {player}")))?;
        state.riding = Some(Riding { vehicle: handle, seat });
        state.position = position;
        state.rotation = rotation;
        state.dimension = dimension;
        Ok(())
    }

    pub fn leave_vehicle(&mut self, player: PlayerId) -> Option<EntityHandle> {
        self.players
            .get_mut(&player)
            .and_then(|p| p.riding.take())
            .map(|r| r.vehicle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(value: Value) -> StateProps {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn spawn_rejects_unknown_and_empty_models() {
        let mut world = World::new(vec!["sultan".to_string()]);
        assert!(world.spawn_vehicle("sultan", Vec3::ZERO, Vec3::ZERO, 0).is_ok());
        assert!(matches!(
            world.spawn_vehicle("tank", Vec3::ZERO, Vec3::ZERO, 0),
            Err(AppError::InvalidModel(_))
        ));

        let open = World::new(Vec::new());
        assert!(open.can_create("anything"));
        assert!(!open.can_create("  "));
    }

    #[test]
    fn stale_handles_do_not_resolve_after_slot_reuse() {
        let mut world = World::default();
        let first = world.spawn_vehicle("sultan", Vec3::ZERO, Vec3::ZERO, 0).unwrap();
        assert!(world.destroy_vehicle(first).is_some());
        let second = world.spawn_vehicle("comet", Vec3::ZERO, Vec3::ZERO, 0).unwrap();

        assert!(world.vehicle(first).is_none());
        assert!(world.destroy_vehicle(first).is_none());
        assert_eq!(world.vehicle(second).unwrap().model, "comet");
        assert_eq!(world.vehicle_count(), 1);
    }

    #[test]
    fn new_vehicles_start_locked_with_engine_off() {
        let mut world = World::default();
        let handle = world.spawn_vehicle("sultan", Vec3::ZERO, Vec3::ZERO, 0).unwrap();
        let vehicle = world.vehicle(handle).unwrap();
        assert_eq!(vehicle.lock_state, LockState::Locked);
        assert!(!vehicle.engine_on);
        assert_eq!(vehicle.doors, [DoorState::Closed; DOOR_COUNT]);
    }

    #[test]
    fn state_props_merge_over_defaults_and_keep_unknown_keys() {
        let mut vehicle = LiveVehicle::new("sultan", Vec3::ZERO, Vec3::ZERO, 0);
        vehicle.apply_state_props(&props(json!({
            "lockState": 1,
            "engineOn": true,
            "doors": [0, 4, true],
            "dirtLevel": 3
        })));
        assert_eq!(vehicle.lock_state, LockState::Unlocked);
        assert!(vehicle.engine_on);
        assert_eq!(vehicle.doors[0], DoorState::Closed);
        assert_eq!(vehicle.doors[1], DoorState::Open);
        assert_eq!(vehicle.doors[2], DoorState::Open);
        assert_eq!(vehicle.doors[3], DoorState::Closed);
        assert_eq!(vehicle.extra.get("dirtLevel"), Some(&json!(3)));
        assert!(!vehicle.extra.contains_key("engineOn"));
    }

    #[test]
    fn locked_vehicles_cannot_be_entered() {
        let mut world = World::default();
        let handle = world.spawn_vehicle("sultan", Vec3::ZERO, Vec3::ZERO, 0).unwrap();
        world.upsert_player(PlayerId(1), PlayerState::at(Vec3::ZERO, 0));

        let err = world.enter_vehicle(PlayerId(1), handle, Seat::Driver).unwrap_err();
        assert!(matches!(err, AppError::AccessDenied(_)));

        world.vehicle_mut(handle).unwrap().lock_state = LockState::Unlocked;
        world.enter_vehicle(PlayerId(1), handle, Seat::Driver).unwrap();
        assert_eq!(world.player(PlayerId(1)).unwrap().driving(), Some(handle));
    }

    #[test]
    fn driver_seat_holds_one_player() {
        let mut world = World::default();
        let handle = world.spawn_vehicle("sultan", Vec3::ZERO, Vec3::ZERO, 0).unwrap();
        world.vehicle_mut(handle).unwrap().lock_state = LockState::Unlocked;
        world.upsert_player(PlayerId(1), PlayerState::at(Vec3::ZERO, 0));
        world.upsert_player(PlayerId(2), PlayerState::at(Vec3::ZERO, 0));

        world.enter_vehicle(PlayerId(1), handle, Seat::Driver).unwrap();
        assert!(world.enter_vehicle(PlayerId(2), handle, Seat::Driver).is_err());
        world.enter_vehicle(PlayerId(2), handle, Seat::Passenger(1)).unwrap();
        assert_eq!(world.player(PlayerId(2)).unwrap().driving(), None);
    }

    #[test]
    fn moving_a_vehicle_carries_riders_and_destroying_ejects_them() {
        let mut world = World::default();
        let handle = world.spawn_vehicle("sultan", Vec3::ZERO, Vec3::ZERO, 2).unwrap();
        world.vehicle_mut(handle).unwrap().lock_state = LockState::Unlocked;
        world.upsert_player(PlayerId(1), PlayerState::at(Vec3::ZERO, 2));
        world.enter_vehicle(PlayerId(1), handle, Seat::Driver).unwrap();

        let target = Vec3::new(50.0, 10.0, 0.0);
        world.move_vehicle(handle, target, Vec3::ZERO).unwrap();
        assert_eq!(world.player(PlayerId(1)).unwrap().position, target);

        world.destroy_vehicle(handle);
        assert!(world.player(PlayerId(1)).unwrap().riding.is_none());
    }
}
