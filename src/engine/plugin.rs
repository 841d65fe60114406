//! Vehicle command handlers and the state they share.

use crate::config::Config;
use crate::engine::access::{can_operate, is_owner};
use crate::engine::binder::{BindOutcome, EntityBinder};
use crate::engine::command::{DOOR_INDEX_HINT, PlayerCommand};
use crate::engine::keys::KeyRegistry;
use crate::engine::locator::{nearest_bound, within};
use crate::engine::model::{CharacterId, NewVehicle, PlayerId, VehicleId, VehicleRecord};
use crate::engine::plate::unique_plate;
use crate::engine::query::{accessible_to, menu_entries};
use crate::engine::world::{DOOR_COUNT, DoorState, EntityHandle, LockState, PlayerState, World};
use crate::error::{AppError, AppResult};
use crate::host::{CharacterResolver, PlayerChannel};
use crate::store::{IdAllocator, VehicleStore};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{Instrument, error, info, info_span, warn};

const NO_VEHICLE: &str = "No vehicle found";
const NOT_YOURS: &str = "You do not own this vehicle";
const NOT_DRIVING: &str = "You must be driving a vehicle";
const NO_CHARACTER: &str = "No character selected";
const NO_PLAYER: &str = "No player found";

/// The world and its binding table, always locked together.
#[derive(Debug, Default)]
pub struct LiveState {
    pub world: World,
    pub binder: EntityBinder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyChange {
    Granted,
    Revoked,
}

/// Shared plugin state handed to every command.
///
/// The live state sits behind a synchronous mutex that is never held across
/// an `.await`; persistence happens either before the lock is taken or after
/// it is released.
#[derive(Clone)]
pub struct VehiclePlugin {
    pub config: Arc<Config>,
    store: Arc<dyn VehicleStore>,
    ids: Arc<dyn IdAllocator>,
    characters: Arc<dyn CharacterResolver>,
    channel: Arc<dyn PlayerChannel>,
    live: Arc<Mutex<LiveState>>,
}

impl VehiclePlugin {
    pub fn new(
        config: Config,
        store: Arc<dyn VehicleStore>,
        ids: Arc<dyn IdAllocator>,
        characters: Arc<dyn CharacterResolver>,
        channel: Arc<dyn PlayerChannel>,
    ) -> Self {
        let world = World::new(config.vehicles.allowed_models.clone());
        Self {
            config: Arc::new(config),
            store,
            ids,
            characters,
            channel,
            live: Arc::new(Mutex::new(LiveState {
                world,
                binder: EntityBinder::new(),
            })),
        }
    }

    /// Run a closure against the live world, e.g. to mirror player movement.
    pub fn with_live<T>(&self, f: impl FnOnce(&mut LiveState) -> T) -> T {
        f(&mut self.live.lock())
    }

    fn character(&self, player: PlayerId) -> AppResult<CharacterId> {
        self.characters
            .current_character(player)
            .ok_or_else(|| AppError::NotFound(NO_CHARACTER.to_string()))
    }

    fn player_state(live: &LiveState, player: PlayerId) -> AppResult<PlayerState> {
        live.world
            .player(player)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("player {player} is not in the world")))
    }

    /// The bound vehicle the player is driving and its document snapshot.
    fn driven_vehicle(
        live: &LiveState,
        player: PlayerId,
    ) -> AppResult<(EntityHandle, VehicleRecord)> {
        let state = Self::player_state(live, player)?;
        let handle = state
            .driving()
            .ok_or_else(|| AppError::InvalidInput(NOT_DRIVING.to_string()))?;
        let record = live
            .binder
            .record_for(handle)
            .cloned()
            .ok_or_else(|| AppError::InvalidInput(NOT_DRIVING.to_string()))?;
        Ok((handle, record))
    }

    fn require_operate(character: &CharacterId, record: &VehicleRecord) -> AppResult<()> {
        if can_operate(character, record) {
            Ok(())
        } else {
            Err(AppError::AccessDenied(NOT_YOURS.to_string()))
        }
    }

    // ───── Actions ─────

    /// Persist a new vehicle where the player stands. It is not spawned.
    pub async fn create_vehicle(&self, player: PlayerId, model: &str) -> AppResult<VehicleRecord> {
        let character = self.character(player)?;
        let model = model.trim();
        if model.is_empty() {
            return Err(AppError::InvalidInput("Provide a vehicle model".to_string()));
        }
        let state = {
            let live = self.live.lock();
            if !live.world.can_create(model) {
                return Err(AppError::InvalidModel(model.to_string()));
            }
            Self::player_state(&live, player)?
        };

        let uid = self.ids.next_id(&self.config.database.collection).await?;
        let attempts = self.config.vehicles.plate_retry_attempts;
        let plate = unique_plate(self.store.as_ref(), attempts).await?;
        let draft = NewVehicle {
            model: model.to_string(),
            position: state.position,
            rotation: state.rotation,
            owner_id: character,
            dimension: state.dimension,
            fuel_level: self.config.vehicles.default_fuel,
        };
        let record = self.store.create(draft, uid, plate).await?;
        info!(
            vehicle = %record.id,
            uid = record.uid,
            plate = %record.plate,
            owner = %record.owner_id,
            "Vehicle created"
        );
        Ok(record)
    }

    /// Vehicles the player can access; also opens the menu on their client.
    pub async fn list_vehicles(&self, player: PlayerId) -> AppResult<Vec<VehicleRecord>> {
        let character = self.character(player)?;
        let records = accessible_to(self.store.as_ref(), &character).await?;
        self.channel.open_menu(player, &menu_entries(&records));
        Ok(records)
    }

    /// Spawn the vehicle if it is not in the world, otherwise despawn it.
    pub async fn toggle_spawn(
        &self,
        player: PlayerId,
        vehicle: VehicleId,
    ) -> AppResult<BindOutcome> {
        let character = self.character(player)?;
        let record = self
            .store
            .get(vehicle)
            .await?
            .ok_or_else(|| AppError::NotFound(NO_VEHICLE.to_string()))?;
        Self::require_operate(&character, &record)?;

        let mut live = self.live.lock();
        let LiveState { world, binder } = &mut *live;
        if binder.is_retiring(record.id) {
            return Err(AppError::NotFound(NO_VEHICLE.to_string()));
        }
        binder.bind(world, &record, true)
    }

    pub fn toggle_lock(&self, player: PlayerId) -> AppResult<LockState> {
        let character = self.character(player)?;
        let mut live = self.live.lock();
        let state = Self::player_state(&live, player)?;
        let radius = self.config.vehicles.interaction_radius;
        let handle = nearest_bound(&live.world, &live.binder, &state, radius)
            .ok_or_else(|| AppError::NotFound(NO_VEHICLE.to_string()))?;
        let record = live
            .binder
            .record_for(handle)
            .ok_or_else(|| AppError::NotFound(NO_VEHICLE.to_string()))?;
        Self::require_operate(&character, record)?;

        let vehicle = live
            .world
            .vehicle_mut(handle)
            .ok_or_else(|| AppError::NotFound(NO_VEHICLE.to_string()))?;
        vehicle.lock_state = vehicle.lock_state.toggled();
        Ok(vehicle.lock_state)
    }

    /// Returns whether the engine is now running.
    pub fn toggle_engine(&self, player: PlayerId) -> AppResult<bool> {
        let character = self.character(player)?;
        let mut live = self.live.lock();
        let (handle, record) = Self::driven_vehicle(&live, player)?;
        Self::require_operate(&character, &record)?;

        let vehicle = live
            .world
            .vehicle_mut(handle)
            .ok_or_else(|| AppError::NotFound(NO_VEHICLE.to_string()))?;
        vehicle.engine_on = !vehicle.engine_on;
        Ok(vehicle.engine_on)
    }

    /// Any driver may work the doors; no key is needed once inside.
    pub fn toggle_door(&self, player: PlayerId, index: i64) -> AppResult<DoorState> {
        let door = usize::try_from(index)
            .ok()
            .filter(|i| *i < DOOR_COUNT)
            .ok_or_else(|| AppError::InvalidInput(DOOR_INDEX_HINT.to_string()))?;
        let mut live = self.live.lock();
        let (handle, _) = Self::driven_vehicle(&live, player)?;

        let vehicle = live
            .world
            .vehicle_mut(handle)
            .ok_or_else(|| AppError::NotFound(NO_VEHICLE.to_string()))?;
        vehicle.doors[door] = vehicle.doors[door].toggled();
        Ok(vehicle.doors[door])
    }

    /// Save the driven vehicle's current placement as its parking spot.
    pub async fn park(&self, player: PlayerId) -> AppResult<VehicleRecord> {
        let character = self.character(player)?;
        let (mut record, position, rotation) = {
            let live = self.live.lock();
            let (handle, record) = Self::driven_vehicle(&live, player)?;
            Self::require_operate(&character, &record)?;
            let vehicle = live
                .world
                .vehicle(handle)
                .ok_or_else(|| AppError::NotFound(NO_VEHICLE.to_string()))?;
            (record, vehicle.position, vehicle.rotation)
        };

        self.store.update_placement(record.id, position, rotation).await?;
        record.position = position;
        record.rotation = rotation;
        self.live.lock().binder.refresh_placement(record.id, position, rotation);
        info!(vehicle = %record.id, "Vehicle parked");
        Ok(record)
    }

    /// Give the target a key to the driven vehicle, or take it back if they
    /// already hold one. Only the owner hands out keys.
    pub async fn toggle_key(&self, player: PlayerId, target: PlayerId) -> AppResult<KeyChange> {
        let character = self.character(player)?;
        let mut record = {
            let live = self.live.lock();
            let (_, record) = Self::driven_vehicle(&live, player)?;
            if !is_owner(&character, &record) {
                return Err(AppError::AccessDenied(NOT_YOURS.to_string()));
            }
            let me = Self::player_state(&live, player)?;
            let radius = self.config.vehicles.key_transfer_radius;
            let reachable = live
                .world
                .player(target)
                .is_some_and(|t| {
                    t.dimension == me.dimension && within(t.position, me.position, radius)
                });
            if !reachable {
                return Err(AppError::NotFound(NO_PLAYER.to_string()));
            }
            record
        };

        let target_character = self
            .characters
            .current_character(target)
            .ok_or_else(|| AppError::NotFound(NO_PLAYER.to_string()))?;
        if target_character == character {
            return Err(AppError::InvalidInput(
                "You cannot give keys to yourself".to_string(),
            ));
        }

        let mut keys = KeyRegistry::new(self.store.as_ref(), self.characters.as_ref(), &mut record);
        let change = if keys.has_key(target)? {
            keys.revoke(target).await?;
            KeyChange::Revoked
        } else {
            keys.grant(target).await?;
            KeyChange::Granted
        };
        self.live.lock().binder.refresh(&record);
        Ok(change)
    }

    /// Despawn and delete a vehicle. Owner only.
    pub async fn remove_vehicle(&self, player: PlayerId, vehicle: VehicleId) -> AppResult<()> {
        let character = self.character(player)?;
        let record = self
            .store
            .get(vehicle)
            .await?
            .ok_or_else(|| AppError::NotFound(NO_VEHICLE.to_string()))?;
        if !is_owner(&character, &record) {
            return Err(AppError::AccessDenied(NOT_YOURS.to_string()));
        }

        {
            let mut live = self.live.lock();
            let LiveState { world, binder } = &mut *live;
            binder.begin_removal(world, record.id)?;
        }
        let destroyed = self.store.destroy(record.id).await;
        {
            let mut live = self.live.lock();
            let LiveState { world, binder } = &mut *live;
            match &destroyed {
                Ok(_) => {
                    binder.finish_removal(world, record.id)?;
                }
                Err(_) => binder.abort_removal(record.id),
            }
        }
        if !destroyed? {
            warn!(vehicle = %record.id, "Vehicle document was already gone");
        }
        info!(vehicle = %record.id, uid = record.uid, "Vehicle removed");
        Ok(())
    }

    // ───── Dispatch ─────

    /// Run a player command and tell the player how it went.
    ///
    /// Denials and bad input become notices. Storage failures are logged and
    /// reported generically. A binding conflict means the one-entity-per-
    /// vehicle invariant is already broken, and panics.
    pub async fn handle(&self, player: PlayerId, command: PlayerCommand) {
        let span = info_span!("vehicle_command", player = %player, action = command.action());
        self.dispatch(player, command).instrument(span).await
    }

    async fn dispatch(&self, player: PlayerId, command: PlayerCommand) {
        let action = command.action();
        let result = match command {
            PlayerCommand::Create { model } => self
                .create_vehicle(player, &model)
                .await
                .map(|_| Some("Successfully created vehicle in the database.".to_string())),
            PlayerCommand::List => self.list_vehicles(player).await.map(|_| None),
            PlayerCommand::Spawn { vehicle } => {
                self.toggle_spawn(player, vehicle).await.map(|outcome| match outcome {
                    BindOutcome::Spawned(_) => Some("Vehicle spawned".to_string()),
                    BindOutcome::Despawned(_) => Some("Vehicle despawned".to_string()),
                    BindOutcome::Unchanged(_) => None,
                })
            }
            PlayerCommand::Lock => self.toggle_lock(player).map(|state| {
                Some(match state {
                    LockState::Locked => "Vehicle locked".to_string(),
                    LockState::Unlocked => "Vehicle unlocked".to_string(),
                })
            }),
            PlayerCommand::Engine => self
                .toggle_engine(player)
                .map(|on| Some(format!("Engine {}", if on { "on" } else { "off" }))),
            PlayerCommand::Doors { index } => self.toggle_door(player, index).map(|_| None),
            PlayerCommand::Park => self
                .park(player)
                .await
                .map(|_| Some("Vehicle parked successfully".to_string())),
            PlayerCommand::Keys { target } => {
                self.toggle_key(player, target).await.map(|change| {
                    Some(match change {
                        KeyChange::Granted => "Key given".to_string(),
                        KeyChange::Revoked => "Key removed".to_string(),
                    })
                })
            }
            PlayerCommand::Remove { vehicle } => self
                .remove_vehicle(player, vehicle)
                .await
                .map(|_| Some("Vehicle removed".to_string())),
        };

        match result {
            Ok(Some(message)) => self.channel.notify(player, &message),
            Ok(None) => {}
            Err(AppError::BindConflict { vehicle, count }) => {
                panic!("vehicle {vehicle} is bound to {count} live entities");
            }
            Err(e) if e.is_io_failure() => {
                error!(error = %e, "Failed to {action}");
                self.channel.notify(player, &format!("Failed to {action}."));
            }
            Err(e) => self.channel.notify(player, &player_notice(&e)),
        }
    }
}

/// The text shown to a player for a handled failure.
fn player_notice(err: &AppError) -> String {
    match err {
        AppError::NotFound(m) | AppError::AccessDenied(m) | AppError::InvalidInput(m) => m.clone(),
        AppError::InvalidModel(model) => format!("Unknown vehicle model '{model}'"),
        other => other.to_string(),
    }
}
