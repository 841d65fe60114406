//! Persisted vehicle documents and the identifiers that key them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Free-form auxiliary physical state stored alongside a vehicle.
pub type StateProps = serde_json::Map<String, serde_json::Value>;

/// World partition. Entities in different dimensions never interact.
pub type Dimension = i32;

/// Identifier assigned to a vehicle document by the persistence layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VehicleId(Uuid);

impl VehicleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for VehicleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for VehicleId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Opaque identity of the character a player is controlling.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CharacterId(String);

impl CharacterId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CharacterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Connection-scoped handle of a player, assigned by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u32);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Straight-line distance between two points.
    pub fn distance(self, other: Self) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// A vehicle document as stored in the vehicles collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleRecord {
    pub id: VehicleId,
    pub uid: u64,
    pub model: String,
    pub position: Vec3,
    pub rotation: Vec3,
    pub owner_id: CharacterId,
    #[serde(default)]
    pub key_holder_ids: Vec<CharacterId>,
    pub dimension: Dimension,
    pub fuel_level: f32,
    #[serde(default)]
    pub state_props: StateProps,
    pub plate: String,
}

impl VehicleRecord {
    /// Menu label shown to players when listing their vehicles.
    pub fn menu_label(&self) -> String {
        format!("[UID: {}] {}", self.uid, self.model)
    }
}

/// Everything the creator supplies; identifiers and plate are filled in on
/// creation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewVehicle {
    pub model: String,
    pub position: Vec3,
    pub rotation: Vec3,
    pub owner_id: CharacterId,
    pub dimension: Dimension,
    pub fuel_level: f32,
}

impl NewVehicle {
    pub fn into_record(self, id: VehicleId, uid: u64, plate: String) -> VehicleRecord {
        VehicleRecord {
            id,
            uid,
            model: self.model,
            position: self.position,
            rotation: self.rotation,
            owner_id: self.owner_id,
            key_holder_ids: Vec::new(),
            dimension: self.dimension,
            fuel_level: self.fuel_level,
            state_props: StateProps::new(),
            plate,
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_draft(owner: &str, model: &str) -> NewVehicle {
    NewVehicle {
        model: model.to_string(),
        position: Vec3::ZERO,
        rotation: Vec3::ZERO,
        owner_id: CharacterId::new(owner),
        dimension: 0,
        fuel_level: 100.0,
    }
}

#[cfg(test)]
pub(crate) fn sample_record(owner: &str) -> VehicleRecord {
    sample_draft(owner, "sultan").into_record(VehicleId::new(), 1, "ABC123".to_string())
}
