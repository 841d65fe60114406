//! Who may operate a vehicle.

use crate::engine::model::{CharacterId, VehicleRecord};

/// True when the character owns the vehicle or holds a key to it.
pub fn can_operate(character: &CharacterId, record: &VehicleRecord) -> bool {
    is_owner(character, record) || record.key_holder_ids.contains(character)
}

/// Ownership alone; key holders are not owners.
pub fn is_owner(character: &CharacterId, record: &VehicleRecord) -> bool {
    record.owner_id == *character
}
