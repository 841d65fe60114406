//! Which vehicles a character can see in the management menu.

use crate::engine::model::{CharacterId, VehicleId, VehicleRecord};
use crate::error::AppResult;
use crate::store::VehicleStore;
use serde::Serialize;

/// One selectable line of the vehicle menu. Selecting it sends a spawn
/// toggle for `vehicle`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MenuEntry {
    pub label: String,
    pub vehicle: VehicleId,
}

impl From<&VehicleRecord> for MenuEntry {
    fn from(record: &VehicleRecord) -> Self {
        Self {
            label: record.menu_label(),
            vehicle: record.id,
        }
    }
}

/// Vehicles the character owns or holds a key to, straight from the store.
pub async fn accessible_to(
    store: &dyn VehicleStore,
    character: &CharacterId,
) -> AppResult<Vec<VehicleRecord>> {
    store.accessible_to(character).await
}

pub fn menu_entries(records: &[VehicleRecord]) -> Vec<MenuEntry> {
    records.iter().map(MenuEntry::from).collect()
}
