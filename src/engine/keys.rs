//! Shared keys on a single vehicle.

use crate::engine::model::{CharacterId, PlayerId, VehicleRecord};
use crate::error::{AppError, AppResult};
use crate::host::CharacterResolver;
use crate::store::VehicleStore;
use tracing::info;

/// Grants and revokes keys on one vehicle document.
///
/// Mutations go through the store's atomic key-holder primitives first; the
/// in-memory record only takes the stored list once the write succeeded.
pub struct KeyRegistry<'a> {
    store: &'a dyn VehicleStore,
    characters: &'a dyn CharacterResolver,
    record: &'a mut VehicleRecord,
}

impl<'a> KeyRegistry<'a> {
    pub fn new(
        store: &'a dyn VehicleStore,
        characters: &'a dyn CharacterResolver,
        record: &'a mut VehicleRecord,
    ) -> Self {
        Self {
            store,
            characters,
            record,
        }
    }

    fn resolve(&self, target: PlayerId) -> AppResult<CharacterId> {
        self.characters
            .current_character(target)
            .ok_or_else(|| AppError::NotFound(format!("no character for player {target}")))
    }

    /// Give the target's character a key. Granting twice keeps one entry.
    pub async fn grant(&mut self, target: PlayerId) -> AppResult<()> {
        let character = self.resolve(target)?;
        let keys = self.store.add_key_holder(self.record.id, &character).await?;
        self.record.key_holder_ids = keys;
        info!(vehicle = %self.record.id, character = %character, "Key granted");
        Ok(())
    }

    /// Take every key the target's character holds.
    pub async fn revoke(&mut self, target: PlayerId) -> AppResult<()> {
        let character = self.resolve(target)?;
        let keys = self.store.remove_key_holder(self.record.id, &character).await?;
        self.record.key_holder_ids = keys;
        info!(vehicle = %self.record.id, character = %character, "Key revoked");
        Ok(())
    }

    /// `NotFound` when the target has no character, never `false`.
    pub fn has_key(&self, target: PlayerId) -> AppResult<bool> {
        let character = self.resolve(target)?;
        Ok(self.record.key_holder_ids.contains(&character))
    }
}
