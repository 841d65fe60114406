//! Seams to the host server: who a player is playing as, and how to reach
//! them.

use crate::engine::model::{CharacterId, PlayerId};
use crate::engine::query::MenuEntry;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Resolves the character a connected player currently controls.
pub trait CharacterResolver: Send + Sync {
    fn current_character(&self, player: PlayerId) -> Option<CharacterId>;
}

/// Fire-and-forget output to a player. Implementations swallow delivery
/// failures; a disconnected player simply misses the message.
pub trait PlayerChannel: Send + Sync {
    fn notify(&self, player: PlayerId, message: &str);

    /// Open the vehicle management menu on the player's client.
    fn open_menu(&self, player: PlayerId, entries: &[MenuEntry]);
}

/// Player to character table maintained by the host as characters are
/// selected and players disconnect.
#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: RwLock<HashMap<PlayerId, CharacterId>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(&self, player: PlayerId, character: CharacterId) {
        self.sessions.write().insert(player, character);
    }

    pub fn disconnect(&self, player: PlayerId) -> Option<CharacterId> {
        self.sessions.write().remove(&player)
    }
}

impl CharacterResolver for SessionTable {
    fn current_character(&self, player: PlayerId) -> Option<CharacterId> {
        self.sessions.read().get(&player).cloned()
    }
}

/// Writes player output to stdout, one line per message.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleChannel;

impl PlayerChannel for ConsoleChannel {
    fn notify(&self, player: PlayerId, message: &str) {
        println!("[player {player}] {message}");
    }

    fn open_menu(&self, player: PlayerId, entries: &[MenuEntry]) {
        println!("[player {player}] My vehicles ({})", entries.len());
        for entry in entries {
            println!("[player {player}]   {}  ({})", entry.label, entry.vehicle);
        }
    }
}

/// Captures everything sent to players.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingChannel {
    pub notices: parking_lot::Mutex<Vec<(PlayerId, String)>>,
    pub menus: parking_lot::Mutex<Vec<(PlayerId, Vec<MenuEntry>)>>,
}

#[cfg(test)]
impl RecordingChannel {
    pub fn last_notice(&self, player: PlayerId) -> Option<String> {
        self.notices
            .lock()
            .iter()
            .rev()
            .find(|(p, _)| *p == player)
            .map(|(_, m)| m.clone())
    }
}

#[cfg(test)]
impl PlayerChannel for RecordingChannel {
    fn notify(&self, player: PlayerId, message: &str) {
        self.notices.lock().push((player, message.to_string()));
    }

    fn open_menu(&self, player: PlayerId, entries: &[MenuEntry]) {
        self.menus.lock().push((player, entries.to_vec()));
    }
}
