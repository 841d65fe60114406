//! Chat commands players type, and parsing them into actions.

use crate::engine::model::{PlayerId, VehicleId};
use crate::error::{AppError, AppResult};

/// A command the host should register with its chat dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: &'static str,
    pub usage: &'static str,
    pub description: &'static str,
}

pub const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "acar",
        usage: "/acar [model]",
        description: "Create car",
    },
    CommandSpec {
        name: "vehicles",
        usage: "/vehicles",
        description: "Display all your vehicles",
    },
    CommandSpec {
        name: "vspawn",
        usage: "/vspawn [vehicleId]",
        description: "Spawn or despawn one of your vehicles",
    },
    CommandSpec {
        name: "vlock",
        usage: "/vlock",
        description: "Lock or unlock a vehicle",
    },
    CommandSpec {
        name: "vengine",
        usage: "/vengine",
        description: "Toggle engine",
    },
    CommandSpec {
        name: "vdoors",
        usage: "/vdoors [0-4]",
        description: "Change doors open state by providing a door index",
    },
    CommandSpec {
        name: "vpark",
        usage: "/vpark",
        description: "Park your vehicle",
    },
    CommandSpec {
        name: "vkeys",
        usage: "/vkeys [playerId]",
        description: "Give or take keys from another player",
    },
    CommandSpec {
        name: "vremove",
        usage: "/vremove [vehicleId]",
        description: "Permanently delete one of your vehicles",
    },
];

pub const DOOR_INDEX_HINT: &str = "Provide a valid door index [0-4]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerCommand {
    Create { model: String },
    List,
    Spawn { vehicle: VehicleId },
    Lock,
    Engine,
    Doors { index: i64 },
    Park,
    Keys { target: PlayerId },
    Remove { vehicle: VehicleId },
}

impl PlayerCommand {
    /// Short name used in logs and failure notices.
    pub fn action(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create vehicle",
            Self::List => "list vehicles",
            Self::Spawn { .. } => "spawn vehicle",
            Self::Lock => "lock vehicle",
            Self::Engine => "toggle engine",
            Self::Doors { .. } => "toggle door",
            Self::Park => "park vehicle",
            Self::Keys { .. } => "change keys",
            Self::Remove { .. } => "remove vehicle",
        }
    }
}

pub fn spec(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|c| c.name == name)
}

fn usage(name: &str) -> AppError {
    let hint = spec(name).map_or(name, |s| s.usage);
    AppError::InvalidInput(format!("Usage: {hint}"))
}

/// Parse a chat line such as `/vdoors 2`. The leading slash is optional.
pub fn parse(line: &str) -> AppResult<PlayerCommand> {
    let mut parts = line.trim().trim_start_matches('/').split_whitespace();
    let name = parts
        .next()
        .ok_or_else(|| AppError::InvalidInput("Empty command".to_string()))?
        .to_ascii_lowercase();
    let arg = parts.next();

    let command = match name.as_str() {
        "acar" => PlayerCommand::Create {
            model: arg.ok_or_else(|| usage(&name))?.to_string(),
        },
        "vehicles" => PlayerCommand::List,
        "vspawn" => PlayerCommand::Spawn {
            vehicle: parse_vehicle_id(&name, arg)?,
        },
        "vlock" => PlayerCommand::Lock,
        "vengine" => PlayerCommand::Engine,
        "vdoors" => PlayerCommand::Doors {
            index: arg
                .and_then(|a| a.parse().ok())
                .ok_or_else(|| AppError::InvalidInput(DOOR_INDEX_HINT.to_string()))?,
        },
        "vpark" => PlayerCommand::Park,
        "vkeys" => PlayerCommand::Keys {
            target: arg
                .and_then(|a| a.parse().ok())
                .map(PlayerId)
                .ok_or_else(|| usage(&name))?,
        },
        "vremove" => PlayerCommand::Remove {
            vehicle: parse_vehicle_id(&name, arg)?,
        },
        other => return Err(AppError::InvalidInput(format!("Unknown command /{other}"))),
    };
    Ok(command)
}

fn parse_vehicle_id(name: &str, arg: Option<&str>) -> AppResult<VehicleId> {
    arg.and_then(|a| a.parse().ok()).ok_or_else(|| usage(name))
}
