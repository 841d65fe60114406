//! Line-oriented stand-in for a game server host.
//!
//! Reads stdin, keeps a small world of simulated players, and forwards their
//! chat commands to the [`VehiclePlugin`]. Output goes to stdout through
//! [`ConsoleChannel`](crate::host::ConsoleChannel); logs stay on stderr.

use crate::engine::command::{self, COMMANDS, PlayerCommand};
use crate::engine::locator::nearest_bound;
use crate::engine::model::{CharacterId, Dimension, PlayerId, Vec3};
use crate::engine::plugin::VehiclePlugin;
use crate::engine::world::{PlayerState, Seat};
use crate::error::{AppError, AppResult};
use crate::host::SessionTable;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleLine {
    Join {
        player: PlayerId,
        character: CharacterId,
        position: Vec3,
        dimension: Dimension,
    },
    Leave {
        player: PlayerId,
    },
    Move {
        player: PlayerId,
        position: Vec3,
        dimension: Option<Dimension>,
    },
    /// Enter the nearest spawned vehicle.
    Enter {
        player: PlayerId,
        seat: Seat,
    },
    Exit {
        player: PlayerId,
    },
    Chat {
        player: PlayerId,
        command: PlayerCommand,
    },
    Help,
    Quit,
    Empty,
}

const HELP: &str = "\
join <player> <character> [x y z] [dimension]
leave <player>
move <player> <x> <y> <z> [dimension]
enter <player> [seat]      (seat 0 drives, 1-3 ride along)
exit <player>
<player> /<command> [args]
help | quit";

fn player_arg(arg: Option<&str>) -> AppResult<PlayerId> {
    arg.and_then(|a| a.parse().ok())
        .map(PlayerId)
        .ok_or_else(|| AppError::InvalidInput("Expected a numeric player id".to_string()))
}

fn float_args<'a>(args: &mut impl Iterator<Item = &'a str>) -> AppResult<Vec3> {
    let mut next = || -> AppResult<f32> {
        args.next()
            .and_then(|a| a.parse().ok())
            .ok_or_else(|| AppError::InvalidInput("Expected x y z coordinates".to_string()))
    };
    Ok(Vec3::new(next()?, next()?, next()?))
}

fn dimension_arg(arg: Option<&str>) -> AppResult<Option<Dimension>> {
    arg.map(|a| {
        a.parse()
            .map_err(|_| AppError::InvalidInput(format!("Bad dimension '{a}'")))
    })
    .transpose()
}

/// Parse one console line.
pub fn parse_line(line: &str) -> AppResult<ConsoleLine> {
    let line = line.trim();
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(ConsoleLine::Empty);
    };

    // "<player> /command ..." is chat from a simulated player.
    if let Ok(id) = head.parse::<u32>() {
        let rest = line[head.len()..].trim_start();
        if !rest.starts_with('/') {
            return Err(AppError::InvalidInput(
                "Player input must be a /command".to_string(),
            ));
        }
        return Ok(ConsoleLine::Chat {
            player: PlayerId(id),
            command: command::parse(rest)?,
        });
    }

    let parsed = match head.to_ascii_lowercase().as_str() {
        "join" => {
            let player = player_arg(words.next())?;
            let character = words
                .next()
                .map(CharacterId::new)
                .ok_or_else(|| AppError::InvalidInput("Expected a character id".to_string()))?;
            let mut rest = words.peekable();
            let position = if rest.peek().is_some() {
                float_args(&mut rest)?
            } else {
                Vec3::ZERO
            };
            ConsoleLine::Join {
                player,
                character,
                position,
                dimension: dimension_arg(rest.next())?.unwrap_or(0),
            }
        }
        "leave" => ConsoleLine::Leave {
            player: player_arg(words.next())?,
        },
        "move" => {
            let player = player_arg(words.next())?;
            let position = float_args(&mut words)?;
            ConsoleLine::Move {
                player,
                position,
                dimension: dimension_arg(words.next())?,
            }
        }
        "enter" => {
            let player = player_arg(words.next())?;
            let seat = match words.next().map(str::parse::<u8>) {
                None | Some(Ok(0)) => Seat::Driver,
                Some(Ok(n)) if n <= 3 => Seat::Passenger(n),
                _ => return Err(AppError::InvalidInput("Seat must be 0-3".to_string())),
            };
            ConsoleLine::Enter { player, seat }
        }
        "exit" => ConsoleLine::Exit {
            player: player_arg(words.next())?,
        },
        "help" => ConsoleLine::Help,
        "quit" => ConsoleLine::Quit,
        other => {
            return Err(AppError::InvalidInput(format!(
                "Unknown console command '{other}', try help"
            )));
        }
    };
    Ok(parsed)
}

pub struct Console {
    plugin: VehiclePlugin,
    sessions: Arc<SessionTable>,
}

impl Console {
    pub fn new(plugin: VehiclePlugin, sessions: Arc<SessionTable>) -> Self {
        Self { plugin, sessions }
    }

    /// Apply one parsed line. Returns `false` once the console should stop.
    pub async fn apply(&self, line: ConsoleLine) -> AppResult<bool> {
        match line {
            ConsoleLine::Join {
                player,
                character,
                position,
                dimension,
            } => {
                info!(player = %player, character = %character, "Player joined");
                self.sessions.select(player, character);
                self.plugin.with_live(|live| {
                    live.world
                        .upsert_player(player, PlayerState::at(position, dimension))
                });
            }
            ConsoleLine::Leave { player } => {
                self.sessions.disconnect(player);
                self.plugin.with_live(|live| live.world.remove_player(player));
                info!(player = %player, "Player left");
            }
            ConsoleLine::Move {
                player,
                position,
                dimension,
            } => self.plugin.with_live(|live| -> AppResult<()> {
                let state = live
                    .world
                    .player(player)
                    .cloned()
                    .ok_or_else(|| AppError::NotFound(format!("player {player}")))?;
                match state.driving() {
                    Some(handle) => live.world.move_vehicle(handle, position, state.rotation)?,
                    None => {
                        if let Some(p) = live.world.player_mut(player) {
                            p.position = position;
                            p.riding = None;
                            if let Some(dimension) = dimension {
                                p.dimension = dimension;
                            }
                        }
                    }
                }
                Ok(())
            })?,
            ConsoleLine::Enter { player, seat } => {
                let radius = self.plugin.config.vehicles.interaction_radius;
                self.plugin.with_live(|live| -> AppResult<()> {
                    let state = live
                        .world
                        .player(player)
                        .cloned()
                        .ok_or_else(|| AppError::NotFound(format!("player {player}")))?;
                    let handle = nearest_bound(&live.world, &live.binder, &state, radius)
                        .ok_or_else(|| AppError::NotFound("No vehicle found".to_string()))?;
                    live.world.enter_vehicle(player, handle, seat)?;
                    debug!(player = %player, entity = %handle, "Entered vehicle");
                    Ok(())
                })?;
            }
            ConsoleLine::Exit { player } => {
                self.plugin.with_live(|live| live.world.leave_vehicle(player));
            }
            ConsoleLine::Chat { player, command } => self.plugin.handle(player, command).await,
            ConsoleLine::Help => {
                println!("{HELP}");
                for spec in COMMANDS {
                    println!("  {:<22} {}", spec.usage, spec.description);
                }
            }
            ConsoleLine::Quit => return Ok(false),
            ConsoleLine::Empty => {}
        }
        Ok(true)
    }

    /// Read stdin until EOF or `quit`.
    pub async fn run(self) -> AppResult<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            let keep_going = match parse_line(&line) {
                Ok(parsed) => self.apply(parsed).await.unwrap_or_else(|e| {
                    println!("{e}");
                    true
                }),
                Err(e) => {
                    println!("{e}");
                    true
                }
            };
            if !keep_going {
                break;
            }
        }
        Ok(())
    }
}
