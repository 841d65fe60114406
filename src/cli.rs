//! Defines the command-line interface for Motorpool.

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Persistent vehicle ownership, keys and spawning for game servers.",
    subcommand_required = false,
    arg_required_else_help = false,
    disable_help_subcommand = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Runs the plugin against a stdin console host (default).
    Console,
    /// Creates the database and vehicle collection, then exits.
    InitDb,
    /// Prints the vehicles a character owns or holds keys to.
    List {
        /// Character id to look up.
        character: String,
        /// Print JSON documents instead of menu labels.
        #[arg(long)]
        json: bool,
    },
}
