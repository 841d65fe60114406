// Copyright (c) 2025 motorpool contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Motorpool: persistent player-owned vehicles for multiplayer game servers.
//!
//! Vehicles live as documents in a store, are spawned into the world on
//! demand, and are operated by their owner and anyone holding a key.

// Public modules that can be used by the binary entrypoint.
pub mod cli;
pub mod config;
pub mod console;
pub mod db;
pub mod engine;
pub mod error;
pub mod error_ext;
pub mod host;
pub mod store;
