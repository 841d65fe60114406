//! Vehicle registry, live-world binding and the player commands built on them.

pub mod access;
pub mod binder;
pub mod command;
pub mod keys;
pub mod locator;
pub mod model;
pub mod plate;
pub mod plugin;
pub mod query;
pub mod world;
