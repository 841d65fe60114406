//! Configuration management for motorpool

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure for the application
#[derive(Debug, Default, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Database configuration
    pub database: DatabaseConfig,

    /// Gameplay tuning for vehicle commands
    pub vehicles: VehiclesConfig,

    /// Log output
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Local path to the SQLite database file.
    ///
    /// Examples:
    /// - `~/.motorpool/motorpool.db`
    /// - `:memory:` (in-memory database)
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    /// Collection (table) holding vehicle documents. Also names the uid
    /// counter.
    #[serde(default = "default_collection")]
    pub collection: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct VehiclesConfig {
    /// How close a vehicle must be for `/vlock` to find it.
    #[serde(default = "default_interaction_radius")]
    pub interaction_radius: f32,

    /// How close the other player must be for `/vkeys`.
    #[serde(default = "default_key_transfer_radius")]
    pub key_transfer_radius: f32,

    /// Fuel level of newly created vehicles.
    #[serde(default = "default_fuel")]
    pub default_fuel: f32,

    /// Plate draws attempted before a duplicate plate is accepted.
    #[serde(default = "default_plate_retry_attempts")]
    pub plate_retry_attempts: u32,

    /// Models the world can create. Empty allows any model name.
    #[serde(default)]
    pub allowed_models: Vec<String>,
}

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Enable debug-level logging
    #[serde(default)]
    pub verbose: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            collection: default_collection(),
        }
    }
}

impl Default for VehiclesConfig {
    fn default() -> Self {
        Self {
            interaction_radius: default_interaction_radius(),
            key_transfer_radius: default_key_transfer_radius(),
            default_fuel: default_fuel(),
            plate_retry_attempts: default_plate_retry_attempts(),
            allowed_models: Vec::new(),
        }
    }
}

// Default value functions
fn default_db_path() -> PathBuf {
    dirs::home_dir()
        .map(|p| p.join(".motorpool").join("motorpool.db"))
        .unwrap_or_else(|| PathBuf::from(".motorpool/motorpool.db"))
}

fn default_collection() -> String {
    crate::store::DEFAULT_COLLECTION.to_string()
}

fn default_interaction_radius() -> f32 {
    10.0
}

fn default_key_transfer_radius() -> f32 {
    10.0
}

fn default_fuel() -> f32 {
    100.0
}

fn default_plate_retry_attempts() -> u32 {
    8
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .set_default(
                "database.path",
                default_db_path().to_string_lossy().to_string(),
            )?
            .set_default("database.collection", default_collection())?
            .set_default(
                "vehicles.interaction_radius",
                default_interaction_radius() as f64,
            )?
            .set_default(
                "vehicles.key_transfer_radius",
                default_key_transfer_radius() as f64,
            )?
            .set_default("vehicles.default_fuel", default_fuel() as f64)?
            .set_default(
                "vehicles.plate_retry_attempts",
                default_plate_retry_attempts() as i64,
            )?
            .set_default("vehicles.allowed_models", Vec::<String>::new())?
            .set_default("logging.verbose", false)?;

        // motorpool.toml in the current directory
        if std::path::Path::new("motorpool.toml").exists() {
            builder = builder.add_source(config::File::with_name("motorpool"));
        }

        // ~/.motorpool/motorpool.toml
        if let Some(home_dir) = dirs::home_dir() {
            let config_path = home_dir.join(".motorpool").join("motorpool.toml");
            if config_path.exists() {
                builder = builder.add_source(config::File::from(config_path));
            }
        }

        // Environment overrides, e.g. MOTORPOOL__VEHICLES__INTERACTION_RADIUS=12
        builder = builder.add_source(
            config::Environment::with_prefix("MOTORPOOL")
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("vehicles.allowed_models")
                .try_parsing(true),
        );

        let settings = builder.build()?;
        settings.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let cfg = Config::default();
        assert_eq!(cfg.database.collection, "vehicles");
        assert!(cfg.database.path.to_string_lossy().contains("motorpool.db"));
        assert_eq!(cfg.vehicles.interaction_radius, 10.0);
        assert_eq!(cfg.vehicles.key_transfer_radius, 10.0);
        assert_eq!(cfg.vehicles.default_fuel, 100.0);
        assert_eq!(cfg.vehicles.plate_retry_attempts, 8);
        assert!(cfg.vehicles.allowed_models.is_empty());
        assert!(!cfg.logging.verbose);
    }

    #[test]
    #[serial_test::serial]
    fn load_without_overrides_matches_defaults() {
        let loaded = Config::load().expect("load config");
        assert_eq!(loaded.database.collection, "vehicles");
        assert_eq!(loaded.vehicles.plate_retry_attempts, 8);
    }

    #[test]
    #[serial_test::serial]
    #[allow(unsafe_code)]
    fn env_overrides_work() {
        unsafe { std::env::set_var("MOTORPOOL__VEHICLES__INTERACTION_RADIUS", "12.5") };
        unsafe { std::env::set_var("MOTORPOOL__DATABASE__COLLECTION", "garage") };
        unsafe { std::env::set_var("MOTORPOOL__VEHICLES__ALLOWED_MODELS", "sultan,comet") };
        let loaded = Config::load().expect("load config from env");
        assert_eq!(loaded.vehicles.interaction_radius, 12.5);
        assert_eq!(loaded.database.collection, "garage");
        assert_eq!(loaded.vehicles.allowed_models, vec!["sultan", "comet"]);
        unsafe { std::env::remove_var("MOTORPOOL__VEHICLES__INTERACTION_RADIUS") };
        unsafe { std::env::remove_var("MOTORPOOL__DATABASE__COLLECTION") };
        unsafe { std::env::remove_var("MOTORPOOL__VEHICLES__ALLOWED_MODELS") };
    }
}
