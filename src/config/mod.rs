//! Layered configuration.
//!
//! Values come from `Settings::default()`, then an optional TOML file, then
//! `RELAY_`-prefixed environment variables (`RELAY_SERVER__PORT=9000`). The
//! bare `PORT` and `REDIS_URL` variables win over everything else.

mod settings;

use crate::config::settings::PartialSettings;
use config::{Config, ConfigError, Environment, File};

pub use settings::{
    BrokerSettings, LogSettings, MediumKind, ServerSettings, SessionSettings, Settings,
};

/// Loads the configuration from `config/default` and environment variables.
pub fn load_config() -> Result<Settings, ConfigError> {
    load_config_from("config/default")
}

/// Same as `load_config`, reading the optional file source from `path`.
pub fn load_config_from(path: &str) -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name(path).required(false))
        .add_source(
            Environment::with_prefix("RELAY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .set_override_option("server.port", std::env::var("PORT").ok())?
        .set_override_option("broker.redis_url", std::env::var("REDIS_URL").ok())?;

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(partial.merge_with_defaults())
}
