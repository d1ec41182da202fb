mod settings;

use std::path::Path;

use config::{Config, Environment, File};

use settings::PartialSettings;

pub use config::ConfigError;
pub use settings::{
    BridgeSettings, HubSettings, LogSettings, ServerSettings, Settings, StorageSettings,
};

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "config/default";

/// Prefix of environment overrides, e.g. `LIVEFEED_HUB__QUEUE_CAPACITY=64`.
pub const ENV_PREFIX: &str = "LIVEFEED";

/// Loads the configuration from `.env`, the default file and environment variables.
/// Values not given anywhere fall back to [`Settings::default`].
pub fn load_config() -> Result<Settings, ConfigError> {
    let _ = dotenvy::dotenv();
    load_config_from(DEFAULT_CONFIG_FILE)
}

/// Same as [`load_config`] with an explicit config file (extension optional)
/// and without reading `.env`.
pub fn load_config_from(path: impl AsRef<Path>) -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::from(path.as_ref()).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    let settings = partial.merge_onto(Settings::default());
    settings.hub.validate()?;
    Ok(settings)
}
