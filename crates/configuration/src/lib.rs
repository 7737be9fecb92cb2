use crate::error::ConfigError;
use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod logging;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use logging::init_tracing;
pub use settings::{Config, DatabaseSettings, ListingSettings, LoggingSettings};

/// File looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Prefix of environment overrides, e.g. `SHOWS__DATABASE__HOST=db`.
pub const ENV_PREFIX: &str = "SHOWS";

/// Loads the application configuration.
///
/// Sources, lowest precedence first: built-in defaults, the TOML file at
/// `path` (or an optional `config.toml`), then `SHOWS__*` environment
/// variables. The result is validated before it is returned.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let file = match path {
        Some(path) => config::File::from(path).required(true),
        None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
    };

    let builder = config::Config::builder()
        .add_source(file)
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

    finish(builder)
}

/// Loads configuration from TOML text only, without consulting the
/// environment.
pub fn load_config_from_str(toml: &str) -> Result<Config, ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::from_str(toml, config::FileFormat::Toml));
    finish(builder)
}

fn finish(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
) -> Result<Config, ConfigError> {
    // Attempt to deserialize the entire configuration into our `Config` struct
    let config = builder.build()?.try_deserialize::<Config>()?;
    config.validate()?;
    Ok(config)
}

/// Command-line flag selecting the configuration file.
#[cfg(feature = "clap")]
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ConfigArgs {
    /// Path to a TOML configuration file (defaults to ./config.toml when present).
    #[arg(long, global = true)]
    pub config: Option<std::path::PathBuf>,
}

#[cfg(feature = "clap")]
impl ConfigArgs {
    pub fn load(&self) -> Result<Config, ConfigError> {
        load_config(self.config.as_deref())
    }
}
