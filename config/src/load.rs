//! Layered configuration loading from files and environment variables.

use std::io;
use std::path::Path;

use rust_cli_config::builder::{ConfigBuilder, DefaultState};
use rust_cli_config::{ConfigError, File};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::environment::Environment;

/// Directory containing configuration files relative to the working directory.
const CONFIGURATION_DIR: &str = "configuration";

/// Prefix for environment variable configuration overrides.
const ENV_PREFIX: &str = "APP";

/// Separator between the prefix and the first key segment.
const ENV_PREFIX_SEPARATOR: &str = "_";

/// Separator for nested configuration keys in environment variables.
const ENV_SEPARATOR: &str = "__";

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum LoadConfigError {
    /// Failed to determine the current working directory.
    #[error("failed to determine the current directory: {0}")]
    CurrentDir(#[source] io::Error),

    /// The `APP_ENVIRONMENT` variable holds an unsupported value.
    #[error("failed to load the environment: {0}")]
    Environment(#[source] io::Error),

    /// A configuration source could not be read or merged.
    #[error("failed to build the configuration: {0}")]
    Build(#[source] ConfigError),

    /// The merged configuration does not deserialize into the target type.
    #[error("failed to deserialize the configuration: {0}")]
    Deserialize(#[source] ConfigError),
}

/// Loads configuration from the `configuration` directory under the current working
/// directory. See [`load_config_from`].
pub fn load_config<T>() -> Result<T, LoadConfigError>
where
    T: DeserializeOwned,
{
    let base_dir = std::env::current_dir().map_err(LoadConfigError::CurrentDir)?;

    load_config_from(&base_dir.join(CONFIGURATION_DIR))
}

/// Loads configuration by layering `base.yaml`, the environment-specific
/// `<env>.yaml` and `APP`-prefixed environment variables, later layers overriding
/// earlier ones.
///
/// Nested keys are addressed in environment variables with `__` between segments,
/// e.g. `APP_SNAPSHOT__CHUNK_SIZE=2048`. Missing files are skipped so an
/// environment-variable-only setup works out of the box.
pub fn load_config_from<T>(directory: &Path) -> Result<T, LoadConfigError>
where
    T: DeserializeOwned,
{
    let environment = Environment::load().map_err(LoadConfigError::Environment)?;

    let settings = ConfigBuilder::<DefaultState>::default()
        .add_source(File::from(directory.join("base.yaml")).required(false))
        .add_source(File::from(directory.join(format!("{environment}.yaml"))).required(false))
        .add_source(
            rust_cli_config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator(ENV_PREFIX_SEPARATOR)
                .separator(ENV_SEPARATOR)
                .try_parsing(true),
        )
        .build()
        .map_err(LoadConfigError::Build)?;

    settings
        .try_deserialize::<T>()
        .map_err(LoadConfigError::Deserialize)
}
