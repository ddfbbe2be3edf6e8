use std::fmt;
use std::io::Error;
use std::str::FromStr;

/// Name of the environment variable which contains the environment name.
const APP_ENVIRONMENT_ENV_NAME: &str = "APP_ENVIRONMENT";

/// The name of the development environment.
const DEV_ENV_NAME: &str = "dev";

/// The name of the production environment.
const PROD_ENV_NAME: &str = "prod";

/// Represents the runtime environment for the connector.
///
/// Use [`Environment`] to distinguish between development and production modes when
/// selecting which configuration files to layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Development environment.
    Dev,
    /// Production environment.
    Prod,
}

impl Environment {
    /// Loads the environment from the `APP_ENVIRONMENT` env variable, defaulting to
    /// [`Environment::Dev`] when it is not set.
    pub fn load() -> Result<Environment, Error> {
        std::env::var(APP_ENVIRONMENT_ENV_NAME)
            .unwrap_or_else(|_| DEV_ENV_NAME.to_string())
            .parse()
    }

    /// Returns the string name of the environment.
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Dev => DEV_ENV_NAME,
            Environment::Prod => PROD_ENV_NAME,
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = Error;

    /// Parses an environment name case-insensitively; accepts `dev` or `prod`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            DEV_ENV_NAME => Ok(Self::Dev),
            PROD_ENV_NAME => Ok(Self::Prod),
            other => Err(Error::other(format!(
                "{other} is not a supported environment. Use either `{DEV_ENV_NAME}` or `{PROD_ENV_NAME}`.",
            ))),
        }
    }
}
