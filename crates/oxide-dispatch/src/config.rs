//! Router configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cors::CorsOptions;
use crate::error::Result;

/// Environment variable that overrides [`RouterConfig::environment`].
pub const ENV_VAR: &str = "APP_ENV";

/// The environment the application runs in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Errors are reported to clients without detail.
    #[default]
    Production,
    /// Error details are shown to clients.
    Development,
    /// Like development; used by test suites.
    Testing,
}

impl Environment {
    /// Parses an environment name (`production`/`prod`, `development`/`dev`/`local`, `testing`/`test`).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "production" | "prod" => Some(Self::Production),
            "development" | "dev" | "local" => Some(Self::Development),
            "testing" | "test" => Some(Self::Testing),
            _ => None,
        }
    }

    /// Returns true in production.
    pub fn is_production(self) -> bool {
        self == Self::Production
    }
}

/// Settings read at bootstrap.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Controls how much error detail clients see.
    pub environment: Environment,
    /// Where the route cache lives, if caching is used.
    pub cache_path: Option<PathBuf>,
    /// Directory for persisted rate-limit records. Without one, limits are
    /// kept in memory.
    pub rate_limit_dir: Option<PathBuf>,
    /// Honor `_method` form fields and `X-HTTP-Method-Override` on POST.
    pub method_override: bool,
    /// CORS settings; CORS is disabled when absent.
    pub cors: Option<CorsOptions>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Production,
            cache_path: None,
            rate_limit_dir: None,
            method_override: true,
            cors: None,
        }
    }
}

impl RouterConfig {
    /// Reads a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Applies `APP_ENV`, if set to a known environment.
    #[must_use]
    pub fn with_env(self) -> Self {
        let value = std::env::var(ENV_VAR).ok();
        self.with_env_value(value.as_deref())
    }

    fn with_env_value(mut self, value: Option<&str>) -> Self {
        if let Some(environment) = value.and_then(Environment::from_str) {
            self.environment = environment;
        }
        self
    }

    /// Sets the environment.
    #[must_use]
    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }
}
