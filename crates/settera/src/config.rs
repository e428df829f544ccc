use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::error::SetteraResult;

/// Environment prefix for overrides, e.g. `SETTERA__SAVE_REVERT_DELAY_MS=500`.
pub const ENV_PREFIX: &str = "SETTERA";

/// Store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// How long a key stays "saved" before reverting to "idle" (in milliseconds)
    #[serde(default = "default_save_revert_delay_ms")]
    pub save_revert_delay_ms: u64,
}

fn default_save_revert_delay_ms() -> u64 {
    2000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            save_revert_delay_ms: default_save_revert_delay_ms(),
        }
    }
}

impl StoreConfig {
    /// Load configuration from defaults, an optional TOML file and the environment.
    ///
    /// A missing file is not an error; the defaults apply.
    pub fn load(path: Option<&Path>) -> SetteraResult<Self> {
        Self::load_with_env(path, None)
    }

    /// Same as [`StoreConfig::load`], reading overrides from `env` instead of
    /// the process environment when given.
    pub(crate) fn load_with_env(
        path: Option<&Path>,
        env: Option<config::Map<String, String>>,
    ) -> SetteraResult<Self> {
        let mut builder = Config::builder()
            .set_default("save_revert_delay_ms", default_save_revert_delay_ms() as i64)?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(false));
        }

        let built = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .build()?;

        Ok(built.try_deserialize()?)
    }

    /// Delay before a "saved" status reverts to "idle".
    pub fn save_revert_delay(&self) -> Duration {
        Duration::from_millis(self.save_revert_delay_ms)
    }
}
