use std::path::Path;

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use tracing::debug;

use super::runtime::RunConfig;

/// Prefix for environment overrides, e.g. `KFOLD_FOLDS=5`, `KFOLD_TRAINER__MAX_ITER=300`
pub const ENV_PREFIX: &str = "KFOLD";

/// Merge defaults, an optional TOML file and `KFOLD_*` environment variables.
///
/// A `.env` file in the working directory is loaded into the environment
/// first. CLI flags are applied on top by the caller.
pub fn load_config(path: impl AsRef<Path>) -> Result<RunConfig> {
    if let Ok(env_file) = dotenvy::dotenv() {
        debug!("Loaded environment from {}", env_file.display());
    }
    load_with_env(path, Environment::with_prefix(ENV_PREFIX))
}

fn load_with_env(path: impl AsRef<Path>, env: Environment) -> Result<RunConfig> {
    let path = path.as_ref();
    let settings = Config::builder()
        .add_source(
            File::new(&path.to_string_lossy(), FileFormat::Toml).required(false),
        )
        .add_source(
            env.prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("trainer.layers"),
        )
        .build()
        .with_context(|| format!("failed to load configuration from {}", path.display()))?;

    let config: RunConfig = settings
        .try_deserialize()
        .context("invalid configuration values")?;
    debug!("Configuration loaded: {:?}", config);
    Ok(config)
}

/// Render the effective configuration as TOML
pub fn to_toml(config: &RunConfig) -> Result<String> {
    toml::to_string_pretty(config).context("failed to serialize configuration")
}
