use std::{collections::HashMap, path::PathBuf};

use config::{Config, ConfigError, Environment};
use serde::Deserialize;

/// Settings read from `PROMOTION_*` environment variables.
pub struct PromotionConfig {
    pub cache_dir: Option<PathBuf>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub token: Option<String>,
}

impl PromotionConfig {
    pub fn load() -> anyhow::Result<Self> {
        let raw_config = RawConfig::load(None)?;

        Ok(Self {
            cache_dir: raw_config.cache.dir,
            name: raw_config.git.name,
            email: raw_config.git.email,
            token: raw_config.git.token,
        })
    }
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct RawConfig {
    #[serde(default)]
    cache: CacheConfig,
    #[serde(default)]
    git: GitConfig,
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct CacheConfig {
    dir: Option<PathBuf>,
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct GitConfig {
    name: Option<String>,
    email: Option<String>,
    token: Option<String>,
}

impl RawConfig {
    fn load(env: Option<HashMap<String, String>>) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(
                Environment::with_prefix("PROMOTION")
                    .separator("_")
                    .source(env),
            )
            .build()?
            .try_deserialize()
    }
}
