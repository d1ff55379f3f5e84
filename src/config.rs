use anyhow::{Context, Result};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

const DEFAULT_CATALOG_URL: &str =
    "https://raw.githubusercontent.com/modhearth/registry/main/catalog.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_catalog_url")]
    pub catalog_url: String,
    /// Overrides the managed mods folder under the data dir when set.
    #[serde(default)]
    pub mods_dir: Option<PathBuf>,
}

impl AppConfig {
    pub fn load_or_create() -> Result<Self> {
        let base_dir = base_data_dir()?;
        fs::create_dir_all(&base_dir).context("create app data dir")?;
        let path = base_dir.join("config.json");
        if path.exists() {
            let raw = fs::read_to_string(&path).context("read app config")?;
            let config: AppConfig = serde_json::from_str(&raw).context("parse app config")?;
            return Ok(config);
        }

        let config = AppConfig {
            catalog_url: default_catalog_url(),
            mods_dir: None,
        };
        config.save()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let base_dir = base_data_dir()?;
        fs::create_dir_all(&base_dir).context("create app data dir")?;
        let path = base_dir.join("config.json");
        let raw = serde_json::to_string_pretty(self).context("serialize app config")?;
        fs::write(path, raw).context("write app config")?;
        Ok(())
    }

    pub fn mods_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.mods_dir {
            return Ok(dir.clone());
        }
        Ok(base_data_dir()?.join("mods"))
    }
}

fn default_catalog_url() -> String {
    DEFAULT_CATALOG_URL.to_string()
}

pub fn base_data_dir() -> Result<PathBuf> {
    let base = BaseDirs::new().context("resolve home dir")?;
    Ok(base.data_local_dir().join("modhearth"))
}
