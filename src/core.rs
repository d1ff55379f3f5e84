use crate::index::ModIndex;
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    fs::File,
    io::{Read, Write},
    path::PathBuf,
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use thiserror::Error;

const USER_AGENT: &str = concat!("modhearth/", env!("CARGO_PKG_VERSION"));
const CATALOG_CACHE_VERSION: u32 = 1;
const CATALOG_CACHE_SECS: u64 = 15 * 60;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("catalog request failed: {0}")]
    Http(String),
    #[error("catalog decode failed: {0}")]
    Decode(String),
    #[error("mod index: {0}")]
    Index(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The native core behind the UI: mod listing, untracked detection and
/// re-indexing. The list payload crosses the seam as raw JSON; shape
/// validation happens on the consuming side.
pub trait ModCore {
    fn mod_list(&self) -> Result<Value, CoreError>;
    fn has_untracked_mods(&self) -> Result<bool, CoreError>;
    fn refresh_mods_folder(&self) -> Result<(), CoreError>;
}

/// Catalog record in its wire shape: `categories` stays an ordered
/// sequence here, duplicates and all.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CatalogEntry {
    name: String,
    description: String,
    publisher: String,
    repo: String,
    download_url: String,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    folder_name: Option<String>,
    #[serde(default)]
    categories: Vec<String>,
    #[serde(default)]
    installed: bool,
    #[serde(default)]
    last_updated: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheHeader {
    version: u32,
    timestamp: u64,
}

#[derive(Serialize, Deserialize)]
struct CatalogCache {
    header: CacheHeader,
    mods: Vec<CatalogEntry>,
}

pub struct NativeCore {
    data_dir: PathBuf,
    mods_dir: PathBuf,
    catalog_url: String,
    agent: ureq::Agent,
}

impl NativeCore {
    pub fn new(data_dir: PathBuf, mods_dir: PathBuf, catalog_url: String) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(5))
            .timeout_read(Duration::from_secs(10))
            .timeout_write(Duration::from_secs(10))
            .build();
        Self {
            data_dir,
            mods_dir,
            catalog_url,
            agent,
        }
    }

    fn cache_path(&self) -> PathBuf {
        self.data_dir.join("catalog.cache.json.gz")
    }

    fn fetch_catalog(&self) -> Result<Vec<CatalogEntry>, CoreError> {
        let response = self
            .agent
            .get(&self.catalog_url)
            .set("User-Agent", USER_AGENT)
            .call()
            .map_err(|err| CoreError::Http(err.to_string()))?;
        response
            .into_json()
            .map_err(|err| CoreError::Decode(err.to_string()))
    }

    /// A stale, missing or unreadable cache reads as a miss.
    fn load_catalog_cache(&self) -> Option<Vec<CatalogEntry>> {
        let file = File::open(self.cache_path()).ok()?;
        let mut decoder = GzDecoder::new(file);
        let mut raw = String::new();
        decoder.read_to_string(&mut raw).ok()?;
        let cache: CatalogCache = serde_json::from_str(&raw).ok()?;
        if cache.header.version != CATALOG_CACHE_VERSION {
            return None;
        }
        if now_secs().saturating_sub(cache.header.timestamp) > CATALOG_CACHE_SECS {
            return None;
        }
        Some(cache.mods)
    }

    fn save_catalog_cache(&self, mods: &[CatalogEntry]) -> Result<(), CoreError> {
        let file = File::create(self.cache_path())?;
        let mut encoder = GzEncoder::new(file, Compression::default());
        let cache = CatalogCache {
            header: CacheHeader {
                version: CATALOG_CACHE_VERSION,
                timestamp: now_secs(),
            },
            mods: mods.to_vec(),
        };
        let raw = serde_json::to_vec(&cache).map_err(|err| CoreError::Decode(err.to_string()))?;
        encoder.write_all(&raw)?;
        encoder.finish()?;
        Ok(())
    }

    fn load_index(&self) -> Result<ModIndex, CoreError> {
        ModIndex::load_or_create(&self.data_dir).map_err(|err| CoreError::Index(err.to_string()))
    }

    fn mark_installed(&self, mods: &mut [CatalogEntry]) -> Result<(), CoreError> {
        let tracked = self.load_index()?.tracked_folders();
        for entry in mods.iter_mut() {
            entry.installed = entry
                .folder_name
                .as_deref()
                .map(|folder| tracked.contains(folder))
                .unwrap_or(false);
        }
        Ok(())
    }
}

impl ModCore for NativeCore {
    fn mod_list(&self) -> Result<Value, CoreError> {
        let mut mods = match self.load_catalog_cache() {
            Some(mods) => mods,
            None => {
                let mods = self.fetch_catalog()?;
                let _ = self.save_catalog_cache(&mods);
                mods
            }
        };
        self.mark_installed(&mut mods)?;
        serde_json::to_value(mods).map_err(|err| CoreError::Decode(err.to_string()))
    }

    fn has_untracked_mods(&self) -> Result<bool, CoreError> {
        let index = self.load_index()?;
        let untracked = index
            .untracked_in(&self.mods_dir)
            .map_err(|err| CoreError::Index(err.to_string()))?;
        Ok(!untracked.is_empty())
    }

    fn refresh_mods_folder(&self) -> Result<(), CoreError> {
        let mut index = self.load_index()?;
        index
            .rebuild_from(&self.mods_dir)
            .map_err(|err| CoreError::Index(err.to_string()))?;
        index
            .save(&self.data_dir)
            .map_err(|err| CoreError::Index(err.to_string()))?;
        Ok(())
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn sample_entry(name: &str, folder: Option<&str>) -> CatalogEntry {
        CatalogEntry {
            name: name.to_string(),
            description: "a mod".to_string(),
            publisher: "someone".to_string(),
            repo: format!("https://example.invalid/{name}"),
            download_url: format!("https://example.invalid/{name}/archive.zip"),
            image: None,
            version: Some("1.0.0".to_string()),
            folder_name: folder.map(str::to_string),
            categories: vec!["Content".to_string()],
            installed: false,
            last_updated: 1_700_000_000,
        }
    }

    fn core_at(tmp: &tempfile::TempDir) -> NativeCore {
        let data_dir = tmp.path().join("data");
        let mods_dir = tmp.path().join("mods");
        fs::create_dir_all(&data_dir).unwrap();
        fs::create_dir_all(&mods_dir).unwrap();
        NativeCore::new(data_dir, mods_dir, "http://127.0.0.1:9/catalog.json".to_string())
    }

    #[test]
    fn catalog_cache_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let core = core_at(&tmp);
        let mods = vec![sample_entry("alpha", Some("alpha")), sample_entry("beta", None)];

        core.save_catalog_cache(&mods).unwrap();
        let loaded = core.load_catalog_cache().expect("fresh cache should hit");
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].name, "alpha");
        assert_eq!(loaded[0].categories, vec!["Content".to_string()]);
    }

    #[test]
    fn missing_cache_reads_as_miss() {
        let tmp = tempfile::tempdir().unwrap();
        let core = core_at(&tmp);
        assert!(core.load_catalog_cache().is_none());
    }

    #[test]
    fn mod_list_marks_tracked_folders_installed() {
        let tmp = tempfile::tempdir().unwrap();
        let core = core_at(&tmp);
        fs::create_dir_all(tmp.path().join("mods").join("alpha")).unwrap();
        core.refresh_mods_folder().unwrap();

        let mods = vec![sample_entry("alpha", Some("alpha")), sample_entry("beta", Some("beta"))];
        core.save_catalog_cache(&mods).unwrap();

        let payload = core.mod_list().unwrap();
        let listed: Vec<CatalogEntry> = serde_json::from_value(payload).unwrap();
        assert!(listed[0].installed);
        assert!(!listed[1].installed);
    }

    #[test]
    fn untracked_check_follows_the_index() {
        let tmp = tempfile::tempdir().unwrap();
        let core = core_at(&tmp);
        assert!(!core.has_untracked_mods().unwrap());

        fs::create_dir_all(tmp.path().join("mods").join("alpha")).unwrap();
        assert!(core.has_untracked_mods().unwrap());

        core.refresh_mods_folder().unwrap();
        assert!(!core.has_untracked_mods().unwrap());
    }
}
