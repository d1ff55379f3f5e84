use anyhow::{Context, Result};
use blake3::Hasher;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};
use walkdir::WalkDir;

const INDEX_VERSION: u32 = 1;

/// Persisted record of which mod folders the application tracks.
///
/// A folder present in storage but absent from the index is "untracked";
/// re-indexing rebuilds the entry list from the current storage state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModIndex {
    pub version: u32,
    pub mods: Vec<IndexEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub name: String,
    pub folder: String,
    pub fingerprint: String,
    pub added_at: u64,
    pub modified_at: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildReport {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
}

impl ModIndex {
    pub fn load_or_create(data_dir: &Path) -> Result<Self> {
        let index_path = data_dir.join("index.json");
        if index_path.exists() {
            let raw = fs::read_to_string(&index_path).context("read index.json")?;
            let index: ModIndex = serde_json::from_str(&raw).context("parse index.json")?;
            return Ok(index);
        }

        let index = ModIndex {
            version: INDEX_VERSION,
            mods: Vec::new(),
        };
        index.save(data_dir)?;
        Ok(index)
    }

    pub fn save(&self, data_dir: &Path) -> Result<()> {
        let index_path = data_dir.join("index.json");
        let raw = serde_json::to_string_pretty(self).context("serialize index.json")?;
        fs::write(index_path, raw).context("write index.json")?;
        Ok(())
    }

    pub fn tracked_folders(&self) -> HashSet<String> {
        self.mods.iter().map(|entry| entry.folder.clone()).collect()
    }

    pub fn is_tracked(&self, folder: &str) -> bool {
        self.mods.iter().any(|entry| entry.folder == folder)
    }

    /// Folders present under `mods_dir` that have no index entry.
    pub fn untracked_in(&self, mods_dir: &Path) -> Result<Vec<String>> {
        let folders = scan_mod_folders(mods_dir)?;
        Ok(folders
            .into_iter()
            .filter(|folder| !self.is_tracked(folder))
            .collect())
    }

    /// Rebuilds the entry list from the current storage state: adds entries
    /// for new folders, refreshes changed ones, drops vanished ones.
    pub fn rebuild_from(&mut self, mods_dir: &Path) -> Result<RebuildReport> {
        let folders = scan_mod_folders(mods_dir)?;
        let found: HashSet<&String> = folders.iter().collect();

        let before = self.mods.len();
        self.mods.retain(|entry| found.contains(&entry.folder));
        let mut report = RebuildReport {
            removed: before - self.mods.len(),
            ..RebuildReport::default()
        };

        for folder in &folders {
            let fingerprint = fingerprint_dir(&mods_dir.join(folder));
            match self.mods.iter_mut().find(|entry| &entry.folder == folder) {
                Some(entry) => {
                    if entry.fingerprint != fingerprint {
                        entry.fingerprint = fingerprint;
                        entry.modified_at = now_timestamp();
                        report.updated += 1;
                    }
                }
                None => {
                    let now = now_timestamp();
                    self.mods.push(IndexEntry {
                        name: folder.clone(),
                        folder: folder.clone(),
                        fingerprint,
                        added_at: now,
                        modified_at: now,
                    });
                    report.added += 1;
                }
            }
        }

        self.mods.sort_by(|a, b| a.folder.cmp(&b.folder));
        Ok(report)
    }
}

/// First-level directories under the mods folder that look like mods.
/// Hidden folders and the loader's own directories are skipped.
pub fn scan_mod_folders(mods_dir: &Path) -> Result<Vec<String>> {
    if !mods_dir.exists() {
        return Ok(Vec::new());
    }

    let mut folders = Vec::new();
    for entry in fs::read_dir(mods_dir).context("read mods dir")? {
        let entry = entry.context("read mods dir entry")?;
        let file_type = entry.file_type().context("stat mods dir entry")?;
        if !file_type.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') || name.eq_ignore_ascii_case("hearth") {
            continue;
        }
        folders.push(name);
    }
    folders.sort();
    Ok(folders)
}

fn fingerprint_dir(path: &PathBuf) -> String {
    let mut hasher = Hasher::new();
    for entry in WalkDir::new(path)
        .sort_by_file_name()
        .into_iter()
        .flatten()
    {
        if !entry.file_type().is_file() {
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(path) {
            hasher.update(relative.to_string_lossy().as_bytes());
        }
        if let Ok(meta) = entry.metadata() {
            hasher.update(&meta.len().to_le_bytes());
            if let Ok(modified) = meta.modified() {
                if let Ok(duration) = modified.duration_since(UNIX_EPOCH) {
                    hasher.update(&duration.as_secs().to_le_bytes());
                }
            }
        }
    }
    hasher.finalize().to_hex().to_string()
}

fn now_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or(0)
}
