use crate::core::ModCore;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One catalog entry as the rest of the UI sees it. `categories` is a set:
/// the core hands it over as an ordered sequence that may carry duplicates,
/// and deserialization collapses those away.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mod {
    pub name: String,
    pub description: String,
    pub publisher: String,
    pub repo: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub categories: HashSet<String>,
    #[serde(default)]
    pub installed: bool,
    #[serde(default)]
    pub last_updated: u64,
}

impl Mod {
    /// Stable display form of the category set.
    pub fn categories_label(&self) -> String {
        let mut list: Vec<&str> = self.categories.iter().map(String::as_str).collect();
        list.sort_unstable();
        list.join(", ")
    }
}

/// Fetches the mod list from the core and validates its shape. A malformed
/// payload is a hard error; core failures propagate untouched.
pub fn fetch_mod_list(core: &dyn ModCore) -> Result<Vec<Mod>> {
    let raw = core.mod_list()?;
    let mods: Vec<Mod> = serde_json::from_value(raw).context("decode mod list")?;
    Ok(mods)
}
