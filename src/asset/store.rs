//! On-disk asset store.
//!
//! Records live as `*.json` files anywhere below the store root. They are
//! written pretty-printed with sorted keys so diffs stay small.

use anyhow::{Context, Result};
use log::warn;
use std::path::{Path, PathBuf};

use crate::runtime::Runtime;

use super::AssetRecord;

/// Loads and saves asset records below a root directory.
pub struct AssetStore<'a, R: Runtime> {
    runtime: &'a R,
    root: PathBuf,
}

impl<'a, R: Runtime> AssetStore<'a, R> {
    pub fn new(runtime: &'a R, root: PathBuf) -> Self {
        Self { runtime, root }
    }

    /// Asset id derived from a record path: `assets/monarch.json` -> `monarch`.
    pub fn asset_id(path: &Path) -> String {
        path.file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// Find every record file below the root, depth first, sorted per directory.
    #[tracing::instrument(skip(self))]
    pub fn find_all(&self) -> Result<Vec<PathBuf>> {
        let mut found = Vec::new();
        if !self.runtime.exists(&self.root) {
            warn!("Asset directory {:?} does not exist", self.root);
            return Ok(found);
        }
        self.collect(&self.root, &mut found)?;
        Ok(found)
    }

    fn collect(&self, dir: &Path, found: &mut Vec<PathBuf>) -> Result<()> {
        for entry in self.runtime.read_dir(dir)? {
            if self.runtime.is_dir(&entry) {
                self.collect(&entry, found)?;
            } else if entry.extension().is_some_and(|ext| ext == "json") {
                found.push(entry);
            }
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub fn load(&self, path: &Path) -> Result<AssetRecord> {
        let content = self.runtime.read_to_string(path)?;
        serde_json::from_str(&content).with_context(|| format!("Malformed asset file {:?}", path))
    }

    #[tracing::instrument(skip(self, record))]
    pub fn save(&self, path: &Path, record: &AssetRecord) -> Result<()> {
        // Going through Value sorts the keys, flattened ones included.
        let value = serde_json::to_value(record)?;
        let content = serde_json::to_string_pretty(&value)?;
        self.runtime
            .write(path, content.as_bytes())
            .with_context(|| format!("Failed to save asset to {:?}", path))
    }

    /// Load every record, optionally only the one matching `asset_id`.
    ///
    /// Records that fail to load are logged and skipped.
    pub fn load_all(&self, asset_id: Option<&str>) -> Result<Vec<(PathBuf, AssetRecord)>> {
        let mut records = Vec::new();

        for path in self.find_all()? {
            let file_id = Self::asset_id(&path);
            if let Some(wanted) = asset_id
                && file_id != wanted
            {
                // stem mismatch, fall back to the id field
                match self.load(&path) {
                    Ok(record) if record.id() == Some(wanted) => records.push((path, record)),
                    _ => {}
                }
                continue;
            }

            match self.load(&path) {
                Ok(record) => records.push((path, record)),
                Err(e) => warn!("Skipping {:?}: {:#}", path, e),
            }
        }

        Ok(records)
    }
}
