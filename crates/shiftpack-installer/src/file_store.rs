use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::KeyValueStore;

/// Key/value entries kept in a single TOML file. Every write rewrites the
/// file through a sibling temp file and a rename.
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    path: PathBuf,
}

impl FileKeyValueStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_state(&self) -> Result<KeyValueStateFile> {
        if !self.path.exists() {
            return Ok(KeyValueStateFile::default());
        }

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("failed reading state file: {}", self.path.display()))?;
        parse_state_file(&content)
            .with_context(|| format!("failed parsing state file: {}", self.path.display()))
    }

    fn save_state(&self, state: &KeyValueStateFile) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed creating state dir: {}", parent.display()))?;
        }

        let content = toml::to_string(state)
            .with_context(|| format!("failed serializing state file: {}", self.path.display()))?;
        let tmp_path = self.path.with_extension("toml.tmp");
        fs::write(&tmp_path, content)
            .with_context(|| format!("failed writing state file: {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &self.path).with_context(|| {
            format!(
                "failed replacing state file {} with {}",
                self.path.display(),
                tmp_path.display()
            )
        })
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.load_state()?.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.write_batch(&[(key, Some(value))])
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.write_batch(&[(key, None)])
    }

    fn write_batch(&mut self, entries: &[(&str, Option<&str>)]) -> Result<()> {
        let mut state = self.load_state()?;
        for (key, value) in entries {
            match value {
                Some(value) => {
                    state.entries.insert(key.to_string(), value.to_string());
                }
                None => {
                    state.entries.remove(*key);
                }
            }
        }
        self.save_state(&state)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct KeyValueStateFile {
    #[serde(default = "state_file_version")]
    version: u32,
    #[serde(default)]
    entries: BTreeMap<String, String>,
}

impl Default for KeyValueStateFile {
    fn default() -> Self {
        Self {
            version: state_file_version(),
            entries: BTreeMap::new(),
        }
    }
}

fn parse_state_file(content: &str) -> Result<KeyValueStateFile> {
    let mut state = toml::from_str::<KeyValueStateFile>(content)?;
    state.version = state_file_version();
    Ok(state)
}

fn state_file_version() -> u32 {
    1
}
