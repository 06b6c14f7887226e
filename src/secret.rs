//! Locally persisted shared secret
//!
//! A single string kept in a small JSON file under the key `agent-password`.
//! It is read when the store is opened and written only on explicit save.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::info;

/// Storage key of the shared secret
pub const SECRET_KEY: &str = "agent-password";

#[derive(Debug)]
pub struct SecretStore {
    path: PathBuf,
    value: Option<String>,
}

impl SecretStore {
    /// Open the store, loading any previously saved secret
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let value = read_secret(&path)?;
        if value.is_some() {
            info!("Loaded saved secret from {}", path.display());
        }
        Ok(Self { path, value })
    }

    /// Store that lives only in memory until saved
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            value: None,
        }
    }

    pub fn get(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn is_set(&self) -> bool {
        self.value.is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Trim and persist; an empty value is rejected and nothing is written
    pub fn save(&mut self, raw: &str) -> Result<()> {
        let value = raw.trim();
        if value.is_empty() {
            bail!("Password cannot be empty.");
        }

        let mut entries = read_entries(&self.path)?;
        entries.insert(SECRET_KEY.to_string(), value.to_string());
        write_entries(&self.path, &entries)?;

        info!("Secret saved ({} chars)", value.chars().count());
        self.value = Some(value.to_string());
        Ok(())
    }

    /// Remove the saved secret
    pub fn clear(&mut self) -> Result<()> {
        let mut entries = read_entries(&self.path)?;
        if entries.remove(SECRET_KEY).is_some() {
            write_entries(&self.path, &entries)?;
            info!("Secret cleared");
        }
        self.value = None;
        Ok(())
    }
}

fn read_secret(path: &Path) -> Result<Option<String>> {
    Ok(read_entries(path)?
        .remove(SECRET_KEY)
        .filter(|v| !v.trim().is_empty()))
}

fn read_entries(path: &Path) -> Result<BTreeMap<String, String>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read secret store {}", path.display()))?;
    if text.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    serde_json::from_str(&text)
        .with_context(|| format!("Secret store {} is not valid JSON", path.display()))
}

fn write_entries(path: &Path, entries: &BTreeMap<String, String>) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(entries)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write secret store {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_trims_and_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state").join("secret.json");

        let mut store = SecretStore::open(&path).unwrap();
        assert!(!store.is_set());

        store.save("  swordfish \n").unwrap();
        assert_eq!(store.get(), Some("swordfish"));

        let reopened = SecretStore::open(&path).unwrap();
        assert_eq!(reopened.get(), Some("swordfish"));
    }

    #[test]
    fn test_empty_secret_rejected_without_writing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secret.json");

        let mut store = SecretStore::open(&path).unwrap();
        let err = store.save("   ").unwrap_err();

        assert_eq!(err.to_string(), "Password cannot be empty.");
        assert!(!path.exists());
        assert!(!store.is_set());
    }

    #[test]
    fn test_clear_removes_saved_value() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secret.json");

        let mut store = SecretStore::open(&path).unwrap();
        store.save("swordfish").unwrap();
        store.clear().unwrap();

        assert!(!store.is_set());
        assert!(!SecretStore::open(&path).unwrap().is_set());
    }

    #[test]
    fn test_file_keyed_by_agent_password() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secret.json");

        SecretStore::open(&path).unwrap().save("swordfish").unwrap();
        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["agent-password"], "swordfish");
    }
}
