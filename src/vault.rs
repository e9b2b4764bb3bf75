//! Vault Registry
//!
//! Maps vault names to canonical root directories. Built once at startup from
//! the configured name → path table and never mutated afterwards, so it can be
//! shared behind an `Arc` and read from any number of tasks without locking.

use crate::tools::ToolError;
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Accessibility report for one vault
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct VaultHealth {
    /// Vault name
    pub name: String,
    /// Canonical root directory
    pub path: PathBuf,
    /// Whether the root still exists and is a directory
    pub accessible: bool,
}

#[derive(Debug, Clone)]
struct VaultRoot {
    /// Canonical directory
    root: PathBuf,
    /// Directory name as configured, before symlinks are resolved
    label: String,
}

/// Immutable name → root directory table
#[derive(Debug, Clone, Default)]
pub struct VaultRegistry {
    vaults: BTreeMap<String, VaultRoot>,
}

impl VaultRegistry {
    /// Build a registry, checking that every root exists and is a directory
    ///
    /// # Errors
    ///
    /// Returns an error naming the vault if its path is missing, is not a
    /// directory, or cannot be canonicalized.
    pub fn new(vaults: BTreeMap<String, PathBuf>) -> Result<Self> {
        let mut resolved = BTreeMap::new();

        for (name, path) in vaults {
            if !path.exists() {
                anyhow::bail!(
                    "Vault path does not exist: {} (vault: {})",
                    path.display(),
                    name
                );
            }
            if !path.is_dir() {
                anyhow::bail!(
                    "Vault path is not a directory: {} (vault: {})",
                    path.display(),
                    name
                );
            }

            let canonical = path
                .canonicalize()
                .with_context(|| format!("Failed to resolve vault path for '{}'", name))?;
            let label = path
                .file_name()
                .or_else(|| canonical.file_name())
                .map(|label| label.to_string_lossy().into_owned())
                .unwrap_or_else(|| canonical.display().to_string());

            tracing::debug!("Registered vault '{}' at {:?}", name, canonical);
            resolved.insert(
                name,
                VaultRoot {
                    root: canonical,
                    label,
                },
            );
        }

        Ok(Self { vaults: resolved })
    }

    /// Look up a vault root without building an error
    pub fn get(&self, name: &str) -> Option<&Path> {
        self.vaults.get(name).map(|vault| vault.root.as_path())
    }

    /// Directory name of the vault as configured
    ///
    /// For a vault configured through a symlink this is the link's name, not
    /// the target's.
    pub fn label(&self, name: &str) -> Option<&str> {
        self.vaults.get(name).map(|vault| vault.label.as_str())
    }

    /// Resolve a vault root, or describe which vaults exist
    pub fn resolve(&self, name: &str) -> Result<&Path, ToolError> {
        self.get(name).ok_or_else(|| ToolError::UnknownVault {
            name: name.to_string(),
            available: self.names(),
        })
    }

    /// Sorted vault names
    pub fn names(&self) -> Vec<String> {
        self.vaults.keys().cloned().collect()
    }

    /// Check every root is still reachable
    pub fn health(&self) -> Vec<VaultHealth> {
        self.vaults
            .iter()
            .map(|(name, vault)| VaultHealth {
                name: name.clone(),
                path: vault.root.clone(),
                accessible: vault.root.is_dir(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.vaults.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vaults.is_empty()
    }
}
