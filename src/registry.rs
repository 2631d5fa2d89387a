// src/registry.rs
//! Durable list of tracked repositories. Backed by a JSON array file; every
//! mutation is written before the call returns.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::RegistryError;
use crate::ingest::store::write_atomic;

#[derive(Debug)]
pub struct SubscriptionRegistry {
    path: PathBuf,
    entries: Vec<String>,
}

impl SubscriptionRegistry {
    /// Load the store at `path`. A missing file is an empty registry.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, RegistryError> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(s) if s.trim().is_empty() => Vec::new(),
            Ok(s) => {
                let raw: Vec<String> = serde_json::from_str(&s).map_err(|e| RegistryError::Corrupt {
                    path: path.clone(),
                    message: e.to_string(),
                })?;
                dedup_case_insensitive(raw)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(err) => return Err(RegistryError::Io { path, err }),
        };
        tracing::debug!(path = %path.display(), count = entries.len(), "subscriptions loaded");
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insertion order.
    pub fn list(&self) -> &[String] {
        &self.entries
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.position(identifier).is_some()
    }

    /// Returns `false` when an equal-ignoring-case entry already exists.
    pub fn add(&mut self, identifier: &str) -> Result<bool, RegistryError> {
        let ident = clean(identifier)?;
        if self.contains(&ident) {
            return Ok(false);
        }
        self.entries.push(ident);
        if let Err(e) = self.save() {
            self.entries.pop();
            return Err(e);
        }
        tracing::info!(identifier = %identifier.trim(), "subscription added");
        Ok(true)
    }

    /// Returns `false` when nothing matched.
    pub fn remove(&mut self, identifier: &str) -> Result<bool, RegistryError> {
        let Some(idx) = self.position(identifier) else {
            return Ok(false);
        };
        let removed = self.entries.remove(idx);
        if let Err(e) = self.save() {
            self.entries.insert(idx, removed);
            return Err(e);
        }
        tracing::info!(identifier = %removed, "subscription removed");
        Ok(true)
    }

    fn position(&self, identifier: &str) -> Option<usize> {
        let needle = identifier.trim();
        self.entries.iter().position(|e| e.eq_ignore_ascii_case(needle))
    }

    fn save(&self) -> Result<(), RegistryError> {
        let json = serde_json::to_vec_pretty(&self.entries).map_err(|e| RegistryError::Corrupt {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        write_atomic(&self.path, &json).map_err(|err| RegistryError::Io {
            path: self.path.clone(),
            err,
        })
    }
}

fn clean(identifier: &str) -> Result<String, RegistryError> {
    let t = identifier.trim();
    if t.is_empty() {
        return Err(RegistryError::InvalidIdentifier(identifier.to_string()));
    }
    Ok(t.to_string())
}

fn dedup_case_insensitive(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for it in items {
        let t = it.trim();
        if !t.is_empty() && !out.iter().any(|e| e.eq_ignore_ascii_case(t)) {
            out.push(t.to_string());
        }
    }
    out
}
