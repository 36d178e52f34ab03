//! Store config module.
//!
//! This module contains the representation of the store
//! configuration.

use serde::Deserialize;
use std::{env, path::PathBuf};

use super::{Error, Result};

/// Represents the store configuration.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize)]
pub struct StoreConfig {
    /// Represents the root directory of the store. Shell expansions
    /// like `~` and `$HOME` are supported.
    pub root_dir: PathBuf,
    /// Represents the host identifier used in message file names.
    /// Defaults to the system host name.
    #[serde(default)]
    pub host_name: Option<String>,
    /// Represents an extra folder delimiter accepted when resolving
    /// folder names, for example `.` for `INBOX.Sent`.
    #[serde(default)]
    pub delimiter: Option<char>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root_dir: dirs::home_dir()
                .map(|dir| dir.join("Mail"))
                .unwrap_or_else(|| PathBuf::from("Mail")),
            host_name: None,
            delimiter: None,
        }
    }
}

impl StoreConfig {
    pub fn new<P: Into<PathBuf>>(root_dir: P) -> Self {
        Self {
            root_dir: root_dir.into(),
            ..Self::default()
        }
    }

    /// Returns the expanded, absolute root directory.
    pub fn root_dir(&self) -> Result<PathBuf> {
        let root_dir = self.root_dir.to_string_lossy();
        let root_dir: PathBuf = shellexpand::full(&root_dir)
            .map_err(|err| Error::ExpandRootDirError(err, root_dir.to_string()))?
            .to_string()
            .into();

        if root_dir.is_absolute() {
            Ok(root_dir)
        } else {
            Ok(env::current_dir()
                .map_err(Error::GetCurrentDirError)?
                .join(root_dir))
        }
    }
}
