//! Path naming module.
//!
//! This module contains the folder path normalization helpers and
//! the generator of unique message file names.

use chrono::Utc;
use log::{debug, trace};
use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

use super::{Error, Result};

/// Separator of folder path segments, on disk and in full names.
pub const SEPARATOR: char = '/';

const DEFAULT_HOST_NAME: &str = "localhost";

/// Normalizes a folder path into a full name.
///
/// Segments are split on `/`, `\` and on the optional extra
/// delimiter. Empty segments are dropped, so the result never starts
/// nor ends with the separator. Segments that would escape the store
/// or name hidden entries (`.`, `..`, `.foo`) are rejected.
pub fn normalize(path: &str, delimiter: Option<char>) -> Result<String> {
    let segments: Vec<&str> = path
        .split(|c| c == SEPARATOR || c == '\\' || Some(c) == delimiter)
        .filter(|segment| !segment.is_empty())
        .collect();

    if segments.iter().any(|segment| segment.starts_with('.')) {
        return Err(Error::InvalidFolderNameError(path.to_owned()));
    }

    Ok(segments.join(&SEPARATOR.to_string()))
}

/// Joins a child segment to a full name.
pub fn join(full_name: &str, child: &str) -> String {
    if full_name.is_empty() {
        child.to_owned()
    } else {
        format!("{}{}{}", full_name, SEPARATOR, child)
    }
}

/// Returns the full name of the parent, or `None` for the root.
pub fn parent(full_name: &str) -> Option<&str> {
    if full_name.is_empty() {
        None
    } else {
        Some(
            full_name
                .rsplit_once(SEPARATOR)
                .map(|(parent, _)| parent)
                .unwrap_or_default(),
        )
    }
}

/// Returns the last segment of a full name.
pub fn name(full_name: &str) -> &str {
    full_name
        .rsplit_once(SEPARATOR)
        .map(|(_, name)| name)
        .unwrap_or(full_name)
}

/// Builds the directory path of a full name under the given root.
pub fn to_path(root: &Path, full_name: &str) -> PathBuf {
    full_name
        .split(SEPARATOR)
        .filter(|segment| !segment.is_empty())
        .fold(root.to_owned(), |path, segment| path.join(segment))
}

/// Returns `true` if the given full name is the given ancestor or
/// one of its descendants.
pub fn is_within(full_name: &str, ancestor: &str) -> bool {
    ancestor.is_empty()
        || full_name == ancestor
        || full_name
            .strip_prefix(ancestor)
            .map(|rest| rest.starts_with(SEPARATOR))
            .unwrap_or_default()
}

/// Generator of unique message file names.
///
/// Names are made of a 12-digit, zero-padded millisecond timestamp,
/// a dot and the host name. Timestamps issued by one generator are
/// strictly increasing, and each candidate is claimed with an
/// exclusive create, so concurrent appends never share a file.
#[derive(Debug)]
pub struct PathNaming {
    host: String,
    last_timestamp: Mutex<i64>,
}

impl PathNaming {
    /// Builds a generator for the given host name, or for the system
    /// host name when none is given.
    pub fn new(host_name: Option<&str>) -> Self {
        let host = host_name
            .map(ToOwned::to_owned)
            .or_else(system_host_name)
            .filter(|host| !host.is_empty())
            .unwrap_or_else(|| DEFAULT_HOST_NAME.to_owned());

        Self {
            host: escape_host(&host),
            last_timestamp: Mutex::new(0),
        }
    }

    /// Returns the escaped host identifier used in file names.
    pub fn host(&self) -> &str {
        &self.host
    }

    fn next_timestamp(&self) -> i64 {
        let mut last = self
            .last_timestamp
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let timestamp = Utc::now().timestamp_millis().max(*last + 1);
        *last = timestamp;
        timestamp
    }

    /// Returns the next candidate file name.
    pub fn next_filename(&self) -> String {
        format!("{:012}.{}", self.next_timestamp(), self.host)
    }

    /// Creates a new, empty message file in the given directory and
    /// returns its name, its path and the open file.
    ///
    /// Retries with a later timestamp while the candidate exists.
    pub fn create_file(&self, dir: &Path) -> Result<(String, PathBuf, fs::File)> {
        loop {
            let filename = self.next_filename();
            let path = dir.join(&filename);
            trace!("message file candidate: {:?}", path);

            if path.exists() {
                debug!("message file {:?} already exists, retrying", path);
                continue;
            }

            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
            {
                Ok(file) => return Ok((filename, path, file)),
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                    debug!("message file {:?} created concurrently, retrying", path);
                }
                Err(err) => return Err(Error::CreateMessageFileError(err, dir.to_owned())),
            }
        }
    }
}

/// Escapes the characters of a host name that cannot appear in a
/// message file name.
fn escape_host(host: &str) -> String {
    host.replace('/', "\\057").replace(':', "\\072")
}

#[cfg(unix)]
fn system_host_name() -> Option<String> {
    nix::unistd::gethostname()
        .ok()
        .and_then(|host| host.into_string().ok())
}

#[cfg(not(unix))]
fn system_host_name() -> Option<String> {
    std::env::var("COMPUTERNAME").ok()
}
