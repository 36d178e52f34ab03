//! Directory cache module.
//!
//! This module contains the snapshot of the immediate children of a
//! folder directory, split into subfolder names and message slots.

use log::{debug, trace};
use std::{
    collections::{HashMap, HashSet},
    fs, io,
    path::Path,
};

use crate::Message;

use super::{Error, Result};

#[derive(Debug)]
struct Slot {
    filename: String,
    message: Option<Message>,
}

/// Represents the listing of a folder directory.
///
/// Message numbers are 1-based positions in the listing. They stay
/// stable for the lifetime of the cache, whatever happens on disk,
/// and are compacted when messages are expunged.
#[derive(Debug, Default)]
pub struct DirectoryCache {
    folders: Vec<String>,
    slots: Vec<Slot>,
}

impl DirectoryCache {
    /// Lists the given directory once. Hidden entries are skipped and
    /// names are sorted. A missing directory gives an empty cache.
    pub fn read(dir: &Path) -> Result<Self> {
        debug!("reading directory {:?}", dir);

        let mut cache = Self::default();
        let (folders, mut filenames) = match list(dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("directory {:?} does not exist", dir);
                return Ok(cache);
            }
            Err(err) => return Err(Error::ReadDirError(err, dir.to_owned())),
        };

        cache.folders = folders;
        cache.folders.sort();
        filenames.sort();
        cache.slots = filenames
            .into_iter()
            .map(|filename| Slot {
                filename,
                message: None,
            })
            .collect();

        trace!("cache: {:?}", cache);
        Ok(cache)
    }

    /// Lists the directory again. Messages already loaded keep their
    /// handle when their file is still listed, and are renumbered.
    pub fn refresh(&mut self, dir: &Path) -> Result<()> {
        let mut fresh = Self::read(dir)?;
        let mut loaded: HashMap<String, Message> = self
            .slots
            .drain(..)
            .filter_map(|slot| slot.message.map(|message| (slot.filename, message)))
            .collect();

        for (i, slot) in fresh.slots.iter_mut().enumerate() {
            if let Some(message) = loaded.remove(&slot.filename) {
                message.set_number(i + 1);
                slot.message = Some(message);
            }
        }

        if !loaded.is_empty() {
            debug!("{} loaded message(s) vanished from {:?}", loaded.len(), dir);
        }

        *self = fresh;
        Ok(())
    }

    /// Re-reads the subfolder names only, keeping message slots
    /// untouched.
    pub fn reload_folders(&mut self, dir: &Path) -> Result<()> {
        let mut folders = match list(dir) {
            Ok((folders, _)) => folders,
            Err(err) if err.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(err) => return Err(Error::ReadDirError(err, dir.to_owned())),
        };
        folders.sort();
        self.folders = folders;
        Ok(())
    }

    pub fn folders(&self) -> &[String] {
        &self.folders
    }

    /// Returns the number of message slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn slot(&self, number: usize) -> Option<&Slot> {
        number.checked_sub(1).and_then(|i| self.slots.get(i))
    }

    pub fn filename(&self, number: usize) -> Option<&str> {
        self.slot(number).map(|slot| slot.filename.as_str())
    }

    /// Returns the loaded message at the given number, if any.
    pub fn message(&self, number: usize) -> Option<&Message> {
        self.slot(number).and_then(|slot| slot.message.as_ref())
    }

    pub fn set_message(&mut self, number: usize, message: Message) {
        if let Some(slot) = number.checked_sub(1).and_then(|i| self.slots.get_mut(i)) {
            slot.message = Some(message);
        }
    }

    /// Appends a loaded message and returns its number.
    pub fn push(&mut self, filename: String, message: Message) -> usize {
        self.slots.push(Slot {
            filename,
            message: Some(message),
        });
        self.slots.len()
    }

    /// Returns the number of the message stored in the given file.
    pub fn position(&self, filename: &str) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.filename == filename)
            .map(|i| i + 1)
    }

    /// Iterates over the messages already loaded.
    pub fn loaded(&self) -> impl Iterator<Item = &Message> {
        self.slots.iter().filter_map(|slot| slot.message.as_ref())
    }

    /// Removes the slots of the given files, then renumbers the
    /// loaded messages.
    pub fn remove(&mut self, filenames: &HashSet<String>) {
        if filenames.is_empty() {
            return;
        }

        self.slots.retain(|slot| !filenames.contains(&slot.filename));

        for (i, slot) in self.slots.iter().enumerate() {
            if let Some(message) = &slot.message {
                message.set_number(i + 1);
            }
        }
    }
}

fn list(dir: &Path) -> io::Result<(Vec<String>, Vec<String>)> {
    let mut folders = Vec::new();
    let mut filenames = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = match entry.file_name().into_string() {
            Ok(name) => name,
            Err(name) => {
                debug!("skipping non UTF-8 entry {:?}", name);
                continue;
            }
        };

        if name.starts_with('.') {
            continue;
        }

        let path = entry.path();
        if path.is_dir() {
            folders.push(name);
        } else if path.is_file() {
            filenames.push(name);
        }
    }

    Ok((folders, filenames))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn read_skips_hidden_entries() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::create_dir(dir.path().join(".hidden-dir")).unwrap();
        fs::write(dir.path().join("b"), "b").unwrap();
        fs::write(dir.path().join("a"), "a").unwrap();
        fs::write(dir.path().join(".hidden-file"), "").unwrap();

        let cache = DirectoryCache::read(dir.path()).unwrap();

        assert_eq!(vec!["sub".to_owned()], cache.folders());
        assert_eq!(2, cache.len());
        assert_eq!(Some("a"), cache.filename(1));
        assert_eq!(Some("b"), cache.filename(2));
        assert_eq!(None, cache.filename(0));
        assert_eq!(None, cache.filename(3));
        assert!(cache.message(1).is_none());
    }

    #[test]
    fn read_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DirectoryCache::read(&dir.path().join("missing")).unwrap();
        assert!(cache.is_empty());
        assert!(cache.folders().is_empty());
    }

    #[test]
    fn refresh_keeps_loaded_messages() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("2"), "b").unwrap();
        let mut cache = DirectoryCache::read(dir.path()).unwrap();
        let b = Message::new("b");
        b.set_number(1);
        cache.set_message(1, b.clone());

        fs::write(dir.path().join("1"), "a").unwrap();
        cache.refresh(dir.path()).unwrap();

        assert_eq!(2, cache.len());
        assert!(cache.message(1).is_none());
        assert!(cache.message(2).unwrap().ptr_eq(&b));
        assert_eq!(2, b.number());
    }

    #[test]
    fn remove_compacts_numbers() {
        let mut cache = DirectoryCache::default();
        let a = Message::new("a");
        let b = Message::new("b");
        let c = Message::new("c");
        for (name, message) in [("a", &a), ("b", &b), ("c", &c)] {
            let number = cache.push(name.into(), message.clone());
            message.set_number(number);
        }

        cache.remove(&HashSet::from(["b".to_owned()]));

        assert_eq!(2, cache.len());
        assert_eq!(Some(2), cache.position("c"));
        assert_eq!(1, a.number());
        assert_eq!(2, c.number());
        assert!(cache.message(2).unwrap().ptr_eq(&c));
    }
}
