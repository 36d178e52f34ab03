//! Plain folder module.
//!
//! This module contains the basic storage unit: a directory holding
//! message files and subfolder directories.

use bitflags::bitflags;
use log::{debug, trace, warn};
use std::{
    collections::HashSet,
    fmt, fs,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard, Weak},
};

use crate::{Flag, Folder, FolderEvent, Message};

use super::{
    handle::WeakFolder,
    naming::{self, PathNaming},
    store::StoreInner,
    DirectoryCache, Error, Result, Store,
};

bitflags! {
    /// Represents the capabilities of a folder.
    pub struct FolderType: u8 {
        const HOLDS_FOLDERS = 0b01;
        const HOLDS_MESSAGES = 0b10;
    }
}

/// Represents the mode a folder is opened with.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OpenMode {
    ReadOnly,
    ReadWrite,
}

struct State {
    folder_type: FolderType,
    mode: Option<OpenMode>,
    cache: Option<DirectoryCache>,
}

pub(crate) struct PlainFolderInner {
    name: String,
    full_name: String,
    path: PathBuf,
    store: Weak<StoreInner>,
    naming: Arc<PathNaming>,
    /// Logical owner when the folder is a part of a maildir folder.
    owner: Option<WeakFolder>,
    state: Mutex<State>,
}

/// Represents a folder backed by a plain directory.
///
/// Building a folder performs no I/O: the folder may not exist yet,
/// or may outlive its directory. The directory listing is cached on
/// first use and dropped on close.
#[derive(Clone)]
pub struct PlainFolder(Arc<PlainFolderInner>);

impl PlainFolder {
    pub(crate) fn build(
        store: Weak<StoreInner>,
        naming: Arc<PathNaming>,
        root: &Path,
        full_name: String,
        owner: Option<WeakFolder>,
    ) -> Self {
        Self(Arc::new(PlainFolderInner {
            name: naming::name(&full_name).to_owned(),
            path: naming::to_path(root, &full_name),
            full_name,
            store,
            naming,
            owner,
            state: Mutex::new(State {
                folder_type: FolderType::HOLDS_FOLDERS | FolderType::HOLDS_MESSAGES,
                mode: None,
                cache: None,
            }),
        }))
    }

    pub(crate) fn downgrade(&self) -> Weak<PlainFolderInner> {
        Arc::downgrade(&self.0)
    }

    pub(crate) fn from_inner(inner: Arc<PlainFolderInner>) -> Self {
        Self(inner)
    }

    /// Returns the last segment of the full name, empty for the root
    /// folder.
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Returns the path of the folder relative to the store root,
    /// segments separated by `/`.
    pub fn full_name(&self) -> &str {
        &self.0.full_name
    }

    /// Returns the directory backing the folder.
    pub fn path(&self) -> &Path {
        &self.0.path
    }

    /// Checks whether the directory exists. Never cached.
    pub fn exists(&self) -> bool {
        self.0.path.is_dir()
    }

    fn state(&self) -> Result<MutexGuard<State>> {
        self.0
            .state
            .lock()
            .map_err(|err| Error::LockFolderError(self.0.full_name.clone(), err.to_string()))
    }

    pub fn folder_type(&self) -> Result<FolderType> {
        Ok(self.state()?.folder_type)
    }

    pub fn is_open(&self) -> bool {
        self.mode().is_some()
    }

    pub fn mode(&self) -> Option<OpenMode> {
        self.state().ok().and_then(|state| state.mode)
    }

    fn store(&self) -> Result<Store> {
        Store::from_weak(&self.0.store)
            .ok_or_else(|| Error::StoreDroppedError(self.0.full_name.clone()))
    }

    /// Returns the weak reference messages keep to their folder.
    pub(crate) fn owner(&self) -> WeakFolder {
        self.0
            .owner
            .clone()
            .unwrap_or_else(|| WeakFolder::Plain(self.downgrade()))
    }

    /// Returns the folder the outside world sees: the maildir folder
    /// for maildir parts, the folder itself otherwise.
    fn logical(&self) -> Folder {
        self.0
            .owner
            .as_ref()
            .and_then(WeakFolder::upgrade)
            .unwrap_or_else(|| Folder::Plain(self.clone()))
    }

    pub(crate) fn notify(&self, event: FolderEvent) {
        if let Some(store) = Store::from_weak(&self.0.store) {
            store.notify(event);
        }
    }

    fn ensure_cache<'a>(&self, state: &'a mut State) -> Result<&'a mut DirectoryCache> {
        let cache = match state.cache.take() {
            Some(cache) => cache,
            None => DirectoryCache::read(&self.0.path)?,
        };
        Ok(state.cache.insert(cache))
    }

    /// Opens the folder and lists its directory. Messages loaded
    /// before opening keep their handle.
    pub fn open(&self, mode: OpenMode) -> Result<()> {
        debug!("opening folder {:?} ({:?})", self.0.full_name, mode);

        let mut state = self.state()?;
        if state.mode.is_some() {
            return Err(Error::FolderAlreadyOpenError(self.0.full_name.clone()));
        }

        let cache = match state.cache.take() {
            Some(mut cache) => {
                cache.refresh(&self.0.path)?;
                cache
            }
            None => DirectoryCache::read(&self.0.path)?,
        };
        state.cache = Some(cache);
        state.mode = Some(mode);
        Ok(())
    }

    /// Closes the folder, expunging it first if asked, and drops the
    /// directory cache.
    pub fn close(&self, expunge: bool) -> Result<()> {
        self.close_with(expunge, true)
    }

    pub(crate) fn close_with(&self, expunge: bool, notify: bool) -> Result<()> {
        debug!("closing folder {:?} (expunge: {})", self.0.full_name, expunge);

        if !self.is_open() {
            return Err(Error::FolderNotOpenError(self.0.full_name.clone()));
        }

        if expunge {
            let removed = self.expunge_quietly()?;
            if notify && !removed.is_empty() {
                self.notify(FolderEvent::MessagesRemoved {
                    folder: self.logical(),
                    messages: removed,
                });
            }
        }

        let mut state = self.state()?;
        state.mode = None;
        state.cache = None;
        Ok(())
    }

    /// Returns the number of messages, reading the directory if it
    /// is not cached yet, whether the folder is open or not.
    pub fn message_count(&self) -> Result<usize> {
        let mut state = self.state()?;
        Ok(self.ensure_cache(&mut state)?.len())
    }

    /// Returns the message at the given 1-based number.
    ///
    /// Returns `Ok(None)` when the backing file cannot be read, for
    /// example after an external deletion.
    pub fn get_message(&self, number: usize) -> Result<Option<Message>> {
        Ok(self.load_message(number)?.map(|(message, _)| message))
    }

    /// Same as [`PlainFolder::get_message`], and tells whether the
    /// message was read from disk by this call.
    pub(crate) fn load_message(&self, number: usize) -> Result<Option<(Message, bool)>> {
        debug!("getting message {} from folder {:?}", number, self.0.full_name);

        if !self.exists() {
            return Err(Error::FolderNotFoundError(self.0.path.clone()));
        }

        let owner = self.owner();
        let mut state = self.state()?;
        let cache = self.ensure_cache(&mut state)?;

        let filename = cache.filename(number).map(ToOwned::to_owned).ok_or_else(|| {
            Error::MessageOutOfRangeError(number, cache.len(), self.0.full_name.clone())
        })?;

        if let Some(message) = cache.message(number) {
            return Ok(Some((message.clone(), false)));
        }

        match Message::from_path(self.0.path.join(&filename)) {
            Ok(message) => {
                message.attach(owner, number);
                cache.set_message(number, message.clone());
                trace!("message: {:?}", message);
                Ok(Some((message, true)))
            }
            Err(err) => {
                warn!("cannot read message {:?}: {}", filename, err);
                Ok(None)
            }
        }
    }

    /// Returns the number of the message stored in the given file,
    /// within the current listing.
    pub fn find_message(&self, filename: &str) -> Result<Option<usize>> {
        let mut state = self.state()?;
        Ok(self.ensure_cache(&mut state)?.position(filename))
    }

    /// Returns the messages already read from disk.
    pub(crate) fn loaded_messages(&self) -> Result<Vec<Message>> {
        let state = self.state()?;
        Ok(state
            .cache
            .as_ref()
            .map(|cache| cache.loaded().cloned().collect())
            .unwrap_or_default())
    }

    /// Writes each message to a new file, then replaces each entry of
    /// the given slice by the stored message. Returns the stored
    /// messages, in the same order.
    pub fn append_messages(&self, messages: &mut [Message]) -> Result<Vec<Message>> {
        let appended = self.append_quietly(messages)?;

        if !appended.is_empty() {
            self.notify(FolderEvent::MessagesAdded {
                folder: self.logical(),
                messages: appended.clone(),
            });
        }

        Ok(appended)
    }

    pub(crate) fn append_quietly(&self, messages: &mut [Message]) -> Result<Vec<Message>> {
        debug!(
            "appending {} message(s) to folder {:?}",
            messages.len(),
            self.0.full_name
        );

        if !self.exists() {
            return Err(Error::FolderNotFoundError(self.0.path.clone()));
        }

        let owner = self.owner();
        let mut state = self.state()?;

        if !state.folder_type.contains(FolderType::HOLDS_MESSAGES) {
            return Err(Error::FolderCannotHoldMessagesError(
                self.0.full_name.clone(),
            ));
        }
        if state.mode == Some(OpenMode::ReadOnly) {
            return Err(Error::FolderReadOnlyError(self.0.full_name.clone()));
        }

        let cache = self.ensure_cache(&mut state)?;
        let mut appended = Vec::with_capacity(messages.len());

        for message in messages.iter_mut() {
            let (filename, path, mut file) = self.0.naming.create_file(&self.0.path)?;
            trace!("writing message file {:?}", path);

            file.write_all(message.raw())
                .and_then(|()| file.flush())
                .map_err(|err| Error::WriteMessageError(err, path.clone()))?;
            drop(file);

            // what is stored is what is read back later
            let stored = Message::from_path(&path)?;
            stored.set_flags(message.flags());
            let number = cache.push(filename, stored.clone());
            stored.attach(owner.clone(), number);

            *message = stored.clone();
            appended.push(stored);
        }

        Ok(appended)
    }

    /// Removes the files of the loaded messages flagged as deleted,
    /// then compacts the message numbers. Returns the removed
    /// messages, sorted by path.
    pub fn expunge(&self) -> Result<Vec<Message>> {
        let removed = self.expunge_quietly()?;

        if !removed.is_empty() {
            self.notify(FolderEvent::MessagesRemoved {
                folder: self.logical(),
                messages: removed.clone(),
            });
        }

        Ok(removed)
    }

    pub(crate) fn expunge_quietly(&self) -> Result<Vec<Message>> {
        debug!("expunging folder {:?}", self.0.full_name);

        if !self.exists() {
            return Err(Error::FolderNotFoundError(self.0.path.clone()));
        }

        let mut state = self.state()?;
        if state.mode == Some(OpenMode::ReadOnly) {
            return Err(Error::FolderReadOnlyError(self.0.full_name.clone()));
        }

        // messages never read cannot have been flagged
        let cache = match state.cache.as_mut() {
            Some(cache) => cache,
            None => return Ok(Vec::new()),
        };

        let mut deleted: Vec<Message> = cache
            .loaded()
            .filter(|message| message.has_flag(&Flag::Deleted))
            .cloned()
            .collect();
        deleted.sort_by(|a, b| a.path().cmp(&b.path()));

        let mut filenames = HashSet::new();
        for message in &deleted {
            let (filename, path) = match (message.filename(), message.path()) {
                (Some(filename), Some(path)) => (filename, path),
                _ => continue,
            };

            trace!("deleting message file {:?}", path);
            match fs::remove_file(path) {
                Ok(()) => (),
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    debug!("message file {:?} already deleted", path);
                }
                Err(err) => {
                    cache.remove(&filenames);
                    return Err(Error::DeleteMessageError(err, path.to_owned()));
                }
            }

            filenames.insert(filename.to_owned());
        }

        cache.remove(&filenames);

        let removed: Vec<Message> = deleted
            .into_iter()
            .filter(|message| {
                message
                    .filename()
                    .map(|filename| filenames.contains(filename))
                    .unwrap_or_default()
            })
            .collect();
        removed.iter().for_each(Message::set_expunged);

        debug!("expunged {} message(s)", removed.len());
        Ok(removed)
    }

    /// Lists the existing subfolders.
    pub fn list(&self) -> Result<Vec<Folder>> {
        self.list_with(|_| true)
    }

    /// Lists the existing subfolders matching the given filter.
    pub fn list_with<F>(&self, filter: F) -> Result<Vec<Folder>>
    where
        F: Fn(&Folder) -> bool,
    {
        self.list_filtered(|_| true, filter)
    }

    pub(crate) fn list_filtered<I, F>(&self, include: I, filter: F) -> Result<Vec<Folder>>
    where
        I: Fn(&str) -> bool,
        F: Fn(&Folder) -> bool,
    {
        debug!("listing folder {:?}", self.0.full_name);

        if !self.exists() {
            return Err(Error::FolderNotFoundError(self.0.path.clone()));
        }

        let names = {
            let mut state = self.state()?;
            self.ensure_cache(&mut state)?.folders().to_vec()
        };

        let store = self.store()?;
        let mut folders = Vec::new();

        for name in names.iter().filter(|name| include(name.as_str())) {
            let folder = store.folder_by_full_name(&naming::join(&self.0.full_name, name))?;
            if folder.exists() && filter(&folder) {
                folders.push(folder);
            }
        }

        trace!("folders: {:?}", folders);
        Ok(folders)
    }

    /// Re-reads the subfolder names of a cached listing.
    pub(crate) fn reload_folders(&self) -> Result<()> {
        let mut state = self.state()?;
        if let Some(cache) = state.cache.as_mut() {
            cache.reload_folders(&self.0.path)?;
        }
        Ok(())
    }

    /// Returns the parent folder, or `None` for the root folder.
    pub fn parent(&self) -> Result<Option<Folder>> {
        match naming::parent(&self.0.full_name) {
            Some(parent) => Ok(Some(self.store()?.folder_by_full_name(parent)?)),
            None => Ok(None),
        }
    }

    /// Returns the child folder with the given relative name.
    pub fn folder(&self, name: &str) -> Result<Folder> {
        let name = naming::normalize(name, None)?;
        self.store()?
            .folder_by_full_name(&naming::join(&self.0.full_name, &name))
    }

    /// Creates the directory and its missing ancestors.
    pub fn create(&self, folder_type: FolderType) -> Result<bool> {
        if self.create_quietly(folder_type)? {
            self.notify(FolderEvent::FolderCreated(self.logical()));
        }
        Ok(true)
    }

    /// Creates the directory if needed, and tells whether it was
    /// created by this call.
    pub(crate) fn create_quietly(&self, folder_type: FolderType) -> Result<bool> {
        debug!("creating folder {:?} ({:?})", self.0.full_name, folder_type);

        let path = &self.0.path;
        if path.exists() && !path.is_dir() {
            return Err(Error::FolderFileConflictError(path.clone()));
        }

        let created = !path.is_dir();
        if created {
            fs::create_dir_all(path).map_err(|err| Error::CreateFolderError(err, path.clone()))?;
        }

        self.state()?.folder_type = folder_type;

        if created {
            self.reload_parent_folders();
        }

        Ok(created)
    }

    fn reload_parent_folders(&self) {
        if let (Ok(store), Some(parent)) = (self.store(), naming::parent(&self.0.full_name)) {
            store.reload_folders(parent);
        }
    }

    /// Deletes every message of the folder, then the directory if
    /// nothing is left.
    ///
    /// Without `recurse`, subfolders are kept and `Ok(false)` is
    /// returned when some exist. With `recurse`, subfolders are
    /// deleted first.
    pub fn delete(&self, recurse: bool) -> Result<bool> {
        let deleted = self.delete_quietly(recurse)?;
        if deleted {
            self.notify(FolderEvent::FolderDeleted(self.logical()));
        }
        Ok(deleted)
    }

    pub(crate) fn delete_quietly(&self, recurse: bool) -> Result<bool> {
        debug!("deleting folder {:?} (recurse: {})", self.0.full_name, recurse);

        if !self.exists() {
            return Err(Error::FolderNotFoundError(self.0.path.clone()));
        }
        if self.is_open() {
            return Err(Error::FolderStillOpenError(self.0.full_name.clone()));
        }

        self.open(OpenMode::ReadWrite)?;
        let count = self.message_count()?;
        for number in 1..=count {
            if let Some(message) = self.get_message(number)? {
                message.add_flag(Flag::Deleted);
            }
        }
        self.close_with(true, false)?;

        let subfolders = DirectoryCache::read(&self.0.path)?.folders().to_vec();
        if !subfolders.is_empty() {
            if !recurse {
                debug!("folder {:?} still has subfolders", self.0.full_name);
                return Ok(false);
            }

            let store = self.store()?;
            for name in subfolders {
                let folder = store.folder_by_full_name(&naming::join(&self.0.full_name, &name))?;
                if !folder.delete(true)? {
                    return Ok(false);
                }
            }
        }

        if let Err(err) = fs::remove_dir(&self.0.path) {
            let is_empty = fs::read_dir(&self.0.path)
                .map(|mut entries| entries.next().is_none())
                .unwrap_or_default();
            if is_empty {
                return Err(Error::DeleteFolderError(err, self.0.path.clone()));
            }
            debug!("folder {:?} is not empty, keeping it", self.0.full_name);
            return Ok(false);
        }

        if let Ok(store) = self.store() {
            store.evict(&self.0.full_name);
        }
        self.reload_parent_folders();

        Ok(true)
    }

    /// Renames the directory to the path of the given folder.
    ///
    /// Returns `Ok(false)` when the filesystem refuses the rename.
    pub fn rename_to(&self, target: &Folder) -> Result<bool> {
        debug!(
            "renaming folder {:?} to {:?}",
            self.0.full_name,
            target.full_name()
        );

        if !self.exists() {
            return Err(Error::FolderNotFoundError(self.0.path.clone()));
        }
        if self.is_open() {
            return Err(Error::FolderStillOpenError(self.0.full_name.clone()));
        }

        let target_path = target.path();
        if target_path.exists() {
            return Err(Error::RenameTargetExistsError(target_path.to_owned()));
        }
        if let Some(parent) = target_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| Error::CreateFolderError(err, parent.to_owned()))?;
        }

        if let Err(err) = fs::rename(&self.0.path, target_path) {
            warn!(
                "cannot rename folder {:?} to {:?}: {}",
                self.0.path, target_path, err
            );
            return Ok(false);
        }

        self.state()?.cache = None;

        let store = self.store()?;
        let from = self.logical();
        store.evict(&self.0.full_name);
        store.evict(target.full_name());
        self.reload_parent_folders();
        if let Some(parent) = naming::parent(target.full_name()) {
            store.reload_folders(parent);
        }

        let to = store.folder_by_full_name(target.full_name())?;
        self.notify(FolderEvent::FolderRenamed { from, to });

        Ok(true)
    }

    pub fn ptr_eq(&self, other: &PlainFolder) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for PlainFolder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PlainFolder")
            .field("full_name", &self.0.full_name)
            .field("path", &self.0.path)
            .finish()
    }
}
