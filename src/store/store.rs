//! Store module.
//!
//! This module contains the entry point of the library: the store
//! mapping folder names to folder handles under one root directory.

use log::{debug, trace, warn};
use std::{
    collections::HashMap,
    fmt, fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard, RwLock, Weak},
};

use crate::{Folder, FolderEvent, FolderListener};

use super::{
    maildir, naming, Error, FolderType, MaildirFolder, PathNaming, PlainFolder, Result,
    StoreConfig,
};

const FILE_URL_SCHEME: &str = "file://";

pub(crate) struct StoreInner {
    root: PathBuf,
    delimiter: Option<char>,
    naming: Arc<PathNaming>,
    folders: Mutex<HashMap<String, Folder>>,
    default_folder: Mutex<Option<Folder>>,
    listeners: RwLock<Vec<Arc<dyn FolderListener>>>,
}

/// Represents a mailbox store rooted at a local directory.
///
/// The store hands out exactly one folder handle per folder name for
/// its whole lifetime (until [`Store::close`]). Cloning the store is
/// cheap and clones share the same handles.
#[derive(Clone)]
pub struct Store(Arc<StoreInner>);

impl Store {
    /// Connects to the store described by the given config, creating
    /// the root directory if needed.
    pub fn connect(config: &StoreConfig) -> Result<Self> {
        let root = config.root_dir()?;
        debug!("connecting to store at {:?}", root);

        if root.exists() && !root.is_dir() {
            return Err(Error::RootNotDirError(root));
        }
        fs::create_dir_all(&root).map_err(|err| Error::CreateRootDirError(err, root.clone()))?;

        let naming = PathNaming::new(config.host_name.as_deref());
        trace!("message file names host: {:?}", naming.host());

        Ok(Self(Arc::new(StoreInner {
            root,
            delimiter: config.delimiter,
            naming: Arc::new(naming),
            folders: Mutex::new(HashMap::new()),
            default_folder: Mutex::new(None),
            listeners: RwLock::new(Vec::new()),
        })))
    }

    pub(crate) fn from_weak(inner: &Weak<StoreInner>) -> Option<Self> {
        inner.upgrade().map(Self)
    }

    /// Returns the absolute root directory.
    pub fn root(&self) -> &Path {
        &self.0.root
    }

    pub fn naming(&self) -> &PathNaming {
        &self.0.naming
    }

    fn folders(&self) -> Result<MutexGuard<HashMap<String, Folder>>> {
        self.0
            .folders
            .lock()
            .map_err(|err| Error::LockStoreError(err.to_string()))
    }

    /// Returns the folder at the root of the store, creating its
    /// directory if it does not exist.
    pub fn default_folder(&self) -> Result<Folder> {
        let cached = self
            .0
            .default_folder
            .lock()
            .map_err(|err| Error::LockStoreError(err.to_string()))?
            .clone();

        let folder = match cached {
            Some(folder) => folder,
            None => self.folder_by_full_name("")?,
        };

        if !folder.exists() {
            folder.create(FolderType::HOLDS_FOLDERS | FolderType::HOLDS_MESSAGES)?;
        }

        *self
            .0
            .default_folder
            .lock()
            .map_err(|err| Error::LockStoreError(err.to_string()))? = Some(folder.clone());

        Ok(folder)
    }

    /// Returns the folder at the given path, relative to the root.
    ///
    /// The path can also be a `file://` URL pointing inside the root.
    /// Both `/` and the configured delimiter separate segments.
    pub fn folder(&self, path: &str) -> Result<Folder> {
        debug!("resolving folder {:?}", path);

        let full_name = match path.strip_prefix(FILE_URL_SCHEME) {
            Some(url) => {
                let path = self.url_to_relative_path(url)?;
                naming::normalize(&path, self.0.delimiter)?
            }
            None => naming::normalize(path, self.0.delimiter)?,
        };

        self.folder_by_full_name(&full_name)
    }

    fn url_to_relative_path(&self, url: &str) -> Result<String> {
        let path = urlencoding::decode(url)
            .map_err(|_| Error::InvalidFolderUrlError(format!("{}{}", FILE_URL_SCHEME, url)))?;
        let path = Path::new(&*path);

        path.strip_prefix(&self.0.root)
            .map(|path| path.to_string_lossy().to_string())
            .map_err(|_| Error::FolderUrlOutsideRootError(format!("{}{}", FILE_URL_SCHEME, url)))
    }

    /// Returns the cached handle of the given full name, building it
    /// first if needed.
    ///
    /// A path holding `cur`, `new` and `tmp`, or a path that does not
    /// exist yet, gives a maildir folder. Any other path gives a plain
    /// folder, except the parts of a maildir folder which are the
    /// handles the maildir folder itself uses.
    pub(crate) fn folder_by_full_name(&self, full_name: &str) -> Result<Folder> {
        if let Some(part) = self.maildir_part(full_name)? {
            return Ok(part);
        }

        let mut folders = self.folders()?;

        if let Some(folder) = folders.get(full_name) {
            return Ok(folder.clone());
        }

        let path = naming::to_path(&self.0.root, full_name);
        let store = Arc::downgrade(&self.0);
        let folder = if !path.exists() || maildir::is_maildir(&path) {
            Folder::Maildir(MaildirFolder::build(
                store,
                self.0.naming.clone(),
                &self.0.root,
                full_name.to_owned(),
            ))
        } else {
            Folder::Plain(PlainFolder::build(
                store,
                self.0.naming.clone(),
                &self.0.root,
                full_name.to_owned(),
                None,
            ))
        };

        trace!("new folder handle: {:?}", folder);
        folders.insert(full_name.to_owned(), folder.clone());
        Ok(folder)
    }

    fn maildir_part(&self, full_name: &str) -> Result<Option<Folder>> {
        let name = naming::name(full_name);
        let parent = match naming::parent(full_name) {
            Some(parent) if maildir::RESERVED_NAMES.contains(&name) => parent,
            _ => return Ok(None),
        };

        Ok(match self.folder_by_full_name(parent)? {
            Folder::Maildir(maildir) => maildir.part(name).cloned().map(Folder::Plain),
            Folder::Plain(_) => None,
        })
    }

    /// Drops the handles of the given full name and of its
    /// descendants.
    pub(crate) fn evict(&self, full_name: &str) {
        match self.folders() {
            Ok(mut folders) => {
                folders.retain(|name, _| !naming::is_within(name, full_name));
            }
            Err(err) => warn!("cannot evict folder {:?}: {}", full_name, err),
        }
    }

    /// Refreshes the subfolder names of the cached handle of the
    /// given full name, if any.
    pub(crate) fn reload_folders(&self, full_name: &str) {
        let folder = match self.folders() {
            Ok(folders) => folders.get(full_name).cloned(),
            Err(err) => {
                warn!("cannot reload subfolders of {:?}: {}", full_name, err);
                None
            }
        };

        if let Some(folder) = folder {
            if let Err(err) = folder.reload_folders() {
                warn!("cannot reload subfolders of {:?}: {}", full_name, err);
            }
        }
    }

    /// Registers a listener notified of every folder event of the
    /// store.
    pub fn add_listener<L>(&self, listener: L) -> Result<()>
    where
        L: FolderListener + 'static,
    {
        self.0
            .listeners
            .write()
            .map_err(|err| Error::LockStoreError(err.to_string()))?
            .push(Arc::new(listener));
        Ok(())
    }

    pub(crate) fn notify(&self, event: FolderEvent) {
        trace!("folder event: {:?}", event);

        let listeners = match self.0.listeners.read() {
            Ok(listeners) => listeners.clone(),
            Err(err) => {
                warn!("cannot notify folder listeners: {}", err);
                return;
            }
        };

        for listener in listeners {
            listener.on_event(&event);
        }
    }

    /// Forgets every folder handle. Open folders are not closed.
    pub fn close(&self) -> Result<()> {
        debug!("closing store at {:?}", self.0.root);

        self.folders()?.clear();
        *self
            .0
            .default_folder
            .lock()
            .map_err(|err| Error::LockStoreError(err.to_string()))? = None;
        Ok(())
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Store").field("root", &self.0.root).finish()
    }
}
