//! Module related to the local mailbox store.

pub mod cache;
pub use cache::DirectoryCache;

pub mod config;
pub use config::StoreConfig;

pub mod error;
pub use error::{Error, ErrorKind, Result};

pub mod folder;
pub use folder::{FolderType, OpenMode, PlainFolder};

pub mod handle;
pub use handle::Folder;

pub mod maildir;
pub use maildir::MaildirFolder;

pub mod naming;
pub use naming::PathNaming;

mod store;
pub use self::store::Store;
