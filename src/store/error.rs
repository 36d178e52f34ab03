//! Error module.
//!
//! This module contains the error returned by store and folder
//! operations.

use std::{env, io, path::PathBuf, result};
use thiserror::Error;

use crate::domain::message;

/// Represents the category of an [`Error`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// The operation does not match the open/closed state of the
    /// folder.
    IllegalState,
    /// The backing directory of the folder does not exist.
    FolderNotFound,
    /// The message number is outside `1..=count`.
    IndexOutOfRange,
    /// Any other failure, mostly I/O.
    Messaging,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("folder {0:?} is already open")]
    FolderAlreadyOpenError(String),
    #[error("folder {0:?} is not open")]
    FolderNotOpenError(String),
    #[error("folder {0:?} is open in read-only mode")]
    FolderReadOnlyError(String),
    #[error("cannot rename or delete folder {0:?} while it is open")]
    FolderStillOpenError(String),
    #[error("cannot lock folder {0:?}: {1}")]
    LockFolderError(String, String),
    #[error("cannot lock store folders cache: {0}")]
    LockStoreError(String),
    #[error("store of folder {0:?} is closed")]
    StoreDroppedError(String),

    #[error("cannot find folder at {0}")]
    FolderNotFoundError(PathBuf),

    #[error("cannot get message {0} from folder {2:?}: out of range 1..={1}")]
    MessageOutOfRangeError(usize, usize, String),

    #[error("invalid folder name {0:?}")]
    InvalidFolderNameError(String),
    #[error("invalid folder url {0:?}")]
    InvalidFolderUrlError(String),
    #[error("folder url {0:?} points outside of the store root")]
    FolderUrlOutsideRootError(String),
    #[error("cannot expand store root directory {1}")]
    ExpandRootDirError(#[source] shellexpand::LookupError<env::VarError>, String),
    #[error("cannot get current directory")]
    GetCurrentDirError(#[source] io::Error),
    #[error("cannot create store root directory {1}")]
    CreateRootDirError(#[source] io::Error, PathBuf),
    #[error("store root {0} is not a directory")]
    RootNotDirError(PathBuf),
    #[error("cannot read directory {1}")]
    ReadDirError(#[source] io::Error, PathBuf),
    #[error("folder {0:?} cannot hold messages")]
    FolderCannotHoldMessagesError(String),
    #[error("cannot create message file in {1}")]
    CreateMessageFileError(#[source] io::Error, PathBuf),
    #[error("cannot write message file {1}")]
    WriteMessageError(#[source] io::Error, PathBuf),
    #[error("cannot delete message file {1}")]
    DeleteMessageError(#[source] io::Error, PathBuf),
    #[error("cannot create folder at {0}: a file already exists there")]
    FolderFileConflictError(PathBuf),
    #[error("cannot create folder at {1}")]
    CreateFolderError(#[source] io::Error, PathBuf),
    #[error("cannot delete folder at {1}")]
    DeleteFolderError(#[source] io::Error, PathBuf),
    #[error("cannot rename folder to {0}: target already exists")]
    RenameTargetExistsError(PathBuf),

    #[error(transparent)]
    MessageError(#[from] message::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::FolderAlreadyOpenError(_)
            | Self::FolderNotOpenError(_)
            | Self::FolderReadOnlyError(_)
            | Self::FolderStillOpenError(_)
            | Self::LockFolderError(..)
            | Self::LockStoreError(_)
            | Self::StoreDroppedError(_) => ErrorKind::IllegalState,
            Self::FolderNotFoundError(_) => ErrorKind::FolderNotFound,
            Self::MessageOutOfRangeError(..) => ErrorKind::IndexOutOfRange,
            _ => ErrorKind::Messaging,
        }
    }
}

pub type Result<T> = result::Result<T, Error>;
