//! Folder handle module.
//!
//! This module contains the folder handle returned by the store,
//! dispatching every operation to either folder kind.

use std::{fmt, path::Path, sync::Weak};

use crate::Message;

use super::{
    folder::PlainFolderInner, maildir::MaildirFolderInner, FolderType, MaildirFolder, OpenMode,
    PlainFolder, Result,
};

/// Represents a folder of the store, either plain or maildir.
#[derive(Clone, Debug)]
pub enum Folder {
    Plain(PlainFolder),
    Maildir(MaildirFolder),
}

macro_rules! dispatch {
    ($self:ident, $folder:ident => $e:expr) => {
        match $self {
            Folder::Plain($folder) => $e,
            Folder::Maildir($folder) => $e,
        }
    };
}

impl Folder {
    pub fn name(&self) -> &str {
        dispatch!(self, f => f.name())
    }

    pub fn full_name(&self) -> &str {
        dispatch!(self, f => f.full_name())
    }

    pub fn path(&self) -> &Path {
        dispatch!(self, f => f.path())
    }

    pub fn exists(&self) -> bool {
        dispatch!(self, f => f.exists())
    }

    pub fn folder_type(&self) -> Result<FolderType> {
        dispatch!(self, f => f.folder_type())
    }

    pub fn is_open(&self) -> bool {
        dispatch!(self, f => f.is_open())
    }

    pub fn mode(&self) -> Option<OpenMode> {
        dispatch!(self, f => f.mode())
    }

    pub fn open(&self, mode: OpenMode) -> Result<()> {
        dispatch!(self, f => f.open(mode))
    }

    pub fn close(&self, expunge: bool) -> Result<()> {
        dispatch!(self, f => f.close(expunge))
    }

    pub fn message_count(&self) -> Result<usize> {
        dispatch!(self, f => f.message_count())
    }

    /// Returns the number of unread messages. Plain folders do not
    /// track unread messages and always return 0.
    pub fn new_message_count(&self) -> Result<usize> {
        match self {
            Folder::Plain(_) => Ok(0),
            Folder::Maildir(f) => f.new_message_count(),
        }
    }

    pub fn has_new_messages(&self) -> Result<bool> {
        Ok(self.new_message_count()? > 0)
    }

    pub fn get_message(&self, number: usize) -> Result<Option<Message>> {
        dispatch!(self, f => f.get_message(number))
    }

    pub fn append_messages(&self, messages: &mut [Message]) -> Result<Vec<Message>> {
        dispatch!(self, f => f.append_messages(messages))
    }

    pub fn expunge(&self) -> Result<Vec<Message>> {
        dispatch!(self, f => f.expunge())
    }

    pub fn list(&self) -> Result<Vec<Folder>> {
        dispatch!(self, f => f.list())
    }

    pub fn list_with<F>(&self, filter: F) -> Result<Vec<Folder>>
    where
        F: Fn(&Folder) -> bool,
    {
        dispatch!(self, f => f.list_with(filter))
    }

    pub fn create(&self, folder_type: FolderType) -> Result<bool> {
        dispatch!(self, f => f.create(folder_type))
    }

    pub fn delete(&self, recurse: bool) -> Result<bool> {
        dispatch!(self, f => f.delete(recurse))
    }

    pub fn rename_to(&self, target: &Folder) -> Result<bool> {
        dispatch!(self, f => f.rename_to(target))
    }

    pub fn parent(&self) -> Result<Option<Folder>> {
        dispatch!(self, f => f.parent())
    }

    pub fn folder(&self, name: &str) -> Result<Folder> {
        dispatch!(self, f => f.folder(name))
    }

    /// Returns the number of the message stored in the given file.
    pub fn find_message(&self, filename: &str) -> Result<Option<usize>> {
        dispatch!(self, f => f.find_message(filename))
    }

    pub fn is_maildir(&self) -> bool {
        matches!(self, Folder::Maildir(_))
    }

    pub fn as_maildir(&self) -> Option<&MaildirFolder> {
        match self {
            Folder::Maildir(f) => Some(f),
            Folder::Plain(_) => None,
        }
    }

    pub fn as_plain(&self) -> Option<&PlainFolder> {
        match self {
            Folder::Plain(f) => Some(f),
            Folder::Maildir(_) => None,
        }
    }

    /// Returns `true` if both handles point to the same folder.
    pub fn ptr_eq(&self, other: &Folder) -> bool {
        match (self, other) {
            (Folder::Plain(a), Folder::Plain(b)) => a.ptr_eq(b),
            (Folder::Maildir(a), Folder::Maildir(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    pub(crate) fn reload_folders(&self) -> Result<()> {
        dispatch!(self, f => f.reload_folders())
    }
}

impl fmt::Display for Folder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.full_name())
    }
}

/// Represents the weak reference a message keeps to its folder.
#[derive(Clone)]
pub(crate) enum WeakFolder {
    Plain(Weak<PlainFolderInner>),
    Maildir(Weak<MaildirFolderInner>),
}

impl WeakFolder {
    pub fn upgrade(&self) -> Option<Folder> {
        match self {
            Self::Plain(f) => f.upgrade().map(PlainFolder::from_inner).map(Folder::Plain),
            Self::Maildir(f) => f
                .upgrade()
                .map(MaildirFolder::from_inner)
                .map(Folder::Maildir),
        }
    }
}
