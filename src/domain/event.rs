//! Event module.
//!
//! This module contains the notifications emitted by folders to the
//! listeners registered on their store.

use crate::{Folder, Message};

/// Represents a change made to the store by a folder operation.
#[derive(Debug, Clone)]
pub enum FolderEvent {
    FolderCreated(Folder),
    FolderDeleted(Folder),
    FolderRenamed {
        from: Folder,
        to: Folder,
    },
    /// Messages appended to the folder, in append order.
    MessagesAdded {
        folder: Folder,
        messages: Vec<Message>,
    },
    /// Messages expunged from the folder, sorted by path.
    MessagesRemoved {
        folder: Folder,
        messages: Vec<Message>,
    },
}

impl FolderEvent {
    /// Returns the folder affected by the event. For renames, this is
    /// the folder at its new path.
    pub fn folder(&self) -> &Folder {
        match self {
            Self::FolderCreated(folder) | Self::FolderDeleted(folder) => folder,
            Self::FolderRenamed { to, .. } => to,
            Self::MessagesAdded { folder, .. } | Self::MessagesRemoved { folder, .. } => folder,
        }
    }
}

/// Observer of folder events.
///
/// Listeners are called synchronously, after the operation released
/// its locks, so they may call back into the store.
pub trait FolderListener: Send + Sync {
    fn on_event(&self, event: &FolderEvent);
}

impl<F> FolderListener for F
where
    F: Fn(&FolderEvent) + Send + Sync,
{
    fn on_event(&self, event: &FolderEvent) {
        self(event)
    }
}
