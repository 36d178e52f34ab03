//! Maildir folder module.
//!
//! This module contains the maildir-compatible folder: one logical
//! folder made of three plain folders, `cur` for read messages, `new`
//! for unread ones and `tmp` which is only created and deleted.
//!
//! Unread messages (recent and not seen) live in `new`. The logical
//! numbering lists `new` first, then `cur`. When the folder is closed
//! with expunge, messages whose flags no longer match their directory
//! are moved to the other one.

use log::{debug, warn};
use std::{
    fmt,
    path::Path,
    sync::{Arc, Mutex, MutexGuard, Weak},
};

use crate::{Flag, Folder, FolderEvent, Message};

use super::{
    handle::WeakFolder,
    naming::{self, PathNaming},
    store::StoreInner,
    Error, FolderType, OpenMode, PlainFolder, Result,
};

pub const CUR: &str = "cur";
pub const NEW: &str = "new";
pub const TMP: &str = "tmp";

/// Names of the maildir parts, never listed as subfolders.
pub const RESERVED_NAMES: [&str; 3] = [CUR, NEW, TMP];

/// Returns `true` if the given directory holds the three maildir
/// parts.
pub fn is_maildir(path: &Path) -> bool {
    RESERVED_NAMES.iter().all(|name| path.join(name).is_dir())
}

pub(crate) struct MaildirFolderInner {
    base: PlainFolder,
    cur: PlainFolder,
    new: PlainFolder,
    tmp: PlainFolder,
    lock: Mutex<()>,
}

/// Represents a maildir-compatible folder.
#[derive(Clone)]
pub struct MaildirFolder(Arc<MaildirFolderInner>);

impl MaildirFolder {
    pub(crate) fn build(
        store: Weak<StoreInner>,
        naming: Arc<PathNaming>,
        root: &Path,
        full_name: String,
    ) -> Self {
        Self(Arc::new_cyclic(|maildir| {
            let owner = Some(WeakFolder::Maildir(maildir.clone()));
            let part = |name: &str| {
                PlainFolder::build(
                    store.clone(),
                    naming.clone(),
                    root,
                    naming::join(&full_name, name),
                    owner.clone(),
                )
            };

            MaildirFolderInner {
                cur: part(CUR),
                new: part(NEW),
                tmp: part(TMP),
                base: PlainFolder::build(
                    store.clone(),
                    naming.clone(),
                    root,
                    full_name.clone(),
                    owner.clone(),
                ),
                lock: Mutex::new(()),
            }
        }))
    }

    pub(crate) fn from_inner(inner: Arc<MaildirFolderInner>) -> Self {
        Self(inner)
    }

    fn lock(&self) -> Result<MutexGuard<()>> {
        self.0
            .lock
            .lock()
            .map_err(|err| Error::LockFolderError(self.full_name().to_owned(), err.to_string()))
    }

    /// Returns the plain folder holding read messages.
    pub fn cur_folder(&self) -> &PlainFolder {
        &self.0.cur
    }

    /// Returns the plain folder holding unread messages.
    pub fn new_folder(&self) -> &PlainFolder {
        &self.0.new
    }

    pub fn tmp_folder(&self) -> &PlainFolder {
        &self.0.tmp
    }

    /// Returns the part with the given reserved name.
    pub fn part(&self, name: &str) -> Option<&PlainFolder> {
        match name {
            CUR => Some(&self.0.cur),
            NEW => Some(&self.0.new),
            TMP => Some(&self.0.tmp),
            _ => None,
        }
    }

    pub fn name(&self) -> &str {
        self.0.base.name()
    }

    pub fn full_name(&self) -> &str {
        self.0.base.full_name()
    }

    pub fn path(&self) -> &Path {
        self.0.base.path()
    }

    pub fn exists(&self) -> bool {
        self.0.base.exists()
    }

    pub fn folder_type(&self) -> Result<FolderType> {
        self.0.base.folder_type()
    }

    pub fn is_open(&self) -> bool {
        self.0.base.is_open()
    }

    pub fn mode(&self) -> Option<OpenMode> {
        self.0.base.mode()
    }

    fn logical(&self) -> Folder {
        Folder::Maildir(self.clone())
    }

    /// Opens the folder with its `cur` and `new` parts. `tmp` is
    /// never opened.
    pub fn open(&self, mode: OpenMode) -> Result<()> {
        let _lock = self.lock()?;
        debug!("opening maildir folder {:?} ({:?})", self.full_name(), mode);

        if self.is_open() {
            return Err(Error::FolderAlreadyOpenError(self.full_name().to_owned()));
        }

        let mut opened: Vec<&PlainFolder> = Vec::with_capacity(3);
        for part in [&self.0.base, &self.0.cur, &self.0.new] {
            if let Err(err) = part.open(mode) {
                for part in opened {
                    if let Err(err) = part.close_with(false, false) {
                        warn!("cannot close folder {:?}: {}", part.full_name(), err);
                    }
                }
                return Err(err);
            }
            opened.push(part);
        }

        Ok(())
    }

    /// Closes the folder. With `expunge`, messages are first moved
    /// between `new` and `cur` to match their flags, then deleted
    /// messages are removed.
    pub fn close(&self, expunge: bool) -> Result<()> {
        let lock = self.lock()?;
        debug!(
            "closing maildir folder {:?} (expunge: {})",
            self.full_name(),
            expunge
        );

        if !self.is_open() {
            return Err(Error::FolderNotOpenError(self.full_name().to_owned()));
        }

        let mut removed = Vec::new();
        if expunge {
            let moved = self.reconcile()?;
            removed = self
                .expunge_parts()?
                .into_iter()
                .filter(|message| !moved.iter().any(|m| m.ptr_eq(message)))
                .collect();
        }

        self.0.new.close_with(false, false)?;
        self.0.cur.close_with(false, false)?;
        self.0.base.close_with(false, false)?;
        drop(lock);

        if !removed.is_empty() {
            self.0.base.notify(FolderEvent::MessagesRemoved {
                folder: self.logical(),
                messages: removed,
            });
        }

        Ok(())
    }

    /// Moves loaded messages whose flags no longer match their part.
    ///
    /// Seen messages of `new` go to `cur` first, then unread messages
    /// of `cur` go to `new`. Messages moved by the first pass are not
    /// considered by the second one, so a message moves at most once
    /// per close. Returns the original copies, flagged as deleted.
    fn reconcile(&self) -> Result<Vec<Message>> {
        let seen: Vec<Message> = self
            .0
            .new
            .loaded_messages()?
            .into_iter()
            .filter(|message| !message.has_flag(&Flag::Deleted) && message.has_flag(&Flag::Seen))
            .collect();
        let (mut moved, copies) = self.move_messages(&seen, &self.0.cur)?;
        copies
            .iter()
            .for_each(|message| message.remove_flag(&Flag::Recent));

        let unread: Vec<Message> = self
            .0
            .cur
            .loaded_messages()?
            .into_iter()
            .filter(|message| !message.has_flag(&Flag::Deleted) && message.is_new())
            .filter(|message| !copies.iter().any(|copy| copy.ptr_eq(message)))
            .collect();
        let (moved_to_new, _) = self.move_messages(&unread, &self.0.new)?;

        moved.extend(moved_to_new);
        debug!("reconciled {} message(s)", moved.len());
        Ok(moved)
    }

    /// Appends the raw content of each message to the target part,
    /// flagging the original as deleted as soon as its copy is
    /// stored. Returns the originals actually moved and their copies.
    fn move_messages(
        &self,
        messages: &[Message],
        target: &PlainFolder,
    ) -> Result<(Vec<Message>, Vec<Message>)> {
        let mut moved = Vec::new();
        let mut copies = Vec::new();

        for message in messages {
            match message.path() {
                Some(path) if path.is_file() => (),
                _ => {
                    warn!(
                        "cannot move message {:?} to {:?}, skipping it",
                        message.filename(),
                        target.full_name()
                    );
                    continue;
                }
            }

            let mut copy = [Message::with_flags(message.raw().to_vec(), message.flags())];
            target.append_quietly(&mut copy)?;
            message.add_flag(Flag::Deleted);

            let [copy] = copy;
            moved.push(message.clone());
            copies.push(copy);
        }

        Ok((moved, copies))
    }

    fn expunge_parts(&self) -> Result<Vec<Message>> {
        let mut removed = self.0.new.expunge_quietly()?;
        removed.extend(self.0.cur.expunge_quietly()?);
        removed.extend(self.0.base.expunge_quietly()?);
        Ok(removed)
    }

    /// Removes the deleted messages of `new`, `cur` and of the
    /// folder itself, without moving messages between parts.
    pub fn expunge(&self) -> Result<Vec<Message>> {
        let removed = {
            let _lock = self.lock()?;
            self.expunge_parts()?
        };

        if !removed.is_empty() {
            self.0.base.notify(FolderEvent::MessagesRemoved {
                folder: self.logical(),
                messages: removed.clone(),
            });
        }

        Ok(removed)
    }

    pub fn message_count(&self) -> Result<usize> {
        Ok(self.0.new.message_count()? + self.0.cur.message_count()?)
    }

    /// Returns the number of unread messages, held by `new`.
    pub fn new_message_count(&self) -> Result<usize> {
        self.0.new.message_count()
    }

    pub fn has_new_messages(&self) -> Result<bool> {
        Ok(self.new_message_count()? > 0)
    }

    /// Returns the message at the given logical number: `new`
    /// messages first, then `cur` ones.
    ///
    /// Messages read from `new` are flagged recent and not seen.
    pub fn get_message(&self, number: usize) -> Result<Option<Message>> {
        debug!("getting message {} from maildir folder {:?}", number, self.full_name());

        if !self.exists() {
            return Err(Error::FolderNotFoundError(self.path().to_owned()));
        }

        let new_count = self.0.new.message_count()?;
        let count = new_count + self.0.cur.message_count()?;
        if number == 0 || number > count {
            return Err(Error::MessageOutOfRangeError(
                number,
                count,
                self.full_name().to_owned(),
            ));
        }

        if number <= new_count {
            Ok(self.0.new.load_message(number)?.map(|(message, loaded)| {
                if loaded {
                    message.add_flag(Flag::Recent);
                    message.remove_flag(&Flag::Seen);
                }
                message
            }))
        } else {
            self.0.cur.get_message(number - new_count)
        }
    }

    /// Returns the logical number of the message stored in the given
    /// file.
    pub fn find_message(&self, filename: &str) -> Result<Option<usize>> {
        let new_count = self.0.new.message_count()?;
        match self.0.new.find_message(filename)? {
            Some(number) => Ok(Some(number)),
            None => Ok(self
                .0
                .cur
                .find_message(filename)?
                .map(|number| number + new_count)),
        }
    }

    /// Appends unread messages (recent and not seen) to `new` and the
    /// others to `cur`, then replaces each entry of the given slice
    /// by the stored message. Returns the stored messages in the
    /// original order.
    pub fn append_messages(&self, messages: &mut [Message]) -> Result<Vec<Message>> {
        let lock = self.lock()?;
        debug!(
            "appending {} message(s) to maildir folder {:?}",
            messages.len(),
            self.full_name()
        );

        let (new_indexes, cur_indexes): (Vec<usize>, Vec<usize>) =
            (0..messages.len()).partition(|&i| messages[i].is_new());

        let mut new_batch: Vec<Message> = new_indexes.iter().map(|&i| messages[i].clone()).collect();
        let mut cur_batch: Vec<Message> = cur_indexes.iter().map(|&i| messages[i].clone()).collect();

        if !new_batch.is_empty() {
            self.0.new.append_quietly(&mut new_batch)?;
            for message in &new_batch {
                message.add_flag(Flag::Recent);
                message.remove_flag(&Flag::Seen);
            }
        }

        if !cur_batch.is_empty() {
            self.0.cur.append_quietly(&mut cur_batch)?;
            for message in &cur_batch {
                message.remove_flag(&Flag::Recent);
            }
        }

        for (i, message) in new_indexes.into_iter().zip(new_batch) {
            messages[i] = message;
        }
        for (i, message) in cur_indexes.into_iter().zip(cur_batch) {
            messages[i] = message;
        }

        drop(lock);

        let appended = messages.to_vec();
        if !appended.is_empty() {
            self.0.base.notify(FolderEvent::MessagesAdded {
                folder: self.logical(),
                messages: appended.clone(),
            });
        }

        Ok(appended)
    }

    /// Lists the existing subfolders, without the maildir parts.
    pub fn list(&self) -> Result<Vec<Folder>> {
        self.list_with(|_| true)
    }

    pub fn list_with<F>(&self, filter: F) -> Result<Vec<Folder>>
    where
        F: Fn(&Folder) -> bool,
    {
        self.0
            .base
            .list_filtered(|name| !RESERVED_NAMES.contains(&name), filter)
    }

    pub(crate) fn reload_folders(&self) -> Result<()> {
        self.0.base.reload_folders()
    }

    /// Creates the folder directory and its three parts. Succeeds
    /// only if the four directories could be created.
    pub fn create(&self, folder_type: FolderType) -> Result<bool> {
        let created = {
            let _lock = self.lock()?;
            let mut created = self
                .0
                .base
                .create_quietly(folder_type | FolderType::HOLDS_FOLDERS)?;
            for part in [&self.0.cur, &self.0.new, &self.0.tmp] {
                created |= part.create_quietly(FolderType::HOLDS_MESSAGES)?;
            }
            created
        };

        if created {
            self.0.base.notify(FolderEvent::FolderCreated(self.logical()));
        }

        Ok(true)
    }

    /// Deletes the three parts, then the user subfolders (when
    /// `recurse` is set) and the folder itself.
    ///
    /// Without `recurse`, a folder holding user subfolders loses its
    /// parts and messages but is kept, and `Ok(false)` is returned.
    pub fn delete(&self, recurse: bool) -> Result<bool> {
        let lock = self.lock()?;
        debug!(
            "deleting maildir folder {:?} (recurse: {})",
            self.full_name(),
            recurse
        );

        if !self.exists() {
            return Err(Error::FolderNotFoundError(self.path().to_owned()));
        }
        if self.is_open() {
            return Err(Error::FolderStillOpenError(self.full_name().to_owned()));
        }

        for part in [&self.0.new, &self.0.cur, &self.0.tmp] {
            if part.exists() && !part.delete_quietly(true)? {
                return Ok(false);
            }
        }

        // subfolders notify their own deletion
        drop(lock);
        let deleted = self.0.base.delete_quietly(recurse)?;

        if deleted {
            self.0.base.notify(FolderEvent::FolderDeleted(self.logical()));
        }

        Ok(deleted)
    }

    pub fn rename_to(&self, target: &Folder) -> Result<bool> {
        if self.0.cur.is_open() || self.0.new.is_open() {
            return Err(Error::FolderStillOpenError(self.full_name().to_owned()));
        }
        self.0.base.rename_to(target)
    }

    pub fn parent(&self) -> Result<Option<Folder>> {
        self.0.base.parent()
    }

    pub fn folder(&self, name: &str) -> Result<Folder> {
        self.0.base.folder(name)
    }

    pub fn ptr_eq(&self, other: &MaildirFolder) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for MaildirFolder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("MaildirFolder")
            .field("full_name", &self.full_name())
            .field("path", &self.path())
            .finish()
    }
}
