use log::{debug, trace};
use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
    result,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use thiserror::Error;

use crate::{store::handle::WeakFolder, Flag, Flags, Folder};

use super::MessageContent;

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot read message at {1}")]
    ReadMessageError(#[source] io::Error, PathBuf),
    #[error("cannot parse message")]
    ParseMessageError(#[source] mailparse::MailParseError),
    #[error("cannot parse message body")]
    ParseBodyError(#[source] mailparse::MailParseError),
}

pub type Result<T> = result::Result<T, Error>;

/// Represents the backing file of a stored message.
#[derive(Debug)]
struct Location {
    filename: String,
    path: PathBuf,
}

#[derive(Default)]
struct State {
    flags: Flags,
    number: usize,
    owner: Option<WeakFolder>,
    expunged: bool,
}

struct Inner {
    raw: Vec<u8>,
    location: Option<Location>,
    state: Mutex<State>,
    content: Mutex<Option<Arc<MessageContent>>>,
}

/// Represents a message.
///
/// A message is a cheap, shareable handle: clones point to the same
/// message, so flags set through one clone are seen by the folder
/// holding another. Use [`Message::ptr_eq`] to compare identities.
///
/// A message is either detached (built from raw bytes, the input of
/// appends) or stored (wrapping one file of a folder).
#[derive(Clone)]
pub struct Message(Arc<Inner>);

impl Message {
    /// Builds a detached message from raw bytes, without flags.
    pub fn new<R: Into<Vec<u8>>>(raw: R) -> Self {
        Self::with_flags(raw, Flags::default())
    }

    /// Builds a detached message from raw bytes and flags.
    pub fn with_flags<R: Into<Vec<u8>>>(raw: R, flags: Flags) -> Self {
        Self::build(raw.into(), None, flags)
    }

    /// Reads the file at the given path and wraps it. Flags are
    /// derived from the message status headers.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("reading message at {:?}", path);

        let raw = fs::read(path).map_err(|err| Error::ReadMessageError(err, path.to_owned()))?;
        let flags = match mailparse::parse_headers(&raw) {
            Ok((headers, _)) => Flags::from_headers(&headers),
            Err(err) => {
                trace!("cannot parse headers of {:?}: {}", path, err);
                Flags::default()
            }
        };
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let location = Location {
            filename,
            path: path.to_owned(),
        };

        Ok(Self::build(raw, Some(location), flags))
    }

    fn build(raw: Vec<u8>, location: Option<Location>, flags: Flags) -> Self {
        Self(Arc::new(Inner {
            raw,
            location,
            state: Mutex::new(State {
                flags,
                ..State::default()
            }),
            content: Mutex::new(None),
        }))
    }

    fn state(&self) -> MutexGuard<State> {
        self.0.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the raw bytes of the message.
    pub fn raw(&self) -> &[u8] {
        &self.0.raw
    }

    pub fn size(&self) -> usize {
        self.0.raw.len()
    }

    /// Returns the file name of the backing file. The file name is
    /// the stable identifier of a message across reopens, unlike its
    /// number.
    pub fn filename(&self) -> Option<&str> {
        self.0.location.as_ref().map(|l| l.filename.as_str())
    }

    pub fn path(&self) -> Option<&Path> {
        self.0.location.as_ref().map(|l| l.path.as_path())
    }

    /// Returns the 1-based position of the message within the
    /// listing of its backing directory, or 0 for detached messages.
    pub fn number(&self) -> usize {
        self.state().number
    }

    /// Returns the logical folder owning the message. Messages held
    /// by the `cur` and `new` parts of a maildir folder report the
    /// maildir folder itself.
    pub fn folder(&self) -> Option<Folder> {
        self.state().owner.as_ref().and_then(WeakFolder::upgrade)
    }

    /// Returns `true` once the backing file has been expunged.
    pub fn is_expunged(&self) -> bool {
        self.state().expunged
    }

    pub fn flags(&self) -> Flags {
        self.state().flags.clone()
    }

    pub fn has_flag(&self, flag: &Flag) -> bool {
        self.state().flags.contains(flag)
    }

    pub fn add_flag(&self, flag: Flag) {
        self.state().flags.insert(flag);
    }

    pub fn remove_flag(&self, flag: &Flag) {
        self.state().flags.remove(flag);
    }

    /// Adds or removes the given flag.
    pub fn set_flag(&self, flag: Flag, enabled: bool) {
        if enabled {
            self.add_flag(flag)
        } else {
            self.remove_flag(&flag)
        }
    }

    /// Replaces all the flags.
    pub fn set_flags(&self, flags: Flags) {
        self.state().flags = flags;
    }

    /// Returns `true` if the message is classified as unread: recent
    /// and not seen.
    pub fn is_new(&self) -> bool {
        self.state().flags.is_new()
    }

    /// Parses the raw bytes on first access, then returns the cached
    /// content.
    pub fn content(&self) -> Result<Arc<MessageContent>> {
        let mut content = self.0.content.lock().unwrap_or_else(PoisonError::into_inner);
        match content.as_ref() {
            Some(content) => Ok(content.clone()),
            None => {
                let parsed = Arc::new(MessageContent::parse(&self.0.raw)?);
                *content = Some(parsed.clone());
                Ok(parsed)
            }
        }
    }

    /// Returns `true` if both handles point to the same message.
    pub fn ptr_eq(&self, other: &Message) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn attach(&self, owner: WeakFolder, number: usize) {
        let mut state = self.state();
        state.owner = Some(owner);
        state.number = number;
    }

    pub(crate) fn set_number(&self, number: usize) {
        self.state().number = number;
    }

    pub(crate) fn set_expunged(&self) {
        let mut state = self.state();
        state.expunged = true;
        state.number = 0;
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let state = self.state();
        f.debug_struct("Message")
            .field("filename", &self.filename())
            .field("number", &state.number)
            .field("flags", &state.flags)
            .field("size", &self.size())
            .finish()
    }
}
