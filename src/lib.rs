//! Rust library for local mailbox storage.
//!
//! A [`Store`] maps a hierarchy of folders onto a directory tree.
//! Folders are either plain directories of message files
//! ([`PlainFolder`]) or maildir-compatible directories made of `cur`,
//! `new` and `tmp` parts ([`MaildirFolder`]), both exposed through
//! the [`Folder`] handle.

pub mod domain;
pub use domain::*;

pub mod store;
pub use store::*;
