//! Flag module.
//!
//! This module contains the message flags and their in-memory set.

pub mod flag;
pub mod flags;

pub use self::flag::*;
pub use self::flags::*;
