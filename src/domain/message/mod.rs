//! Message module.
//!
//! This module contains the representation of the stored message
//! and of its lazily parsed content.

mod content;
pub use content::*;

mod message;
pub use message::*;
