pub mod event;
pub use event::{FolderEvent, FolderListener};

pub mod flag;
pub use flag::{Flag, Flags};

pub mod message;
pub use message::{Message, MessageContent};
