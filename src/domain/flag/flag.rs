use serde::Serialize;
use std::fmt;

/// Represents the flag variants.
///
/// Flags live in memory only: they are realized on disk by the
/// owning folder when it expunges or reconciles its messages.
#[derive(Debug, Clone, Eq, Hash, PartialEq, Serialize)]
pub enum Flag {
    Seen,
    Answered,
    Flagged,
    Deleted,
    Draft,
    Recent,
    Custom(String),
}

impl Flag {
    pub fn custom<F: ToString>(flag: F) -> Self {
        Self::Custom(flag.to_string())
    }

    /// Maps a character of a `Status` or `X-Status` header to a
    /// flag, as written by mbox-style mail agents.
    /// The `D` (deleted) marker is ignored.
    pub fn from_status_char(c: char) -> Option<Self> {
        match c {
            'R' => Some(Flag::Seen),
            'A' => Some(Flag::Answered),
            'F' => Some(Flag::Flagged),
            'T' => Some(Flag::Draft),
            _ => None,
        }
    }
}

impl From<&str> for Flag {
    fn from(s: &str) -> Self {
        match s {
            "seen" => Flag::Seen,
            "answered" | "replied" => Flag::Answered,
            "flagged" => Flag::Flagged,
            "deleted" | "trashed" => Flag::Deleted,
            "draft" => Flag::Draft,
            "recent" => Flag::Recent,
            flag => Flag::Custom(flag.into()),
        }
    }
}

impl From<String> for Flag {
    fn from(s: String) -> Self {
        s.as_str().into()
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Flag::Seen => write!(f, "seen"),
            Flag::Answered => write!(f, "answered"),
            Flag::Flagged => write!(f, "flagged"),
            Flag::Deleted => write!(f, "deleted"),
            Flag::Draft => write!(f, "draft"),
            Flag::Recent => write!(f, "recent"),
            Flag::Custom(flag) => write!(f, "{}", flag),
        }
    }
}
