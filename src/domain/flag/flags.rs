use mailparse::{MailHeader, MailHeaderMap};
use serde::Serialize;
use std::{collections::HashSet, fmt, ops};

use crate::Flag;

/// Represents the list of flags.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct Flags(pub HashSet<Flag>);

impl Flags {
    /// Derives flags from the `Status` and `X-Status` headers of a
    /// parsed message. Messages without those headers get no flag.
    pub fn from_headers(headers: &[MailHeader]) -> Self {
        ["Status", "X-Status"]
            .iter()
            .filter_map(|key| headers.get_first_value(key))
            .flat_map(|value| value.chars().collect::<Vec<_>>())
            .filter_map(Flag::from_status_char)
            .collect()
    }

    /// Returns `true` if the flags classify a message as unread:
    /// recent and not seen.
    pub fn is_new(&self) -> bool {
        self.contains(&Flag::Recent) && !self.contains(&Flag::Seen)
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut flags: Vec<_> = self.iter().map(Flag::to_string).collect();
        flags.sort();
        write!(f, "{}", flags.join(" "))
    }
}

impl ops::Deref for Flags {
    type Target = HashSet<Flag>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl ops::DerefMut for Flags {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<&str> for Flags {
    fn from(flags: &str) -> Self {
        Flags(
            flags
                .split_whitespace()
                .map(|flag| flag.trim().into())
                .collect(),
        )
    }
}

impl FromIterator<Flag> for Flags {
    fn from_iter<T: IntoIterator<Item = Flag>>(iter: T) -> Self {
        let mut flags = Flags::default();
        flags.extend(iter);
        flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_status_headers() {
        let raw = b"Status: RO\r\nX-Status: AF\r\nSubject: hi\r\n\r\nbody";
        let (headers, _) = mailparse::parse_headers(raw).unwrap();
        let flags = Flags::from_headers(&headers);

        assert!(flags.contains(&Flag::Seen));
        assert!(flags.contains(&Flag::Answered));
        assert!(flags.contains(&Flag::Flagged));
        assert!(!flags.contains(&Flag::Recent));
        assert_eq!(3, flags.len());
    }

    #[test]
    fn classify_new() {
        assert!(Flags::from("recent").is_new());
        assert!(!Flags::from("recent seen").is_new());
        assert!(!Flags::from("").is_new());
    }
}
