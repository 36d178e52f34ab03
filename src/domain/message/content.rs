use chrono::{DateTime, FixedOffset};
use log::trace;
use mailparse::ParsedMail;

use super::{Error, Result};

/// Represents the parsed form of a raw message.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct MessageContent {
    /// Represents all the headers, in order, with decoded values.
    pub headers: Vec<(String, String)>,
    pub subject: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub message_id: Option<String>,
    pub date: Option<DateTime<FixedOffset>>,
    /// Represents the first text/plain part of the message, or the
    /// whole body for single part messages.
    pub body: String,
}

impl MessageContent {
    pub fn parse(raw: &[u8]) -> Result<Self> {
        trace!(">> parse message content");

        let parsed = mailparse::parse_mail(raw).map_err(Error::ParseMessageError)?;
        let mut content = MessageContent::default();

        for h in parsed.get_headers() {
            let k = h.get_key();
            let v = h.get_value();
            trace!("header {:?}: {:?}", k, v);

            match k.to_lowercase().as_str() {
                "subject" => content.subject = Some(v.clone()),
                "from" => content.from = Some(v.clone()),
                "to" => content.to = Some(v.clone()),
                "message-id" => content.message_id = Some(v.clone()),
                "date" => {
                    // strips trailing comments like "(UTC)"
                    content.date =
                        DateTime::parse_from_rfc2822(v.split_at(v.find(" (").unwrap_or(v.len())).0)
                            .ok()
                }
                _ => (),
            }

            content.headers.push((k, v));
        }

        content.body = find_text_plain(&parsed)
            .unwrap_or(&parsed)
            .get_body()
            .map_err(Error::ParseBodyError)?;

        trace!("<< parse message content");
        Ok(content)
    }

    /// Returns the first value of the given header, case
    /// insensitive.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

fn find_text_plain<'a>(part: &'a ParsedMail<'a>) -> Option<&'a ParsedMail<'a>> {
    if part.subparts.is_empty() {
        if part.ctype.mimetype == "text/plain" {
            Some(part)
        } else {
            None
        }
    } else {
        part.subparts.iter().find_map(find_text_plain)
    }
}
