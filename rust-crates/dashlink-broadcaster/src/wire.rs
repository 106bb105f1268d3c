//! Delimited text wire format
//!
//! A message is an ordered list of `key=value` pairs joined with `&`:
//!
//! ```text
//! response=values&values=numeric*temp*12.000000~boolean*armed*true
//! request=change_value&type=numeric&name=speed&value=2.5
//! ```
//!
//! Nothing is escaped. Payload text must never contain a reserved token;
//! dashboard settings are checked for this at load time and log text is
//! scrubbed before it is queued.

use std::fmt;

use crate::error::ProtocolError;

/// Separates one pair from the next
pub const PAIR_SEPARATOR: char = '&';

/// Separates a key from its value (first occurrence only)
pub const KEY_VALUE_SEPARATOR: char = '=';

/// Separates items of a list value and records of the values payload
pub const LIST_SEPARATOR: &str = "~";

/// Separates fields of a values-topic record
pub const VALUE_FIELD_SEPARATOR: &str = "*";

/// Separates fields of a match-topic record
pub const MATCH_FIELD_SEPARATOR: &str = "*$#$*";

/// Separates match-topic records
pub const MATCH_RECORD_SEPARATOR: &str = "~$#$~";

const RESERVED_TOKENS: [&str; 5] = [
    "&",
    "=",
    LIST_SEPARATOR,
    MATCH_FIELD_SEPARATOR,
    MATCH_RECORD_SEPARATOR,
];

/// True if `text` would corrupt the framing of a message it is embedded in.
pub fn contains_reserved(text: &str) -> bool {
    RESERVED_TOKENS.iter().any(|token| text.contains(token))
}

/// Replace every reserved token in free text with `_`.
///
/// Multi-character tokens go first so no fragment of them survives.
pub fn scrub_reserved(text: &str) -> String {
    if !contains_reserved(text) {
        return text.to_string();
    }

    let mut scrubbed = text
        .replace(MATCH_RECORD_SEPARATOR, "_")
        .replace(MATCH_FIELD_SEPARATOR, "_");
    for token in [PAIR_SEPARATOR, KEY_VALUE_SEPARATOR] {
        scrubbed = scrubbed.replace(token, "_");
    }
    scrubbed.replace(LIST_SEPARATOR, "_")
}

/// Kind of server-to-client message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Values,
    MatchValues,
    Log,
    Connected,
    AutoData,
}

impl ResponseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseKind::Values => "values",
            ResponseKind::MatchValues => "match_values",
            ResponseKind::Log => "log",
            ResponseKind::Connected => "connected",
            ResponseKind::AutoData => "auto_data",
        }
    }
}

/// Ordered key/value message
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WireMessage {
    pairs: Vec<(String, String)>,
}

impl WireMessage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a server-to-client message
    pub fn response(kind: ResponseKind) -> Self {
        Self::new().with("response", kind.as_str())
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.pairs.push((key.into(), value.into()));
        self
    }

    /// First value stored under `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn require(&self, key: &'static str) -> Result<&str, ProtocolError> {
        self.get(key).ok_or(ProtocolError::MissingField(key))
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn encode(&self) -> String {
        let mut out = String::new();
        for (i, (key, value)) in self.pairs.iter().enumerate() {
            if i > 0 {
                out.push(PAIR_SEPARATOR);
            }
            out.push_str(key);
            out.push(KEY_VALUE_SEPARATOR);
            out.push_str(value);
        }
        out
    }

    /// Split an inbound message into its pairs.
    ///
    /// Empty segments are skipped; a segment without `=` becomes a key with
    /// an empty value.
    pub fn decode(raw: &str) -> Self {
        let pairs = raw
            .split(PAIR_SEPARATOR)
            .filter(|segment| !segment.is_empty())
            .map(|segment| match segment.split_once(KEY_VALUE_SEPARATOR) {
                Some((key, value)) => (key.to_string(), value.to_string()),
                None => (segment.to_string(), String::new()),
            })
            .collect();

        Self { pairs }
    }
}

impl fmt::Display for WireMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Join list items for a single message value (`a~b~c`).
pub fn join_list<S: AsRef<str>>(items: &[S]) -> String {
    items
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(LIST_SEPARATOR)
}
