use std::fmt;

use crate::error::BroadcasterError;

/// Logical broadcast channel, chosen by the client's connect path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Dashboard,
    Values,
    Match,
    Log,
}

impl Topic {
    pub const ALL: [Topic; 4] = [Topic::Dashboard, Topic::Values, Topic::Match, Topic::Log];

    /// Resolve the request path of a new connection.
    ///
    /// `/webdashboard` is accepted as an alias of `/dashboard`.
    pub fn from_path(path: &str) -> Result<Self, BroadcasterError> {
        match path {
            "/dashboard" | "/webdashboard" => Ok(Topic::Dashboard),
            "/values" => Ok(Topic::Values),
            "/match" => Ok(Topic::Match),
            "/log" => Ok(Topic::Log),
            other => Err(BroadcasterError::UnknownTopic(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Topic::Dashboard => "dashboard",
            Topic::Values => "values",
            Topic::Match => "match",
            Topic::Log => "log",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
