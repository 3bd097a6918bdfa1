use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier of an upstream conversation thread.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(String);

impl ThreadId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    /// Accept a caller-supplied id only if it can be used as a URL path
    /// segment as-is.
    pub fn parse(raw: &str) -> Option<Self> {
        is_valid_id(raw).then(|| Self(raw.to_owned()))
    }
}

/// Upstream identifiers are ASCII letters, digits, `_` and `-`.
pub(crate) fn is_valid_id(raw: &str) -> bool {
    !raw.is_empty()
        && raw
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ThreadId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ThreadId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Opaque identifier of one assistant run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RunId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Author of a thread message.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single message in a thread.
///
/// Messages are immutable once created upstream; `created_at` is the upstream
/// unix timestamp (seconds) and defines the ordering within a thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub thread_id: ThreadId,
    pub role: Role,
    /// Concatenation of every text part of the upstream message.
    pub content: String,
    pub created_at: i64,
}

/// Lifecycle status of a run, as reported by the upstream service.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    /// The run is being cancelled upstream; still non-terminal.
    Cancelling,
    Completed,
    Failed,
    Cancelled,
    Expired,
    /// The assistant asked for tool outputs. This workflow never submits any,
    /// so the status is treated as a terminal failure.
    RequiresAction,
    Incomplete,
    /// Any status this crate does not know about. Polling continues.
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    /// `true` once no further transition will happen for this workflow.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunStatus::Completed
                | RunStatus::Failed
                | RunStatus::Cancelled
                | RunStatus::Expired
                | RunStatus::RequiresAction
                | RunStatus::Incomplete
        )
    }

    pub fn is_success(self) -> bool {
        self == RunStatus::Completed
    }
}

/// Error detail attached by the upstream service to a failed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunLastError {
    pub code: String,
    pub message: String,
}

/// Upstream view of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub thread_id: ThreadId,
    pub status: RunStatus,
    #[serde(default)]
    pub last_error: Option<RunLastError>,
}

/// Order in which thread messages are returned.
///
/// `OldestFirst` is chronological and suits rendering a transcript top to
/// bottom; `NewestFirst` matches the upstream listing default.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
pub enum MessageOrder {
    #[default]
    #[serde(rename = "asc")]
    #[strum(to_string = "asc", serialize = "oldest")]
    OldestFirst,
    #[serde(rename = "desc")]
    #[strum(to_string = "desc", serialize = "newest")]
    NewestFirst,
}

impl MessageOrder {
    /// Value of the upstream `order` query parameter.
    pub fn as_query(self) -> &'static str {
        match self {
            MessageOrder::OldestFirst => "asc",
            MessageOrder::NewestFirst => "desc",
        }
    }
}
