//! Request and response messages, one JSON object per line.
//!
//! ```text
//! -> {"command":"ADD","id":1,"body":"hi","timestamp":5.0}
//! <- {"id":1,"success":true}
//! -> {"command":"FEED","id":3}
//! <- {"id":3,"feed":[{"body":"yo","timestamp":7.0},{"body":"hi","timestamp":5.0}]}
//! ```

use chirp_feed::Post;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Command {
    Add,
    Remove,
    Contains,
    Feed,
    /// Ends input consumption; never answered.
    Done,
    /// Any command name we do not recognise, or none at all. Answered with
    /// `success: false`.
    #[default]
    #[serde(other)]
    Unknown,
}

/// A decoded request. Absent fields take their zero value and field names
/// also match in capitalised form (`Command`, `Id`, ...).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Request {
    #[serde(default, alias = "Command")]
    pub command: Command,
    /// Caller-supplied correlation id, echoed in the response.
    #[serde(default, alias = "Id", alias = "ID")]
    pub id: i64,
    #[serde(default, alias = "Body")]
    pub body: String,
    #[serde(default, alias = "Timestamp")]
    pub timestamp: f64,
}

impl Request {
    pub fn new(command: Command, id: i64) -> Self {
        Self {
            command,
            id,
            body: String::new(),
            timestamp: 0.0,
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_timestamp(mut self, timestamp: f64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn is_done(&self) -> bool {
        self.command == Command::Done
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Status { id: i64, success: bool },
    Feed { id: i64, feed: Vec<Post> },
}

impl Response {
    pub fn status(id: i64, success: bool) -> Self {
        Self::Status { id, success }
    }

    pub fn feed(id: i64, feed: Vec<Post>) -> Self {
        Self::Feed { id, feed }
    }

    pub fn id(&self) -> i64 {
        match self {
            Self::Status { id, .. } | Self::Feed { id, .. } => *id,
        }
    }
}
