use serde::{Deserialize, Serialize};

/// An immutable (body, timestamp) entry of a feed.
///
/// The timestamp doubles as the post's identity: a feed never holds two
/// posts with the same timestamp, and timestamps are assumed not to be NaN.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub body: String,
    pub timestamp: f64,
}

impl Post {
    pub fn new(body: impl Into<String>, timestamp: f64) -> Self {
        Self {
            body: body.into(),
            timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_lowercase_keys() {
        let json = serde_json::to_string(&Post::new("hi", 5.0)).expect("serialize");
        assert_eq!(json, r#"{"body":"hi","timestamp":5.0}"#);
    }
}
