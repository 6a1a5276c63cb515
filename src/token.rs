use serde::{Deserialize, Serialize};
use serde_json::Value;
use veil::Redact;

/// Session token returned by a successful authentication.
///
/// The client never looks inside: whatever the server returns from
/// `authenticate` is handed back verbatim when binding the renderer. The
/// token lives for one application session and is never renewed.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Redact)]
#[serde(transparent)]
pub struct SessionToken {
    #[redact]
    value: Value,
}

impl SessionToken {
    #[must_use]
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
        }
    }

    /// Wire form of the token.
    #[must_use]
    pub fn to_value(&self) -> Value {
        self.value.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn token_is_passed_through_unchanged() {
        let wire = json!({ "session": 42, "nonce": "a1b2" });
        let token: SessionToken = serde_json::from_value(wire.clone()).unwrap();
        assert_eq!(token.to_value(), wire);
    }

    #[test]
    fn token_is_redacted_in_debug_output() {
        let token = SessionToken::new("s3cr3t-token");
        assert!(!format!("{token:?}").contains("s3cr3t-token"));
    }
}
