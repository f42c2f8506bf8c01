//! Normalized command results.

use serde::Serialize;

/// Result of running one command against a server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The server answered; carries the raw response text
    Success(String),
    /// No answer within the command timeout; the connection is kept
    SoftTimeout,
    /// No usable connection, the command was not (fully) delivered
    NoConnection,
}

/// Discriminant of [`CommandOutcome`] as exposed to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutcomeKind {
    /// See [`CommandOutcome::Success`]
    Success,
    /// See [`CommandOutcome::SoftTimeout`]
    SoftTimeout,
    /// See [`CommandOutcome::NoConnection`]
    NoConnection,
}

impl OutcomeKind {
    /// Stable label
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::Success => "success",
            OutcomeKind::SoftTimeout => "soft-timeout",
            OutcomeKind::NoConnection => "no-connection",
        }
    }
}

impl CommandOutcome {
    /// Discriminant
    pub fn kind(&self) -> OutcomeKind {
        match self {
            CommandOutcome::Success(_) => OutcomeKind::Success,
            CommandOutcome::SoftTimeout => OutcomeKind::SoftTimeout,
            CommandOutcome::NoConnection => OutcomeKind::NoConnection,
        }
    }

    /// Anything but a missing connection counts as delivered
    pub fn is_ok(&self) -> bool {
        !matches!(self, CommandOutcome::NoConnection)
    }

    /// Response text, only present on success
    pub fn text(&self) -> Option<&str> {
        match self {
            CommandOutcome::Success(text) => Some(text),
            _ => None,
        }
    }

    /// Take the response text
    pub fn into_text(self) -> Option<String> {
        match self {
            CommandOutcome::Success(text) => Some(text),
            _ => None,
        }
    }
}

/// Serializable reply shape handed to the HTTP layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandReply {
    /// See [`CommandOutcome::is_ok`]
    pub ok: bool,
    /// Response text on success
    pub text: Option<String>,
    /// Outcome discriminant
    pub kind: OutcomeKind,
}

impl From<CommandOutcome> for CommandReply {
    fn from(outcome: CommandOutcome) -> Self {
        Self {
            ok: outcome.is_ok(),
            kind: outcome.kind(),
            text: outcome.into_text(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_json_shape() {
        let reply = CommandReply::from(CommandOutcome::Success("hostname = x".to_string()));
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"ok": true, "text": "hostname = x", "kind": "success"})
        );

        let reply = CommandReply::from(CommandOutcome::SoftTimeout);
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"ok": true, "text": null, "kind": "soft-timeout"})
        );

        let reply = CommandReply::from(CommandOutcome::NoConnection);
        assert!(!reply.ok);
        assert_eq!(reply.kind.as_str(), "no-connection");
    }
}
