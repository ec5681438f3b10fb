//! The unit exchanged on the raw plugin channel.
//!
//! An [`Envelope`] names a logical channel and carries an ordered argument
//! list. Calls and their responses additionally carry a correlation id so
//! the caller can match the answer to the request. Everything else is a
//! fire-and-forget event.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A message on the raw channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Full channel name, including any `<scope>/` prefix.
    pub channel: String,

    /// Present only on call/response pairs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,

    /// Ordered argument list.
    #[serde(default)]
    pub args: Vec<Value>,
}

impl Envelope {
    /// Create a fire-and-forget event envelope.
    pub fn event(channel: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            channel: channel.into(),
            correlation_id: None,
            args,
        }
    }

    /// Create a call envelope tagged with `correlation_id`.
    pub fn call(
        channel: impl Into<String>,
        correlation_id: impl Into<String>,
        args: Vec<Value>,
    ) -> Self {
        Self {
            channel: channel.into(),
            correlation_id: Some(correlation_id.into()),
            args,
        }
    }

    /// Build the response to a call received on `channel`.
    ///
    /// The response travels on [`response_channel`] and echoes the
    /// correlation id.
    pub fn response(channel: &str, correlation_id: &str, value: Value) -> Self {
        Self {
            channel: response_channel(channel, correlation_id),
            correlation_id: Some(correlation_id.to_owned()),
            args: vec![value],
        }
    }

    /// Returns `true` if this envelope belongs to a call/response pair.
    pub fn is_correlated(&self) -> bool {
        self.correlation_id.is_some()
    }

    /// First argument, or `Null` when the list is empty.
    pub fn first_arg(&self) -> Value {
        self.args.first().cloned().unwrap_or(Value::Null)
    }
}

/// An envelope as received, tagged with the identity of its sender.
///
/// `sender` is whatever identity the transport can attribute to the
/// frame (a window id, a worker id). Transports that cannot tell leave
/// it empty, and such frames always pass endpoint validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Inbound {
    /// Sender identity, if known.
    pub sender: Option<String>,
    /// The decoded envelope.
    pub envelope: Envelope,
}

impl Inbound {
    /// Wrap an envelope with no sender identity.
    pub fn anonymous(envelope: Envelope) -> Self {
        Self {
            sender: None,
            envelope,
        }
    }

    /// Wrap an envelope attributed to `sender`.
    pub fn from_sender(sender: impl Into<String>, envelope: Envelope) -> Self {
        Self {
            sender: Some(sender.into()),
            envelope,
        }
    }
}

/// Name of the channel a call's response is sent on.
pub fn response_channel(channel: &str, correlation_id: &str) -> String {
    format!("{channel}-{correlation_id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_serialization_omits_correlation_id() {
        let env = Envelope::event("u1/setText", vec![json!("hello")]);
        let json = serde_json::to_string(&env).unwrap();
        assert_eq!(json, r#"{"channel":"u1/setText","args":["hello"]}"#);
    }

    #[test]
    fn call_uses_camel_case() {
        let env = Envelope::call("ready", "abc", vec![]);
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["correlationId"], "abc");
        assert_eq!(json["args"], json!([]));
    }

    #[test]
    fn missing_args_default_to_empty() {
        let env: Envelope = serde_json::from_str(r#"{"channel":"settings"}"#).unwrap();
        assert!(env.args.is_empty());
        assert!(!env.is_correlated());
        assert_eq!(env.first_arg(), Value::Null);
    }

    #[test]
    fn response_targets_derived_channel() {
        let env = Envelope::response("u1/stop", "42", json!(true));
        assert_eq!(env.channel, "u1/stop-42");
        assert_eq!(env.correlation_id.as_deref(), Some("42"));
        assert_eq!(env.first_arg(), json!(true));
    }

    #[test]
    fn inbound_constructors() {
        let env = Envelope::event("x", vec![]);
        assert!(Inbound::anonymous(env.clone()).sender.is_none());
        assert_eq!(
            Inbound::from_sender("win-1", env).sender.as_deref(),
            Some("win-1")
        );
    }
}
