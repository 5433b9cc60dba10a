use crate::header::HeaderParseError;
use crate::message::BodyError;

/// Error raised by the remote peer and sent back as a response body.
///
/// On the wire this is a JSON object `{"name": "Error", "message": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct RpcError {
    pub name: String,
    pub message: String,
}

impl RpcError {
    /// Value of the `name` field that marks a response body as an error.
    pub const NAME: &'static str = "Error";

    pub fn new(message: impl ToString) -> Self {
        Self {
            name: Self::NAME.to_string(),
            message: message.to_string(),
        }
    }

    /// Returns the error if `value` has the error shape `{"name": "Error", ...}`.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        let object = value.as_object()?;
        if object.get("name")?.as_str()? != Self::NAME {
            return None;
        }
        let message = object
            .get("message")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default();
        Some(Self::new(message))
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "message": self.message,
        })
    }
}

/// Malformed frame received from the peer.
#[derive(Debug, thiserror::Error)]
pub enum MalformedFrame {
    #[error("Failed to parse frame header")]
    Header(
        #[source]
        #[from]
        HeaderParseError,
    ),
    #[error("Failed to decode frame body")]
    Body(
        #[source]
        #[from]
        BodyError,
    ),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The frame was discarded. Reading may continue.
    #[error("Malformed frame")]
    MalformedFrame(
        #[source]
        #[from]
        MalformedFrame,
    ),
    #[error("Not connected")]
    NotConnected,
    #[error("Method \"{name}\" not found")]
    MethodNotFound { name: String },
    #[error("Remote error: {0}")]
    Rpc(
        #[source]
        #[from]
        RpcError,
    ),
    #[error("Transport failed")]
    Transport(#[source] std::io::Error),
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn error_shape() {
        let value = serde_json::json!({"name": "Error", "message": "boom"});
        assert_eq!(RpcError::from_json(&value), Some(RpcError::new("boom")));

        let value = serde_json::json!({"name": "Error"});
        assert_eq!(RpcError::from_json(&value), Some(RpcError::new("")));
    }

    #[test]
    fn not_error_shape() {
        for value in vec![
            serde_json::json!({"name": "TypeError", "message": "boom"}),
            serde_json::json!({"message": "boom"}),
            serde_json::json!(["Error", "boom"]),
            serde_json::json!(true),
            serde_json::json!({"id": "@abc=.ed25519"}),
        ] {
            assert_eq!(RpcError::from_json(&value), None, "{}", value);
        }
    }

    #[test_strategy::proptest]
    fn to_json_from_json(#[strategy("[a-z ]*")] message: String) {
        let error = RpcError::new(message);
        prop_assert_eq!(RpcError::from_json(&error.to_json()), Some(error));
    }
}
