//! The JSON envelope that opens every call and the [Request] built from it.
use crate::handler::Handler;
use crate::message::Message;

/// Shape of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub enum RequestType {
    /// Exactly one reply
    Sync,
    /// Exactly one reply
    Async,
    /// Only the callee sends messages
    Source,
    /// Only the caller sends messages
    Sink,
    /// Both the caller and the callee send messages
    Duplex,
}

impl RequestType {
    /// Returns true if frames of this call have the stream bit set.
    pub fn is_stream(self) -> bool {
        matches!(self, Self::Source | Self::Sink | Self::Duplex)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sync => "sync",
            Self::Async => "async",
            Self::Source => "source",
            Self::Sink => "sink",
            Self::Duplex => "duplex",
        }
    }
}

impl Default for RequestType {
    fn default() -> Self {
        Self::Async
    }
}

impl std::fmt::Display for RequestType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RequestType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "sync" => Ok(Self::Sync),
            "async" => Ok(Self::Async),
            "source" => Ok(Self::Source),
            "sink" => Ok(Self::Sink),
            "duplex" => Ok(Self::Duplex),
            value => Err(format!("Unknown request type \"{}\"", value)),
        }
    }
}

impl serde::Serialize for RequestType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.as_str().serialize(serializer)
    }
}

impl<'de> serde::Deserialize<'de> for RequestType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;

        let value = String::deserialize(deserializer)?;
        value.parse().map_err(|_| {
            D::Error::invalid_value(
                serde::de::Unexpected::Str(&value),
                &"one of \"sync\", \"async\", \"source\", \"sink\" or \"duplex\"",
            )
        })
    }
}

/// Body of the first frame of a call.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct CallEnvelope {
    pub name: Vec<String>,
    #[serde(default)]
    pub args: Vec<serde_json::Value>,
    #[serde(rename = "type", default)]
    pub type_: RequestType,
}

impl CallEnvelope {
    /// Build an envelope for the dot-separated method `name`.
    pub fn new(name: &str, args: Vec<serde_json::Value>, type_: RequestType) -> Self {
        Self {
            name: name.split('.').map(String::from).collect(),
            args,
            type_,
        }
    }

    /// Method path joined with dots.
    pub fn method(&self) -> String {
        self.name.join(".")
    }
}

/// Call initiated by the peer, as passed to method handlers.
#[derive(Debug)]
pub struct Request {
    /// Positive request number chosen by the peer.
    pub number: i32,
    pub name: String,
    pub args: Vec<serde_json::Value>,
    pub type_: RequestType,
    /// Stream bit of the frame that opened the call.
    pub stream: bool,
    /// Further messages the peer sends on a stream call. Set by the
    /// dispatcher for calls that stay open.
    pub incoming: Option<Handler>,
}

impl Request {
    /// Decode the request from the first frame of an inbound call. Returns
    /// `None` if the frame does not carry a call envelope.
    pub fn from_message(message: &Message) -> Option<Self> {
        let number = message.req.filter(|number| *number > 0)?;
        let envelope = message.body.decode_json::<CallEnvelope>()?.ok()?;
        Some(Self {
            number,
            name: envelope.method(),
            args: envelope.args,
            type_: envelope.type_,
            stream: message.stream,
            incoming: None,
        })
    }

    /// Request number to use for replies.
    pub fn response_number(&self) -> i32 {
        -self.number
    }
}
