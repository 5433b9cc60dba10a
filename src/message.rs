//! Provides [Message], the decoded unit of the packet stream, and its [Body].
use crate::header::{BodyType, Header, HeaderFlags};

/// Maximum number of body bytes written to the transport at once.
pub const CHUNK_SIZE: usize = 4096;

/// Error encoding or decoding a frame body.
#[derive(Debug, thiserror::Error)]
pub enum BodyError {
    #[error("Invalid JSON body")]
    Json {
        body: String,
        #[source]
        error: serde_json::Error,
    },
    #[error("Invalid string body")]
    Text {
        #[source]
        error: std::string::FromUtf8Error,
    },
    #[error("Failed to serialize JSON body")]
    Serialize(#[source] serde_json::Error),
}

#[derive(Clone, PartialEq)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub enum Body {
    Binary(Vec<u8>),
    Text(String),
    Json(#[cfg_attr(test, proptest(strategy = "test::json_value()"))] serde_json::Value),
}

impl Body {
    /// Serialize `value` into a JSON body.
    pub fn json(value: &impl serde::Serialize) -> Result<Self, BodyError> {
        serde_json::to_value(value)
            .map(Body::Json)
            .map_err(BodyError::Serialize)
    }

    /// The JSON literal `true` that ends a stream without an error.
    pub fn end() -> Self {
        Body::Json(serde_json::Value::Bool(true))
    }

    pub fn is_end(&self) -> bool {
        matches!(self, Body::Json(serde_json::Value::Bool(true)))
    }

    pub fn body_type(&self) -> BodyType {
        match self {
            Body::Binary(_) => BodyType::Binary,
            Body::Text(_) => BodyType::Text,
            Body::Json(_) => BodyType::Json,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Body::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Deserialize a JSON body into `T`. Returns `None` for non-JSON bodies.
    pub fn decode_json<T: serde::de::DeserializeOwned>(&self) -> Option<serde_json::Result<T>> {
        self.as_json()
            .map(|value| serde_json::from_value(value.clone()))
    }

    /// Raw bytes as they are sent over the wire.
    pub fn to_bytes(&self) -> Result<Vec<u8>, BodyError> {
        match self {
            Body::Binary(data) => Ok(data.clone()),
            Body::Text(string) => Ok(Vec::from(string.as_bytes())),
            Body::Json(value) => serde_json::to_vec(value).map_err(BodyError::Serialize),
        }
    }

    pub fn from_bytes(body_type: BodyType, data: Vec<u8>) -> Result<Self, BodyError> {
        Ok(match body_type {
            BodyType::Binary => Body::Binary(data),
            BodyType::Text => {
                Body::Text(String::from_utf8(data).map_err(|error| BodyError::Text { error })?)
            }
            BodyType::Json => {
                let value = serde_json::from_slice(&data).map_err(|error| BodyError::Json {
                    body: String::from_utf8_lossy(&data).into_owned(),
                    error,
                })?;
                Body::Json(value)
            }
        })
    }
}

impl std::fmt::Debug for Body {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Binary(data) => fmt
                .debug_tuple("Binary")
                .field(&format_args!("{} bytes", data.len()))
                .finish(),
            Self::Text(string) => fmt.debug_tuple("Text").field(string).finish(),
            Self::Json(value) => fmt
                .debug_tuple("Json")
                .field(&format_args!("{}", value))
                .finish(),
        }
    }
}

impl From<serde_json::Value> for Body {
    fn from(value: serde_json::Value) -> Self {
        Body::Json(value)
    }
}

impl From<String> for Body {
    fn from(string: String) -> Self {
        Body::Text(string)
    }
}

impl From<Vec<u8>> for Body {
    fn from(data: Vec<u8>) -> Self {
        Body::Binary(data)
    }
}

/// A frame of the packet stream with its body decoded.
///
/// `req` is the request number the message was received with. It is `None`
/// for messages that have not been sent yet.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct Message {
    pub body: Body,
    pub stream: bool,
    pub end_err: bool,
    #[cfg_attr(test, proptest(value = "None"))]
    pub req: Option<i32>,
}

impl Message {
    pub fn new(body: Body, stream: bool, end_err: bool) -> Self {
        Self {
            body,
            stream,
            end_err,
            req: None,
        }
    }

    pub fn flags(&self) -> HeaderFlags {
        HeaderFlags {
            is_stream: self.stream,
            is_end_or_error: self.end_err,
        }
    }

    /// Returns true for the final message of a stream that carries no data.
    pub fn is_end_sentinel(&self) -> bool {
        self.end_err && self.body.is_end()
    }

    /// Build the header and body bytes of the frame carrying this message.
    pub fn encode(&self, request_number: i32) -> Result<(Header, Vec<u8>), BodyError> {
        let body = self.body.to_bytes()?;
        let header = Header {
            flags: self.flags(),
            body_type: self.body.body_type(),
            body_len: body.len() as u32,
            request_number,
        };
        Ok((header, body))
    }

    pub fn decode(header: Header, body: Vec<u8>) -> Result<Self, BodyError> {
        Ok(Self {
            body: Body::from_bytes(header.body_type, body)?,
            stream: header.flags.is_stream,
            end_err: header.flags.is_end_or_error,
            req: Some(header.request_number),
        })
    }
}

/// Number of transport chunks a body of `len` bytes is split into.
pub fn chunk_count(len: usize) -> usize {
    (len + CHUNK_SIZE - 1) / CHUNK_SIZE
}

/// Split body bytes into the chunks written to the transport.
pub fn chunks(data: &[u8]) -> std::slice::Chunks<'_, u8> {
    data.chunks(CHUNK_SIZE)
}
