//! Provides [Header], the fixed size prefix of every frame on the wire.
//!
//! ```text
//! +-------+--------------------+------------------------+
//! | flags | body length (u32)  | request number (i32)   |
//! +-------+--------------------+------------------------+
//!  1 byte   4 bytes, big endian  4 bytes, big endian
//! ```
#[cfg(test)]
use proptest::strategy::Strategy as _;
use std::convert::TryFrom;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(test, derive(test_strategy::Arbitrary))]
pub struct Header {
    pub flags: HeaderFlags,
    pub body_type: BodyType,
    pub body_len: u32,
    /// Positive for requests, negative for replies. Never zero.
    #[cfg_attr(test, strategy((1i32..=i32::MAX).prop_union(i32::MIN..=-1i32)))]
    pub request_number: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(test, derive(test_strategy::Arbitrary))]
pub struct HeaderFlags {
    pub is_stream: bool,
    pub is_end_or_error: bool,
}

impl HeaderFlags {
    const STREAM: u8 = 0b1000;
    const END_OR_ERROR: u8 = 0b0100;

    fn from_byte(flags: u8) -> Self {
        Self {
            is_stream: flags & Self::STREAM != 0,
            is_end_or_error: flags & Self::END_OR_ERROR != 0,
        }
    }

    fn to_byte(self) -> u8 {
        let mut flags = 0;
        if self.is_stream {
            flags |= Self::STREAM;
        }
        if self.is_end_or_error {
            flags |= Self::END_OR_ERROR;
        }
        flags
    }
}

/// Encoding of the frame body. Stored in the two lowest bits of the flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(test, derive(test_strategy::Arbitrary))]
#[repr(u8)]
pub enum BodyType {
    Binary = 0,
    Text = 1,
    Json = 2,
}

impl TryFrom<u8> for BodyType {
    type Error = HeaderParseError;

    /// Extract the body type from the flags byte.
    fn try_from(flags: u8) -> Result<Self, Self::Error> {
        match flags & 0b11 {
            0 => Ok(BodyType::Binary),
            1 => Ok(BodyType::Text),
            2 => Ok(BodyType::Json),
            value => Err(HeaderParseError::InvalidBodyType { value }),
        }
    }
}

/// Error returned from [Header::parse].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HeaderParseError {
    #[error("Invalid body type {value}")]
    InvalidBodyType { value: u8 },
    #[error("Request number is zero")]
    RequestNumberZero,
}

impl Header {
    pub const SIZE: usize = 9;

    /// Parse a header. Returns `None` for the all-zero "goodbye" header that
    /// ends a connection.
    pub fn parse(data: [u8; Self::SIZE]) -> Result<Option<Self>, HeaderParseError> {
        if data == [0u8; Self::SIZE] {
            return Ok(None);
        }

        let body_type = BodyType::try_from(data[0])?;
        let request_number = i32::from_be_bytes([data[5], data[6], data[7], data[8]]);
        if request_number == 0 {
            return Err(HeaderParseError::RequestNumberZero);
        }

        Ok(Some(Self {
            flags: HeaderFlags::from_byte(data[0]),
            body_type,
            body_len: Self::peek_body_len(&data),
            request_number,
        }))
    }

    /// Read the body length field without validating the rest of the header.
    ///
    /// Used to skip the body of a frame whose header failed to parse.
    pub fn peek_body_len(data: &[u8; Self::SIZE]) -> u32 {
        u32::from_be_bytes([data[1], data[2], data[3], data[4]])
    }

    pub fn build(&self) -> [u8; Self::SIZE] {
        let mut header = [0u8; Self::SIZE];
        header[0] = self.flags.to_byte() | self.body_type as u8;
        header[1..5].copy_from_slice(&self.body_len.to_be_bytes());
        header[5..].copy_from_slice(&self.request_number.to_be_bytes());
        header
    }
}
