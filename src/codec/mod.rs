//! Value serialization seam.
//!
//! The transport moves opaque `(flags, bytes)` payloads; a [`Codec`] turns
//! application values into that form and back. [`BincodeCodec`] covers
//! serde-serializable types, [`StringCodec`] covers UTF-8 strings, and
//! [`RawCodec`] passes pre-encoded payloads through untouched.


use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::CodecError;

/// Flag bits identifying how a payload was encoded.
pub const FLAG_RAW: u32 = 0;
pub const FLAG_UTF8: u32 = 1;
pub const FLAG_BINCODE: u32 = 2;

/// The transportable form of a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedPayload {
    pub flags: u32,
    pub data: Vec<u8>,
}

impl CachedPayload {
    pub fn new(flags: u32, data: Vec<u8>) -> Self {
        Self { flags, data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Encode/decode between application values and transportable payloads.
pub trait Codec<T>: Send + Sync {
    fn encode(&self, value: &T) -> Result<CachedPayload, CodecError>;

    fn decode(&self, payload: &CachedPayload) -> Result<T, CodecError>;
}

/// Serde codec over bincode for any serializable value type.
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCodec;

impl<T> Codec<T> for BincodeCodec
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    fn encode(&self, value: &T) -> Result<CachedPayload, CodecError> {
        let data = bincode::serialize(value).map_err(|e| CodecError::Encode(Box::new(e)))?;
        Ok(CachedPayload::new(FLAG_BINCODE, data))
    }

    fn decode(&self, payload: &CachedPayload) -> Result<T, CodecError> {
        bincode::deserialize(&payload.data).map_err(|e| CodecError::Decode {
            flags: payload.flags,
            source: Box::new(e),
        })
    }
}

/// UTF-8 string codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringCodec;

impl Codec<String> for StringCodec {
    fn encode(&self, value: &String) -> Result<CachedPayload, CodecError> {
        Ok(CachedPayload::new(FLAG_UTF8, value.as_bytes().to_vec()))
    }

    fn decode(&self, payload: &CachedPayload) -> Result<String, CodecError> {
        String::from_utf8(payload.data.clone()).map_err(|e| CodecError::Decode {
            flags: payload.flags,
            source: Box::new(e),
        })
    }
}

/// Identity codec for callers that already hold an encoded payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawCodec;

impl Codec<CachedPayload> for RawCodec {
    fn encode(&self, value: &CachedPayload) -> Result<CachedPayload, CodecError> {
        Ok(value.clone())
    }

    fn decode(&self, payload: &CachedPayload) -> Result<CachedPayload, CodecError> {
        Ok(payload.clone())
    }
}
