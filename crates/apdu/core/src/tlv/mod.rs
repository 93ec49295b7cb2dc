//! Simple-TLV codec
//!
//! Each record is `tag (1 byte) ‖ length ‖ value`, where the length is one byte
//! for values up to 254 bytes and `FF` followed by a big-endian u16 otherwise.
//! Sequences keep insertion order and duplicates.

mod tag;

use bytes::{Bytes, BytesMut};
use iso7816_tlv::simple;
pub use tag::TlvTag;
use thiserror::Error;

/// Errors raised by the TLV codec and its typed accessors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TlvError {
    /// Input ended in the middle of a record or its length was malformed
    #[error("Malformed TLV data at offset {offset}: {reason}")]
    Malformed {
        /// Byte offset of the record that failed to decode
        offset: usize,
        /// Diagnostic from the decoder
        reason: String,
    },

    /// Tag byte cannot be represented (00 and FF are reserved)
    #[error("Tag {0:#04x} cannot be encoded")]
    InvalidTag(u8),

    /// Value exceeds the 16-bit length field
    #[error("Value of {tag} is too long: {len} bytes")]
    ValueTooLong {
        /// Tag of the offending record
        tag: TlvTag,
        /// Value length in bytes
        len: usize,
    },

    /// A required tag is absent
    #[error("Missing tag {0}")]
    MissingTag(TlvTag),

    /// A value could not be interpreted as the requested type
    #[error("Invalid value for {tag}: {reason}")]
    InvalidValue {
        /// Tag of the offending record
        tag: TlvTag,
        /// What went wrong
        reason: &'static str,
    },
}

/// A single tag-length-value record
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tlv {
    tag: TlvTag,
    value: Bytes,
}

impl Tlv {
    /// Create a record
    pub fn new(tag: TlvTag, value: impl Into<Bytes>) -> Self {
        Self {
            tag,
            value: value.into(),
        }
    }

    /// Record holding a single byte
    pub fn u8(tag: TlvTag, value: u8) -> Self {
        Self::new(tag, vec![value])
    }

    /// Record holding a big-endian u16
    pub fn u16(tag: TlvTag, value: u16) -> Self {
        Self::new(tag, value.to_be_bytes().to_vec())
    }

    /// Record holding a big-endian u32
    pub fn u32(tag: TlvTag, value: u32) -> Self {
        Self::new(tag, value.to_be_bytes().to_vec())
    }

    /// Record holding an ASCII string
    pub fn ascii(tag: TlvTag, value: &str) -> Self {
        Self::new(tag, value.as_bytes().to_vec())
    }

    /// Record tag
    pub const fn tag(&self) -> TlvTag {
        self.tag
    }

    /// Record value
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Consume the record, returning its value
    pub fn into_value(self) -> Bytes {
        self.value
    }

    /// Encode this record
    pub fn to_bytes(&self) -> Result<Bytes, TlvError> {
        let tag = simple::Tag::try_from(self.tag.code())
            .map_err(|_| TlvError::InvalidTag(self.tag.code()))?;
        let tlv = simple::Tlv::new(tag, self.value.to_vec()).map_err(|_| {
            TlvError::ValueTooLong {
                tag: self.tag,
                len: self.value.len(),
            }
        })?;
        Ok(Bytes::from(tlv.to_vec()))
    }

    /// Value as a big-endian unsigned integer (at most 8 bytes)
    pub fn as_uint(&self) -> Result<u64, TlvError> {
        if self.value.is_empty() || self.value.len() > 8 {
            return Err(TlvError::InvalidValue {
                tag: self.tag,
                reason: "integer must be 1 to 8 bytes",
            });
        }
        Ok(self
            .value
            .iter()
            .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte)))
    }

    /// Value as an ASCII string, trailing NUL bytes stripped
    pub fn as_ascii(&self) -> Result<String, TlvError> {
        let trimmed = match self.value.iter().position(|b| *b == 0) {
            Some(end) => &self.value[..end],
            None => &self.value[..],
        };
        if !trimmed.is_ascii() {
            return Err(TlvError::InvalidValue {
                tag: self.tag,
                reason: "not an ASCII string",
            });
        }
        Ok(String::from_utf8_lossy(trimmed).into_owned())
    }

    /// Value as an upper-case hex string
    pub fn as_hex(&self) -> String {
        hex::encode_upper(&self.value)
    }
}

/// Ordered sequence of TLV records
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlvList(Vec<Tlv>);

impl TlvList {
    /// Create an empty sequence
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Append a record, keeping any existing record with the same tag
    pub fn push(&mut self, tlv: Tlv) {
        self.0.push(tlv);
    }

    /// Append a record built from a tag and value
    pub fn add(&mut self, tag: TlvTag, value: impl Into<Bytes>) {
        self.push(Tlv::new(tag, value));
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the sequence is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate the records in order
    pub fn iter(&self) -> std::slice::Iter<'_, Tlv> {
        self.0.iter()
    }

    /// Encode all records in order
    pub fn encode(&self) -> Result<Bytes, TlvError> {
        let mut buf = BytesMut::new();
        for tlv in &self.0 {
            buf.extend_from_slice(&tlv.to_bytes()?);
        }
        Ok(buf.freeze())
    }

    /// Decode a byte sequence into records
    ///
    /// Fails on a truncated record or a malformed length field.
    pub fn decode(data: &[u8]) -> Result<Self, TlvError> {
        let mut records = Vec::new();
        let mut rest = data;
        while !rest.is_empty() {
            let offset = data.len() - rest.len();
            let (parsed, remaining) = simple::Tlv::parse(rest);
            let tlv = parsed.map_err(|e| TlvError::Malformed {
                offset,
                reason: format!("{e:?}"),
            })?;
            // The decoder does not always advance on garbage
            if remaining.len() >= rest.len() {
                return Err(TlvError::Malformed {
                    offset,
                    reason: "decoder made no progress".to_string(),
                });
            }
            let code: u8 = tlv.tag().into();
            records.push(Tlv::new(
                TlvTag::from_code(code),
                Bytes::copy_from_slice(tlv.value()),
            ));
            rest = remaining;
        }
        Ok(Self(records))
    }

    /// First record with the given tag
    pub fn get(&self, tag: TlvTag) -> Option<&Tlv> {
        self.0.iter().find(|tlv| tlv.tag == tag)
    }

    /// Whether a record with the given tag is present
    pub fn contains(&self, tag: TlvTag) -> bool {
        self.get(tag).is_some()
    }

    /// All records with the given tag, in order
    pub fn get_all(&self, tag: TlvTag) -> impl Iterator<Item = &Tlv> {
        self.0.iter().filter(move |tlv| tlv.tag == tag)
    }

    /// Value of the first record with the given tag
    pub fn bytes(&self, tag: TlvTag) -> Option<&[u8]> {
        self.get(tag).map(Tlv::value)
    }

    /// Value of a required tag
    pub fn require(&self, tag: TlvTag) -> Result<&[u8], TlvError> {
        self.bytes(tag).ok_or(TlvError::MissingTag(tag))
    }

    /// First record as a big-endian unsigned integer
    pub fn uint(&self, tag: TlvTag) -> Result<Option<u64>, TlvError> {
        self.get(tag).map(Tlv::as_uint).transpose()
    }

    /// First record as an unsigned integer that must fit `N`
    pub fn uint_as<N: TryFrom<u64>>(&self, tag: TlvTag) -> Result<Option<N>, TlvError> {
        self.uint(tag)?
            .map(|value| {
                N::try_from(value).map_err(|_| TlvError::InvalidValue {
                    tag,
                    reason: "integer out of range",
                })
            })
            .transpose()
    }

    /// First record as an ASCII string
    pub fn ascii(&self, tag: TlvTag) -> Result<Option<String>, TlvError> {
        self.get(tag).map(Tlv::as_ascii).transpose()
    }

    /// First record as an upper-case hex string
    pub fn hex(&self, tag: TlvTag) -> Option<String> {
        self.get(tag).map(Tlv::as_hex)
    }
}

impl From<Vec<Tlv>> for TlvList {
    fn from(records: Vec<Tlv>) -> Self {
        Self(records)
    }
}

impl FromIterator<Tlv> for TlvList {
    fn from_iter<I: IntoIterator<Item = Tlv>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<Tlv> for TlvList {
    fn extend<I: IntoIterator<Item = Tlv>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl IntoIterator for TlvList {
    type Item = Tlv;
    type IntoIter = std::vec::IntoIter<Tlv>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a TlvList {
    type Item = &'a Tlv;
    type IntoIter = std::slice::Iter<'a, Tlv>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
