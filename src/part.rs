// Copyright 2021 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! `Part`, the wire envelope carried over the gossip broadcast queue and push/pull snapshots:
//! `{ key: string, data: bytes }`. The codec here is a length-delimited record format private to
//! this crate; both sides of a cluster must run the same version, since the payload encoding
//! itself is opaque to this layer.

use bytes::{Buf, BufMut, Bytes, BytesMut};

/// A single `{ key, data }` envelope.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Part {
    /// The state-key this payload belongs to.
    pub key: String,
    /// The opaque, caller-encoded payload.
    pub data: Bytes,
}

impl Part {
    /// Wraps a key and payload as a `Part`.
    pub fn new(key: impl Into<String>, data: Bytes) -> Self {
        Self { key: key.into(), data }
    }

    /// Encodes this part as `[key_len: u16][key][data]`.
    pub fn encode(&self) -> Bytes {
        let key_bytes = self.key.as_bytes();
        let mut buf = BytesMut::with_capacity(2 + key_bytes.len() + self.data.len());
        buf.put_u16(key_bytes.len() as u16);
        buf.put_slice(key_bytes);
        buf.put_slice(&self.data);
        buf.freeze()
    }

    /// Decodes a single part previously produced by [`Part::encode`].
    pub fn decode(mut buf: &[u8]) -> Result<Self, DecodePartError> {
        if buf.len() < 2 {
            return Err(DecodePartError::Truncated);
        }
        let key_len = buf.get_u16() as usize;
        if buf.len() < key_len {
            return Err(DecodePartError::Truncated);
        }
        let key = String::from_utf8(buf[..key_len].to_vec()).map_err(|_| DecodePartError::InvalidKey)?;
        let data = Bytes::copy_from_slice(&buf[key_len..]);
        Ok(Self { key, data })
    }

    /// Encodes a whole list of parts (a push/pull snapshot) as a length-prefixed sequence.
    pub fn encode_list(parts: &[Part]) -> Bytes {
        let mut buf = BytesMut::new();
        buf.put_u32(parts.len() as u32);
        for part in parts {
            let encoded = part.encode();
            buf.put_u32(encoded.len() as u32);
            buf.put_slice(&encoded);
        }
        buf.freeze()
    }

    /// Decodes a list previously produced by [`Part::encode_list`].
    pub fn decode_list(mut buf: &[u8]) -> Result<Vec<Part>, DecodePartError> {
        if buf.len() < 4 {
            return Err(DecodePartError::Truncated);
        }
        let count = buf.get_u32() as usize;
        let mut parts = Vec::with_capacity(count);
        for _ in 0..count {
            if buf.len() < 4 {
                return Err(DecodePartError::Truncated);
            }
            let len = buf.get_u32() as usize;
            if buf.len() < len {
                return Err(DecodePartError::Truncated);
            }
            parts.push(Part::decode(&buf[..len])?);
            buf.advance(len);
        }
        Ok(parts)
    }
}

/// Decoding failures are logged and discarded by the delegate, since one bad message should
/// never corrupt local state; nothing here is ever propagated as a hard error.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum DecodePartError {
    /// The buffer ended before a declared length was satisfied.
    #[error("truncated part buffer")]
    Truncated,
    /// The key bytes were not valid UTF-8.
    #[error("part key is not valid utf-8")]
    InvalidKey,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_round_trips() {
        let part = Part::new("silences", Bytes::from_static(b"payload"));
        let encoded = part.encode();
        let decoded = Part::decode(&encoded).unwrap();
        assert_eq!(decoded, part);
    }

    #[test]
    fn part_list_round_trips() {
        let parts = vec![
            Part::new("silences", Bytes::from_static(b"a")),
            Part::new("nflog", Bytes::from_static(b"bb")),
        ];
        let encoded = Part::encode_list(&parts);
        let decoded = Part::decode_list(&encoded).unwrap();
        assert_eq!(decoded, parts);
    }

    #[test]
    fn decode_truncated_buffer_errors() {
        assert_eq!(Part::decode(&[0, 5, 1, 2]), Err(DecodePartError::Truncated));
    }
}
