//! # Bus Messages
//!
//! Decoding of multipart frames `[topic, payload, sequence?]` into
//! [`BusMessage`] values.

use std::fmt;

use crate::{BusError, Result};

/// Topic names published by the node.
pub mod topics {
    /// Hash of every newly connected block.
    pub const HASH_BLOCK: &str = "hashblock";
    /// Hash of every transaction entering the mempool.
    pub const HASH_TX: &str = "hashtx";
    /// Full serialized block.
    pub const RAW_BLOCK: &str = "rawblock";
    /// Full serialized transaction.
    pub const RAW_TX: &str = "rawtx";
}

/// Optional per-topic sequence number carried in the third frame.
///
/// Displays as `N/A` when the frame did not carry one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Sequence(pub Option<u32>);

impl Sequence {
    /// Decode a 4-byte little-endian counter; anything else is absent.
    pub fn from_frame(frame: Option<&[u8]>) -> Self {
        let value = frame
            .and_then(|bytes| <[u8; 4]>::try_from(bytes).ok())
            .map(u32::from_le_bytes);
        Self(value)
    }

    /// The numeric value, if present.
    pub fn value(&self) -> Option<u32> {
        self.0
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(n) => write!(f, "{n}"),
            None => f.write_str("N/A"),
        }
    }
}

/// A message received from the publish endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    /// Topic the message was published on.
    pub topic: String,
    /// Payload, hex encoded.
    pub payload_hex: String,
    /// Publisher sequence number.
    pub sequence: Sequence,
}

impl BusMessage {
    /// Decode a multipart frame.
    ///
    /// # Errors
    ///
    /// `BusError::Malformed` when fewer than two fields are present.
    pub fn from_frames(frames: &[Vec<u8>]) -> Result<Self> {
        match frames {
            [topic, payload, rest @ ..] => Ok(Self {
                topic: String::from_utf8_lossy(topic).into_owned(),
                payload_hex: hex::encode(payload),
                sequence: Sequence::from_frame(rest.first().map(Vec::as_slice)),
            }),
            _ => Err(BusError::Malformed(frames.len())),
        }
    }

    /// Encode into a multipart frame.
    ///
    /// Payloads that are not valid hex are sent as raw bytes.
    pub fn to_frames(&self) -> Vec<Vec<u8>> {
        let payload =
            hex::decode(&self.payload_hex).unwrap_or_else(|_| self.payload_hex.as_bytes().to_vec());
        let mut frames = vec![self.topic.as_bytes().to_vec(), payload];
        if let Some(seq) = self.sequence.value() {
            frames.push(seq.to_le_bytes().to_vec());
        }
        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_with_sequence() {
        let frames = vec![
            b"hashblock".to_vec(),
            vec![0xab; 32],
            7u32.to_le_bytes().to_vec(),
        ];
        let msg = BusMessage::from_frames(&frames).unwrap();
        assert_eq!(msg.topic, topics::HASH_BLOCK);
        assert_eq!(msg.payload_hex, "ab".repeat(32));
        assert_eq!(msg.sequence, Sequence(Some(7)));
        assert_eq!(msg.sequence.to_string(), "7");
    }

    #[test]
    fn test_missing_sequence_is_sentinel() {
        let frames = vec![b"hashtx".to_vec(), vec![0x01, 0x02]];
        let msg = BusMessage::from_frames(&frames).unwrap();
        assert_eq!(msg.sequence.value(), None);
        assert_eq!(msg.sequence.to_string(), "N/A");
    }

    #[test]
    fn test_short_sequence_is_sentinel() {
        let frames = vec![b"hashtx".to_vec(), vec![0x01], vec![0x01, 0x00]];
        let msg = BusMessage::from_frames(&frames).unwrap();
        assert_eq!(msg.sequence, Sequence(None));
    }

    #[test]
    fn test_single_frame_is_malformed() {
        let frames = vec![b"hashblock".to_vec()];
        assert_eq!(
            BusMessage::from_frames(&frames),
            Err(BusError::Malformed(1))
        );
    }

    #[test]
    fn test_frames_roundtrip() {
        let msg = BusMessage {
            topic: topics::HASH_BLOCK.to_string(),
            payload_hex: "00ff".to_string(),
            sequence: Sequence(Some(42)),
        };
        assert_eq!(BusMessage::from_frames(&msg.to_frames()).unwrap(), msg);
    }
}
