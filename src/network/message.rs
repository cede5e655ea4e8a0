//! Gossip message types and wire framing
//!
//! Every message travels as a JSON envelope `{ "type": int, "payload":
//! bytes }`; the payload is itself JSON, interpreted per type. Frames on
//! the wire are length-prefixed behind four magic bytes.

use crate::core::block::Block;
use crate::core::transaction::Transaction;
use bytes::{Buf, BufMut, BytesMut};
use serde::{Deserialize, Serialize};
use tokio_util::codec::{Decoder, Encoder};

/// Magic bytes for message framing
pub const MAGIC: [u8; 4] = [0x4E, 0x41, 0x4E, 0x4F]; // "NANO"

/// Upper bound on a single frame, matching the maximum block size with
/// headroom for encoding overhead
pub const MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;

/// Gossip messages exchanged between peers
#[derive(Debug, Clone)]
pub enum Message {
    /// Announce a newly produced block
    NewBlock(Block),
    /// Announce a transaction
    Transaction(Transaction),
    /// Ask a peer for its whole chain
    RequestChain,
    /// Full chain snapshot, sent in reply to `RequestChain`
    ResponseChain(Vec<Block>),
    /// Introduce a peer address
    NewPeer(String),
}

/// On-the-wire representation
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: u8,
    payload: Vec<u8>,
}

const KIND_NEW_BLOCK: u8 = 0;
const KIND_TRANSACTION: u8 = 1;
const KIND_REQUEST_CHAIN: u8 = 2;
const KIND_RESPONSE_CHAIN: u8 = 3;
const KIND_NEW_PEER: u8 = 4;

impl Message {
    /// Serialize to the JSON envelope
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        let envelope = match self {
            Message::NewBlock(block) => Envelope {
                kind: KIND_NEW_BLOCK,
                payload: serde_json::to_vec(block)?,
            },
            Message::Transaction(tx) => Envelope {
                kind: KIND_TRANSACTION,
                payload: serde_json::to_vec(tx)?,
            },
            Message::RequestChain => Envelope {
                kind: KIND_REQUEST_CHAIN,
                payload: Vec::new(),
            },
            Message::ResponseChain(blocks) => Envelope {
                kind: KIND_RESPONSE_CHAIN,
                payload: serde_json::to_vec(blocks)?,
            },
            Message::NewPeer(address) => Envelope {
                kind: KIND_NEW_PEER,
                payload: serde_json::to_vec(address)?,
            },
        };
        serde_json::to_vec(&envelope)
    }

    /// Deserialize from the JSON envelope
    pub fn from_bytes(data: &[u8]) -> Result<Self, serde_json::Error> {
        let envelope: Envelope = serde_json::from_slice(data)?;
        match envelope.kind {
            KIND_NEW_BLOCK => Ok(Message::NewBlock(serde_json::from_slice(&envelope.payload)?)),
            KIND_TRANSACTION => Ok(Message::Transaction(serde_json::from_slice(
                &envelope.payload,
            )?)),
            KIND_REQUEST_CHAIN => Ok(Message::RequestChain),
            KIND_RESPONSE_CHAIN => Ok(Message::ResponseChain(serde_json::from_slice(
                &envelope.payload,
            )?)),
            KIND_NEW_PEER => Ok(Message::NewPeer(serde_json::from_slice(&envelope.payload)?)),
            other => Err(serde::de::Error::custom(format!(
                "unknown message type {other}"
            ))),
        }
    }

    /// Message type name for logging
    pub fn type_name(&self) -> &'static str {
        match self {
            Message::NewBlock(_) => "NewBlock",
            Message::Transaction(_) => "Transaction",
            Message::RequestChain => "RequestChain",
            Message::ResponseChain(_) => "ResponseChain",
            Message::NewPeer(_) => "NewPeer",
        }
    }
}

/// Length-prefixed codec: magic (4) + length (4) + JSON envelope
pub struct MessageCodec;

impl Encoder<Message> for MessageCodec {
    type Error = std::io::Error;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let data = item
            .to_bytes()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;

        dst.reserve(8 + data.len());
        dst.put_slice(&MAGIC);
        dst.put_u32(data.len() as u32);
        dst.put_slice(&data);
        Ok(())
    }
}

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < 8 {
            return Ok(None);
        }

        if src[..4] != MAGIC {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "invalid magic bytes",
            ));
        }

        let len = u32::from_be_bytes([src[4], src[5], src[6], src[7]]) as usize;
        if len > MAX_FRAME_BYTES {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "frame exceeds maximum size",
            ));
        }
        if src.len() < 8 + len {
            return Ok(None);
        }

        src.advance(8);
        let data = src.split_to(len);

        let msg = Message::from_bytes(&data)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        Ok(Some(msg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_roundtrip() {
        let msg = Message::NewPeer("127.0.0.1:9000".to_string());
        let bytes = msg.to_bytes().unwrap();
        match Message::from_bytes(&bytes).unwrap() {
            Message::NewPeer(addr) => assert_eq!(addr, "127.0.0.1:9000"),
            other => panic!("wrong message type: {}", other.type_name()),
        }
    }

    #[test]
    fn test_request_chain_has_empty_payload() {
        let bytes = Message::RequestChain.to_bytes().unwrap();
        assert!(matches!(
            Message::from_bytes(&bytes).unwrap(),
            Message::RequestChain
        ));
    }

    #[test]
    fn test_unknown_type_rejected() {
        let raw = serde_json::to_vec(&serde_json::json!({"type": 99, "payload": []})).unwrap();
        assert!(Message::from_bytes(&raw).is_err());
    }

    #[test]
    fn test_codec_roundtrip() {
        let mut codec = MessageCodec;
        let block = Block::genesis();
        let mut buf = BytesMut::new();

        codec.encode(Message::NewBlock(block.clone()), &mut buf).unwrap();
        match codec.decode(&mut buf).unwrap().unwrap() {
            Message::NewBlock(decoded) => assert_eq!(decoded.hash, block.hash),
            other => panic!("wrong message type: {}", other.type_name()),
        }
        assert!(buf.is_empty());
    }

    #[test]
    fn test_codec_rejects_bad_magic() {
        let mut codec = MessageCodec;
        let mut buf = BytesMut::from(&b"XXXX\x00\x00\x00\x00"[..]);
        assert!(codec.decode(&mut buf).is_err());
    }

    #[test]
    fn test_codec_waits_for_full_frame() {
        let mut codec = MessageCodec;
        let mut full = BytesMut::new();
        codec.encode(Message::RequestChain, &mut full).unwrap();

        let mut partial = BytesMut::from(&full[..full.len() - 2]);
        assert!(codec.decode(&mut partial).unwrap().is_none());
    }
}
