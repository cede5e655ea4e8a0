//! Peer-to-peer gossip: message types, peer registry and the node

pub mod message;
pub mod node;
pub mod peer;

pub use message::{Message, MessageCodec};
pub use node::Node;
pub use peer::{PeerError, PeerRegistry};
