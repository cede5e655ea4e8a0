//! The gossip node
//!
//! Accepts peer connections, answers chain requests inline, and funnels
//! every other message through a single-consumer queue so handling stays
//! sequential while accepting stays concurrent. Outbound traffic is
//! connection-per-message with a bounded retry loop per peer.

use crate::core::block::Block;
use crate::core::blockchain::Blockchain;
use crate::core::transaction::Transaction;
use crate::network::message::{Message, MessageCodec};
use crate::network::peer::{PeerError, PeerRegistry, MAX_CONNECTION_RETRIES, RETRY_DELAY};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::codec::Framed;

/// Capacity of the accept-to-handler queue
const MESSAGE_QUEUE_DEPTH: usize = 100;

/// A peer-to-peer gossip node. Cloning is cheap and shares all state.
#[derive(Clone)]
pub struct Node {
    /// Our own listen address, announced to peers
    pub address: String,
    pub engine: Arc<Blockchain>,
    pub registry: Arc<PeerRegistry>,
}

impl Node {
    pub fn new(address: &str, engine: Arc<Blockchain>) -> Self {
        Self {
            address: address.to_string(),
            engine,
            registry: Arc::new(PeerRegistry::new()),
        }
    }

    /// Bind and serve until the process exits
    pub async fn start(&self) -> Result<(), PeerError> {
        let listener = TcpListener::bind(&self.address).await?;
        log::info!("Node listening on {}", self.address);

        let (queue_tx, queue_rx) = mpsc::channel::<Message>(MESSAGE_QUEUE_DEPTH);
        let worker = self.clone();
        tokio::spawn(async move { worker.process_queue(queue_rx).await });

        loop {
            match listener.accept().await {
                Ok((stream, peer_addr)) => {
                    let node = self.clone();
                    let queue = queue_tx.clone();
                    tokio::spawn(async move {
                        let peer = peer_addr.ip().to_string();
                        if let Err(e) = node.handle_connection(stream, &peer, queue).await {
                            log::debug!("Connection from {peer} closed: {e}");
                        }
                    });
                }
                Err(e) => log::error!("Failed to accept connection: {e}"),
            }
        }
    }

    /// Decode one message from the connection. Chain requests are answered
    /// on the same connection; everything else goes to the handler queue.
    async fn handle_connection(
        &self,
        stream: TcpStream,
        peer: &str,
        queue: mpsc::Sender<Message>,
    ) -> Result<(), PeerError> {
        let mut framed = Framed::new(stream, MessageCodec);

        let msg = framed.next().await.ok_or(PeerError::Closed)??;
        if let Err(e) = self.registry.check_rate(peer) {
            log::warn!("Rate limit exceeded for peer {peer}");
            return Err(e);
        }
        log::debug!("Received {} from {peer}", msg.type_name());

        match msg {
            Message::RequestChain => {
                let blocks = self.engine.blocks();
                framed.send(Message::ResponseChain(blocks)).await?;
            }
            other => {
                queue.send(other).await.map_err(|_| PeerError::Closed)?;
            }
        }
        Ok(())
    }

    /// Sequential handler for queued messages
    async fn process_queue(&self, mut queue: mpsc::Receiver<Message>) {
        while let Some(msg) = queue.recv().await {
            self.handle_message(msg).await;
        }
    }

    async fn handle_message(&self, msg: Message) {
        match msg {
            Message::NewBlock(block) => self.handle_new_block(block).await,
            Message::Transaction(tx) => self.handle_transaction(tx).await,
            Message::ResponseChain(blocks) => {
                self.engine.replace_chain(blocks);
            }
            Message::NewPeer(address) => self.handle_new_peer(address),
            // Answered inline by the connection handler
            Message::RequestChain => {}
        }
    }

    /// Validate an announced block against our tip; append and rebroadcast
    /// on success, drop silently otherwise
    async fn handle_new_block(&self, block: Block) {
        let index = block.index;
        if self.engine.accept_block(block.clone()) {
            log::info!("Accepted block {index} from the network");
            self.broadcast(Message::NewBlock(block));
        } else {
            log::debug!("Dropped invalid block {index} from the network");
        }
    }

    /// Admit an announced transaction; rebroadcast on success
    async fn handle_transaction(&self, tx: Transaction) {
        match self.engine.submit_transaction(tx.clone()) {
            Ok(()) => self.broadcast(Message::Transaction(tx)),
            Err(e) => log::debug!("Rejected transaction from the network: {e}"),
        }
    }

    /// Record an unknown peer and dial it back asynchronously
    fn handle_new_peer(&self, address: String) {
        if address == self.address || !self.registry.insert(&address) {
            return;
        }
        log::info!("Discovered peer {address}");
        let node = self.clone();
        tokio::spawn(async move { node.connect_to_peer(&address).await });
    }

    /// Dial a peer and announce ourselves, retrying with a fixed delay
    pub async fn connect_to_peer(&self, address: &str) {
        for attempt in 1..=MAX_CONNECTION_RETRIES {
            match TcpStream::connect(address).await {
                Ok(stream) => {
                    let mut framed = Framed::new(stream, MessageCodec);
                    match framed.send(Message::NewPeer(self.address.clone())).await {
                        Ok(()) => {
                            self.registry.insert(address);
                            return;
                        }
                        Err(e) => {
                            log::warn!("Failed to greet peer {address}: {e}");
                        }
                    }
                }
                Err(e) => log::warn!(
                    "Failed to connect to peer {address} (attempt {attempt}/{MAX_CONNECTION_RETRIES}): {e}"
                ),
            }
            tokio::time::sleep(RETRY_DELAY).await;
        }
    }

    /// Dial every bootstrap peer except ourselves
    pub fn discover_peers(&self, peers: &[String]) {
        for peer in peers {
            if peer != &self.address && !peer.is_empty() {
                let node = self.clone();
                let peer = peer.clone();
                tokio::spawn(async move { node.connect_to_peer(&peer).await });
            }
        }
    }

    /// Fan a message out to every known peer. Each peer gets its own task
    /// and retry loop, so a slow peer never blocks the handler.
    pub fn broadcast(&self, msg: Message) {
        for peer in self.registry.peers() {
            let msg = msg.clone();
            tokio::spawn(async move { send_with_retries(&peer, msg).await });
        }
    }

    /// Ask a peer for its chain and adopt it when it is strictly longer
    /// and valid
    pub async fn request_chain(&self, peer: &str) -> Result<bool, PeerError> {
        let stream = TcpStream::connect(peer)
            .await
            .map_err(|e| PeerError::ConnectionFailed(e.to_string()))?;
        let mut framed = Framed::new(stream, MessageCodec);

        framed.send(Message::RequestChain).await?;
        match framed.next().await.ok_or(PeerError::Closed)?? {
            Message::ResponseChain(blocks) => Ok(self.engine.replace_chain(blocks)),
            other => {
                log::warn!("Unexpected {} in reply to RequestChain", other.type_name());
                Ok(false)
            }
        }
    }
}

/// One-shot delivery with a bounded retry loop. Permanent failure only
/// skips the peer for this call; it stays in the known set.
async fn send_with_retries(peer: &str, msg: Message) {
    for attempt in 1..=MAX_CONNECTION_RETRIES {
        match TcpStream::connect(peer).await {
            Ok(stream) => {
                let mut framed = Framed::new(stream, MessageCodec);
                if framed.send(msg.clone()).await.is_ok() {
                    return;
                }
            }
            Err(e) => {
                log::debug!("Broadcast to {peer} failed (attempt {attempt}): {e}");
            }
        }
        tokio::time::sleep(RETRY_DELAY).await;
    }
    log::warn!("Giving up broadcast to {peer} after {MAX_CONNECTION_RETRIES} attempts");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mining::pow::ProofOfWork;
    use std::time::Duration;

    fn started_node(port: u16, engine: Arc<Blockchain>) -> Node {
        let node = Node::new(&format!("127.0.0.1:{port}"), engine);
        let server = node.clone();
        tokio::spawn(async move { server.start().await });
        node
    }

    fn mine_next(engine: &Blockchain) -> Block {
        let tip = engine.latest_block();
        let mut block = Block::new(
            vec![Transaction::reward("remote-miner", 50, tip.index + 1)],
            &tip.hash,
            1,
        );
        block.index = tip.index + 1;
        let (nonce, hash) = ProofOfWork::new(&block).run().unwrap();
        block.nonce = nonce;
        block.hash = hash;
        block
    }

    #[tokio::test]
    async fn test_request_chain_served_inline() {
        let engine = Arc::new(Blockchain::new());
        engine.set_miner_address("miner");
        engine.append_pow(vec![]).unwrap();

        let node = started_node(19_701, engine.clone());
        tokio::time::sleep(Duration::from_millis(100)).await;

        let stream = TcpStream::connect(&node.address).await.unwrap();
        let mut framed = Framed::new(stream, MessageCodec);
        framed.send(Message::RequestChain).await.unwrap();

        match framed.next().await.unwrap().unwrap() {
            Message::ResponseChain(blocks) => assert_eq!(blocks.len(), 2),
            other => panic!("unexpected {}", other.type_name()),
        }
    }

    #[tokio::test]
    async fn test_new_block_appended() {
        let engine = Arc::new(Blockchain::new());
        let node = started_node(19_702, engine.clone());
        tokio::time::sleep(Duration::from_millis(100)).await;

        let block = mine_next(&engine);
        let stream = TcpStream::connect(&node.address).await.unwrap();
        let mut framed = Framed::new(stream, MessageCodec);
        framed.send(Message::NewBlock(block)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(engine.height(), 1);
        assert_eq!(engine.utxos.balance("remote-miner"), 50);
    }

    #[tokio::test]
    async fn test_invalid_block_dropped_silently() {
        let engine = Arc::new(Blockchain::new());
        let node = started_node(19_703, engine.clone());
        tokio::time::sleep(Duration::from_millis(100)).await;

        let mut block = mine_next(&engine);
        block.previous_hash = "bogus".to_string();

        let stream = TcpStream::connect(&node.address).await.unwrap();
        let mut framed = Framed::new(stream, MessageCodec);
        framed.send(Message::NewBlock(block)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(engine.height(), 0);
    }

    #[tokio::test]
    async fn test_new_peer_recorded() {
        let engine = Arc::new(Blockchain::new());
        let node = started_node(19_704, engine);
        tokio::time::sleep(Duration::from_millis(100)).await;

        let stream = TcpStream::connect(&node.address).await.unwrap();
        let mut framed = Framed::new(stream, MessageCodec);
        framed
            .send(Message::NewPeer("127.0.0.1:1".to_string()))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(node.registry.contains("127.0.0.1:1"));
    }

    #[tokio::test]
    async fn test_chain_sync_between_nodes() {
        let engine_a = Arc::new(Blockchain::new());
        engine_a.set_miner_address("miner-a");
        let engine_b = Arc::new(Blockchain::new());
        engine_b.set_miner_address("miner-b");
        for _ in 0..3 {
            engine_b.append_pow(vec![]).unwrap();
        }

        let _node_b = started_node(19_705, engine_b.clone());
        tokio::time::sleep(Duration::from_millis(100)).await;

        let node_a = Node::new("127.0.0.1:19706", engine_a.clone());
        let replaced = node_a.request_chain("127.0.0.1:19705").await.unwrap();

        assert!(replaced);
        assert_eq!(engine_a.height(), 3);
        assert_eq!(engine_a.utxos.balance("miner-b"), 150);
    }
}
