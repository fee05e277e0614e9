use async_trait::async_trait;
use tokio::sync::broadcast;

use bt2c_core::{CoreError, Message, Transport};

/// In-process loopback [`Transport`]. The teacher's network crate speaks
/// libp2p gossipsub over a real swarm; a single demo node has no peers to
/// gossip with, so this broadcasts on a channel any number of local
/// subscribers (tests, a future multi-node harness) can tap.
pub struct LoopbackTransport {
    sender: broadcast::Sender<Message>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1024);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.sender.subscribe()
    }
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn broadcast(&self, message: Message) -> Result<(), CoreError> {
        // No subscribers is not an error: a lone node with nothing
        // listening yet still produces blocks.
        let _ = self.sender.send(message);
        Ok(())
    }

    async fn recv(&self) -> Result<Message, CoreError> {
        let mut receiver = self.sender.subscribe();
        receiver
            .recv()
            .await
            .map_err(|e| CoreError::Transport(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bt2c_core::{Address, Amount, Transaction, TransactionPayload};
    use std::str::FromStr;

    fn tx() -> Transaction {
        Transaction {
            sender: Address::parse("bt2c_aaaaaaaaaaaaaaaaaaaaaaaaaa").unwrap(),
            recipient: Address::parse("bt2c_bbbbbbbbbbbbbbbbbbbbbbbbbb").unwrap(),
            amount: Amount::from_str("1").unwrap(),
            fee: Amount::from_str("0.01").unwrap(),
            nonce: 0,
            timestamp: 0,
            payload: TransactionPayload::Transfer,
            signature: Vec::new(),
        }
    }

    #[tokio::test]
    async fn broadcast_reaches_a_subscriber() {
        let transport = LoopbackTransport::new();
        let mut subscriber = transport.subscribe();
        transport
            .broadcast(Message::NewTransaction(tx()))
            .await
            .unwrap();
        let received = subscriber.recv().await.unwrap();
        assert!(matches!(received, Message::NewTransaction(_)));
    }

    #[tokio::test]
    async fn broadcast_with_no_subscribers_does_not_error() {
        let transport = LoopbackTransport::new();
        transport
            .broadcast(Message::NewTransaction(tx()))
            .await
            .unwrap();
    }
}
