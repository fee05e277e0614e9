use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::amount::Amount;
use crate::block::Block;
use crate::error::CoreError;
use crate::hash::Hash;
use crate::transaction::Transaction;
use crate::validator::{UnstakeRequest, Validator};

/// Signing and verification, generalized from the key-management surface a
/// concrete crypto backend provides. A node depends on this trait, not on
/// any particular signature scheme, so the algorithm can be swapped (or
/// mocked in tests) without touching consensus or chain code.
#[async_trait]
pub trait CryptoProvider: Send + Sync {
    /// Derive the canonical address owning this DER-encoded public key.
    fn address_from_public_key(&self, public_key_der: &[u8]) -> Address;

    async fn sign(&self, private_key_der: &[u8], message: &[u8]) -> Result<Vec<u8>, CoreError>;

    async fn verify(
        &self,
        public_key_der: &[u8],
        message: &[u8],
        signature: &[u8],
    ) -> Result<bool, CoreError>;
}

/// Durable storage for chain state. Concrete backends (in-memory, on-disk,
/// a database) implement this; consensus and chain logic only ever see the
/// trait object. Named collections mirror the spec's persistence surface:
/// `blocks`, `transactions`, `validators`, `unstake_requests`.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_block(&self, hash: &Hash) -> Result<Option<Block>, CoreError>;
    async fn put_block(&self, block: &Block) -> Result<(), CoreError>;
    async fn get_block_by_height(&self, height: u64) -> Result<Option<Block>, CoreError>;
    async fn chain_head(&self) -> Result<Option<Hash>, CoreError>;
    async fn set_chain_head(&self, hash: Hash) -> Result<(), CoreError>;

    async fn get_transaction(&self, hash: &Hash) -> Result<Option<Transaction>, CoreError>;
    /// Atomically persists every transaction in `transactions` (e.g. a
    /// freshly appended block's contents).
    async fn put_transactions(&self, transactions: &[Transaction]) -> Result<(), CoreError>;

    async fn get_validator(&self, address: &Address) -> Result<Option<Validator>, CoreError>;
    async fn put_validator(&self, validator: &Validator) -> Result<(), CoreError>;
    async fn all_validators(&self) -> Result<Vec<Validator>, CoreError>;

    async fn get_unstake_requests(&self, validator: &Address) -> Result<Vec<UnstakeRequest>, CoreError>;
    async fn put_unstake_request(&self, request: &UnstakeRequest) -> Result<(), CoreError>;

    async fn get_balance(&self, address: &Address) -> Result<Amount, CoreError>;
    async fn set_balance(&self, address: &Address, amount: Amount) -> Result<(), CoreError>;
}

/// Gossip message exchanged between nodes. Generalized from the concrete
/// libp2p wire messages into a transport-agnostic shape; mirrors the
/// spec's `NEW_TX` / `NEW_BLOCK` / `REQUEST_BLOCKS` / `BLOCKS_RESPONSE`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Message {
    NewTransaction(Transaction),
    NewBlock(Block),
    RequestBlocks { from_height: u64, to_height: u64 },
    BlocksResponse(Vec<Block>),
    ValidatorAnnouncement(Validator),
}

/// Peer-to-peer message exchange. Concrete backends (libp2p, an in-memory
/// channel bus for tests) implement this.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn broadcast(&self, message: Message) -> Result<(), CoreError>;
    async fn recv(&self) -> Result<Message, CoreError>;
}
