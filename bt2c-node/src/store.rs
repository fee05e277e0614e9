use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use bt2c_core::{Address, Amount, Block, CoreError, Hash, Store, Transaction, UnstakeRequest, Validator};

/// In-memory [`Store`] backing the reference node. The teacher's storage
/// crate talks to Postgres; this node keeps everything resident, matching
/// the spec's non-goal on persistence durability across restarts.
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<State>,
}

#[derive(Default)]
struct State {
    blocks_by_hash: HashMap<Hash, Block>,
    blocks_by_height: HashMap<u64, Hash>,
    chain_head: Option<Hash>,
    transactions: HashMap<Hash, Transaction>,
    validators: HashMap<Address, Validator>,
    unstake_requests: HashMap<Address, Vec<UnstakeRequest>>,
    balances: HashMap<Address, Amount>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn get_block(&self, hash: &Hash) -> Result<Option<Block>, CoreError> {
        Ok(self.inner.read().blocks_by_hash.get(hash).cloned())
    }

    async fn put_block(&self, block: &Block) -> Result<(), CoreError> {
        let mut state = self.inner.write();
        let hash = block.hash();
        state.blocks_by_height.insert(block.header.height, hash);
        state.blocks_by_hash.insert(hash, block.clone());
        Ok(())
    }

    async fn get_block_by_height(&self, height: u64) -> Result<Option<Block>, CoreError> {
        let state = self.inner.read();
        Ok(state
            .blocks_by_height
            .get(&height)
            .and_then(|hash| state.blocks_by_hash.get(hash))
            .cloned())
    }

    async fn chain_head(&self) -> Result<Option<Hash>, CoreError> {
        Ok(self.inner.read().chain_head)
    }

    async fn set_chain_head(&self, hash: Hash) -> Result<(), CoreError> {
        self.inner.write().chain_head = Some(hash);
        Ok(())
    }

    async fn get_transaction(&self, hash: &Hash) -> Result<Option<Transaction>, CoreError> {
        Ok(self.inner.read().transactions.get(hash).cloned())
    }

    async fn put_transactions(&self, transactions: &[Transaction]) -> Result<(), CoreError> {
        let mut state = self.inner.write();
        for tx in transactions {
            state.transactions.insert(tx.hash(), tx.clone());
        }
        Ok(())
    }

    async fn get_validator(&self, address: &Address) -> Result<Option<Validator>, CoreError> {
        Ok(self.inner.read().validators.get(address).cloned())
    }

    async fn put_validator(&self, validator: &Validator) -> Result<(), CoreError> {
        self.inner
            .write()
            .validators
            .insert(validator.address.clone(), validator.clone());
        Ok(())
    }

    async fn all_validators(&self) -> Result<Vec<Validator>, CoreError> {
        Ok(self.inner.read().validators.values().cloned().collect())
    }

    async fn get_unstake_requests(&self, validator: &Address) -> Result<Vec<UnstakeRequest>, CoreError> {
        Ok(self
            .inner
            .read()
            .unstake_requests
            .get(validator)
            .cloned()
            .unwrap_or_default())
    }

    async fn put_unstake_request(&self, request: &UnstakeRequest) -> Result<(), CoreError> {
        self.inner
            .write()
            .unstake_requests
            .entry(request.validator.clone())
            .or_default()
            .push(request.clone());
        Ok(())
    }

    async fn get_balance(&self, address: &Address) -> Result<Amount, CoreError> {
        Ok(self
            .inner
            .read()
            .balances
            .get(address)
            .copied()
            .unwrap_or(Amount::ZERO))
    }

    async fn set_balance(&self, address: &Address, amount: Amount) -> Result<(), CoreError> {
        self.inner.write().balances.insert(address.clone(), amount);
        Ok(())
    }
}
