use std::collections::HashMap;

use parking_lot::RwLock;

use bt2c_core::{Address, Amount, Block, CryptoProvider, Hash, Transaction, TransactionType, ZERO_HASH};
use bt2c_mempool::Mempool;

use crate::error::ChainError;

fn credits_recipient(kind: TransactionType) -> bool {
    matches!(kind, TransactionType::Transfer | TransactionType::Reward)
}

struct State {
    blocks: HashMap<Hash, Block>,
    height_index: HashMap<u64, Hash>,
    tx_index: HashMap<Hash, (Hash, u64)>,
    tip: Hash,
    tip_height: u64,
    tip_timestamp: u64,
    balances: HashMap<Address, Amount>,
    nonces: HashMap<Address, u64>,
}

/// Owns the canonical chain: block storage, account balances, and nonces.
/// Validates and applies one block at a time; fork *choice* lives in
/// [`crate::fork`], fork *application* (replaying an alternate chain) lives
/// in [`ChainManager::reorg_to`].
pub struct ChainManager {
    state: RwLock<State>,
}

impl ChainManager {
    /// Initializes the chain from a genesis block. The genesis block's
    /// transactions (typically a single developer-allocation reward) are
    /// applied to seed initial balances.
    pub fn from_genesis(genesis: Block) -> Result<Self, ChainError> {
        if !genesis.has_valid_merkle_root() {
            return Err(ChainError::BadMerkleRoot);
        }
        if genesis.header.height != 0 || genesis.header.previous_hash != ZERO_HASH {
            return Err(ChainError::WrongHeight {
                expected: 0,
                got: genesis.header.height,
            });
        }

        let mut balances = HashMap::new();
        let mut nonces = HashMap::new();
        for tx in &genesis.transactions {
            if credits_recipient(tx.kind()) {
                let entry = balances.entry(tx.recipient.clone()).or_insert(Amount::ZERO);
                *entry = entry.checked_add(tx.amount).unwrap_or(*entry);
            }
            if !tx.skips_signature() {
                nonces.insert(tx.sender.clone(), tx.nonce);
            }
        }

        let hash = genesis.hash();
        let timestamp = genesis.header.timestamp;
        let mut height_index = HashMap::new();
        height_index.insert(0, hash);
        let mut tx_index = HashMap::new();
        for tx in &genesis.transactions {
            tx_index.insert(tx.hash(), (hash, 0));
        }
        let mut blocks = HashMap::new();
        blocks.insert(hash, genesis);

        Ok(Self {
            state: RwLock::new(State {
                blocks,
                height_index,
                tx_index,
                tip: hash,
                tip_height: 0,
                tip_timestamp: timestamp,
                balances,
                nonces,
            }),
        })
    }

    pub fn tip_hash(&self) -> Hash {
        self.state.read().tip
    }

    pub fn tip_height(&self) -> u64 {
        self.state.read().tip_height
    }

    pub fn balance(&self, address: &Address) -> Amount {
        self.state.read().balances.get(address).copied().unwrap_or(Amount::ZERO)
    }

    pub fn nonce(&self, address: &Address) -> u64 {
        self.state.read().nonces.get(address).copied().unwrap_or(0)
    }

    /// Credits `address`'s spendable balance outside the normal
    /// transaction flow. Used for protocol-level payouts that don't have
    /// a signed sender — a matured exit-queue withdrawal moving stake
    /// back into the validator's spendable balance.
    pub fn credit(&self, address: &Address, amount: Amount) {
        let mut state = self.state.write();
        let entry = state.balances.entry(address.clone()).or_insert(Amount::ZERO);
        *entry = entry.checked_add(amount).unwrap_or(*entry);
    }

    /// Moves part of `from`'s spendable balance to `to` outside the normal
    /// transaction flow. Used to redistribute a block proposer's
    /// just-credited subsidy+fees to its delegators per the commission
    /// split, since `append_block` always credits the full amount to the
    /// proposer address.
    pub fn redistribute(&self, from: &Address, to: &Address, amount: Amount) {
        let mut state = self.state.write();
        if let Some(balance) = state.balances.get_mut(from) {
            *balance = balance.saturating_sub(amount);
        }
        let entry = state.balances.entry(to.clone()).or_insert(Amount::ZERO);
        *entry = entry.checked_add(amount).unwrap_or(*entry);
    }

    pub fn get_block(&self, hash: &Hash) -> Option<Block> {
        self.state.read().blocks.get(hash).cloned()
    }

    pub fn get_block_by_height(&self, height: u64) -> Option<Block> {
        let state = self.state.read();
        let hash = state.height_index.get(&height)?;
        state.blocks.get(hash).cloned()
    }

    /// Looks up a confirmed transaction and how many confirmations (blocks
    /// including its own) it has accrued.
    pub fn get_transaction_with_finality(&self, hash: &Hash) -> Option<(Transaction, u64)> {
        let state = self.state.read();
        let (block_hash, height) = state.tx_index.get(hash)?;
        let block = state.blocks.get(block_hash)?;
        let tx = block.transactions.iter().find(|t| &t.hash() == hash)?.clone();
        Some((tx, state.tip_height - height + 1))
    }

    /// Validates and applies `block` to the tip. `public_keys` resolves
    /// the DER public key for every address with a non-coinbase
    /// transaction in the block (including the proposer), since addresses
    /// alone don't carry enough information to verify a signature.
    /// `expected_subsidy` is the protocol block subsidy for this height
    /// (the caller computes it via `RewardEngine::block_subsidy`, since
    /// this crate has no reward-schedule concerns of its own) — the
    /// coinbase's `amount` must equal it exactly, regardless of the fees
    /// it additionally collects, which enforces the global supply cap.
    pub async fn append_block(
        &self,
        block: Block,
        public_keys: &HashMap<Address, Vec<u8>>,
        crypto: &dyn CryptoProvider,
        now: u64,
        expected_subsidy: Amount,
    ) -> Result<Vec<Hash>, ChainError> {
        {
            let state = self.state.read();
            if block.header.height != state.tip_height + 1 {
                return Err(ChainError::WrongHeight {
                    expected: state.tip_height + 1,
                    got: block.header.height,
                });
            }
            if block.header.previous_hash != state.tip {
                return Err(ChainError::WrongParent);
            }
            if block.header.timestamp <= state.tip_timestamp {
                return Err(ChainError::NonMonotonicTimestamp);
            }
        }
        if !block.has_valid_merkle_root() {
            return Err(ChainError::BadMerkleRoot);
        }

        let validator_key = public_keys
            .get(&block.header.validator)
            .ok_or(ChainError::BadBlockSignature)?;
        let header_hash = block.header.hash();
        if !crypto.verify(validator_key, &header_hash, &block.signature).await? {
            return Err(ChainError::BadBlockSignature);
        }

        match block.transactions.first() {
            Some(tx) if tx.kind() == TransactionType::Reward && tx.sender.is_reserved() => {
                if tx.amount.units() != expected_subsidy.units() {
                    return Err(ChainError::WrongCoinbaseAmount {
                        expected: expected_subsidy.to_string(),
                        got: tx.amount.to_string(),
                    });
                }
            }
            _ => return Err(ChainError::MissingCoinbase),
        }

        // Validate every transaction against a snapshot before mutating
        // anything, so a rejected block leaves no partial state change.
        let mut pending_balances: HashMap<Address, Amount> = HashMap::new();
        let mut pending_nonces: HashMap<Address, u64> = HashMap::new();
        let mut fees_collected = Amount::ZERO;

        {
            let state = self.state.read();
            for (i, tx) in block.transactions.iter().enumerate() {
                if !tx.is_timestamp_valid(now) {
                    return Err(ChainError::TransactionRejected(
                        hex::encode(tx.hash()),
                        bt2c_mempool::RejectReason::InvalidTimestamp,
                    ));
                }

                let is_coinbase = i == 0;
                if !tx.skips_signature() {
                    let key = public_keys
                        .get(&tx.sender)
                        .ok_or(ChainError::BadTransactionSignature)?;
                    if !crypto.verify(key, &tx.signing_bytes(), &tx.signature).await? {
                        return Err(ChainError::BadTransactionSignature);
                    }

                    let last_seen = pending_nonces
                        .get(&tx.sender)
                        .copied()
                        .unwrap_or_else(|| state.nonces.get(&tx.sender).copied().unwrap_or(0));
                    // Strictly contiguous, not merely increasing: a gap
                    // would violate the "included (sender, nonce) pairs are
                    // 1, 2, 3, ... with no gaps" invariant.
                    if tx.nonce != last_seen + 1 {
                        return Err(ChainError::TransactionRejected(
                            hex::encode(tx.hash()),
                            bt2c_mempool::RejectReason::InvalidNonce {
                                last_seen,
                                got: tx.nonce,
                            },
                        ));
                    }
                    pending_nonces.insert(tx.sender.clone(), tx.nonce);

                    let required = tx
                        .amount
                        .checked_add(tx.fee)
                        .map_err(|_| bt2c_core::CoreError::Crypto("amount overflow".into()))?;
                    let available = pending_balances
                        .get(&tx.sender)
                        .copied()
                        .unwrap_or_else(|| state.balances.get(&tx.sender).copied().unwrap_or(Amount::ZERO));
                    if available.units() < required.units() {
                        return Err(ChainError::TransactionRejected(
                            hex::encode(tx.hash()),
                            bt2c_mempool::RejectReason::InsufficientBalance,
                        ));
                    }
                    pending_balances.insert(tx.sender.clone(), available.checked_sub(required).unwrap_or(Amount::ZERO));
                    if !is_coinbase {
                        fees_collected = fees_collected.checked_add(tx.fee).unwrap_or(fees_collected);
                    }
                }

                if credits_recipient(tx.kind()) {
                    let current = pending_balances
                        .get(&tx.recipient)
                        .copied()
                        .unwrap_or_else(|| state.balances.get(&tx.recipient).copied().unwrap_or(Amount::ZERO));
                    pending_balances.insert(tx.recipient.clone(), current.checked_add(tx.amount).unwrap_or(current));
                }
            }
        }

        // Apply.
        let mut state = self.state.write();
        for (address, balance) in pending_balances {
            state.balances.insert(address, balance);
        }
        for (address, nonce) in pending_nonces {
            state.nonces.insert(address, nonce);
        }
        if !fees_collected.is_zero() {
            let entry = state
                .balances
                .entry(block.header.validator.clone())
                .or_insert(Amount::ZERO);
            *entry = entry.checked_add(fees_collected).unwrap_or(*entry);
        }

        let hash = block.hash();
        let height = block.header.height;
        let timestamp = block.header.timestamp;
        let included: Vec<Hash> = block.transactions.iter().map(Transaction::hash).collect();
        for tx_hash in &included {
            state.tx_index.insert(*tx_hash, (hash, height));
        }
        state.height_index.insert(height, hash);
        state.blocks.insert(hash, block);
        state.tip = hash;
        state.tip_height = height;
        state.tip_timestamp = timestamp;

        tracing::info!(height, %fees_collected, "appended block");
        Ok(included)
    }

    /// Rolls the canonical chain back to `height`, discarding every block
    /// above it from the index and recomputing balances and nonces from
    /// scratch by replaying the retained genesis-through-`height` blocks.
    /// The discarded blocks' transactions are not requeued here — call
    /// [`Self::orphaned_since`] (with the pre-rollback tip height) first if
    /// the caller wants them back in the mempool.
    pub fn rollback_to(&self, height: u64) -> Result<(), ChainError> {
        let mut state = self.state.write();
        if height > state.tip_height {
            return Err(ChainError::WrongHeight {
                expected: state.tip_height,
                got: height,
            });
        }
        for h in (height + 1)..=state.tip_height {
            if let Some(hash) = state.height_index.remove(&h) {
                if let Some(block) = state.blocks.remove(&hash) {
                    for tx in &block.transactions {
                        state.tx_index.remove(&tx.hash());
                    }
                }
            }
        }

        let mut balances: HashMap<Address, Amount> = HashMap::new();
        let mut nonces: HashMap<Address, u64> = HashMap::new();
        for h in 0..=height {
            let hash = state
                .height_index
                .get(&h)
                .copied()
                .ok_or(ChainError::RollbackTargetMissing(height))?;
            let block = state
                .blocks
                .get(&hash)
                .cloned()
                .ok_or(ChainError::RollbackTargetMissing(height))?;
            let mut fees = Amount::ZERO;
            for (i, tx) in block.transactions.iter().enumerate() {
                if credits_recipient(tx.kind()) {
                    let entry = balances.entry(tx.recipient.clone()).or_insert(Amount::ZERO);
                    *entry = entry.checked_add(tx.amount).unwrap_or(*entry);
                }
                if !tx.skips_signature() {
                    nonces.insert(tx.sender.clone(), tx.nonce);
                    let debit = tx.amount.checked_add(tx.fee).unwrap_or(tx.amount);
                    let entry = balances.entry(tx.sender.clone()).or_insert(Amount::ZERO);
                    *entry = entry.saturating_sub(debit);
                    if i != 0 {
                        fees = fees.checked_add(tx.fee).unwrap_or(fees);
                    }
                }
            }
            if !fees.is_zero() {
                let entry = balances.entry(block.header.validator.clone()).or_insert(Amount::ZERO);
                *entry = entry.checked_add(fees).unwrap_or(*entry);
            }
        }

        let new_tip = state.height_index[&height];
        let new_tip_timestamp = state.blocks[&new_tip].header.timestamp;
        state.balances = balances;
        state.nonces = nonces;
        state.tip = new_tip;
        state.tip_height = height;
        state.tip_timestamp = new_tip_timestamp;
        Ok(())
    }

    /// Reorgs the canonical chain onto a winning fork: rolls back to
    /// `common_ancestor_height` (see [`Self::rollback_to`]), then applies
    /// `new_blocks` in order via [`Self::append_block`]. `subsidies[i]` is
    /// the expected coinbase subsidy for `new_blocks[i]`. The rollback has
    /// already happened if a later block in `new_blocks` fails to apply;
    /// the caller decides whether to retry, fall back to an empty chain at
    /// the ancestor height, or propagate the error.
    pub async fn reorg_to(
        &self,
        common_ancestor_height: u64,
        new_blocks: Vec<Block>,
        public_keys: &HashMap<Address, Vec<u8>>,
        crypto: &dyn CryptoProvider,
        now: u64,
        subsidies: &[Amount],
    ) -> Result<Vec<Hash>, ChainError> {
        self.rollback_to(common_ancestor_height)?;
        let mut included = Vec::new();
        for (block, subsidy) in new_blocks.into_iter().zip(subsidies.iter().copied()) {
            included.extend(
                self.append_block(block, public_keys, crypto, now, subsidy).await?,
            );
        }
        Ok(included)
    }

    /// Returns the transactions contained in blocks above `common_ancestor_height`
    /// on the currently active chain, for requeueing into the mempool
    /// after a reorg discards them.
    pub fn orphaned_since(&self, common_ancestor_height: u64) -> Vec<Transaction> {
        let state = self.state.read();
        let mut orphaned = Vec::new();
        for height in (common_ancestor_height + 1)..=state.tip_height {
            if let Some(hash) = state.height_index.get(&height) {
                if let Some(block) = state.blocks.get(hash) {
                    orphaned.extend(block.transactions.iter().cloned());
                }
            }
        }
        orphaned
    }

    /// Returns orphaned transactions (per [`Self::orphaned_since`]) to the
    /// mempool so they can be re-included in a future block.
    pub fn return_orphaned_to_mempool(&self, common_ancestor_height: u64, mempool: &Mempool, now: u64) {
        for tx in self.orphaned_since(common_ancestor_height) {
            if tx.skips_signature() {
                continue;
            }
            let sender = tx.sender.clone();
            let _ = mempool.add(tx, now, || self.nonce(&sender), || self.balance(&sender));
        }
    }
}
