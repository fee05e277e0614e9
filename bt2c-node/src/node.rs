use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use bt2c_chain::ChainManager;
use bt2c_config::ChainConfig;
use bt2c_consensus::{RewardEngine, SeedInputs, Slasher, ValidatorSelector, ValidatorSet};
use bt2c_core::{
    merkle_root, Address, Amount, Block, BlockHeader, CryptoProvider, Hash, Message, Store,
    Transaction, TransactionPayload, Transport, UnstakeRequest,
};
use bt2c_mempool::Mempool;

use crate::error::NodeError;
use crate::genesis;

/// Wires every consensus primitive into one block-producing node: the
/// mempool transactions flow through, the validator set and selector that
/// decide who proposes, the chain manager that validates and applies what
/// they propose, and the slasher/reward engine that react to the result.
///
/// `public_keys` and `signing_keys` exist only because this crate has no
/// key-storage-at-rest concern of its own (explicitly out of scope) — a
/// real deployment's wallet/HSM integration would own `signing_keys`
/// entirely and hand the node only already-decrypted signatures.
pub struct Node {
    config: ChainConfig,
    crypto: Arc<dyn CryptoProvider>,
    store: Arc<dyn Store>,
    transport: Arc<dyn Transport>,
    chain: ChainManager,
    validator_set: ValidatorSet,
    selector: ValidatorSelector,
    slasher: Slasher,
    mempool: Mempool,
    public_keys: RwLock<HashMap<Address, Vec<u8>>>,
    signing_keys: RwLock<HashMap<Address, Vec<u8>>>,
}

impl Node {
    pub fn new(
        config: ChainConfig,
        crypto: Arc<dyn CryptoProvider>,
        store: Arc<dyn Store>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, NodeError> {
        let chain = ChainManager::from_genesis(genesis::build(&config))?;
        let validator_set = ValidatorSet::new(config.clone(), genesis::timestamp());
        let mempool = Mempool::new(config.mempool_capacity, config.mempool_tx_ttl_secs);
        Ok(Self {
            config,
            crypto,
            store,
            transport,
            chain,
            validator_set,
            selector: ValidatorSelector::new(),
            slasher: Slasher::new(),
            mempool,
            public_keys: RwLock::new(HashMap::new()),
            signing_keys: RwLock::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn tip_height(&self) -> u64 {
        self.chain.tip_height()
    }

    pub fn balance(&self, address: &Address) -> Amount {
        self.chain.balance(address)
    }

    pub fn mempool_len(&self) -> usize {
        self.mempool.len()
    }

    /// Drops mempool entries past their TTL. Returns how many were dropped.
    pub fn prune_mempool(&self, now: u64) -> usize {
        self.mempool.evict_expired(now).len()
    }

    /// Registers a plain (non-validator) account's public key, so its
    /// signed transactions can later be verified at block-append time.
    /// Validator public keys are registered automatically by
    /// [`Self::register_validator`].
    pub fn register_account(&self, address: Address, public_key_der: Vec<u8>) {
        self.public_keys.write().insert(address, public_key_der);
    }

    /// Registers a new validator with the underlying [`ValidatorSet`] and
    /// remembers its public key for signature verification. `signing_key_der`
    /// is only needed for validators this process itself will propose
    /// blocks for.
    pub async fn register_validator(
        &self,
        address: Address,
        public_key_der: Vec<u8>,
        signing_key_der: Option<Vec<u8>>,
        stake: Amount,
        commission_rate: f64,
        joined_at: u64,
    ) -> Result<Amount, NodeError> {
        let bonus = self.validator_set.register(
            address.clone(),
            public_key_der.clone(),
            stake,
            commission_rate,
            joined_at,
        )?;
        self.public_keys.write().insert(address.clone(), public_key_der);
        if let Some(key) = signing_key_der {
            self.signing_keys.write().insert(address.clone(), key);
        }
        if let Some(validator) = self.validator_set.get(&address) {
            self.store.put_validator(&validator).await?;
        }
        Ok(bonus)
    }

    /// Queues an unstake request for `address`, crediting nothing yet — the
    /// funds become spendable once [`Self::process_matured_exits`] observes
    /// the request has matured.
    pub fn request_unstake(
        &self,
        address: &Address,
        amount: Amount,
        current_height: u64,
    ) -> Result<UnstakeRequest, NodeError> {
        Ok(self.validator_set.request_unstake(address, amount, current_height)?)
    }

    /// Validates and admits a transaction into the mempool. The sender's
    /// on-chain nonce and balance are read from `self.chain` lazily, from
    /// inside the mempool's own write-lock critical section, so a second
    /// `submit_transaction` call for the same sender can't interleave
    /// between the check and the insert and admit two transactions against
    /// a balance that only covers one of them.
    pub fn submit_transaction(&self, transaction: Transaction, now: u64) -> Result<Hash, NodeError> {
        let sender = transaction.sender.clone();
        Ok(self.mempool.add(
            transaction,
            now,
            || self.chain.nonce(&sender),
            || self.chain.balance(&sender),
        )?)
    }

    /// Puts transactions drained from the mempool for a block that never
    /// made it onto the chain back into circulation for the next round.
    /// Coinbase/reward transactions never pass through here since only
    /// `selected` (the drained non-coinbase transactions) is ever passed
    /// in; best-effort, a transaction that's since gone stale is simply
    /// dropped rather than failing the caller.
    fn requeue_drained(&self, transactions: Vec<Transaction>, now: u64) {
        for tx in transactions {
            let sender = tx.sender.clone();
            let _ = self
                .mempool
                .add(tx, now, || self.chain.nonce(&sender), || self.chain.balance(&sender));
        }
    }

    /// Moves matured exit-queue requests into spendable balance. Intended
    /// to be called once per block (or on a dedicated schedule) by the
    /// caller driving the node loop.
    pub async fn process_matured_exits(&self, current_height: u64) -> Result<Vec<UnstakeRequest>, NodeError> {
        let matured = self.validator_set.process_exit_queue(current_height, usize::MAX);
        let mut completed = Vec::new();
        for request in &matured {
            self.chain.credit(&request.validator, request.amount);
            if let Some(done) = self.validator_set.complete_next_ready_unstake(&request.validator) {
                self.store.put_unstake_request(&done).await?;
                completed.push(done);
            }
        }
        Ok(completed)
    }

    /// Runs one full round of block production: select a proposer, drain
    /// the mempool, assemble and sign the block, append it to the chain,
    /// then feed the result back into reputation, slashing, and reward
    /// bookkeeping. `response_time_ms` is the caller's measured latency for
    /// this round (e.g. the scheduler's own tick-to-tick timing), folded
    /// into the proposer's reputation metrics.
    pub async fn produce_block(&self, now: u64, timestamp_millis: u64, response_time_ms: f64) -> Result<Block, NodeError> {
        let next_height = self.chain.tip_height() + 1;
        let previous_hash = self.chain.tip_hash();
        let previous_block = self
            .chain
            .get_block_by_height(self.chain.tip_height())
            .ok_or_else(|| NodeError::NothingToPropose("missing tip block".into()))?;

        let eligible = self.validator_set.all_active(next_height);
        let inputs = SeedInputs {
            timestamp_millis,
            previous_hash: &previous_hash,
            previous_height: previous_block.header.height,
            previous_transactions_hash: &previous_block.header.merkle_root,
            previous_validator: &previous_block.header.validator,
        };
        let proposer = self.selector.select(&inputs, now, &eligible)?;

        let signing_key = self
            .signing_keys
            .read()
            .get(&proposer)
            .cloned()
            .ok_or_else(|| NodeError::NoSigningKey(proposer.to_string()))?;

        let selected = self
            .mempool
            .drain(self.config.max_tx_per_block, self.config.max_block_bytes);
        let fees = selected
            .iter()
            .fold(Amount::ZERO, |acc, tx| acc.checked_add(tx.fee).unwrap_or(acc));

        let reward_engine = RewardEngine::new(&self.config);
        let subsidy = reward_engine.block_subsidy(next_height);

        let coinbase = Transaction {
            sender: Address::reserved(),
            recipient: proposer.clone(),
            amount: subsidy,
            fee: Amount::ZERO,
            nonce: 0,
            timestamp: now,
            payload: TransactionPayload::Reward { block_height: next_height },
            signature: Vec::new(),
        };
        let mut transactions = Vec::with_capacity(selected.len() + 1);
        transactions.push(coinbase);
        transactions.extend(selected.iter().cloned());

        let header = BlockHeader {
            height: next_height,
            previous_hash,
            timestamp: now,
            validator: proposer.clone(),
            nonce: 0,
            merkle_root: merkle_root(&transactions),
        };
        let header_hash = header.hash();
        let signature = match self.crypto.sign(&signing_key, &header_hash).await {
            Ok(signature) => signature,
            Err(e) => {
                self.requeue_drained(selected, now);
                return Err(e.into());
            }
        };
        let block = Block {
            header,
            transactions,
            signature,
        };

        let public_keys = self.public_keys.read().clone();
        if let Err(e) = self
            .chain
            .append_block(block.clone(), &public_keys, self.crypto.as_ref(), now, subsidy)
            .await
        {
            // The block never made it onto the chain, so the transactions
            // drained for it are still valid candidates for the next round.
            self.requeue_drained(selected, now);
            return Err(e.into());
        }

        self.store.put_block(&block).await?;
        self.store.put_transactions(&block.transactions).await?;
        self.store.set_chain_head(block.hash()).await?;

        self.validator_set
            .update_metrics(&proposer, response_time_ms, true, selected.len() as u64)?;
        self.validator_set.record_block_produced(&proposer, now);

        if let Some(evidence) = self.slasher.observe_signature(&proposer, next_height, block.hash()) {
            self.validator_set.apply_evidence(&evidence, now)?;
        }
        if let Some(evidence) = self.slasher.observe_block(&proposer, next_height, false) {
            self.validator_set.apply_evidence(&evidence, now)?;
        }

        let total_reward = reward_engine.total_block_reward(next_height, fees);
        if let Some(validator) = self.validator_set.get(&proposer) {
            let (validator_payout, delegate_payouts) = RewardEngine::split_commission(
                total_reward,
                validator.commission_rate,
                validator.stake,
                &validator.delegations,
            );
            for (delegator, amount) in &delegate_payouts {
                self.chain.redistribute(&proposer, delegator, *amount);
            }
            self.validator_set.credit_reward(&proposer, validator_payout)?;
            if let Some(updated) = self.validator_set.get(&proposer) {
                self.store.put_validator(&updated).await?;
            }
        }

        self.transport.broadcast(Message::NewBlock(block.clone())).await?;
        tracing::info!(height = next_height, %proposer, txs = block.transactions.len(), "produced block");

        Ok(block)
    }
}
