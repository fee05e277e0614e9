use std::collections::{BinaryHeap, HashMap, HashSet};

use parking_lot::RwLock;

use bt2c_core::{Address, Amount, Hash, Transaction};

use crate::error::RejectReason;

/// Maximum encoded transaction size accepted into the mempool.
pub const MAX_TX_SIZE_BYTES: usize = 16 * 1024;

struct Entry {
    transaction: Transaction,
    fee_per_byte: f64,
    received_at: u64,
    sequence: u64,
}

/// A slot in the fee-priority heap. Carries enough information to check
/// whether the entry it points at is still live (lazy deletion) without
/// the heap itself needing to support arbitrary removal.
struct HeapItem {
    fee_per_byte: f64,
    sequence: u64,
    hash: Hash,
}

impl PartialEq for HeapItem {
    fn eq(&self, other: &Self) -> bool {
        self.fee_per_byte == other.fee_per_byte && self.sequence == other.sequence
    }
}
impl Eq for HeapItem {}

impl PartialOrd for HeapItem {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapItem {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.fee_per_byte
            .total_cmp(&other.fee_per_byte)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// One sender's next not-yet-offered transaction, ordered into the
/// cross-sender selection heap by fee-per-byte (higher first), ties broken
/// by older `received_at`, then by insertion `sequence` for determinism.
struct Candidate<'a> {
    sender: &'a Address,
    fee_per_byte: f64,
    received_at: u64,
    sequence: u64,
}

impl<'a> Candidate<'a> {
    fn from_entry(sender: &'a Address, entry: &Entry) -> Self {
        Self {
            sender,
            fee_per_byte: entry.fee_per_byte,
            received_at: entry.received_at,
            sequence: entry.sequence,
        }
    }
}

impl PartialEq for Candidate<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.fee_per_byte == other.fee_per_byte
            && self.received_at == other.received_at
            && self.sequence == other.sequence
    }
}
impl Eq for Candidate<'_> {}

impl PartialOrd for Candidate<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate<'_> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.fee_per_byte
            .total_cmp(&other.fee_per_byte)
            .then_with(|| other.received_at.cmp(&self.received_at))
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

#[derive(Default)]
struct State {
    entries: HashMap<Hash, Entry>,
    /// Highest nonce seen in the pool per sender, for strictly-increasing
    /// nonce enforcement against pending (not yet chain-confirmed) txs.
    nonce_index: HashMap<Address, u64>,
    by_sender: HashMap<Address, HashSet<Hash>>,
    priority: BinaryHeap<HeapItem>,
    sequence_counter: u64,
    /// Sum of `size_bytes()` across all resident entries; checked against
    /// `Mempool::max_bytes` on every insert.
    total_bytes: usize,
}

/// The transaction pool: an arena of pending transactions (`entries`)
/// indexed by hash, sender nonce, and sender address, plus a fee-priority
/// heap used to pick the most profitable transactions for the next block.
///
/// Internally synchronized with a single `RwLock` so callers never need to
/// worry about torn reads across the indexes; this crate sits below the
/// chain/validator locks in the node's fixed lock order.
pub struct Mempool {
    state: RwLock<State>,
    capacity: usize,
    tx_ttl_secs: u64,
}

impl Mempool {
    pub fn new(capacity: usize, tx_ttl_secs: u64) -> Self {
        Self {
            state: RwLock::new(State::default()),
            capacity,
            tx_ttl_secs,
        }
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.state.read().entries.contains_key(hash)
    }

    /// Sum of `amount + fee` across this sender's pending transactions,
    /// used by callers to check balance without double-counting across
    /// multiple pending transactions from the same sender.
    pub fn pending_debits(&self, address: &Address) -> Amount {
        Self::pending_debits_locked(&self.state.read(), address)
    }

    fn pending_debits_locked(state: &State, address: &Address) -> Amount {
        let Some(hashes) = state.by_sender.get(address) else {
            return Amount::ZERO;
        };
        hashes
            .iter()
            .filter_map(|h| state.entries.get(h))
            .fold(Amount::ZERO, |acc, e| {
                acc.checked_add(e.transaction.amount)
                    .and_then(|a| a.checked_add(e.transaction.fee))
                    .unwrap_or(acc)
            })
    }

    /// Last nonce seen in the pool for `address`, if any pending transaction
    /// exists from that sender.
    pub fn last_seen_nonce(&self, address: &Address) -> Option<u64> {
        self.state.read().nonce_index.get(address).copied()
    }

    /// Validates and inserts `transaction`. `account_nonce`/`chain_balance`
    /// are lazy providers for the sender's last confirmed on-chain nonce
    /// and spendable balance — they're invoked only if needed, and only
    /// after the pool's write lock is already held, so the nonce/balance a
    /// transaction is checked against can't go stale between the check and
    /// the insert (no other `add` can interleave once this one has the
    /// lock). Pending amounts already committed to this sender's other
    /// resident transactions are folded in under the same lock so a sender
    /// can't double-spend across two transactions submitted back to back.
    pub fn add(
        &self,
        transaction: Transaction,
        now: u64,
        account_nonce: impl FnOnce() -> u64,
        chain_balance: impl FnOnce() -> Amount,
    ) -> Result<Hash, RejectReason> {
        if !transaction.is_timestamp_valid(now) {
            return Err(RejectReason::InvalidTimestamp);
        }
        if transaction.size_bytes() > MAX_TX_SIZE_BYTES {
            return Err(RejectReason::Oversized);
        }

        let hash = transaction.hash();
        let mut state = self.state.write();

        if state.entries.contains_key(&hash) {
            return Err(RejectReason::DuplicateTransaction);
        }

        let last_seen = state
            .nonce_index
            .get(&transaction.sender)
            .copied()
            .unwrap_or_else(account_nonce);
        if transaction.nonce != last_seen + 1 {
            return Err(RejectReason::InvalidNonce {
                last_seen,
                got: transaction.nonce,
            });
        }

        if !transaction.skips_signature() {
            let required = transaction
                .amount
                .checked_add(transaction.fee)
                .map_err(|_| RejectReason::InsufficientBalance)?;
            let pending = Self::pending_debits_locked(&state, &transaction.sender);
            let available = chain_balance().saturating_sub(pending);
            if available.units() < required.units() {
                return Err(RejectReason::InsufficientBalance);
            }
        }

        let fee_per_byte = transaction.fee_per_byte();
        if state.entries.len() >= self.capacity {
            let lowest = state.priority.peek().map(|i| i.fee_per_byte);
            match lowest {
                Some(lowest_fee) if fee_per_byte > lowest_fee => {
                    self.evict_lowest_locked(&mut state);
                }
                _ => return Err(RejectReason::MempoolFull),
            }
        }

        let sequence = state.sequence_counter;
        state.sequence_counter += 1;

        state.nonce_index.insert(transaction.sender.clone(), transaction.nonce);
        state
            .by_sender
            .entry(transaction.sender.clone())
            .or_default()
            .insert(hash);
        state.priority.push(HeapItem {
            fee_per_byte,
            sequence,
            hash,
        });
        state.entries.insert(
            hash,
            Entry {
                transaction,
                fee_per_byte,
                received_at: now,
                sequence,
            },
        );

        tracing::debug!(?hash, fee_per_byte, "accepted transaction into mempool");
        Ok(hash)
    }

    pub fn remove(&self, hash: &Hash) -> Option<Transaction> {
        let mut state = self.state.write();
        self.remove_locked(&mut state, hash)
    }

    fn remove_locked(&self, state: &mut State, hash: &Hash) -> Option<Transaction> {
        let entry = state.entries.remove(hash)?;
        if let Some(set) = state.by_sender.get_mut(&entry.transaction.sender) {
            set.remove(hash);
            if set.is_empty() {
                state.by_sender.remove(&entry.transaction.sender);
            }
        }
        Some(entry.transaction)
    }

    /// Removes the current lowest-fee-per-byte entry. Caller must hold the
    /// write lock; used both for explicit eviction and capacity pressure.
    fn evict_lowest_locked(&self, state: &mut State) {
        while let Some(item) = state.priority.peek() {
            if state.entries.contains_key(&item.hash) {
                let hash = item.hash;
                self.remove_locked(state, &hash);
                state.priority.pop();
                return;
            }
            state.priority.pop();
        }
    }

    /// Drops transactions older than the configured TTL, returning their
    /// hashes.
    pub fn evict_expired(&self, now: u64) -> Vec<Hash> {
        let mut state = self.state.write();
        let expired: Vec<Hash> = state
            .entries
            .iter()
            .filter(|(_, e)| now.saturating_sub(e.received_at) > self.tx_ttl_secs)
            .map(|(h, _)| *h)
            .collect();
        for hash in &expired {
            self.remove_locked(&mut state, hash);
        }
        expired
    }

    /// Selects up to `max_count` highest fee-per-byte transactions whose
    /// total encoded size does not exceed `max_bytes`, and removes exactly
    /// those transactions from the pool before returning them — selection
    /// and removal happen under the same write lock, so no other caller
    /// can observe or re-select a transaction this one is about to take
    /// for its own block.
    ///
    /// Global ordering is by decreasing fee-per-byte, ties broken by older
    /// timestamp; but a sender's resident transactions are only ever
    /// offered in nonce order — a later nonce never enters the selection
    /// ahead of an earlier one from the same sender, even if it pays a
    /// higher fee, since a block containing it without its predecessor
    /// would violate the contiguous-nonce invariant.
    pub fn drain(&self, max_count: usize, max_bytes: usize) -> Vec<Transaction> {
        let mut state = self.state.write();

        let mut by_sender: HashMap<Address, Vec<Hash>> = HashMap::new();
        for entry in state.entries.values() {
            by_sender
                .entry(entry.transaction.sender.clone())
                .or_default()
                .push(entry.transaction.hash());
        }
        for hashes in by_sender.values_mut() {
            hashes.sort_by_key(|h| state.entries[h].transaction.nonce);
        }
        let mut cursors: HashMap<Address, usize> = HashMap::new();

        let mut heap: BinaryHeap<Candidate> = BinaryHeap::new();
        for (sender, hashes) in &by_sender {
            if let Some(first) = hashes.first() {
                heap.push(Candidate::from_entry(sender, &state.entries[first]));
            }
        }

        let mut selected_hashes = Vec::new();
        let mut total_bytes = 0usize;
        while let Some(candidate) = heap.pop() {
            let hashes = &by_sender[candidate.sender];
            let cursor = cursors.entry(candidate.sender.clone()).or_insert(0);
            let hash = hashes[*cursor];
            *cursor += 1;
            if let Some(next) = hashes.get(*cursor) {
                heap.push(Candidate::from_entry(candidate.sender, &state.entries[next]));
            }

            if selected_hashes.len() >= max_count {
                break;
            }
            let size = state.entries[&hash].transaction.size_bytes();
            if total_bytes + size > max_bytes {
                continue;
            }
            total_bytes += size;
            selected_hashes.push(hash);
        }

        selected_hashes
            .into_iter()
            .filter_map(|hash| self.remove_locked(&mut state, &hash))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bt2c_core::TransactionPayload;
    use std::str::FromStr;

    fn tx(sender_suffix: char, nonce: u64, fee: &str) -> Transaction {
        Transaction {
            sender: Address::parse(&format!("bt2c_{}", sender_suffix.to_string().repeat(26)))
                .unwrap(),
            recipient: Address::parse("bt2c_bbbbbbbbbbbbbbbbbbbbbbbbbb").unwrap(),
            amount: Amount::from_str("1").unwrap(),
            fee: Amount::from_str(fee).unwrap(),
            nonce,
            timestamp: 1_000,
            payload: TransactionPayload::Transfer,
            signature: Vec::new(),
        }
    }

    /// Test-only shorthand for `Mempool::add` with a fixed on-chain nonce
    /// and balance, standing in for what `Node::submit_transaction` would
    /// normally supply from the chain.
    fn add(
        pool: &Mempool,
        transaction: Transaction,
        account_nonce: u64,
        chain_balance: Amount,
        now: u64,
    ) -> Result<Hash, RejectReason> {
        pool.add(transaction, now, || account_nonce, || chain_balance)
    }

    #[test]
    fn accepts_and_dedupes() {
        let pool = Mempool::new(10, 3600);
        let t = tx('a', 1, "0.01");
        let hash = add(&pool, t.clone(), 0, Amount::from_integer(100), 1_000).unwrap();
        assert!(pool.contains(&hash));
        assert_eq!(
            add(&pool, t, 0, Amount::from_integer(100), 1_000),
            Err(RejectReason::DuplicateTransaction)
        );
    }

    #[test]
    fn rejects_non_contiguous_nonce() {
        let pool = Mempool::new(10, 3600);
        add(&pool, tx('a', 1, "0.01"), 0, Amount::from_integer(100), 1_000)
            .unwrap();
        let err = add(&pool, tx('a', 3, "0.02"), 0, Amount::from_integer(100), 1_000)
            .unwrap_err();
        assert_eq!(
            err,
            RejectReason::InvalidNonce {
                last_seen: 1,
                got: 3
            }
        );
    }

    #[test]
    fn rejects_repeated_nonce() {
        let pool = Mempool::new(10, 3600);
        add(&pool, tx('a', 1, "0.01"), 0, Amount::from_integer(100), 1_000)
            .unwrap();
        let err = add(&pool, tx('a', 1, "0.02"), 0, Amount::from_integer(100), 1_000)
            .unwrap_err();
        assert_eq!(
            err,
            RejectReason::InvalidNonce {
                last_seen: 1,
                got: 1
            }
        );
    }

    #[test]
    fn rejects_insufficient_balance() {
        let pool = Mempool::new(10, 3600);
        let err = add(&pool, tx('a', 1, "0.01"), 0, Amount::from_str("0.5").unwrap(), 1_000)
            .unwrap_err();
        assert_eq!(err, RejectReason::InsufficientBalance);
    }

    #[test]
    fn evicts_lowest_fee_when_full_and_outbid() {
        let pool = Mempool::new(1, 3600);
        add(&pool, tx('a', 1, "0.0001"), 0, Amount::from_integer(100), 1_000)
            .unwrap();
        let hash = add(&pool, tx('b', 1, "1.0"), 0, Amount::from_integer(100), 1_000)
            .unwrap();
        assert_eq!(pool.len(), 1);
        assert!(pool.contains(&hash));
    }

    #[test]
    fn full_and_not_outbid_is_rejected() {
        let pool = Mempool::new(1, 3600);
        add(&pool, tx('a', 1, "1.0"), 0, Amount::from_integer(100), 1_000)
            .unwrap();
        let err = add(&pool, tx('b', 1, "0.0001"), 0, Amount::from_integer(100), 1_000)
            .unwrap_err();
        assert_eq!(err, RejectReason::MempoolFull);
    }

    #[test]
    fn drain_orders_by_fee_per_byte_and_empties_the_pool() {
        let pool = Mempool::new(10, 3600);
        add(&pool, tx('a', 1, "0.001"), 0, Amount::from_integer(100), 1_000)
            .unwrap();
        add(&pool, tx('b', 1, "1.0"), 0, Amount::from_integer(100), 1_000)
            .unwrap();
        let selected = pool.drain(10, usize::MAX);
        assert_eq!(selected.len(), 2);
        assert!(selected[0].fee_per_byte() >= selected[1].fee_per_byte());
        assert_eq!(pool.len(), 0);
    }

    #[test]
    fn drain_keeps_nonce_order_within_a_sender_despite_fee() {
        let pool = Mempool::new(10, 3600);
        // Nonce 2 pays far more per byte than nonce 1, but must still come
        // after it in the selection — never included without its
        // predecessor, and never reordered ahead of it.
        add(&pool, tx('a', 1, "0.0001"), 0, Amount::from_integer(100), 1_000)
            .unwrap();
        add(&pool, tx('a', 2, "1.0"), 0, Amount::from_integer(100), 1_000)
            .unwrap();
        let selected = pool.drain(10, usize::MAX);
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].nonce, 1);
        assert_eq!(selected[1].nonce, 2);
    }

    #[test]
    fn drain_caps_a_sender_at_its_first_unselected_nonce_when_limited() {
        let pool = Mempool::new(10, 3600);
        add(&pool, tx('a', 1, "0.0001"), 0, Amount::from_integer(100), 1_000)
            .unwrap();
        add(&pool, tx('a', 2, "1.0"), 0, Amount::from_integer(100), 1_000)
            .unwrap();
        add(&pool, tx('b', 1, "0.5"), 0, Amount::from_integer(100), 1_000)
            .unwrap();
        // Only room for 2: 'a' nonce 1 must be taken before 'a' nonce 2 is
        // even offered, so the second slot goes to 'b' rather than skipping
        // ahead to 'a' nonce 2. The untaken 'a' nonce 2 stays resident.
        let selected = pool.drain(2, usize::MAX);
        assert_eq!(selected.len(), 2);
        assert!(selected.iter().any(|t| t.sender == tx('a', 1, "0").sender && t.nonce == 1));
        assert!(selected.iter().any(|t| t.sender == tx('b', 1, "0").sender));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn drain_does_not_return_the_same_transaction_twice() {
        let pool = Mempool::new(10, 3600);
        add(&pool, tx('a', 1, "0.01"), 0, Amount::from_integer(100), 1_000)
            .unwrap();
        let first = pool.drain(10, usize::MAX);
        assert_eq!(first.len(), 1);
        let second = pool.drain(10, usize::MAX);
        assert!(second.is_empty());
    }

    #[test]
    fn evict_expired_drops_old_entries() {
        let pool = Mempool::new(10, 100);
        add(&pool, tx('a', 1, "0.01"), 0, Amount::from_integer(100), 1_000)
            .unwrap();
        let expired = pool.evict_expired(1_000 + 101);
        assert_eq!(expired.len(), 1);
        assert_eq!(pool.len(), 0);
    }
}
