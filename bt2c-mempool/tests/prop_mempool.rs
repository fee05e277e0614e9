// Property tests for the mempool's nonce-contiguity and block-selection
// invariants (universal invariant #2 from the spec: included (sender,
// nonce) pairs are strictly 1, 2, 3, ... with no gaps).

use std::collections::HashMap;
use std::str::FromStr;

use bt2c_core::{Address, Amount, Transaction, TransactionPayload};
use bt2c_mempool::Mempool;
use proptest::prelude::*;

fn sender(n: u8) -> Address {
    let c = (b'a' + n) as char;
    Address::parse(&format!("bt2c_{}", c.to_string().repeat(26))).unwrap()
}

fn tx(addr: &Address, nonce: u64, fee_units: i128) -> Transaction {
    Transaction {
        sender: addr.clone(),
        recipient: Address::parse("bt2c_bbbbbbbbbbbbbbbbbbbbbbbbbb").unwrap(),
        amount: Amount::from_str("1").unwrap(),
        fee: Amount::from_units(fee_units),
        nonce,
        timestamp: 1_000,
        payload: TransactionPayload::Transfer,
        signature: Vec::new(),
    }
}

proptest! {
    /// Whatever order a sender's contiguous nonces are submitted in, and
    /// whatever fees they carry, `drain` only ever returns them
    /// in ascending nonce order, with no gaps.
    #[test]
    fn selection_preserves_nonce_order_per_sender(
        nonce_count in 1usize..8,
        fees in proptest::collection::vec(1i128..1_000_000, 1..8),
        shuffle_seed in 0u64..1000,
    ) {
        let pool = Mempool::new(64, 3_600);
        let addr = sender(0);
        let mut order: Vec<u64> = (1..=nonce_count as u64).collect();
        // Deterministic shuffle: rotate by the seed so insertion order
        // varies without pulling in a shuffle dependency.
        let rotate_by = (shuffle_seed as usize) % order.len().max(1);
        order.rotate_left(rotate_by);

        for &nonce in &order {
            let fee = fees[(nonce as usize - 1) % fees.len()];
            let _ = pool.add(tx(&addr, nonce, fee), 1_000, || 0, || Amount::from_integer(1_000_000));
        }

        let selected = pool.drain(usize::MAX, usize::MAX);
        let nonces: Vec<u64> = selected
            .iter()
            .filter(|t| t.sender == addr)
            .map(|t| t.nonce)
            .collect();
        let mut expected: Vec<u64> = nonces.clone();
        expected.sort_unstable();
        prop_assert_eq!(&nonces, &expected, "selection must preserve ascending nonce order");
        for pair in nonces.windows(2) {
            prop_assert_eq!(pair[1], pair[0] + 1, "no gaps allowed between selected nonces");
        }
    }

    /// Across many senders with interleaved, randomly-ordered nonces and
    /// fees, every sender's selected subsequence is still gap-free and
    /// starts at 1 (nothing is selected out of order, no matter how
    /// attractive a later nonce's fee is).
    #[test]
    fn selection_is_per_sender_contiguous_across_many_senders(
        assignments in proptest::collection::vec((0u8..4, 1i128..1_000_000), 1..30),
    ) {
        let pool = Mempool::new(256, 3_600);
        let mut next_nonce: HashMap<u8, u64> = HashMap::new();
        for (sender_id, fee) in assignments {
            let nonce = next_nonce.entry(sender_id).or_insert(0);
            *nonce += 1;
            let addr = sender(sender_id);
            let _ = pool.add(tx(&addr, *nonce, fee), 1_000, || 0, || Amount::from_integer(1_000_000));
        }

        let selected = pool.drain(usize::MAX, usize::MAX);
        let mut by_sender: HashMap<Address, Vec<u64>> = HashMap::new();
        for t in &selected {
            by_sender.entry(t.sender.clone()).or_default().push(t.nonce);
        }
        for nonces in by_sender.values() {
            for pair in nonces.windows(2) {
                prop_assert_eq!(pair[1], pair[0] + 1);
            }
            prop_assert_eq!(nonces[0], 1);
        }
    }
}
