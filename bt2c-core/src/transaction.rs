use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::amount::Amount;
use crate::canonical::canonical_bytes;
use crate::hash::{sha256, Hash};

/// Transaction timestamps must lie within `[now - MAX_PAST, now + MAX_FUTURE]`.
pub const TIMESTAMP_MAX_PAST_SECS: u64 = 86_400;
pub const TIMESTAMP_MAX_FUTURE_SECS: u64 = 300;

/// The type-discriminant of a [`Transaction`]. Kept as a plain enum (rather
/// than deriving it solely from [`TransactionPayload`]'s tag) so components
/// that only care about the kind don't need to destructure the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    Transfer,
    Stake,
    Unstake,
    Delegate,
    Undelegate,
    Slash,
    Reward,
}

/// Type-specific transaction payload. Adjacently tagged so the canonical
/// encoding carries a `type` key and a nested `payload` object, matching the
/// wire shape described by the spec rather than serde's internally-tagged
/// default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionPayload {
    Transfer,
    Stake { commission_rate: f64 },
    Unstake,
    Delegate { validator: Address },
    Undelegate,
    Slash { reason: String, evidence: serde_json::Value },
    Reward { block_height: u64 },
}

impl TransactionPayload {
    pub fn kind(&self) -> TransactionType {
        match self {
            TransactionPayload::Transfer => TransactionType::Transfer,
            TransactionPayload::Stake { .. } => TransactionType::Stake,
            TransactionPayload::Unstake => TransactionType::Unstake,
            TransactionPayload::Delegate { .. } => TransactionType::Delegate,
            TransactionPayload::Undelegate => TransactionType::Undelegate,
            TransactionPayload::Slash { .. } => TransactionType::Slash,
            TransactionPayload::Reward { .. } => TransactionType::Reward,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: Address,
    pub recipient: Address,
    pub amount: Amount,
    pub fee: Amount,
    /// Per-sender monotonic nonce, strictly increasing, starting at 1.
    pub nonce: u64,
    /// Seconds since epoch.
    pub timestamp: u64,
    #[serde(flatten)]
    pub payload: TransactionPayload,
    /// RSASSA-PKCS1-v1_5 signature over `signing_bytes()`. Empty for
    /// reward/genesis transactions from the reserved sender, which skip
    /// signature checks entirely.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signature: Vec<u8>,
}

impl Transaction {
    pub fn kind(&self) -> TransactionType {
        self.payload.kind()
    }

    /// Whether this transaction is exempt from signature verification
    /// (reward/genesis transactions carrying the reserved sender).
    pub fn skips_signature(&self) -> bool {
        self.sender.is_reserved()
    }

    /// Canonical encoding with the `signature` field cleared — what gets
    /// hashed and what the signature itself covers.
    pub fn signing_bytes(&self) -> Vec<u8> {
        let mut unsigned = self.clone();
        unsigned.signature = Vec::new();
        canonical_bytes(&unsigned).expect("transaction is always representable as JSON")
    }

    pub fn hash(&self) -> Hash {
        sha256(&self.signing_bytes())
    }

    pub fn is_timestamp_valid(&self, now: u64) -> bool {
        let not_before = now.saturating_sub(TIMESTAMP_MAX_PAST_SECS);
        let not_after = now.saturating_add(TIMESTAMP_MAX_FUTURE_SECS);
        self.timestamp >= not_before && self.timestamp <= not_after
    }

    /// Size of the canonical encoding in bytes — used for mempool fee-per-byte
    /// priority and size-limit checks.
    pub fn size_bytes(&self) -> usize {
        canonical_bytes(self).map(|b| b.len()).unwrap_or(usize::MAX)
    }

    pub fn fee_per_byte(&self) -> f64 {
        let size = self.size_bytes().max(1) as f64;
        self.fee.to_f64() / size
    }
}
