//! Wallet, transaction and account record types
//!
//! Everything here is persisted through the store as JSON and must
//! round-trip losslessly.

use crate::games::types::GameType;
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Balance a wallet is seeded with on first access, in minor units.
pub const STARTING_BALANCE: f64 = 10_000.0;

/// Per-user wallet. Amounts are minor units (cents) carried as `f64`
/// for protocol compatibility with the JSON wire format.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Wallet {
    pub user_id: i64,
    pub balance: f64,
    pub locked_balance: f64,
    pub total_wagered: f64,
    pub total_won: f64,

    // Provably-fair header
    pub client_seed: String,
    pub server_hash: String,
    pub nonce: i64,
}

impl Wallet {
    /// Fresh wallet with the starting balance and a generated client seed.
    pub fn new(user_id: i64, server_hash: String) -> Self {
        Self {
            user_id,
            balance: STARTING_BALANCE,
            locked_balance: 0.0,
            total_wagered: 0.0,
            total_won: 0.0,
            client_seed: generate_client_seed(),
            server_hash,
            nonce: 0,
        }
    }

    /// Amount the player can still stake.
    pub fn available(&self) -> f64 {
        self.balance
    }

    /// Available plus anything tied up in live games.
    pub fn total(&self) -> f64 {
        self.balance + self.locked_balance
    }
}

/// 16 random bytes, hex-encoded. 128 bits of entropy.
pub fn generate_client_seed() -> String {
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Ledger entry categories
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Bet,
    Win,
    Deposit,
    Withdraw,
    Bonus,
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionType::Bet => write!(f, "bet"),
            TransactionType::Win => write!(f, "win"),
            TransactionType::Deposit => write!(f, "deposit"),
            TransactionType::Withdraw => write!(f, "withdraw"),
            TransactionType::Bonus => write!(f, "bonus"),
        }
    }
}

/// Append-only audit entry emitted on every terminal settlement.
/// Never mutated after write.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub id: String,
    pub user_id: i64,
    #[serde(rename = "type")]
    pub tx_type: TransactionType,
    /// Signed amount: gross payout for wins, negative stake for losses.
    pub amount: f64,
    pub balance_before: f64,
    pub balance_after: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_id: Option<String>,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// One entry in the per-user bet-pattern ring (most recent 50 kept).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BetPattern {
    pub amount: f64,
    pub game_type: GameType,
    pub timestamp: i64,
}

/// Authenticated-session record. Issued upstream; the core only
/// persists and refreshes it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UserSession {
    pub user_id: i64,
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
}

/// Minimal user profile mirrored from the auth collaborator.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_wallet_defaults() {
        let wallet = Wallet::new(123_456_789, "hash".to_string());

        assert_eq!(wallet.balance, STARTING_BALANCE);
        assert_eq!(wallet.locked_balance, 0.0);
        assert_eq!(wallet.nonce, 0);
        assert_eq!(wallet.client_seed.len(), 32); // 16 bytes hex
        assert!(wallet.client_seed.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_client_seeds_are_unique() {
        assert_ne!(generate_client_seed(), generate_client_seed());
    }

    #[test]
    fn test_wallet_totals() {
        let mut wallet = Wallet::new(1, String::new());
        wallet.balance = 9_000.0;
        wallet.locked_balance = 1_000.0;

        assert_eq!(wallet.available(), 9_000.0);
        assert_eq!(wallet.total(), 10_000.0);
    }

    #[test]
    fn test_wallet_json_round_trip() {
        let wallet = Wallet::new(42, "abc".to_string());
        let encoded = serde_json::to_string(&wallet).unwrap();
        let decoded: Wallet = serde_json::from_str(&encoded).unwrap();
        assert_eq!(wallet, decoded);
    }

    #[test]
    fn test_transaction_type_tag() {
        let tx = Transaction {
            id: "tx1".to_string(),
            user_id: 1,
            tx_type: TransactionType::Win,
            amount: 1_500.0,
            balance_before: 9_000.0,
            balance_after: 10_500.0,
            game_id: Some("g1".to_string()),
            description: "Won 1500.00 on crash (1.50x)".to_string(),
            created_at: Utc::now(),
        };

        let encoded = serde_json::to_value(&tx).unwrap();
        assert_eq!(encoded["type"], "win");
        assert_eq!(encoded["amount"], 1_500.0);
    }
}
