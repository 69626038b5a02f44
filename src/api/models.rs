//! API request and response models

use crate::games::types::{GameSession, GameStatus, GameType};
use crate::models::{Transaction, Wallet};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Session view returned on bet placement and active-game listings.
/// Deliberately excludes `server_seed` and the metadata (mine layouts
/// and dice rolls stay server-side until resolution).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub id: String,
    pub game_type: GameType,
    pub bet_amount: f64,
    pub multiplier: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cashout_at: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crash_point: Option<f64>,
    pub server_hash: String,
    pub nonce: i64,
    pub client_seed: String,
    pub status: GameStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&GameSession> for SessionResponse {
    fn from(session: &GameSession) -> Self {
        Self {
            id: session.id.clone(),
            game_type: session.game_type,
            bet_amount: session.bet_amount,
            multiplier: session.multiplier,
            cashout_at: session.cashout_at,
            crash_point: session.crash_point,
            server_hash: session.server_hash.clone(),
            nonce: session.nonce,
            client_seed: session.client_seed.clone(),
            status: session.status,
            created_at: session.created_at,
            updated_at: session.updated_at,
        }
    }
}

/// POST cashout / mines cashout body
#[derive(Debug, Clone, Deserialize)]
pub struct CashoutRequest {
    pub game_id: String,
}

/// POST mines reveal body
#[derive(Debug, Clone, Deserialize)]
pub struct RevealRequest {
    pub game_id: String,
    pub position: i64,
}

/// POST dice play body
#[derive(Debug, Clone, Deserialize)]
pub struct DicePlayRequest {
    pub game_id: String,
    pub target: i64,
    #[serde(default)]
    pub over: bool,
}

/// GET balance response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub available: f64,
    pub locked: f64,
    pub total: f64,
    pub total_wagered: f64,
    pub total_won: f64,
    pub nonce: i64,
    pub client_seed: String,
    pub server_hash: String,
}

impl BalanceResponse {
    pub fn from_wallet(wallet: &Wallet, server_hash: String) -> Self {
        Self {
            available: wallet.available(),
            locked: wallet.locked_balance,
            total: wallet.total(),
            total_wagered: wallet.total_wagered,
            total_won: wallet.total_won,
            nonce: wallet.nonce,
            client_seed: wallet.client_seed.clone(),
            server_hash,
        }
    }
}

/// GET active games response
#[derive(Debug, Clone, Serialize)]
pub struct ActiveGamesResponse {
    pub games: Vec<SessionResponse>,
    pub count: usize,
}

/// One completed game in the history listing
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub id: String,
    pub game_type: GameType,
    pub bet_amount: f64,
    pub multiplier: f64,
    pub payout: f64,
    pub result: &'static str,
    pub status: GameStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

impl From<&GameSession> for HistoryEntry {
    fn from(session: &GameSession) -> Self {
        let payout = session.payout();
        Self {
            id: session.id.clone(),
            game_type: session.game_type,
            bet_amount: session.bet_amount,
            multiplier: session.cashout_at.unwrap_or(0.0),
            payout,
            result: if payout > 0.0 { "win" } else { "lose" },
            status: session.status,
            created_at: session.created_at,
            ended_at: session.ended_at,
        }
    }
}

/// GET history response
#[derive(Debug, Clone, Serialize)]
pub struct HistoryResponse {
    pub games: Vec<HistoryEntry>,
    pub count: usize,
}

/// GET transactions response
#[derive(Debug, Clone, Serialize)]
pub struct TransactionsResponse {
    pub transactions: Vec<Transaction>,
    pub count: usize,
}

/// History pagination query
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_history_limit")]
    pub limit: usize,
}

fn default_history_limit() -> usize {
    50
}

/// POST verify body
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyRequest {
    pub client_seed: String,
    pub server_seed: String,
    pub nonce: i64,
    pub game_type: GameType,
}

/// POST verify response: the re-derived outcome for byte comparison
#[derive(Debug, Clone, Serialize)]
pub struct VerifyResponse {
    pub valid: bool,
    pub game_type: GameType,
    pub client_seed: String,
    pub server_seed: String,
    pub nonce: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crash_point: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mine_positions: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roll: Option<u8>,
    pub calculated_hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::types::GameMetadata;

    fn session() -> GameSession {
        GameSession {
            id: "g1".to_string(),
            user_id: 7,
            game_type: GameType::Mines,
            bet_amount: 1_000.0,
            multiplier: 1.3,
            cashout_at: Some(1.3),
            crash_point: None,
            client_seed: "aa".repeat(16),
            server_seed: "super-secret".to_string(),
            server_hash: "cc".repeat(32),
            nonce: 4,
            final_hash: "dd".repeat(32),
            status: GameStatus::CashedOut,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            ended_at: Some(Utc::now()),
            metadata: GameMetadata::mines(vec![3, 7, 19], 25, 3),
        }
    }

    #[test]
    fn test_session_response_hides_seed_and_layout() {
        let response = SessionResponse::from(&session());
        let encoded = serde_json::to_value(&response).unwrap();

        assert!(encoded.get("server_seed").is_none());
        assert!(encoded.get("metadata").is_none());
        assert_eq!(encoded["nonce"], 4);
    }

    #[test]
    fn test_history_entry_win_detection() {
        let entry = HistoryEntry::from(&session());
        assert_eq!(entry.result, "win");
        assert_eq!(entry.payout, 1_300.0);

        let mut lost = session();
        lost.cashout_at = None;
        lost.status = GameStatus::Lost;
        let entry = HistoryEntry::from(&lost);
        assert_eq!(entry.result, "lose");
        assert_eq!(entry.payout, 0.0);
    }
}
