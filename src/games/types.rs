//! Game domain types
//!
//! Session records are persisted as JSON and also drive API responses,
//! so every field here must serialize stably.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported game types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum GameType {
    Crash,
    Mines,
    Dice,
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameType::Crash => write!(f, "crash"),
            GameType::Mines => write!(f, "mines"),
            GameType::Dice => write!(f, "dice"),
        }
    }
}

impl std::str::FromStr for GameType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "crash" => Ok(GameType::Crash),
            "mines" => Ok(GameType::Mines),
            "dice" => Ok(GameType::Dice),
            _ => Err(()),
        }
    }
}

/// Session lifecycle states
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Active,
    CashedOut,
    Crashed,
    Lost,
    Completed,
}

impl GameStatus {
    /// Once terminal, only `ended_at` and terminal fields may be written.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, GameStatus::Active)
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameStatus::Active => write!(f, "active"),
            GameStatus::CashedOut => write!(f, "cashed_out"),
            GameStatus::Crashed => write!(f, "crashed"),
            GameStatus::Lost => write!(f, "lost"),
            GameStatus::Completed => write!(f, "completed"),
        }
    }
}

/// Multiplier paid per count of safe reveals in a 3-mine field.
pub const MINE_MULTIPLIERS: [f64; 12] = [
    1.0, 1.12, 1.3, 1.62, 2.08, 2.85, 4.14, 6.5, 11.5, 24.0, 75.0, 750.0,
];

/// Multiplier for `revealed` safe tiles. Outside the table there is no
/// payout, matching the published verifier.
pub fn mine_multiplier(revealed: usize) -> f64 {
    MINE_MULTIPLIERS.get(revealed).copied().unwrap_or(0.0)
}

/// Game-specific session state (discriminated union)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "game", rename_all = "lowercase")]
pub enum GameMetadata {
    Crash,
    Mines {
        mines: Vec<u8>,
        grid_size: usize,
        mine_count: usize,
        revealed: Vec<u8>,
        multipliers: Vec<f64>,
    },
    Dice {
        roll: u8,
        target: u8,
        is_over: bool,
    },
}

impl GameMetadata {
    pub fn mines(mines: Vec<u8>, grid_size: usize, mine_count: usize) -> Self {
        GameMetadata::Mines {
            mines,
            grid_size,
            mine_count,
            revealed: Vec::new(),
            multipliers: MINE_MULTIPLIERS.to_vec(),
        }
    }

    pub fn dice(roll: u8) -> Self {
        // Target and direction are bound at play time; these are the
        // pre-play defaults shown to the client.
        GameMetadata::Dice {
            roll,
            target: 50,
            is_over: false,
        }
    }
}

/// One wagering session. Created on bet, terminal on settlement.
///
/// The fair-RNG header (`client_seed`, `server_seed`, `server_hash`,
/// `nonce`, `final_hash`) is frozen at creation. `server_seed` is kept in
/// the persisted record so verification survives seed rotation, but must
/// never leave the server on a session response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameSession {
    pub id: String,
    pub user_id: i64,
    pub game_type: GameType,
    pub bet_amount: f64,

    pub multiplier: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cashout_at: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crash_point: Option<f64>,

    pub client_seed: String,
    pub server_seed: String,
    pub server_hash: String,
    pub nonce: i64,
    pub final_hash: String,

    pub status: GameStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,

    pub metadata: GameMetadata,
}

impl GameSession {
    pub fn is_active(&self) -> bool {
        self.status == GameStatus::Active
    }

    /// Write the terminal state. Callers must hold the session's writer
    /// role (the instance mutex for live games).
    pub fn finish(&mut self, status: GameStatus) {
        let now = Utc::now();
        self.status = status;
        self.updated_at = now;
        self.ended_at = Some(now);
    }

    /// Gross payout for history views: only cashed-out (or completed
    /// dice wins, which set `cashout_at`) sessions paid anything.
    pub fn payout(&self) -> f64 {
        match self.cashout_at {
            Some(m) if m > 0.0 => self.bet_amount * m,
            _ => 0.0,
        }
    }
}

/// Bet placement request. The game type crosses the wire as a raw
/// string and is validated by the engine, so an unsupported value
/// surfaces as a structured `game_type_unsupported` error rather than a
/// deserialization rejection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetRequest {
    pub game_type: String,
    pub amount: f64,
}

/// Crash cashout outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashoutOutcome {
    pub game_id: String,
    pub win: bool,
    pub multiplier: f64,
    pub payout: f64,
    pub new_balance: f64,
}

/// Single mines reveal outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevealOutcome {
    pub game_id: String,
    pub is_mine: bool,
    pub position: u8,
    pub multiplier: f64,
    pub revealed: Vec<u8>,
    pub revealed_count: usize,
    pub mines_left: usize,
    pub game_over: bool,
    pub status: GameStatus,
    /// Full layout, disclosed only once the game is lost.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mine_positions: Option<Vec<u8>>,
}

/// Mines cashout outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinesCashoutOutcome {
    pub game_id: String,
    pub multiplier: f64,
    pub bet_amount: f64,
    pub winnings: f64,
    pub revealed_count: usize,
    pub new_balance: f64,
    pub status: GameStatus,
}

/// Dice resolution outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiceOutcome {
    pub game_id: String,
    pub roll: u8,
    pub target: u8,
    pub over: bool,
    pub win: bool,
    pub multiplier: f64,
    pub payout: f64,
    pub new_balance: f64,
    pub status: GameStatus,
}

/// Data a client needs to audit upcoming games
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationData {
    pub client_seed: String,
    pub server_hash: String,
    pub current_nonce: i64,
    pub user_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_round_trips_with_tag() {
        let meta = GameMetadata::mines(vec![3, 7, 19], 25, 3);
        let encoded = serde_json::to_value(&meta).unwrap();
        assert_eq!(encoded["game"], "mines");
        assert_eq!(encoded["grid_size"], 25);

        let decoded: GameMetadata = serde_json::from_value(encoded).unwrap();
        assert_eq!(meta, decoded);
    }

    #[test]
    fn test_mine_multiplier_table() {
        assert_eq!(mine_multiplier(0), 1.0);
        assert_eq!(mine_multiplier(2), 1.3);
        assert_eq!(mine_multiplier(11), 750.0);
        assert_eq!(mine_multiplier(12), 0.0);
    }

    #[test]
    fn test_game_type_parses_wire_names() {
        assert_eq!("crash".parse(), Ok(GameType::Crash));
        assert_eq!("mines".parse(), Ok(GameType::Mines));
        assert_eq!("dice".parse(), Ok(GameType::Dice));
        assert_eq!("aviator".parse::<GameType>(), Err(()));
    }

    #[test]
    fn test_status_terminality() {
        assert!(!GameStatus::Active.is_terminal());
        for status in [
            GameStatus::CashedOut,
            GameStatus::Crashed,
            GameStatus::Lost,
            GameStatus::Completed,
        ] {
            assert!(status.is_terminal());
        }
    }

    #[test]
    fn test_payout_requires_cashout() {
        let mut session = GameSession {
            id: "g".to_string(),
            user_id: 1,
            game_type: GameType::Crash,
            bet_amount: 1_000.0,
            multiplier: 1.5,
            cashout_at: None,
            crash_point: Some(2.0),
            client_seed: String::new(),
            server_seed: String::new(),
            server_hash: String::new(),
            nonce: 0,
            final_hash: String::new(),
            status: GameStatus::Crashed,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            ended_at: None,
            metadata: GameMetadata::Crash,
        };

        assert_eq!(session.payout(), 0.0);

        session.cashout_at = Some(1.5);
        assert_eq!(session.payout(), 1_500.0);
    }
}
