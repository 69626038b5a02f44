//! Request handlers
//!
//! Translate HTTP requests into engine operations and engine errors
//! into status-mapped responses.

use super::{
    errors::ApiError,
    middleware::{RequestId, UserId},
    models::*,
};
use crate::games::types::{BetRequest, CashoutOutcome, DiceOutcome, MinesCashoutOutcome, RevealOutcome, VerificationData};
use crate::games::GameEngine;
use axum::{
    extract::{Query, State},
    Extension, Json,
};
use std::sync::Arc;

/// Shared application state
pub struct AppState {
    pub engine: Arc<GameEngine>,
}

/// Health check handler
/// GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "Running".to_string(),
    })
}

/// Place a bet and start the game lifecycle
/// POST /api/games/bet
pub async fn place_bet_handler(
    Extension(request_id): Extension<RequestId>,
    Extension(UserId(user_id)): Extension<UserId>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<BetRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state
        .engine
        .place_bet(user_id, &request)
        .await
        .map_err(|e| ApiError::new(request_id.0.clone(), e))?;

    Ok(Json(SessionResponse::from(&session)))
}

/// Cash out a running crash game
/// POST /api/games/cashout
pub async fn cashout_handler(
    Extension(request_id): Extension<RequestId>,
    Extension(UserId(user_id)): Extension<UserId>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<CashoutRequest>,
) -> Result<Json<CashoutOutcome>, ApiError> {
    let outcome = state
        .engine
        .cashout(user_id, &request.game_id)
        .await
        .map_err(|e| ApiError::new(request_id.0.clone(), e))?;

    Ok(Json(outcome))
}

/// Reveal one minefield cell
/// POST /api/games/mines/reveal
pub async fn reveal_mine_handler(
    Extension(request_id): Extension<RequestId>,
    Extension(UserId(user_id)): Extension<UserId>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<RevealRequest>,
) -> Result<Json<RevealOutcome>, ApiError> {
    let outcome = state
        .engine
        .reveal_mine(user_id, &request.game_id, request.position)
        .await
        .map_err(|e| ApiError::new(request_id.0.clone(), e))?;

    Ok(Json(outcome))
}

/// Cash out a mines game at the current reveal count
/// POST /api/games/mines/cashout
pub async fn cashout_mines_handler(
    Extension(request_id): Extension<RequestId>,
    Extension(UserId(user_id)): Extension<UserId>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<CashoutRequest>,
) -> Result<Json<MinesCashoutOutcome>, ApiError> {
    let outcome = state
        .engine
        .cashout_mines(user_id, &request.game_id)
        .await
        .map_err(|e| ApiError::new(request_id.0.clone(), e))?;

    Ok(Json(outcome))
}

/// Resolve a dice session against a target
/// POST /api/games/dice/play
pub async fn play_dice_handler(
    Extension(request_id): Extension<RequestId>,
    Extension(UserId(user_id)): Extension<UserId>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<DicePlayRequest>,
) -> Result<Json<DiceOutcome>, ApiError> {
    let outcome = state
        .engine
        .play_dice(user_id, &request.game_id, request.target, request.over)
        .await
        .map_err(|e| ApiError::new(request_id.0.clone(), e))?;

    Ok(Json(outcome))
}

/// Wallet balances and fair-RNG header
/// GET /api/games/balance
pub async fn balance_handler(
    Extension(request_id): Extension<RequestId>,
    Extension(UserId(user_id)): Extension<UserId>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let wallet = state
        .engine
        .balance(user_id)
        .await
        .map_err(|e| ApiError::new(request_id.0.clone(), e))?;

    Ok(Json(BalanceResponse::from_wallet(
        &wallet,
        state.engine.server_hash(),
    )))
}

/// Active sessions for the caller
/// GET /api/games/active
pub async fn active_games_handler(
    Extension(request_id): Extension<RequestId>,
    Extension(UserId(user_id)): Extension<UserId>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<ActiveGamesResponse>, ApiError> {
    let sessions = state
        .engine
        .user_active_games(user_id)
        .map_err(|e| ApiError::new(request_id.0.clone(), e))?;

    let games: Vec<SessionResponse> = sessions.iter().map(SessionResponse::from).collect();
    let count = games.len();

    Ok(Json(ActiveGamesResponse { games, count }))
}

/// Completed sessions, newest first
/// GET /api/games/history?limit={n}
pub async fn history_handler(
    Extension(request_id): Extension<RequestId>,
    Extension(UserId(user_id)): Extension<UserId>,
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let sessions = state
        .engine
        .game_history(user_id, query.limit)
        .map_err(|e| ApiError::new(request_id.0.clone(), e))?;

    let games: Vec<HistoryEntry> = sessions.iter().map(HistoryEntry::from).collect();
    let count = games.len();

    Ok(Json(HistoryResponse { games, count }))
}

/// Settlement audit trail, newest first
/// GET /api/games/transactions?limit={n}
pub async fn transactions_handler(
    Extension(request_id): Extension<RequestId>,
    Extension(UserId(user_id)): Extension<UserId>,
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<TransactionsResponse>, ApiError> {
    let transactions = state
        .engine
        .transactions(user_id, query.limit)
        .map_err(|e| ApiError::new(request_id.0.clone(), e))?;

    let count = transactions.len();
    Ok(Json(TransactionsResponse {
        transactions,
        count,
    }))
}

/// Seeds and nonce a client needs before auditing
/// GET /api/games/verification
pub async fn verification_data_handler(
    Extension(request_id): Extension<RequestId>,
    Extension(UserId(user_id)): Extension<UserId>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<VerificationData>, ApiError> {
    let data = state
        .engine
        .verification_data(user_id)
        .await
        .map_err(|e| ApiError::new(request_id.0.clone(), e))?;

    Ok(Json(data))
}

/// Pure outcome re-derivation for provably-fair auditing
/// POST /api/games/verify
pub async fn verify_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<VerifyRequest>,
) -> Json<VerifyResponse> {
    let outcome = state.engine.verify(
        &request.client_seed,
        &request.server_seed,
        request.nonce,
        request.game_type,
    );

    Json(VerifyResponse {
        valid: true,
        game_type: request.game_type,
        client_seed: request.client_seed,
        server_seed: request.server_seed,
        nonce: request.nonce,
        crash_point: outcome.crash_point,
        mine_positions: outcome.mine_positions,
        roll: outcome.roll,
        calculated_hash: outcome.calculated_hash,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::NoopBroadcaster;
    use crate::config::EngineConfig;
    use crate::games::types::GameType;
    use crate::storage::Storage;
    use crate::store::KvStore;
    use std::fs;

    fn test_state(name: &str) -> Arc<AppState> {
        let path = format!("./DB/test_handlers_{}", name);
        let _ = fs::remove_dir_all(&path);
        let store = KvStore::new(Storage::open(&path).expect("open storage"));
        let engine = GameEngine::new(store, Arc::new(NoopBroadcaster), EngineConfig::default());
        Arc::new(AppState { engine })
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await;
        assert_eq!(response.0.status, "Running");
    }

    #[tokio::test]
    async fn test_verify_handler_is_pure() {
        let state = test_state("verify");

        let request = VerifyRequest {
            client_seed: "aabbccdd".to_string(),
            server_seed: "00".repeat(32),
            nonce: 9,
            game_type: GameType::Crash,
        };

        let first = verify_handler(State(state.clone()), Json(request.clone())).await;
        let second = verify_handler(State(state), Json(request)).await;

        assert!(first.0.valid);
        assert!(first.0.crash_point.is_some());
        assert_eq!(first.0.calculated_hash, second.0.calculated_hash);
        assert_eq!(first.0.crash_point, second.0.crash_point);
    }

    #[tokio::test]
    async fn test_balance_handler_reports_fresh_wallet() {
        let state = test_state("balance");

        let response = balance_handler(
            Extension(RequestId("req".to_string())),
            Extension(UserId(42)),
            State(state),
        )
        .await
        .unwrap();

        assert_eq!(response.0.available, 10_000.0);
        assert_eq!(response.0.locked, 0.0);
        assert_eq!(response.0.nonce, 0);
        assert_eq!(response.0.server_hash.len(), 64);
    }
}
