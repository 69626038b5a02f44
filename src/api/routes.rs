//! Route definitions
//!
//! Maps URLs to handlers. Game routes sit behind the authenticated-
//! identity middleware; `/health` and `/api/games/verify` are public
//! (verification is a pure function anyone may call).

use super::{handlers::*, middleware::user_id_middleware};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Build the API router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    let game_routes = Router::new()
        .route("/bet", post(place_bet_handler))
        .route("/cashout", post(cashout_handler))
        .route("/mines/reveal", post(reveal_mine_handler))
        .route("/mines/cashout", post(cashout_mines_handler))
        .route("/dice/play", post(play_dice_handler))
        .route("/balance", get(balance_handler))
        .route("/active", get(active_games_handler))
        .route("/history", get(history_handler))
        .route("/transactions", get(transactions_handler))
        .route("/verification", get(verification_data_handler))
        .layer(middleware::from_fn(user_id_middleware))
        // Added after the identity layer: verification is pure and public.
        .route("/verify", post(verify_handler));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/api/games", game_routes)
        .with_state(state)
}
