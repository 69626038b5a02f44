//! Game engine
//!
//! Owns the active-game registry and every game lifecycle: bet
//! placement, the crash tick loop, cashouts, mine reveals, dice
//! resolution and the stale-game reaper. The persisted session is the
//! source of truth; registry instances exist to serialize writers and
//! drive the real-time loop.
//!
//! Per-game serialization: all writers (tick loop, cashout, reveal,
//! reaper) lock the instance's session mutex, and a terminal status
//! written under that lock is the unique commit point. Exactly one
//! terminal transition can win.

use crate::broadcast::Broadcaster;
use crate::config::EngineConfig;
use crate::errors::{AuthError, EngineResult, ResourceError, StateError, ValidationError};
use crate::games::fair::{FairRng, VerifiedOutcome};
use crate::games::settlement::Settlement;
use crate::games::types::{
    mine_multiplier, BetRequest, CashoutOutcome, DiceOutcome, GameMetadata, GameSession,
    GameStatus, GameType, MinesCashoutOutcome, RevealOutcome, VerificationData,
};
use crate::models::{BetPattern, Wallet};
use crate::store::KvStore;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const RATE_WINDOW: Duration = Duration::from_secs(60);

/// One live game tracked in the process-local registry.
pub struct GameInstance {
    session: Mutex<GameSession>,
    stop: Notify,
    started_at: DateTime<Utc>,
    last_update: AtomicI64,
}

impl GameInstance {
    fn new(session: GameSession) -> Self {
        let now = Utc::now();
        Self {
            session: Mutex::new(session),
            stop: Notify::new(),
            started_at: now,
            last_update: AtomicI64::new(now.timestamp()),
        }
    }

    fn touch(&self) {
        self.last_update
            .store(Utc::now().timestamp(), Ordering::Relaxed);
    }

    fn idle_secs(&self) -> i64 {
        Utc::now().timestamp() - self.last_update.load(Ordering::Relaxed)
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

/// Server-authoritative game engine.
pub struct GameEngine {
    store: KvStore,
    fair: FairRng,
    settlement: Settlement,
    broadcaster: Arc<dyn Broadcaster>,
    config: EngineConfig,
    active_games: DashMap<String, Arc<GameInstance>>,
}

impl GameEngine {
    pub fn new(
        store: KvStore,
        broadcaster: Arc<dyn Broadcaster>,
        config: EngineConfig,
    ) -> Arc<Self> {
        let seed = crate::games::fair::generate_server_seed();
        Self::with_server_seed(store, broadcaster, config, seed)
    }

    /// Engine with an explicit server seed, for operational seed
    /// management and deterministic tests.
    pub fn with_server_seed(
        store: KvStore,
        broadcaster: Arc<dyn Broadcaster>,
        config: EngineConfig,
        server_seed: String,
    ) -> Arc<Self> {
        let settlement = Settlement::new(store.clone());
        Arc::new(Self {
            store,
            fair: FairRng::new(server_seed, config.house_edge),
            settlement,
            broadcaster,
            config,
            active_games: DashMap::new(),
        })
    }

    /// Published commitment to the current server seed.
    pub fn server_hash(&self) -> String {
        self.fair.server_hash()
    }

    /// Current server seed. Reveal channel only — never on a session
    /// response.
    pub fn current_server_seed(&self) -> String {
        self.fair.current_seed()
    }

    /// Swap the server seed. Sessions already minted stay verifiable
    /// against the seed frozen in their records.
    pub fn rotate_server_seed(&self, new_seed: String) {
        info!("rotating server seed");
        self.fair.rotate(new_seed);
    }

    // ---- Bet placement ------------------------------------------------

    pub async fn place_bet(
        self: &Arc<Self>,
        user_id: i64,
        req: &BetRequest,
    ) -> EngineResult<GameSession> {
        let game_type: GameType = req
            .game_type
            .parse()
            .map_err(|()| ValidationError::GameTypeUnsupported(req.game_type.clone()))?;

        if req.amount < self.config.min_bet || req.amount > self.config.max_bet {
            return Err(ValidationError::BetOutOfRange {
                amount: req.amount,
                min: self.config.min_bet,
                max: self.config.max_bet,
            }
            .into());
        }

        if !self
            .store
            .check_rate_limit(user_id, "bet", self.config.bet_rate_per_min, RATE_WINDOW)
            .await?
        {
            return Err(ResourceError::RateLimited {
                action: "bet".to_string(),
            }
            .into());
        }

        let wallet = self
            .store
            .get_or_create_wallet(user_id, &self.fair.server_hash())
            .await?;

        if wallet.balance < req.amount {
            return Err(ResourceError::InsufficientBalance {
                have: wallet.balance,
                need: req.amount,
            }
            .into());
        }

        self.store.lock_balance_for_game(user_id, req.amount).await?;

        if let Err(e) = self.store.record_bet_pattern(
            user_id,
            BetPattern {
                amount: req.amount,
                game_type,
                timestamp: Utc::now().timestamp(),
            },
        ) {
            warn!(user_id, error = %e, "failed to record bet pattern");
        }

        // The fair-RNG header freezes the wallet's seeds and nonce as
        // they were at bet time.
        let session = self.build_session(&wallet, game_type, req.amount);

        if let Err(e) = self.store.save_game_session(&session) {
            self.compensate_failed_bet(user_id, req.amount).await;
            return Err(e);
        }

        if let Err(e) = self.store.increment_nonce(user_id).await {
            self.compensate_failed_bet(user_id, req.amount).await;
            return Err(e);
        }

        self.start_game(session.clone());

        info!(
            user_id,
            game_id = %session.id,
            game_type = %session.game_type,
            amount = req.amount,
            nonce = session.nonce,
            "bet placed"
        );

        Ok(session)
    }

    fn build_session(&self, wallet: &Wallet, game_type: GameType, amount: f64) -> GameSession {
        let (crash_point, metadata, final_hash) = match game_type {
            GameType::Crash => {
                let (crash_point, hash) =
                    self.fair.crash_outcome(&wallet.client_seed, wallet.nonce);
                (Some(crash_point), GameMetadata::Crash, hash)
            }
            GameType::Mines => {
                let (mines, hash) = self.fair.mines_outcome(
                    &wallet.client_seed,
                    wallet.nonce,
                    self.config.mine_count,
                    self.config.grid_size,
                );
                (
                    None,
                    GameMetadata::mines(mines, self.config.grid_size, self.config.mine_count),
                    hash,
                )
            }
            GameType::Dice => {
                let (roll, hash) = self.fair.dice_outcome(&wallet.client_seed, wallet.nonce);
                (None, GameMetadata::dice(roll), hash)
            }
        };

        let now = Utc::now();
        GameSession {
            id: Uuid::new_v4().to_string(),
            user_id: wallet.user_id,
            game_type,
            bet_amount: amount,
            multiplier: 1.0,
            cashout_at: None,
            crash_point,
            client_seed: wallet.client_seed.clone(),
            server_seed: self.fair.current_seed(),
            server_hash: self.fair.server_hash(),
            nonce: wallet.nonce,
            final_hash,
            status: GameStatus::Active,
            created_at: now,
            updated_at: now,
            ended_at: None,
            metadata,
        }
    }

    /// Never leave funds locked on a failed bet path. If even the
    /// compensating release fails, the reaper repairs the residue.
    async fn compensate_failed_bet(&self, user_id: i64, amount: f64) {
        if let Err(e) = self
            .store
            .release_balance_from_game(user_id, amount, false, 0.0)
            .await
        {
            error!(user_id, amount, error = %e, "compensating release failed");
        }
    }

    fn start_game(self: &Arc<Self>, session: GameSession) {
        let game_type = session.game_type;
        let game_id = session.id.clone();
        let instance = Arc::new(GameInstance::new(session));
        self.active_games.insert(game_id, instance.clone());

        // Mines and dice are request-driven; only crash needs a runner.
        if game_type == GameType::Crash {
            let engine = Arc::clone(self);
            tokio::spawn(async move {
                engine.run_crash_game(instance).await;
            });
        }
    }

    // ---- Crash --------------------------------------------------------

    async fn run_crash_game(self: Arc<Self>, instance: Arc<GameInstance>) {
        let period = Duration::from_millis(self.config.crash_tick_ms);
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let mut session = instance.session.lock().await;

                    // A cashout may have committed between ticks; exit
                    // without touching the record again.
                    if !session.is_active() {
                        return;
                    }

                    session.multiplier += self.config.crash_tick_increment;
                    instance.touch();

                    if let Err(e) = self.store.update_game_session(&mut session) {
                        warn!(game_id = %session.id, error = %e, "tick persistence failed");
                    }
                    self.broadcaster
                        .broadcast_game_update(&session.id, session.multiplier);

                    let crash_point = session.crash_point.unwrap_or(f64::MAX);
                    if session.multiplier >= crash_point {
                        session.finish(GameStatus::Crashed);
                        let snapshot = session.clone();
                        drop(session);

                        self.finalize_crash(snapshot).await;
                        return;
                    }
                }
                _ = instance.stop.notified() => {
                    return;
                }
            }
        }
    }

    /// Persist, settle and announce a crashed session. The caller has
    /// already committed the terminal status under the session lock.
    async fn finalize_crash(&self, mut session: GameSession) {
        if let Err(e) = self.store.update_game_session(&mut session) {
            error!(game_id = %session.id, error = %e, "failed to persist crash");
        }

        if let Err(e) = self
            .settlement
            .settle_loss(&session, format!("Placed bet on {}", session.game_type))
            .await
        {
            error!(game_id = %session.id, error = %e, "crash settlement failed");
        }

        self.broadcaster
            .broadcast_game_crash(&session.id, session.crash_point.unwrap_or_default());
        self.active_games.remove(&session.id);

        debug!(game_id = %session.id, crash_point = session.crash_point, "game crashed");
    }

    pub async fn cashout(&self, user_id: i64, game_id: &str) -> EngineResult<CashoutOutcome> {
        if !self
            .store
            .check_rate_limit(
                user_id,
                "cashout",
                self.config.cashout_rate_per_min,
                RATE_WINDOW,
            )
            .await?
        {
            return Err(ResourceError::RateLimited {
                action: "cashout".to_string(),
            }
            .into());
        }

        let Some(instance) = self.active_games.get(game_id).map(|e| e.value().clone()) else {
            // Registry miss: either the game finished (most likely) or
            // this process never owned it.
            let session = self.store.get_game_session(game_id)?;
            if session.status.is_terminal() {
                return Err(StateError::GameAlreadyEnded(game_id.to_string()).into());
            }
            return Err(StateError::GameNotActive(game_id.to_string()).into());
        };

        let mut session = instance.session.lock().await;

        if session.user_id != user_id {
            return Err(AuthError::NotOwner {
                game_id: game_id.to_string(),
            }
            .into());
        }

        // Ties against an in-flight crash resolve here: the tick loop
        // commits `crashed` under this same lock, so a late cashout
        // observes the terminal status and loses.
        if !session.is_active() {
            return Err(StateError::GameAlreadyEnded(game_id.to_string()).into());
        }

        let multiplier = session.multiplier;
        let winnings = session.bet_amount * multiplier;

        session.cashout_at = Some(multiplier);
        session.finish(GameStatus::CashedOut);
        instance.stop.notify_waiters();

        if let Err(e) = self.store.update_game_session(&mut session) {
            warn!(game_id, error = %e, "cashout persistence failed");
        }

        let snapshot = session.clone();
        drop(session);

        let wallet = match self
            .settlement
            .settle_win(
                &snapshot,
                winnings,
                format!(
                    "Won {:.2} on {} ({:.2}x)",
                    winnings, snapshot.game_type, multiplier
                ),
            )
            .await
        {
            Ok(wallet) => wallet,
            Err(e) => {
                // The release did not go through; put the session back
                // in play so the reaper can resolve it.
                let mut session = instance.session.lock().await;
                session.status = GameStatus::Active;
                session.cashout_at = None;
                session.ended_at = None;
                let _ = self.store.update_game_session(&mut session);
                return Err(e);
            }
        };

        self.active_games.remove(game_id);

        info!(user_id, game_id, multiplier, payout = winnings, "cashed out");

        Ok(CashoutOutcome {
            game_id: game_id.to_string(),
            win: true,
            multiplier,
            payout: winnings,
            new_balance: wallet.balance,
        })
    }

    // ---- Mines --------------------------------------------------------

    pub async fn reveal_mine(
        &self,
        user_id: i64,
        game_id: &str,
        position: i64,
    ) -> EngineResult<RevealOutcome> {
        if !(0..25).contains(&position) {
            return Err(ValidationError::PositionOutOfRange { position }.into());
        }
        let position = position as u8;

        if !self
            .store
            .check_rate_limit(
                user_id,
                "reveal",
                self.config.reveal_rate_per_min,
                RATE_WINDOW,
            )
            .await?
        {
            return Err(ResourceError::RateLimited {
                action: "reveal".to_string(),
            }
            .into());
        }

        let instance = self.instance_for(game_id)?;
        let mut session = instance.session.lock().await;

        self.authorize_turn(&session, user_id, game_id, GameType::Mines)?;

        let GameMetadata::Mines {
            mines, revealed, ..
        } = &mut session.metadata
        else {
            return Err(ValidationError::InvalidRequest("mine data missing".to_string()).into());
        };

        if revealed.contains(&position) {
            return Err(ValidationError::PositionAlreadyRevealed { position }.into());
        }

        revealed.push(position);
        let is_mine = mines.contains(&position);
        let mine_positions = mines.clone();
        let revealed_now = revealed.clone();
        let revealed_count = revealed_now.len();
        let multiplier = mine_multiplier(revealed_count);
        instance.touch();

        if is_mine {
            session.finish(GameStatus::Lost);
            self.store.update_game_session(&mut session)?;
            let snapshot = session.clone();
            drop(session);

            self.settlement
                .settle_loss(
                    &snapshot,
                    format!("Lost mines game at position {}", position),
                )
                .await?;
            self.active_games.remove(game_id);

            info!(user_id, game_id, position, "mine hit");

            return Ok(RevealOutcome {
                game_id: game_id.to_string(),
                is_mine: true,
                position,
                multiplier,
                revealed: revealed_now,
                revealed_count,
                mines_left: mine_positions.len(),
                game_over: true,
                status: GameStatus::Lost,
                mine_positions: Some(mine_positions),
            });
        }

        session.multiplier = multiplier;
        self.store.update_game_session(&mut session)?;

        Ok(RevealOutcome {
            game_id: game_id.to_string(),
            is_mine: false,
            position,
            multiplier,
            revealed: revealed_now,
            revealed_count,
            mines_left: mine_positions.len(),
            game_over: false,
            status: GameStatus::Active,
            mine_positions: None,
        })
    }

    pub async fn cashout_mines(
        &self,
        user_id: i64,
        game_id: &str,
    ) -> EngineResult<MinesCashoutOutcome> {
        if !self
            .store
            .check_rate_limit(
                user_id,
                "cashout",
                self.config.cashout_rate_per_min,
                RATE_WINDOW,
            )
            .await?
        {
            return Err(ResourceError::RateLimited {
                action: "cashout".to_string(),
            }
            .into());
        }

        let instance = self.instance_for(game_id)?;
        let mut session = instance.session.lock().await;

        self.authorize_turn(&session, user_id, game_id, GameType::Mines)?;

        let GameMetadata::Mines { revealed, .. } = &session.metadata else {
            return Err(ValidationError::InvalidRequest("mine data missing".to_string()).into());
        };

        // Cashing out before any reveal is allowed and pays the stake back.
        let revealed_count = revealed.len();
        let multiplier = mine_multiplier(revealed_count);
        let winnings = session.bet_amount * multiplier;

        session.multiplier = multiplier;
        session.cashout_at = Some(multiplier);
        session.finish(GameStatus::CashedOut);
        self.store.update_game_session(&mut session)?;

        let snapshot = session.clone();
        drop(session);

        let wallet = self
            .settlement
            .settle_win(
                &snapshot,
                winnings,
                format!(
                    "Mines cashout at {:.2}x with {} reveals",
                    multiplier, revealed_count
                ),
            )
            .await?;
        self.active_games.remove(game_id);

        info!(user_id, game_id, multiplier, payout = winnings, "mines cashed out");

        Ok(MinesCashoutOutcome {
            game_id: game_id.to_string(),
            multiplier,
            bet_amount: snapshot.bet_amount,
            winnings,
            revealed_count,
            new_balance: wallet.balance,
            status: GameStatus::CashedOut,
        })
    }

    // ---- Dice ---------------------------------------------------------

    pub async fn play_dice(
        &self,
        user_id: i64,
        game_id: &str,
        target: i64,
        over: bool,
    ) -> EngineResult<DiceOutcome> {
        if !(1..=95).contains(&target) {
            return Err(ValidationError::TargetOutOfRange { target }.into());
        }
        let target = target as u8;

        // Dice plays share the bet counter.
        if !self
            .store
            .check_rate_limit(user_id, "bet", self.config.bet_rate_per_min, RATE_WINDOW)
            .await?
        {
            return Err(ResourceError::RateLimited {
                action: "bet".to_string(),
            }
            .into());
        }

        let instance = self.instance_for(game_id)?;
        let mut session = instance.session.lock().await;

        self.authorize_turn(&session, user_id, game_id, GameType::Dice)?;

        let GameMetadata::Dice { roll, .. } = &session.metadata else {
            return Err(ValidationError::InvalidRequest("dice data missing".to_string()).into());
        };
        let roll = *roll;

        let win = if over { roll > target } else { roll < target };

        // 1% house edge over the win probability in percent.
        let win_probability = if over { 99 - target as i64 } else { target as i64 } as f64;
        let multiplier = (99.0 / win_probability * 100.0).floor() / 100.0;
        let payout = if win { session.bet_amount * multiplier } else { 0.0 };

        session.metadata = GameMetadata::Dice {
            roll,
            target,
            is_over: over,
        };
        if win {
            session.multiplier = multiplier;
            session.cashout_at = Some(multiplier);
        }
        session.finish(GameStatus::Completed);
        self.store.update_game_session(&mut session)?;

        let snapshot = session.clone();
        drop(session);

        let wallet = if win {
            self.settlement
                .settle_win(
                    &snapshot,
                    payout,
                    format!("Won {:.2} on dice roll {} ({:.2}x)", payout, roll, multiplier),
                )
                .await?
        } else {
            self.settlement
                .settle_loss(&snapshot, "Placed bet on dice".to_string())
                .await?
        };
        self.active_games.remove(game_id);

        info!(user_id, game_id, roll, target, over, win, payout, "dice resolved");

        Ok(DiceOutcome {
            game_id: game_id.to_string(),
            roll,
            target,
            over,
            win,
            multiplier,
            payout,
            new_balance: wallet.balance,
            status: GameStatus::Completed,
        })
    }

    // ---- Queries ------------------------------------------------------

    pub async fn balance(&self, user_id: i64) -> EngineResult<Wallet> {
        self.store
            .get_or_create_wallet(user_id, &self.fair.server_hash())
            .await
    }

    pub fn user_active_games(&self, user_id: i64) -> EngineResult<Vec<GameSession>> {
        let game_ids = self.store.get_user_active_games(user_id)?;
        let sessions = self.store.bulk_get_sessions(&game_ids);
        Ok(sessions.into_iter().filter(|s| s.is_active()).collect())
    }

    pub fn game_history(&self, user_id: i64, limit: usize) -> EngineResult<Vec<GameSession>> {
        self.store.get_game_history(user_id, limit)
    }

    pub fn transactions(
        &self,
        user_id: i64,
        limit: usize,
    ) -> EngineResult<Vec<crate::models::Transaction>> {
        self.store.get_user_transactions(user_id, limit)
    }

    pub async fn verification_data(&self, user_id: i64) -> EngineResult<VerificationData> {
        let wallet = self.balance(user_id).await?;
        Ok(VerificationData {
            client_seed: wallet.client_seed,
            server_hash: self.fair.server_hash(),
            current_nonce: wallet.nonce,
            user_id,
        })
    }

    /// Pure re-derivation from caller-supplied material.
    pub fn verify(
        &self,
        client_seed: &str,
        server_seed: &str,
        nonce: i64,
        game_type: GameType,
    ) -> VerifiedOutcome {
        FairRng::verify(
            server_seed,
            client_seed,
            nonce,
            game_type,
            self.config.house_edge,
        )
    }

    // ---- Registry maintenance -----------------------------------------

    /// Registry lookup, reviving a detached instance from the persisted
    /// record so a restarted process can keep serving turn-based games.
    fn instance_for(&self, game_id: &str) -> EngineResult<Arc<GameInstance>> {
        if let Some(entry) = self.active_games.get(game_id) {
            return Ok(entry.value().clone());
        }

        let session = self.store.get_game_session(game_id)?;
        let instance = Arc::new(GameInstance::new(session));
        self.active_games
            .insert(game_id.to_string(), instance.clone());
        Ok(instance)
    }

    fn authorize_turn(
        &self,
        session: &GameSession,
        user_id: i64,
        game_id: &str,
        expected: GameType,
    ) -> EngineResult<()> {
        if session.user_id != user_id {
            return Err(AuthError::NotOwner {
                game_id: game_id.to_string(),
            }
            .into());
        }
        if session.game_type != expected {
            return Err(ValidationError::InvalidRequest(format!(
                "game {} is {}, not {}",
                game_id, session.game_type, expected
            ))
            .into());
        }
        if !session.is_active() {
            return Err(StateError::GameNotActive(game_id.to_string()).into());
        }
        Ok(())
    }

    /// Force a live game to the crashed/lost terminal state. Used by the
    /// reaper; follows the same serialized path as a natural crash.
    pub async fn force_crash(&self, game_id: &str) -> EngineResult<()> {
        let Some(instance) = self.active_games.get(game_id).map(|e| e.value().clone()) else {
            return Err(StateError::GameNotActive(game_id.to_string()).into());
        };

        let mut session = instance.session.lock().await;
        if !session.is_active() {
            self.active_games.remove(game_id);
            return Ok(());
        }

        session.finish(GameStatus::Crashed);
        instance.stop.notify_waiters();
        let snapshot = session.clone();
        drop(session);

        warn!(game_id, "force-crashing game");
        self.finalize_crash(snapshot).await;
        Ok(())
    }

    /// Reap registry entries idle for at least `max_age`.
    pub async fn cleanup_stale_games(&self, max_age: Duration) {
        let stale: Vec<String> = self
            .active_games
            .iter()
            .filter(|entry| entry.value().idle_secs() >= max_age.as_secs() as i64)
            .map(|entry| entry.key().clone())
            .collect();

        for game_id in stale {
            if let Err(e) = self.force_crash(&game_id).await {
                warn!(game_id = %game_id, error = %e, "stale-game reap failed");
            }
        }
    }

    /// Periodic stale-game reaper.
    pub fn spawn_reaper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let engine = Arc::clone(self);
        let interval = Duration::from_secs(engine.config.reaper_interval_secs);
        let max_age = Duration::from_secs(engine.config.stale_game_max_age_secs);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // skip the immediate tick

            loop {
                ticker.tick().await;
                engine.cleanup_stale_games(max_age).await;
            }
        })
    }

    /// Number of games currently registered in this process.
    pub fn registry_len(&self) -> usize {
        self.active_games.len()
    }
}
