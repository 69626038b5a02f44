//! Typed key-value store adapter
//!
//! Owns key templates, JSON encoding, record TTLs, the history indexes
//! and the two atomic wallet scripts. Everything the engine persists
//! goes through here; nothing else touches [`Storage`] directly.
//!
//! Atomicity: the original backing store ran lock/release as server-side
//! scripts. Single-process, the equivalent guarantee is a per-user async
//! mutex held across each read-modify-write body. Wallet state is never
//! mutated outside those bodies.

use crate::errors::{
    EngineError, EngineResult, NotFoundError, ResourceError, StorageError,
};
use crate::games::types::GameSession;
use crate::models::{BetPattern, Transaction, UserProfile, UserSession, Wallet};
use crate::storage::Storage;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::warn;

/// Key templates and record lifetimes.
pub mod keys {
    /// Game sessions live 7 days.
    pub const TTL_GAME_SESSION: i64 = 7 * 24 * 3600;
    /// Transactions live 30 days.
    pub const TTL_TRANSACTION: i64 = 30 * 24 * 3600;
    /// Authenticated sessions live 24 hours, refreshed on read.
    pub const TTL_USER_SESSION: i64 = 24 * 3600;
    /// User profiles live 30 days.
    pub const TTL_USER_INFO: i64 = 30 * 24 * 3600;

    /// History indexes keep the most recent N entries.
    pub const HISTORY_KEEP: usize = 100;
    /// Bet-pattern ring length.
    pub const PATTERN_KEEP: usize = 50;

    pub fn wallet(user_id: i64) -> String {
        format!("wallet:{}", user_id)
    }

    pub fn game_session(game_id: &str) -> String {
        format!("game:session:{}", game_id)
    }

    pub fn active_game(user_id: i64, game_id: &str) -> String {
        format!("user:{}:active:{}", user_id, game_id)
    }

    pub fn active_game_prefix(user_id: i64) -> String {
        format!("user:{}:active:", user_id)
    }

    pub fn completed_game(user_id: i64, score: i64, game_id: &str) -> String {
        format!(
            "user:{}:completed:{}:{}",
            user_id,
            inverted_score(score),
            game_id
        )
    }

    pub fn completed_game_prefix(user_id: i64) -> String {
        format!("user:{}:completed:", user_id)
    }

    pub fn transaction(tx_id: &str) -> String {
        format!("transaction:{}", tx_id)
    }

    pub fn user_transaction(user_id: i64, score: i64, tx_id: &str) -> String {
        format!("user:{}:tx:{}:{}", user_id, inverted_score(score), tx_id)
    }

    pub fn user_transaction_prefix(user_id: i64) -> String {
        format!("user:{}:tx:", user_id)
    }

    pub fn rate_limit(user_id: i64, action: &str) -> String {
        format!("ratelimit:{}:{}", user_id, action)
    }

    pub fn bet_patterns(user_id: i64) -> String {
        format!("patterns:{}:bets", user_id)
    }

    pub fn user_session(user_id: i64, session_id: &str) -> String {
        format!("user:{}:session:{}", user_id, session_id)
    }

    pub fn user_info(user_id: i64) -> String {
        format!("user:{}:info", user_id)
    }

    /// Unix-second score inverted so a forward prefix scan walks
    /// newest-first. Zero-padded to keep lexicographic == numeric order.
    fn inverted_score(unix_secs: i64) -> String {
        format!("{:020}", u64::MAX - unix_secs.max(0) as u64)
    }
}

/// TTL envelope wrapped around every persisted record. Expiry is lazy:
/// an expired record reads as absent and is deleted on sight.
#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<i64>,
    data: T,
}

/// Lookup result distinguishing a lapsed record from a missing one.
enum Fetched<T> {
    Present(T),
    Expired,
    Missing,
}

/// Typed store over RocksDB.
#[derive(Clone)]
pub struct KvStore {
    storage: Storage,
    user_locks: Arc<DashMap<i64, Arc<Mutex<()>>>>,
}

impl KvStore {
    pub fn new(storage: Storage) -> Self {
        Self {
            storage,
            user_locks: Arc::new(DashMap::new()),
        }
    }

    fn user_lock(&self, user_id: i64) -> Arc<Mutex<()>> {
        self.user_locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn put_json<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl_secs: Option<i64>,
    ) -> EngineResult<()> {
        let envelope = Envelope {
            expires_at: ttl_secs.map(|ttl| Utc::now().timestamp() + ttl),
            data: value,
        };
        let bytes = serde_json::to_vec(&envelope)?;
        self.storage
            .put(key.as_bytes(), &bytes)
            .map_err(|e| StorageError::WriteFailed(e.to_string()))?;
        Ok(())
    }

    fn fetch_json<T: DeserializeOwned>(&self, key: &str) -> EngineResult<Fetched<T>> {
        let Some(bytes) = self
            .storage
            .get(key.as_bytes())
            .map_err(|e| StorageError::Unavailable(e.to_string()))?
        else {
            return Ok(Fetched::Missing);
        };

        let envelope: Envelope<T> = serde_json::from_slice(&bytes).map_err(|e| {
            EngineError::Storage(StorageError::CorruptedData(format!("{}: {}", key, e)))
        })?;

        if let Some(expires_at) = envelope.expires_at {
            if expires_at <= Utc::now().timestamp() {
                let _ = self.storage.delete(key.as_bytes());
                return Ok(Fetched::Expired);
            }
        }

        Ok(Fetched::Present(envelope.data))
    }

    fn get_json<T: DeserializeOwned>(&self, key: &str) -> EngineResult<Option<T>> {
        match self.fetch_json(key)? {
            Fetched::Present(value) => Ok(Some(value)),
            Fetched::Expired | Fetched::Missing => Ok(None),
        }
    }

    // ---- Wallets ------------------------------------------------------

    /// Load a wallet, creating it with the starting balance on first
    /// access. `server_hash` seeds the new wallet's published commitment.
    pub async fn get_or_create_wallet(
        &self,
        user_id: i64,
        server_hash: &str,
    ) -> EngineResult<Wallet> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        if let Some(wallet) = self.get_json::<Wallet>(&keys::wallet(user_id))? {
            return Ok(wallet);
        }

        let wallet = Wallet::new(user_id, server_hash.to_string());
        self.put_json(&keys::wallet(user_id), &wallet, None)?;
        Ok(wallet)
    }

    /// Read-only wallet lookup.
    pub fn get_wallet(&self, user_id: i64) -> EngineResult<Wallet> {
        self.get_json::<Wallet>(&keys::wallet(user_id))?
            .ok_or_else(|| NotFoundError::WalletNotFound(user_id).into())
    }

    /// Atomic stake lock. Fails without side effects when funds are
    /// short; otherwise moves the stake out of `balance` into
    /// `locked_balance` and bumps `total_wagered`.
    pub async fn lock_balance_for_game(&self, user_id: i64, amount: f64) -> EngineResult<Wallet> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        let mut wallet = self.get_wallet(user_id)?;

        if wallet.balance < amount {
            return Err(ResourceError::InsufficientBalance {
                have: wallet.balance,
                need: amount,
            }
            .into());
        }

        wallet.balance -= amount;
        wallet.locked_balance += amount;
        wallet.total_wagered += amount;

        self.put_json(&keys::wallet(user_id), &wallet, None)?;
        Ok(wallet)
    }

    /// Atomic settlement release. `locked_balance` drops by the stake,
    /// floored at zero so a replayed release cannot corrupt the wallet.
    /// On a win the stake returns to balance together with the net
    /// winnings, and `total_won` grows by the net.
    pub async fn release_balance_from_game(
        &self,
        user_id: i64,
        amount: f64,
        won: bool,
        net_winnings: f64,
    ) -> EngineResult<Wallet> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        let mut wallet = self.get_wallet(user_id)?;

        if wallet.locked_balance < amount {
            warn!(
                user_id,
                locked = wallet.locked_balance,
                amount,
                "release exceeds locked balance, flooring at zero"
            );
        }
        wallet.locked_balance = (wallet.locked_balance - amount).max(0.0);

        if won {
            wallet.balance += amount + net_winnings;
            wallet.total_won += net_winnings;
        }

        self.put_json(&keys::wallet(user_id), &wallet, None)?;
        Ok(wallet)
    }

    /// Bump the fair-RNG nonce after a session has been persisted.
    pub async fn increment_nonce(&self, user_id: i64) -> EngineResult<Wallet> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        let mut wallet = self.get_wallet(user_id)?;
        wallet.nonce += 1;
        self.put_json(&keys::wallet(user_id), &wallet, None)?;
        Ok(wallet)
    }

    pub fn delete_wallet(&self, user_id: i64) -> EngineResult<()> {
        self.storage
            .delete(keys::wallet(user_id).as_bytes())
            .map_err(|e| StorageError::WriteFailed(e.to_string()))?;
        Ok(())
    }

    // ---- Game sessions ------------------------------------------------

    /// Persist a new session and add it to the user's active set.
    pub fn save_game_session(&self, session: &GameSession) -> EngineResult<()> {
        self.put_json(
            &keys::game_session(&session.id),
            session,
            Some(keys::TTL_GAME_SESSION),
        )?;
        self.put_json(
            &keys::active_game(session.user_id, &session.id),
            &session.id,
            Some(keys::TTL_GAME_SESSION),
        )?;
        Ok(())
    }

    pub fn get_game_session(&self, game_id: &str) -> EngineResult<GameSession> {
        match self.fetch_json::<GameSession>(&keys::game_session(game_id))? {
            Fetched::Present(session) => Ok(session),
            Fetched::Expired => Err(NotFoundError::SessionExpired(game_id.to_string()).into()),
            Fetched::Missing => Err(NotFoundError::GameNotFound(game_id.to_string()).into()),
        }
    }

    /// Rewrite an existing session record, stamping `updated_at`.
    pub fn update_game_session(&self, session: &mut GameSession) -> EngineResult<()> {
        // Refuse to resurrect a record that already lapsed.
        self.get_game_session(&session.id)?;

        session.updated_at = Utc::now();
        self.put_json(
            &keys::game_session(&session.id),
            session,
            Some(keys::TTL_GAME_SESSION),
        )
    }

    pub fn get_user_active_games(&self, user_id: i64) -> EngineResult<Vec<String>> {
        let prefix = keys::active_game_prefix(user_id);
        let hits = self.storage.scan_prefix(prefix.as_bytes(), usize::MAX);

        let mut game_ids = Vec::with_capacity(hits.len());
        for (key, _) in hits {
            let key = String::from_utf8_lossy(&key);
            if let Some(game_id) = key.strip_prefix(&prefix) {
                game_ids.push(game_id.to_string());
            }
        }
        Ok(game_ids)
    }

    /// Move a session from the active set into the completed index,
    /// trimming the index to the most recent entries.
    pub fn complete_game_session(
        &self,
        user_id: i64,
        game_id: &str,
        completed_at: DateTime<Utc>,
    ) -> EngineResult<()> {
        self.storage
            .delete(keys::active_game(user_id, game_id).as_bytes())
            .map_err(|e| StorageError::WriteFailed(e.to_string()))?;

        self.put_json(
            &keys::completed_game(user_id, completed_at.timestamp(), game_id),
            &game_id,
            Some(keys::TTL_GAME_SESSION),
        )?;

        self.trim_index(&keys::completed_game_prefix(user_id), keys::HISTORY_KEEP)
    }

    /// Completed sessions, newest first.
    pub fn get_game_history(&self, user_id: i64, limit: usize) -> EngineResult<Vec<GameSession>> {
        let limit = clamp_history_limit(limit);
        let prefix = keys::completed_game_prefix(user_id);
        let hits = self.storage.scan_prefix(prefix.as_bytes(), limit);

        let game_ids: Vec<String> = hits
            .into_iter()
            .filter_map(|(key, _)| {
                String::from_utf8_lossy(&key)
                    .rsplit(':')
                    .next()
                    .map(|id| id.to_string())
            })
            .collect();

        Ok(self.bulk_get_sessions(&game_ids))
    }

    /// Fetch many sessions, silently skipping missing or lapsed records.
    pub fn bulk_get_sessions(&self, game_ids: &[String]) -> Vec<GameSession> {
        game_ids
            .iter()
            .filter_map(|id| self.get_json::<GameSession>(&keys::game_session(id)).ok()?)
            .collect()
    }

    pub fn delete_game_session(&self, game_id: &str) -> EngineResult<()> {
        self.storage
            .delete(keys::game_session(game_id).as_bytes())
            .map_err(|e| StorageError::WriteFailed(e.to_string()))?;
        Ok(())
    }

    // ---- Transactions -------------------------------------------------

    pub fn save_transaction(&self, tx: &Transaction) -> EngineResult<()> {
        self.put_json(&keys::transaction(&tx.id), tx, Some(keys::TTL_TRANSACTION))?;
        self.put_json(
            &keys::user_transaction(tx.user_id, tx.created_at.timestamp(), &tx.id),
            &tx.id,
            Some(keys::TTL_TRANSACTION),
        )?;
        self.trim_index(&keys::user_transaction_prefix(tx.user_id), keys::HISTORY_KEEP)
    }

    /// Transactions, newest first.
    pub fn get_user_transactions(
        &self,
        user_id: i64,
        limit: usize,
    ) -> EngineResult<Vec<Transaction>> {
        let limit = clamp_history_limit(limit);
        let prefix = keys::user_transaction_prefix(user_id);
        let hits = self.storage.scan_prefix(prefix.as_bytes(), limit);

        let mut transactions = Vec::with_capacity(hits.len());
        for (key, _) in hits {
            let key = String::from_utf8_lossy(&key);
            let Some(tx_id) = key.rsplit(':').next() else {
                continue;
            };
            if let Some(tx) = self.get_json::<Transaction>(&keys::transaction(tx_id))? {
                transactions.push(tx);
            }
        }
        Ok(transactions)
    }

    // ---- Rate limiting ------------------------------------------------

    /// Fixed-window counter per `(user, action)`. The first hit stamps
    /// the window; hits are allowed while the count stays within the
    /// limit. An elapsed window resets the counter.
    pub async fn check_rate_limit(
        &self,
        user_id: i64,
        action: &str,
        limit: u32,
        window: Duration,
    ) -> EngineResult<bool> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        let key = keys::rate_limit(user_id, action);
        let now = Utc::now().timestamp();
        let window_secs = window.as_secs() as i64;

        let mut counter = self
            .get_json::<RateCounter>(&key)?
            .filter(|c| c.window_start + window_secs > now)
            .unwrap_or(RateCounter {
                count: 0,
                window_start: now,
            });

        counter.count += 1;

        let remaining = (counter.window_start + window_secs - now).max(1);
        self.put_json(&key, &counter, Some(remaining))?;

        Ok(counter.count <= limit)
    }

    pub fn clear_rate_limit(&self, user_id: i64, action: &str) -> EngineResult<()> {
        self.storage
            .delete(keys::rate_limit(user_id, action).as_bytes())
            .map_err(|e| StorageError::WriteFailed(e.to_string()))?;
        Ok(())
    }

    // ---- Bet patterns -------------------------------------------------

    /// Prepend one entry to the per-user pattern ring, keeping the most
    /// recent fifty.
    pub fn record_bet_pattern(&self, user_id: i64, pattern: BetPattern) -> EngineResult<()> {
        let key = keys::bet_patterns(user_id);
        let mut ring = self.get_json::<Vec<BetPattern>>(&key)?.unwrap_or_default();

        ring.insert(0, pattern);
        ring.truncate(keys::PATTERN_KEEP);

        self.put_json(&key, &ring, None)
    }

    pub fn get_bet_patterns(&self, user_id: i64) -> EngineResult<Vec<BetPattern>> {
        Ok(self
            .get_json::<Vec<BetPattern>>(&keys::bet_patterns(user_id))?
            .unwrap_or_default())
    }

    // ---- Authenticated sessions and profiles --------------------------

    pub fn store_user_session(&self, session: &UserSession) -> EngineResult<()> {
        self.put_json(
            &keys::user_session(session.user_id, &session.session_id),
            session,
            Some(keys::TTL_USER_SESSION),
        )
    }

    /// Load an authenticated session, refreshing its last-access stamp
    /// and TTL.
    pub fn get_user_session(
        &self,
        user_id: i64,
        session_id: &str,
    ) -> EngineResult<Option<UserSession>> {
        let key = keys::user_session(user_id, session_id);
        let Some(mut session) = self.get_json::<UserSession>(&key)? else {
            return Ok(None);
        };

        session.last_accessed = Utc::now();
        self.put_json(&key, &session, Some(keys::TTL_USER_SESSION))?;
        Ok(Some(session))
    }

    pub fn delete_user_session(&self, user_id: i64, session_id: &str) -> EngineResult<()> {
        self.storage
            .delete(keys::user_session(user_id, session_id).as_bytes())
            .map_err(|e| StorageError::WriteFailed(e.to_string()))?;
        Ok(())
    }

    pub fn store_user_profile(&self, profile: &UserProfile) -> EngineResult<()> {
        self.put_json(
            &keys::user_info(profile.id),
            profile,
            Some(keys::TTL_USER_INFO),
        )
    }

    pub fn get_user_profile(&self, user_id: i64) -> EngineResult<Option<UserProfile>> {
        self.get_json(&keys::user_info(user_id))
    }

    // ---- Internals ----------------------------------------------------

    /// Drop index entries beyond the newest `keep`.
    fn trim_index(&self, prefix: &str, keep: usize) -> EngineResult<()> {
        let hits = self.storage.scan_prefix(prefix.as_bytes(), usize::MAX);
        if hits.len() <= keep {
            return Ok(());
        }

        let stale: Vec<Vec<u8>> = hits.into_iter().skip(keep).map(|(key, _)| key).collect();
        self.storage
            .delete_batch(&stale)
            .map_err(|e| StorageError::WriteFailed(e.to_string()))?;
        Ok(())
    }
}

/// Fixed-window rate counter record.
#[derive(Serialize, Deserialize)]
struct RateCounter {
    count: u32,
    window_start: i64,
}

fn clamp_history_limit(limit: usize) -> usize {
    if limit == 0 || limit > keys::HISTORY_KEEP {
        50
    } else {
        limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::types::{GameMetadata, GameStatus, GameType};
    use crate::models::TransactionType;
    use chrono::Duration as ChronoDuration;
    use std::fs;

    fn scratch(name: &str) -> KvStore {
        let path = format!("./DB/test_store_{}", name);
        let _ = fs::remove_dir_all(&path);
        KvStore::new(Storage::open(&path).expect("open storage"))
    }

    fn sample_session(id: &str, user_id: i64) -> GameSession {
        GameSession {
            id: id.to_string(),
            user_id,
            game_type: GameType::Crash,
            bet_amount: 1_000.0,
            multiplier: 1.0,
            cashout_at: None,
            crash_point: Some(2.5),
            client_seed: "aa".repeat(16),
            server_seed: "bb".repeat(32),
            server_hash: "cc".repeat(32),
            nonce: 0,
            final_hash: "dd".repeat(32),
            status: GameStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            ended_at: None,
            metadata: GameMetadata::Crash,
        }
    }

    #[tokio::test]
    async fn test_wallet_created_on_first_access() {
        let store = scratch("wallet_create");

        let wallet = store.get_or_create_wallet(999_999, "hash").await.unwrap();
        assert_eq!(wallet.balance, 10_000.0);
        assert_eq!(wallet.nonce, 0);
        assert!(!wallet.client_seed.is_empty());

        // Second read returns the same wallet, not a fresh one.
        let again = store.get_or_create_wallet(999_999, "other").await.unwrap();
        assert_eq!(again.client_seed, wallet.client_seed);
        assert_eq!(again.server_hash, "hash");
    }

    #[tokio::test]
    async fn test_lock_then_losing_release_round_trip() {
        let store = scratch("lock_release");
        store.get_or_create_wallet(1, "h").await.unwrap();

        let locked = store.lock_balance_for_game(1, 1_000.0).await.unwrap();
        assert_eq!(locked.balance, 9_000.0);
        assert_eq!(locked.locked_balance, 1_000.0);
        assert_eq!(locked.total_wagered, 1_000.0);

        let released = store
            .release_balance_from_game(1, 1_000.0, false, 0.0)
            .await
            .unwrap();

        // Balance and lock return to pre-lock values; wagered does not revert.
        assert_eq!(released.balance, 9_000.0);
        assert_eq!(released.locked_balance, 0.0);
        assert_eq!(released.total_wagered, 1_000.0);
        assert_eq!(released.total_won, 0.0);
    }

    #[tokio::test]
    async fn test_winning_release_returns_stake_plus_net() {
        let store = scratch("release_win");
        store.get_or_create_wallet(2, "h").await.unwrap();
        store.lock_balance_for_game(2, 1_000.0).await.unwrap();

        let wallet = store
            .release_balance_from_game(2, 1_000.0, true, 500.0)
            .await
            .unwrap();

        assert_eq!(wallet.balance, 10_500.0);
        assert_eq!(wallet.locked_balance, 0.0);
        assert_eq!(wallet.total_won, 500.0);
        assert_eq!(wallet.total_wagered, 1_000.0);
    }

    #[tokio::test]
    async fn test_insufficient_balance_rejects_without_side_effects() {
        let store = scratch("insufficient");
        store.get_or_create_wallet(3, "h").await.unwrap();

        let err = store.lock_balance_for_game(3, 20_000.0).await.unwrap_err();
        assert_eq!(err.code(), "insufficient_balance");

        let wallet = store.get_wallet(3).unwrap();
        assert_eq!(wallet.balance, 10_000.0);
        assert_eq!(wallet.locked_balance, 0.0);
        assert_eq!(wallet.total_wagered, 0.0);
    }

    #[tokio::test]
    async fn test_over_release_floors_locked_at_zero() {
        let store = scratch("over_release");
        store.get_or_create_wallet(4, "h").await.unwrap();
        store.lock_balance_for_game(4, 500.0).await.unwrap();

        // Replayed release for more than is locked.
        let wallet = store
            .release_balance_from_game(4, 2_000.0, false, 0.0)
            .await
            .unwrap();
        assert_eq!(wallet.locked_balance, 0.0);
        assert_eq!(wallet.balance, 9_500.0);
    }

    #[tokio::test]
    async fn test_nonce_increments_by_one() {
        let store = scratch("nonce");
        store.get_or_create_wallet(5, "h").await.unwrap();

        for expected in 1..=3 {
            let wallet = store.increment_nonce(5).await.unwrap();
            assert_eq!(wallet.nonce, expected);
        }
    }

    #[tokio::test]
    async fn test_session_save_get_update_round_trip() {
        let store = scratch("session_rt");
        let mut session = sample_session("game-1", 10);

        store.save_game_session(&session).unwrap();
        let loaded = store.get_game_session("game-1").unwrap();
        assert_eq!(loaded, session);

        session.multiplier = 1.25;
        store.update_game_session(&mut session).unwrap();
        let updated = store.get_game_session("game-1").unwrap();
        assert_eq!(updated.multiplier, 1.25);
        assert!(updated.updated_at >= loaded.updated_at);

        assert_eq!(
            store.get_game_session("missing").unwrap_err().code(),
            "game_not_found"
        );
    }

    #[tokio::test]
    async fn test_active_set_tracks_completion() {
        let store = scratch("active_set");
        let session = sample_session("game-a", 11);
        store.save_game_session(&session).unwrap();

        assert_eq!(
            store.get_user_active_games(11).unwrap(),
            vec!["game-a".to_string()]
        );

        store
            .complete_game_session(11, "game-a", Utc::now())
            .unwrap();
        assert!(store.get_user_active_games(11).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_history_is_newest_first_and_trimmed() {
        let store = scratch("history");
        let base = Utc::now() - ChronoDuration::seconds(1_000);

        for i in 0..105 {
            let id = format!("game-{:03}", i);
            let session = sample_session(&id, 12);
            store.save_game_session(&session).unwrap();
            store
                .complete_game_session(12, &id, base + ChronoDuration::seconds(i))
                .unwrap();
        }

        let history = store.get_game_history(12, 100).unwrap();
        assert_eq!(history.len(), 100);
        // game-104 completed last, so it leads.
        assert_eq!(history[0].id, "game-104");
        assert_eq!(history[99].id, "game-005");

        // Limit zero falls back to the default page size.
        assert_eq!(store.get_game_history(12, 0).unwrap().len(), 50);
    }

    #[tokio::test]
    async fn test_transactions_indexed_newest_first() {
        let store = scratch("transactions");
        let base = Utc::now() - ChronoDuration::seconds(100);

        for i in 0..3 {
            let tx = Transaction {
                id: format!("tx-{}", i),
                user_id: 13,
                tx_type: TransactionType::Bet,
                amount: -100.0,
                balance_before: 10_000.0 - 100.0 * i as f64,
                balance_after: 9_900.0 - 100.0 * i as f64,
                game_id: None,
                description: "bet".to_string(),
                created_at: base + ChronoDuration::seconds(i * 10),
            };
            store.save_transaction(&tx).unwrap();
        }

        let txs = store.get_user_transactions(13, 10).unwrap();
        assert_eq!(txs.len(), 3);
        assert_eq!(txs[0].id, "tx-2");
        assert_eq!(txs[2].id, "tx-0");
    }

    #[tokio::test]
    async fn test_rate_limit_window() {
        let store = scratch("rate_limit");

        for _ in 0..5 {
            assert!(store
                .check_rate_limit(14, "bet", 5, Duration::from_secs(60))
                .await
                .unwrap());
        }
        assert!(!store
            .check_rate_limit(14, "bet", 5, Duration::from_secs(60))
            .await
            .unwrap());

        // Clearing the counter reopens the window.
        store.clear_rate_limit(14, "bet").unwrap();
        assert!(store
            .check_rate_limit(14, "bet", 5, Duration::from_secs(60))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_bet_pattern_ring_keeps_fifty() {
        let store = scratch("patterns");

        for i in 0..55 {
            store
                .record_bet_pattern(
                    15,
                    BetPattern {
                        amount: i as f64,
                        game_type: GameType::Dice,
                        timestamp: i,
                    },
                )
                .unwrap();
        }

        let ring = store.get_bet_patterns(15).unwrap();
        assert_eq!(ring.len(), 50);
        assert_eq!(ring[0].amount, 54.0);
        assert_eq!(ring[49].amount, 5.0);
    }

    #[tokio::test]
    async fn test_expired_record_reads_as_absent() {
        let store = scratch("expiry");

        // Write a record whose TTL is already in the past.
        store.put_json("ephemeral", &"value", Some(-5)).unwrap();
        assert_eq!(store.get_json::<String>("ephemeral").unwrap(), None);
    }

    #[tokio::test]
    async fn test_user_session_refresh_on_read() {
        let store = scratch("user_session");
        let session = UserSession {
            user_id: 16,
            session_id: "sid-1".to_string(),
            created_at: Utc::now() - ChronoDuration::hours(1),
            last_accessed: Utc::now() - ChronoDuration::hours(1),
        };
        store.store_user_session(&session).unwrap();

        let loaded = store.get_user_session(16, "sid-1").unwrap().unwrap();
        assert!(loaded.last_accessed > session.last_accessed);

        store.delete_user_session(16, "sid-1").unwrap();
        assert!(store.get_user_session(16, "sid-1").unwrap().is_none());
    }
}
