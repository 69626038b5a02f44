//! Terminal settlement
//!
//! Every finished game passes through here exactly once: release the
//! locked stake, move the session into the completed index, and append
//! the audit transaction. Funds correctness comes first — a transaction
//! write that fails after a successful release is logged as an audit
//! gap, never unwound.

use crate::errors::EngineResult;
use crate::games::types::GameSession;
use crate::models::{Transaction, TransactionType, Wallet};
use crate::store::KvStore;
use chrono::Utc;
use tracing::{error, info};
use uuid::Uuid;

pub struct Settlement {
    store: KvStore,
}

impl Settlement {
    pub fn new(store: KvStore) -> Self {
        Self { store }
    }

    /// Settle a lost game: the stake is forfeit, `locked_balance` drops
    /// by it and a `bet` transaction of `-stake` is appended.
    pub async fn settle_loss(
        &self,
        session: &GameSession,
        description: String,
    ) -> EngineResult<Wallet> {
        let wallet = self
            .store
            .release_balance_from_game(session.user_id, session.bet_amount, false, 0.0)
            .await?;

        self.finish_bookkeeping(
            session,
            &wallet,
            TransactionType::Bet,
            -session.bet_amount,
            description,
        );

        Ok(wallet)
    }

    /// Settle a won game: stake plus net winnings return to balance and
    /// a `win` transaction of the gross payout is appended.
    pub async fn settle_win(
        &self,
        session: &GameSession,
        gross_payout: f64,
        description: String,
    ) -> EngineResult<Wallet> {
        let net = gross_payout - session.bet_amount;
        let wallet = self
            .store
            .release_balance_from_game(session.user_id, session.bet_amount, true, net)
            .await?;

        self.finish_bookkeeping(
            session,
            &wallet,
            TransactionType::Win,
            gross_payout,
            description,
        );

        Ok(wallet)
    }

    /// Index maintenance and audit trail after a successful release.
    fn finish_bookkeeping(
        &self,
        session: &GameSession,
        wallet: &Wallet,
        tx_type: TransactionType,
        amount: f64,
        description: String,
    ) {
        let completed_at = session.ended_at.unwrap_or_else(Utc::now);
        if let Err(e) = self
            .store
            .complete_game_session(session.user_id, &session.id, completed_at)
        {
            error!(game_id = %session.id, error = %e, "failed to move session to completed index");
        }

        let tx = Transaction {
            id: Uuid::new_v4().to_string(),
            user_id: session.user_id,
            tx_type,
            amount,
            balance_before: wallet.balance - amount,
            balance_after: wallet.balance,
            game_id: Some(session.id.clone()),
            description,
            created_at: Utc::now(),
        };

        match self.store.save_transaction(&tx) {
            Ok(()) => info!(
                game_id = %session.id,
                tx_id = %tx.id,
                amount,
                "settlement recorded"
            ),
            // Funds already moved; surface the audit gap and move on.
            Err(e) => error!(
                game_id = %session.id,
                error = %e,
                "settlement succeeded but transaction write failed"
            ),
        }
    }
}
