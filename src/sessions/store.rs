use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use super::models::{ActiveSession, AdvisorId, UserId, Wallet};

/// Everything billing may touch for one user: the spendable balance and the
/// per-advisor session records. Guarded by a single per-user mutex so the
/// Control API and the tick engine linearize against each other, and so the
/// one-paid-session-per-user invariant can be enforced while sibling
/// sessions are read and written.
#[derive(Debug)]
pub struct UserAccount {
    pub wallet: Wallet,
    pub sessions: HashMap<AdvisorId, ActiveSession>,
}

impl UserAccount {
    fn new(user_id: UserId) -> Self {
        Self {
            wallet: Wallet::new(user_id),
            sessions: HashMap::new(),
        }
    }
}

/// key: metering-store -> per-user locked accounts
#[derive(Default)]
pub struct MeterStore {
    accounts: DashMap<UserId, Arc<Mutex<UserAccount>>>,
}

impl MeterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lazily creates the account on first touch.
    pub fn account(&self, user_id: UserId) -> Arc<Mutex<UserAccount>> {
        self.accounts
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(UserAccount::new(user_id))))
            .clone()
    }

    /// Working set for the sweep. Collected up front so the sweep never
    /// holds the map shard lock while waiting on an account mutex.
    pub fn user_ids(&self) -> Vec<UserId> {
        self.accounts.iter().map(|entry| *entry.key()).collect()
    }

    pub async fn credits(&self, user_id: UserId) -> i64 {
        self.account(user_id).lock().await.wallet.credits
    }

    /// Top-up entry point for the out-of-scope payment collaborator.
    pub async fn credit(&self, user_id: UserId, amount: i64) -> i64 {
        let account = self.account(user_id);
        let mut account = account.lock().await;
        account.wallet.credits += amount;
        account.wallet.credits
    }

    /// Debit clamped at zero; the wallet is never negative.
    pub async fn debit(&self, user_id: UserId, amount: i64) -> i64 {
        let account = self.account(user_id);
        let mut account = account.lock().await;
        account.wallet.credits = (account.wallet.credits - amount).max(0);
        account.wallet.credits
    }
}
