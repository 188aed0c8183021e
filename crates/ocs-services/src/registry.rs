//! Balance registry
//!
//! Guarded balances indexed by account and balance ID.

use ocs_core::{
    models::{AccountBalances, Balance},
    OcsError, OcsResult,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::guard::GuardedBalance;

type AccountMap = HashMap<String, HashMap<String, Arc<GuardedBalance>>>;

/// In-memory balance store
#[derive(Debug, Default)]
pub struct BalanceRegistry {
    accounts: RwLock<AccountMap>,
    lock_timeout: Option<Duration>,
}

impl BalanceRegistry {
    /// Create an empty registry; `lock_timeout` applies to every balance
    pub fn new(lock_timeout: Option<Duration>) -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            lock_timeout,
        }
    }

    /// Add or replace one balance of an account
    pub fn insert(&self, account_id: &str, balance: Balance) -> OcsResult<Arc<GuardedBalance>> {
        let guarded =
            Arc::new(GuardedBalance::new(balance)?.with_lock_timeout(self.lock_timeout));

        debug!("Registering balance {} for account {}", guarded.id(), account_id);

        self.accounts
            .write()
            .entry(account_id.to_string())
            .or_default()
            .insert(guarded.id().to_string(), Arc::clone(&guarded));

        Ok(guarded)
    }

    /// Load a snapshot, returning the number of balances registered
    ///
    /// Stops at the first invalid balance.
    pub fn load(&self, snapshot: Vec<AccountBalances>) -> OcsResult<usize> {
        let mut count = 0;
        for account in snapshot {
            for balance in account.balances {
                self.insert(&account.account_id, balance)?;
                count += 1;
            }
        }

        info!("Loaded {} balances", count);
        Ok(count)
    }

    /// Look up a balance
    pub fn get(&self, account_id: &str, balance_id: &str) -> OcsResult<Arc<GuardedBalance>> {
        let accounts = self.accounts.read();
        let balances = accounts
            .get(account_id)
            .ok_or_else(|| OcsError::AccountNotFound(account_id.to_string()))?;

        balances
            .get(balance_id)
            .cloned()
            .ok_or_else(|| OcsError::BalanceNotFound(format!("{}:{}", account_id, balance_id)))
    }

    /// Persistable view of every balance, accounts and balances sorted by ID
    pub fn snapshot(&self) -> OcsResult<Vec<AccountBalances>> {
        let accounts = self.accounts.read();

        let mut snapshot = accounts
            .iter()
            .map(|(account_id, balances)| {
                let mut balances = balances
                    .values()
                    .map(|guarded| guarded.snapshot())
                    .collect::<OcsResult<Vec<_>>>()?;
                balances.sort_by(|a, b| a.id.cmp(&b.id));
                Ok(AccountBalances {
                    account_id: account_id.clone(),
                    balances,
                })
            })
            .collect::<OcsResult<Vec<_>>>()?;

        snapshot.sort_by(|a, b| a.account_id.cmp(&b.account_id));
        Ok(snapshot)
    }

    /// Snapshot as pretty JSON, in the shape `load` reads back
    pub fn snapshot_json(&self) -> OcsResult<String> {
        Ok(serde_json::to_string_pretty(&self.snapshot()?)?)
    }
}
