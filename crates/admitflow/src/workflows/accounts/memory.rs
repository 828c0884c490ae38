use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;

use crate::workflows::admissions::domain::AccountId;
use crate::workflows::admissions::repository::StoreError;

use super::domain::{normalize_email, Account, NewAccount};
use super::repository::{account_not_found, AccountStore};
use super::service::AccountError;

#[derive(Default, Clone)]
pub struct InMemoryAccountStore {
    state: Arc<Mutex<AccountState>>,
}

#[derive(Default)]
struct AccountState {
    accounts: BTreeMap<AccountId, Account>,
    last_id: u64,
}

impl AccountState {
    fn email_taken(&self, email: &str, except: Option<AccountId>) -> bool {
        self.accounts
            .values()
            .any(|account| Some(account.id) != except && account.email == email)
    }
}

impl InMemoryAccountStore {
    fn lock(&self) -> Result<MutexGuard<'_, AccountState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("account store lock poisoned".to_string()))
    }
}

impl AccountStore for InMemoryAccountStore {
    fn insert_account(&self, new: NewAccount) -> Result<Account, StoreError> {
        let mut state = self.lock()?;
        let email = normalize_email(&new.email);
        if state.email_taken(&email, None) {
            return Err(StoreError::Conflict(format!(
                "an account for {email} already exists"
            )));
        }
        state.last_id += 1;
        let account = Account {
            id: AccountId(state.last_id),
            name: new.name,
            email,
            role: new.role,
            password_hash: new.password_hash,
            created_at: Utc::now(),
        };
        state.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    fn account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        Ok(self.lock()?.accounts.get(&id).cloned())
    }

    fn account_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let email = normalize_email(email);
        Ok(self
            .lock()?
            .accounts
            .values()
            .find(|account| account.email == email)
            .cloned())
    }

    fn accounts(&self) -> Result<Vec<Account>, StoreError> {
        Ok(self.lock()?.accounts.values().cloned().collect())
    }

    fn update_account(
        &self,
        id: AccountId,
        change: &dyn Fn(&mut Account),
    ) -> Result<Account, StoreError> {
        let mut state = self.lock()?;
        let mut account = state
            .accounts
            .get(&id)
            .cloned()
            .ok_or_else(|| account_not_found(id))?;
        change(&mut account);
        account.id = id;
        account.email = normalize_email(&account.email);
        if state.email_taken(&account.email, Some(id)) {
            return Err(StoreError::Conflict(format!(
                "an account for {} already exists",
                account.email
            )));
        }
        state.accounts.insert(id, account.clone());
        Ok(account)
    }

    fn hold_account(
        &self,
        id: AccountId,
        unit: &mut dyn FnMut(&Account) -> Result<(), AccountError>,
    ) -> Result<(), AccountError> {
        let state = self.lock()?;
        let account = state
            .accounts
            .get(&id)
            .ok_or_else(|| account_not_found(id))?;
        unit(account)
    }

    fn delete_account(
        &self,
        id: AccountId,
        check: &dyn Fn(&Account) -> Result<(), AccountError>,
    ) -> Result<Account, AccountError> {
        let mut state = self.lock()?;
        let account = state
            .accounts
            .get(&id)
            .ok_or_else(|| account_not_found(id))?;
        check(account)?;
        state
            .accounts
            .remove(&id)
            .ok_or_else(|| account_not_found(id).into())
    }
}
