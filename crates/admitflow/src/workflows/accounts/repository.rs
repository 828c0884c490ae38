use crate::workflows::admissions::domain::AccountId;
use crate::workflows::admissions::repository::StoreError;

use super::domain::{Account, NewAccount};
use super::service::AccountError;

/// Storage abstraction for accounts. Emails are unique after lower-casing.
pub trait AccountStore: Send + Sync {
    /// Fails with [`StoreError::Conflict`] when the email is already registered.
    fn insert_account(&self, new: NewAccount) -> Result<Account, StoreError>;
    fn account(&self, id: AccountId) -> Result<Option<Account>, StoreError>;
    fn account_by_email(&self, email: &str) -> Result<Option<Account>, StoreError>;
    /// All accounts ordered by id.
    fn accounts(&self) -> Result<Vec<Account>, StoreError>;
    /// Apply `change` to a copy of the account and store it if the email stays unique.
    fn update_account(
        &self,
        id: AccountId,
        change: &dyn Fn(&mut Account),
    ) -> Result<Account, StoreError>;
    /// Run `unit` while the account is held. It cannot be deleted until `unit` returns.
    fn hold_account(
        &self,
        id: AccountId,
        unit: &mut dyn FnMut(&Account) -> Result<(), AccountError>,
    ) -> Result<(), AccountError>;
    /// Remove the account if `check` accepts it. The check and the removal are one atomic step.
    fn delete_account(
        &self,
        id: AccountId,
        check: &dyn Fn(&Account) -> Result<(), AccountError>,
    ) -> Result<Account, AccountError>;
}

pub(crate) fn account_not_found(id: AccountId) -> StoreError {
    StoreError::NotFound {
        entity: "account",
        id: id.0,
    }
}
