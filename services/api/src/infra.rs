use admitflow::config::AuthConfig;
use admitflow::workflows::accounts::{
    AccountService, AccountStore, AccountsState, AdminService, InMemoryAccountStore,
    SessionAuthority,
};
use admitflow::workflows::admissions::{
    AdmissionsService, AdmissionsState, InMemoryApplicationStore,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Services wired to the in-memory stores of record.
pub(crate) struct Workflows {
    pub(crate) admissions: Arc<AdmissionsService<InMemoryApplicationStore>>,
    pub(crate) accounts: Arc<AccountService>,
    pub(crate) admin: Arc<AdminService<InMemoryApplicationStore>>,
    pub(crate) sessions: Arc<SessionAuthority>,
}

impl Workflows {
    pub(crate) fn in_memory(auth: &AuthConfig) -> Self {
        let account_store: Arc<dyn AccountStore> = Arc::new(InMemoryAccountStore::default());
        let sessions = Arc::new(SessionAuthority::new(
            &auth.jwt_secret,
            session_ttl(auth),
            account_store.clone(),
        ));
        let accounts = Arc::new(AccountService::new(account_store.clone(), sessions.clone()));
        let admissions = Arc::new(AdmissionsService::new(Arc::new(
            InMemoryApplicationStore::default(),
        )));
        let admin = Arc::new(AdminService::new(
            admissions.clone(),
            accounts.clone(),
            account_store,
        ));

        Self {
            admissions,
            accounts,
            admin,
            sessions,
        }
    }

    pub(crate) fn admissions_state(&self) -> AdmissionsState<InMemoryApplicationStore> {
        AdmissionsState {
            service: self.admissions.clone(),
            sessions: self.sessions.clone(),
        }
    }

    pub(crate) fn accounts_state(&self) -> AccountsState<InMemoryApplicationStore> {
        AccountsState {
            accounts: self.accounts.clone(),
            admin: self.admin.clone(),
        }
    }
}

pub(crate) fn session_ttl(auth: &AuthConfig) -> chrono::Duration {
    chrono::Duration::minutes(i64::from(auth.session_ttl_minutes))
}
