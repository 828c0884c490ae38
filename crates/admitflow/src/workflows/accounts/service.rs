use std::sync::Arc;

use tracing::{info, warn};

use crate::config::BootstrapAccount;
use crate::workflows::admissions::access::{authorize, AccessError, Actor, Capability};
use crate::workflows::admissions::domain::{AccountId, Role};
use crate::workflows::admissions::repository::StoreError;
use crate::workflows::admissions::service::WorkflowError;

use super::domain::{
    normalize_email, Account, AgentPatch, LoginRequest, LoginResponse, NewAccount,
    NewAgentRequest, PasswordChange,
};
use super::password::{hash_password, verify_password, PasswordError};
use super::repository::AccountStore;
use super::session::{Session, SessionAuthority, SessionError};

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("You are not registered as a {0}")]
    RoleMismatch(&'static str),
    #[error("unknown role `{0}`")]
    UnknownRole(String),
    #[error("{0}")]
    Validation(String),
    #[error("account {0} is not an agent")]
    NotAnAgent(AccountId),
    #[error("agent {agent} still owns {count} application(s); reassign them first")]
    AgentHasApplications { agent: AccountId, count: usize },
    #[error(transparent)]
    Password(#[from] PasswordError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
}

/// Login, logout, and agent account management.
pub struct AccountService {
    accounts: Arc<dyn AccountStore>,
    sessions: Arc<SessionAuthority>,
}

impl AccountService {
    pub fn new(accounts: Arc<dyn AccountStore>, sessions: Arc<SessionAuthority>) -> Self {
        Self { accounts, sessions }
    }

    pub fn sessions(&self) -> &Arc<SessionAuthority> {
        &self.sessions
    }

    pub fn login(&self, request: LoginRequest) -> Result<LoginResponse, AccountError> {
        let account = match self.accounts.account_by_email(&request.email)? {
            Some(account) if verify_password(&request.password, &account.password_hash) => account,
            _ => {
                warn!(email = %normalize_email(&request.email), "login refused");
                return Err(AccountError::InvalidCredentials);
            }
        };

        if let Some(label) = request.role.as_deref().map(str::trim).filter(|l| !l.is_empty()) {
            let requested = Role::from_label(label)
                .or_else(|| Role::ALL.into_iter().find(|role| role.as_wire() == label))
                .ok_or_else(|| AccountError::UnknownRole(label.to_string()))?;
            if requested != account.role {
                warn!(
                    account_id = %account.id,
                    requested = requested.as_wire(),
                    "login role does not match account"
                );
                return Err(AccountError::RoleMismatch(requested.label()));
            }
        }

        let issued = self.sessions.issue(&account)?;
        info!(
            account_id = %account.id,
            role = account.role.as_wire(),
            "login succeeded"
        );
        Ok(LoginResponse {
            token: issued.token,
            expires_at: issued.expires_at,
            redirect: account.role.landing_path(),
            user: account,
        })
    }

    pub fn logout(&self, session: &Session) {
        self.sessions.revoke(session);
        info!(account_id = %session.actor.account_id, "logout");
    }

    pub fn me(&self, session: &Session) -> Result<Account, AccountError> {
        self.accounts
            .account(session.actor.account_id)?
            .ok_or(AccountError::Session(SessionError::UnknownAccount))
    }

    /// Create an account of any role without an acting session. Used for seeding.
    pub fn provision(
        &self,
        name: &str,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<Account, AccountError> {
        let email = normalize_email(email);
        validate_email(&email)?;
        let name = match name.trim() {
            "" => default_name(&email),
            trimmed => trimmed.to_string(),
        };
        let account = self.accounts.insert_account(NewAccount {
            name,
            email,
            role,
            password_hash: hash_password(password)?,
        })?;
        info!(account_id = %account.id, role = role.as_wire(), "account provisioned");
        Ok(account)
    }

    /// Seed a configured staff account unless an account with that email already exists.
    pub fn ensure_bootstrap_account(
        &self,
        seed: &BootstrapAccount,
    ) -> Result<Option<Account>, AccountError> {
        if let Some(existing) = self.accounts.account_by_email(&seed.email)? {
            if existing.role != seed.role {
                warn!(
                    account_id = %existing.id,
                    role = existing.role.as_wire(),
                    wanted = seed.role.as_wire(),
                    "bootstrap email belongs to a different role"
                );
            }
            return Ok(None);
        }
        self.provision(seed.role.label(), &seed.email, &seed.password, seed.role)
            .map(Some)
    }

    pub fn create_agent(
        &self,
        actor: &Actor,
        request: NewAgentRequest,
    ) -> Result<Account, AccountError> {
        authorize(actor, Capability::ManageAgents)?;
        let account = self.provision(
            &request.name,
            &request.email,
            &request.password,
            Role::Agent,
        )?;
        info!(admin = %actor.account_id, agent_id = %account.id, "agent created");
        Ok(account)
    }

    pub fn list_agents(&self, actor: &Actor) -> Result<Vec<Account>, AccountError> {
        authorize(actor, Capability::ManageAgents)?;
        Ok(self
            .accounts
            .accounts()?
            .into_iter()
            .filter(|account| account.role == Role::Agent)
            .collect())
    }

    pub fn agent(&self, actor: &Actor, id: AccountId) -> Result<Account, AccountError> {
        authorize(actor, Capability::ManageAgents)?;
        self.require_agent(id)
    }

    pub fn update_agent(
        &self,
        actor: &Actor,
        id: AccountId,
        patch: AgentPatch,
    ) -> Result<Account, AccountError> {
        authorize(actor, Capability::ManageAgents)?;
        self.require_agent(id)?;
        let name = patch.name.as_deref().map(str::trim).map(str::to_string);
        let email = patch.email.as_deref().map(normalize_email);
        if name.is_none() && email.is_none() {
            return Err(AccountError::Validation(
                "update must change the name or the email".to_string(),
            ));
        }
        if name.as_deref() == Some("") {
            return Err(AccountError::Validation("name cannot be empty".to_string()));
        }
        if let Some(email) = &email {
            validate_email(email)?;
        }

        let account = self.accounts.update_account(id, &|account| {
            if let Some(name) = &name {
                account.name = name.clone();
            }
            if let Some(email) = &email {
                account.email = email.clone();
            }
        })?;
        info!(admin = %actor.account_id, agent_id = %id, "agent updated");
        Ok(account)
    }

    pub fn change_password(
        &self,
        actor: &Actor,
        id: AccountId,
        change: PasswordChange,
    ) -> Result<(), AccountError> {
        authorize(actor, Capability::ManageAgents)?;
        self.require_agent(id)?;
        let password_hash = hash_password(&change.password)?;
        self.accounts.update_account(id, &|account| {
            account.password_hash = password_hash.clone();
        })?;
        info!(admin = %actor.account_id, agent_id = %id, "agent password changed");
        Ok(())
    }

    pub(crate) fn require_agent(&self, id: AccountId) -> Result<Account, AccountError> {
        let account = self.accounts.account(id)?.ok_or(StoreError::NotFound {
            entity: "account",
            id: id.0,
        })?;
        ensure_agent(&account)?;
        Ok(account)
    }

    /// Run `unit` with the agent account held so it cannot be deleted meanwhile.
    pub(crate) fn with_agent(
        &self,
        id: AccountId,
        unit: &mut dyn FnMut(&Account) -> Result<(), AccountError>,
    ) -> Result<(), AccountError> {
        self.accounts.hold_account(id, &mut |account| {
            ensure_agent(account)?;
            unit(account)
        })
    }

    /// Delete an agent account once `check` accepts it, atomically with the check.
    pub(crate) fn remove_agent(
        &self,
        id: AccountId,
        check: &dyn Fn(&Account) -> Result<(), AccountError>,
    ) -> Result<Account, AccountError> {
        self.accounts.delete_account(id, &|account| {
            ensure_agent(account)?;
            check(account)
        })
    }
}

fn ensure_agent(account: &Account) -> Result<(), AccountError> {
    if account.role != Role::Agent {
        return Err(AccountError::NotAnAgent(account.id));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), AccountError> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(AccountError::Validation(
            "email must be a valid address".to_string(),
        )),
    }
}

fn default_name(email: &str) -> String {
    email.split('@').next().unwrap_or(email).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::accounts::memory::InMemoryAccountStore;
    use chrono::Duration;

    fn service() -> AccountService {
        let store: Arc<dyn AccountStore> = Arc::new(InMemoryAccountStore::default());
        let sessions = Arc::new(SessionAuthority::new(
            "test-secret",
            Duration::minutes(30),
            store.clone(),
        ));
        AccountService::new(store, sessions)
    }

    fn login(email: &str, password: &str, role: Option<&str>) -> LoginRequest {
        LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
            role: role.map(str::to_string),
        }
    }

    #[test]
    fn login_returns_token_and_landing_page() {
        let service = service();
        service
            .provision("Rita", "rita@example.com", "review-pass", Role::Reviewer)
            .expect("provision");

        let response = service
            .login(login("RITA@example.com", "review-pass", Some("Review Team")))
            .expect("login");
        assert_eq!(response.redirect, "/review/dashboard");
        assert_eq!(response.user.role, Role::Reviewer);
        let session = service.sessions().verify(&response.token).expect("verify");
        assert_eq!(session.actor.account_id, response.user.id);
    }

    #[test]
    fn login_rejects_wrong_password_and_wrong_role() {
        let service = service();
        service
            .provision("Ann", "ann@example.com", "agent-pass", Role::Agent)
            .expect("provision");

        assert!(matches!(
            service.login(login("ann@example.com", "nope-nope", None)),
            Err(AccountError::InvalidCredentials)
        ));
        let err = service
            .login(login("ann@example.com", "agent-pass", Some("Review Team")))
            .expect_err("role mismatch");
        assert_eq!(err.to_string(), "You are not registered as a Review Team");
        assert!(matches!(
            service.login(login("ann@example.com", "agent-pass", Some("Janitor"))),
            Err(AccountError::UnknownRole(_))
        ));
    }

    #[test]
    fn logout_revokes_the_session() {
        let service = service();
        service
            .provision("Ann", "ann@example.com", "agent-pass", Role::Agent)
            .expect("provision");
        let response = service
            .login(login("ann@example.com", "agent-pass", Some("Agent")))
            .expect("login");
        let session = service.sessions().verify(&response.token).expect("verify");
        service.logout(&session);
        assert!(service.sessions().verify(&response.token).is_err());
    }

    #[test]
    fn only_agent_admins_manage_agents() {
        let service = service();
        let admin = service
            .provision("Admin", "admin@example.com", "admin-pass", Role::AgentAdmin)
            .expect("provision");
        let admin = Actor::new(admin.id, admin.role);
        let reviewer = Actor::new(AccountId(99), Role::Reviewer);

        let request = NewAgentRequest {
            name: String::new(),
            email: "new.agent@example.com".to_string(),
            password: "agent-pass".to_string(),
        };
        assert!(matches!(
            service.create_agent(&reviewer, request.clone()),
            Err(AccountError::Access(_))
        ));
        let agent = service.create_agent(&admin, request).expect("create");
        assert_eq!(agent.name, "new.agent");
        assert_eq!(agent.role, Role::Agent);

        service
            .change_password(
                &admin,
                agent.id,
                PasswordChange {
                    password: "fresh-pass".to_string(),
                },
            )
            .expect("change password");
        assert!(service
            .login(login("new.agent@example.com", "fresh-pass", None))
            .is_ok());

        assert!(matches!(
            service.agent(&admin, admin.account_id),
            Err(AccountError::NotAnAgent(_))
        ));
        assert_eq!(service.list_agents(&admin).expect("list").len(), 1);
    }

    #[test]
    fn bootstrap_admin_is_created_once() {
        let service = service();
        let admin = BootstrapAccount {
            role: Role::AgentAdmin,
            email: "root@example.com".to_string(),
            password: "bootstrap-pass".to_string(),
        };
        assert!(service.ensure_bootstrap_account(&admin).expect("seed").is_some());
        assert!(service.ensure_bootstrap_account(&admin).expect("seed").is_none());
    }

    #[test]
    fn seeded_reviewers_can_log_in_as_review_team() {
        let service = service();
        let reviewer = BootstrapAccount {
            role: Role::Reviewer,
            email: "review@example.com".to_string(),
            password: "review-pass".to_string(),
        };
        let account = service
            .ensure_bootstrap_account(&reviewer)
            .expect("seed")
            .expect("created");
        assert_eq!(account.role, Role::Reviewer);
        assert_eq!(account.name, "Review Team");

        let response = service
            .login(login("review@example.com", "review-pass", Some("Review Team")))
            .expect("login");
        assert_eq!(response.redirect, "/review/dashboard");
    }
}
