//! Agent-admin operations that span accounts and applications.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::workflows::admissions::access::{authorize, Actor, Capability};
use crate::workflows::admissions::domain::{AccountId, Application, ApplicationId, Role};
use crate::workflows::admissions::repository::{ApplicationStore, StoreError};
use crate::workflows::admissions::service::{status_counts, AdmissionsService, StatusCount};

use super::domain::Account;
use super::repository::AccountStore;
use super::service::{AccountError, AccountService};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentWorkload {
    pub agent_id: AccountId,
    pub name: String,
    pub email: String,
    pub total: usize,
    pub statuses: Vec<StatusCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdminDashboard {
    pub total_applications: usize,
    pub total_agents: usize,
    pub statuses: Vec<StatusCount>,
    pub agents: Vec<AgentWorkload>,
}

pub struct AdminService<S> {
    admissions: Arc<AdmissionsService<S>>,
    accounts: Arc<AccountService>,
    store: Arc<dyn AccountStore>,
}

impl<S> AdminService<S>
where
    S: ApplicationStore + 'static,
{
    pub fn new(
        admissions: Arc<AdmissionsService<S>>,
        accounts: Arc<AccountService>,
        store: Arc<dyn AccountStore>,
    ) -> Self {
        Self {
            admissions,
            accounts,
            store,
        }
    }

    /// Remove an agent account. Refused while the agent still owns applications.
    ///
    /// Lock order is accounts, then applications, here and in [`Self::reassign`].
    pub fn delete_agent(&self, actor: &Actor, id: AccountId) -> Result<Account, AccountError> {
        authorize(actor, Capability::ManageAgents)?;
        let removed = self.accounts.remove_agent(id, &|_| {
            let owned = self.admissions.owned_by(id)?.len();
            if owned > 0 {
                return Err(AccountError::AgentHasApplications {
                    agent: id,
                    count: owned,
                });
            }
            Ok(())
        })?;
        info!(admin = %actor.account_id, agent_id = %id, "agent deleted");
        Ok(removed)
    }

    /// Move an application to another agent's portfolio.
    pub fn reassign(
        &self,
        actor: &Actor,
        application: ApplicationId,
        agent_id: AccountId,
    ) -> Result<Application, AccountError> {
        authorize(actor, Capability::ReassignApplication)?;
        let mut moved = None;
        self.accounts.with_agent(agent_id, &mut |_| {
            moved = Some(self.admissions.reassign(actor, application, agent_id)?);
            Ok(())
        })?;
        moved.ok_or_else(|| {
            StoreError::Unavailable("reassignment was not applied".to_string()).into()
        })
    }

    pub fn dashboard(&self, actor: &Actor) -> Result<AdminDashboard, AccountError> {
        authorize(actor, Capability::ManageAgents)?;
        let applications = self.admissions.list_applications(actor)?;
        let agents: Vec<AgentWorkload> = self
            .store
            .accounts()?
            .into_iter()
            .filter(|account| account.role == Role::Agent)
            .map(|agent| {
                let owned: Vec<&Application> = applications
                    .iter()
                    .filter(|application| application.owner == agent.id)
                    .collect();
                AgentWorkload {
                    agent_id: agent.id,
                    total: owned.len(),
                    statuses: status_counts(owned),
                    name: agent.name,
                    email: agent.email,
                }
            })
            .collect();

        Ok(AdminDashboard {
            total_applications: applications.len(),
            total_agents: agents.len(),
            statuses: status_counts(&applications),
            agents,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::accounts::memory::InMemoryAccountStore;
    use crate::workflows::accounts::session::SessionAuthority;
    use crate::workflows::admissions::domain::StudentProfile;
    use crate::workflows::admissions::memory::InMemoryApplicationStore;
    use chrono::Duration;

    struct Fixture {
        admin: AdminService<InMemoryApplicationStore>,
        admissions: Arc<AdmissionsService<InMemoryApplicationStore>>,
        accounts: Arc<AccountService>,
        store: Arc<dyn AccountStore>,
    }

    fn fixture() -> Fixture {
        let store: Arc<dyn AccountStore> = Arc::new(InMemoryAccountStore::default());
        let sessions = Arc::new(SessionAuthority::new(
            "admin-test-secret",
            Duration::minutes(30),
            store.clone(),
        ));
        let accounts = Arc::new(AccountService::new(store.clone(), sessions));
        let admissions = Arc::new(AdmissionsService::new(Arc::new(
            InMemoryApplicationStore::default(),
        )));
        Fixture {
            admin: AdminService::new(admissions.clone(), accounts.clone(), store.clone()),
            admissions,
            accounts,
            store,
        }
    }

    fn actor(account: Account) -> Actor {
        Actor::new(account.id, account.role)
    }

    fn provision(fixture: &Fixture, email: &str, role: Role) -> Actor {
        actor(
            fixture
                .accounts
                .provision("Staff", email, "long-enough", role)
                .expect("provision"),
        )
    }

    fn profile() -> StudentProfile {
        StudentProfile {
            student_name: "Meera Iyer".to_string(),
            mobile: "+91 90000 00000".to_string(),
            email: "meera@example.com".to_string(),
            country: "Canada".to_string(),
            state: "Ontario".to_string(),
            university: "University of Toronto".to_string(),
            course_name: "MEng Civil".to_string(),
            course_url: "https://www.utoronto.ca/".to_string(),
        }
    }

    #[test]
    fn reassigning_to_a_deleted_agent_fails() {
        let fixture = fixture();
        let admin = provision(&fixture, "admin@example.com", Role::AgentAdmin);
        let owner = provision(&fixture, "owner@example.com", Role::Agent);
        let leaving = provision(&fixture, "leaving@example.com", Role::Agent);
        let application = fixture
            .admissions
            .create_application(&owner, profile())
            .expect("created");

        fixture
            .admin
            .delete_agent(&admin, leaving.account_id)
            .expect("idle agent deleted");
        let err = fixture
            .admin
            .reassign(&admin, application.id, leaving.account_id)
            .expect_err("target is gone");
        assert!(matches!(
            err,
            AccountError::Store(StoreError::NotFound { entity: "account", .. })
        ));
        let unchanged = fixture
            .admissions
            .application(&admin, application.id)
            .expect("load");
        assert_eq!(unchanged.owner, owner.account_id);
    }

    #[test]
    fn deletion_racing_reassignment_never_orphans_an_application() {
        let fixture = fixture();
        let admin = provision(&fixture, "admin@example.com", Role::AgentAdmin);
        let owner = provision(&fixture, "owner@example.com", Role::Agent);

        for round in 0..25 {
            let target = provision(&fixture, &format!("target{round}@example.com"), Role::Agent);
            let application = fixture
                .admissions
                .create_application(&owner, profile())
                .expect("created");

            std::thread::scope(|scope| {
                scope.spawn(|| {
                    let _ = fixture.admin.delete_agent(&admin, target.account_id);
                });
                scope.spawn(|| {
                    let _ = fixture
                        .admin
                        .reassign(&admin, application.id, target.account_id);
                });
            });

            let holder = fixture
                .admissions
                .application(&admin, application.id)
                .expect("load")
                .owner;
            assert!(
                fixture.store.account(holder).expect("read").is_some(),
                "application {} is owned by a deleted account",
                application.id
            );
        }
    }
}
