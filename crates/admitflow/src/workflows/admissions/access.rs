//! Role and ownership checks applied before every read or mutation.

use serde::Serialize;

use super::domain::{AccountId, Application, Role};
use super::lifecycle::WorkflowEvent;

/// Authenticated caller resolved from a verified session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Actor {
    pub account_id: AccountId,
    pub role: Role,
}

impl Actor {
    pub const fn new(account_id: AccountId, role: Role) -> Self {
        Self { account_id, role }
    }

    /// Whether the actor is limited to applications they own.
    pub const fn is_scoped_to_own(&self) -> bool {
        matches!(self.role, Role::Agent)
    }

    pub fn owns(&self, application: &Application) -> bool {
        application.owner == self.account_id
    }
}

/// Operations gated by the access control layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    CreateApplication,
    ViewApplication,
    EditApplication,
    DeleteApplication,
    UploadDocument,
    DeleteDocument,
    ReviewDocument,
    WriteComment,
    Transition(WorkflowEvent),
    ManageAgents,
    ReassignApplication,
}

impl Capability {
    fn describe(self) -> String {
        match self {
            Capability::CreateApplication => "create applications".to_string(),
            Capability::ViewApplication => "view this application".to_string(),
            Capability::EditApplication => "edit application details".to_string(),
            Capability::DeleteApplication => "delete this application".to_string(),
            Capability::UploadDocument => "upload documents".to_string(),
            Capability::DeleteDocument => "delete documents".to_string(),
            Capability::ReviewDocument => "review documents".to_string(),
            Capability::WriteComment => "comment on this application".to_string(),
            Capability::Transition(event) => format!("{} applications", event.describe()),
            Capability::ManageAgents => "manage agent accounts".to_string(),
            Capability::ReassignApplication => "reassign applications".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    #[error("role {} may not {}", role_label(.role), capability_phrase(.capability))]
    RoleDenied { role: Role, capability: Capability },
    #[error("application {application} belongs to another agent")]
    NotOwner { application: u64 },
    #[error("comments must be authored by the signed-in account")]
    ForeignAuthor,
}

fn role_label(role: &Role) -> &'static str {
    role.label()
}

fn capability_phrase(capability: &Capability) -> String {
    capability.describe()
}

fn role_allows(role: Role, capability: Capability) -> bool {
    use Capability::*;

    match role {
        Role::Agent => matches!(
            capability,
            CreateApplication
                | ViewApplication
                | EditApplication
                | DeleteApplication
                | UploadDocument
                | DeleteDocument
                | WriteComment
                | Transition(WorkflowEvent::Activate | WorkflowEvent::Submit)
        ),
        Role::Reviewer => matches!(
            capability,
            ViewApplication
                | ReviewDocument
                | WriteComment
                | Transition(
                    WorkflowEvent::Approve
                        | WorkflowEvent::Reject
                        | WorkflowEvent::FlagActionRequired
                        | WorkflowEvent::DocumentRejected
                )
        ),
        Role::AgentAdmin => matches!(
            capability,
            ViewApplication | DeleteApplication | ManageAgents | ReassignApplication
        ),
        Role::ReviewAdmin => matches!(capability, ViewApplication),
    }
}

/// Check a capability that is not tied to a specific application.
pub fn authorize(actor: &Actor, capability: Capability) -> Result<(), AccessError> {
    if role_allows(actor.role, capability) {
        Ok(())
    } else {
        Err(AccessError::RoleDenied {
            role: actor.role,
            capability,
        })
    }
}

/// Check a capability against one application, enforcing ownership for agents.
pub fn authorize_on(
    actor: &Actor,
    capability: Capability,
    application: &Application,
) -> Result<(), AccessError> {
    authorize(actor, capability)?;
    if actor.is_scoped_to_own() && !actor.owns(application) {
        return Err(AccessError::NotOwner {
            application: application.id.0,
        });
    }
    Ok(())
}

/// Visibility filter used by list endpoints.
pub fn can_see(actor: &Actor, application: &Application) -> bool {
    authorize_on(actor, Capability::ViewApplication, application).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::admissions::domain::{
        ApplicationId, ApplicationStatus, StudentProfile,
    };
    use chrono::Utc;

    fn application(owner: u64) -> Application {
        Application {
            id: ApplicationId(5),
            owner: AccountId(owner),
            profile: StudentProfile::default(),
            status: ApplicationStatus::Draft,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn agents_only_touch_their_own_applications() {
        let owner = Actor::new(AccountId(1), Role::Agent);
        let other = Actor::new(AccountId(2), Role::Agent);
        let app = application(1);

        assert!(authorize_on(&owner, Capability::EditApplication, &app).is_ok());
        assert_eq!(
            authorize_on(&other, Capability::EditApplication, &app),
            Err(AccessError::NotOwner { application: 5 })
        );
        assert!(!can_see(&other, &app));
    }

    #[test]
    fn reviewers_see_everything_but_cannot_edit() {
        let reviewer = Actor::new(AccountId(9), Role::Reviewer);
        let app = application(1);
        assert!(can_see(&reviewer, &app));
        let err = authorize_on(&reviewer, Capability::EditApplication, &app)
            .expect_err("reviewers never edit content");
        assert_eq!(err.to_string(), "role Review Team may not edit application details");
    }

    #[test]
    fn transitions_are_split_between_agents_and_reviewers() {
        let agent = Actor::new(AccountId(1), Role::Agent);
        let reviewer = Actor::new(AccountId(9), Role::Reviewer);
        let submit = Capability::Transition(WorkflowEvent::Submit);
        let approve = Capability::Transition(WorkflowEvent::Approve);

        assert!(authorize(&agent, submit).is_ok());
        assert!(authorize(&agent, approve).is_err());
        assert!(authorize(&reviewer, approve).is_ok());
        assert!(authorize(&reviewer, submit).is_err());
    }

    #[test]
    fn admins_manage_agents_without_workflow_rights() {
        let admin = Actor::new(AccountId(3), Role::AgentAdmin);
        let review_admin = Actor::new(AccountId(4), Role::ReviewAdmin);
        assert!(authorize(&admin, Capability::ReassignApplication).is_ok());
        assert!(authorize(&admin, Capability::ReviewDocument).is_err());
        assert!(can_see(&review_admin, &application(1)));
        assert!(authorize(&review_admin, Capability::ManageAgents).is_err());
    }
}
