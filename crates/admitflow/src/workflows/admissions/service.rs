use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::access::{authorize, authorize_on, can_see, AccessError, Actor, Capability};
use super::catalog::DocumentKind;
use super::domain::{
    file_name_of, AccountId, Application, ApplicationId, ApplicationStatus, Comment, Document,
    DocumentId, DocumentStatus, NewApplication, NewComment, NewDocument, ProfilePatch,
    StudentProfile,
};
use super::lifecycle::{transition, TransitionError, WorkflowEvent};
use super::repository::{ApplicationStore, ApplicationTxn, CascadeReport, StoreError};

/// Broad error categories surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    PreconditionFailed,
    Authorization,
    NotFound,
    Conflict,
    Transport,
}

/// Error raised by the admissions service.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    PreconditionFailed(String),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl WorkflowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkflowError::Validation(_) => ErrorKind::Validation,
            WorkflowError::PreconditionFailed(_) => ErrorKind::PreconditionFailed,
            WorkflowError::Transition(TransitionError::MissingRequiredDocuments { .. }) => {
                ErrorKind::Validation
            }
            WorkflowError::Transition(_) => ErrorKind::PreconditionFailed,
            WorkflowError::Access(_) => ErrorKind::Authorization,
            WorkflowError::Store(StoreError::NotFound { .. }) => ErrorKind::NotFound,
            WorkflowError::Store(StoreError::Conflict(_)) => ErrorKind::Conflict,
            WorkflowError::Store(StoreError::Unavailable(_)) => ErrorKind::Transport,
        }
    }
}

/// Body of `PATCH /applications/:id`: profile edits and/or a requested status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationPatch {
    #[serde(flatten)]
    pub profile: ProfilePatch,
    #[serde(default)]
    pub status: Option<ApplicationStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRequest {
    pub application_id: ApplicationId,
    #[serde(rename = "type")]
    pub kind: DocumentKind,
    pub file_url: String,
}

/// Reviewer decision on a single document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewDecision {
    pub status: DocumentStatus,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRequest {
    pub application_id: ApplicationId,
    #[serde(default)]
    pub document_id: Option<DocumentId>,
    #[serde(default)]
    pub user_id: Option<AccountId>,
    pub text: String,
}

/// Comment as presented to a particular viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: Comment,
    pub tag: Option<&'static str>,
    pub mine: bool,
}

/// Everything the profile page needs in one read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationDetail {
    pub application: Application,
    pub status_label: &'static str,
    pub documents: Vec<Document>,
    pub comments: Vec<CommentView>,
    pub missing_required: Vec<DocumentKind>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentReview {
    pub document: Document,
    pub application: Application,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<Comment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusCount {
    pub status: ApplicationStatus,
    pub label: &'static str,
    pub count: usize,
}

/// Count applications per status in display order, including empty statuses.
pub fn status_counts<'a, I>(applications: I) -> Vec<StatusCount>
where
    I: IntoIterator<Item = &'a Application>,
{
    let mut counts: Vec<StatusCount> = ApplicationStatus::ALL
        .into_iter()
        .map(|status| StatusCount {
            status,
            label: status.label(),
            count: 0,
        })
        .collect();
    for application in applications {
        counts[application.status as usize].count += 1;
    }
    counts
}

/// Service composing access control, the lifecycle state machine, and the store of record.
pub struct AdmissionsService<S> {
    store: Arc<S>,
}

impl<S> AdmissionsService<S>
where
    S: ApplicationStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn create_application(
        &self,
        actor: &Actor,
        profile: StudentProfile,
    ) -> Result<Application, WorkflowError> {
        authorize(actor, Capability::CreateApplication)?;
        let mut profile = profile;
        normalize_profile(&mut profile);
        validate_profile(&profile)?;

        let application = self.store.insert_application(NewApplication {
            owner: actor.account_id,
            profile,
        })?;
        info!(
            application_id = %application.id,
            agent_id = %actor.account_id,
            "application created"
        );
        Ok(application)
    }

    /// Applications visible to the actor, ordered by id.
    pub fn list_applications(&self, actor: &Actor) -> Result<Vec<Application>, WorkflowError> {
        let applications = self.store.applications()?;
        Ok(applications
            .into_iter()
            .filter(|application| can_see(actor, application))
            .collect())
    }

    pub fn summary(&self, actor: &Actor) -> Result<Vec<StatusCount>, WorkflowError> {
        let visible = self.list_applications(actor)?;
        Ok(status_counts(&visible))
    }

    pub fn application(
        &self,
        actor: &Actor,
        id: ApplicationId,
    ) -> Result<Application, WorkflowError> {
        let application = self
            .store
            .application(id)?
            .ok_or_else(|| StoreError::application(id))?;
        authorize_on(actor, Capability::ViewApplication, &application)?;
        Ok(application)
    }

    pub fn detail(
        &self,
        actor: &Actor,
        id: ApplicationId,
    ) -> Result<ApplicationDetail, WorkflowError> {
        let application = self.application(actor, id)?;
        let documents = self.store.documents(id)?;
        let comments = self
            .store
            .comments(id)?
            .into_iter()
            .map(|comment| comment_view(actor, &documents, comment))
            .collect();
        let missing_required =
            super::catalog::missing_required(documents.iter().map(|doc| doc.kind));

        Ok(ApplicationDetail {
            status_label: application.status.label(),
            application,
            documents,
            comments,
            missing_required,
        })
    }

    pub fn documents(
        &self,
        actor: &Actor,
        id: ApplicationId,
    ) -> Result<Vec<Document>, WorkflowError> {
        self.application(actor, id)?;
        Ok(self.store.documents(id)?)
    }

    pub fn comments(
        &self,
        actor: &Actor,
        id: ApplicationId,
    ) -> Result<Vec<CommentView>, WorkflowError> {
        self.application(actor, id)?;
        let documents = self.store.documents(id)?;
        Ok(self
            .store
            .comments(id)?
            .into_iter()
            .map(|comment| comment_view(actor, &documents, comment))
            .collect())
    }

    /// Apply profile edits and/or a status change as one atomic update.
    pub fn update_application(
        &self,
        actor: &Actor,
        id: ApplicationId,
        patch: ApplicationPatch,
    ) -> Result<Application, WorkflowError> {
        let event = match patch.status {
            Some(target) => Some(WorkflowEvent::for_target(target).ok_or_else(|| {
                WorkflowError::PreconditionFailed(format!(
                    "applications cannot be moved back to {}",
                    target.label()
                ))
            })?),
            None => None,
        };
        if patch.profile.is_empty() && event.is_none() {
            return Err(WorkflowError::Validation(
                "update must change at least one field or the status".to_string(),
            ));
        }
        if !patch.profile.is_empty() {
            authorize(actor, Capability::EditApplication)?;
        }
        if let Some(event) = event {
            authorize(actor, Capability::Transition(event))?;
        }

        let outcome = self.store.transact(id, &mut |txn| {
            let now = Utc::now();
            if !patch.profile.is_empty() {
                authorize_on(actor, Capability::EditApplication, txn.application())?;
                let status = txn.application().status;
                if !status.allows_content_edits() {
                    return Err(WorkflowError::PreconditionFailed(format!(
                        "application details are locked while {}",
                        status.label()
                    )));
                }
                txn.apply_patch(&patch.profile, now);
                validate_profile(&txn.application().profile)?;
            }
            if let Some(event) = event {
                apply_event(actor, txn, event)?;
            }
            Ok(())
        })?;

        Ok(outcome.application)
    }

    /// Fire a lifecycle event, re-checking the guard at commit time.
    pub fn transition(
        &self,
        actor: &Actor,
        id: ApplicationId,
        event: WorkflowEvent,
    ) -> Result<Application, WorkflowError> {
        authorize(actor, Capability::Transition(event))?;
        let outcome = self
            .store
            .transact(id, &mut |txn| apply_event(actor, txn, event))?;
        Ok(outcome.application)
    }

    pub fn delete_application(
        &self,
        actor: &Actor,
        id: ApplicationId,
    ) -> Result<CascadeReport, WorkflowError> {
        authorize(actor, Capability::DeleteApplication)?;
        let report = self.store.delete_application(id, &|application| {
            authorize_on(actor, Capability::DeleteApplication, application)?;
            if actor.is_scoped_to_own() && application.status != ApplicationStatus::Draft {
                return Err(WorkflowError::PreconditionFailed(format!(
                    "only draft applications can be deleted; this one is {}",
                    application.status.label()
                )));
            }
            Ok(())
        })?;
        info!(
            application_id = %id,
            actor = %actor.account_id,
            documents = report.documents,
            comments = report.comments,
            "application deleted"
        );
        Ok(report)
    }

    pub fn upload_document(
        &self,
        actor: &Actor,
        request: UploadRequest,
    ) -> Result<Document, WorkflowError> {
        authorize(actor, Capability::UploadDocument)?;
        let file_url = request.file_url.trim().to_string();
        let file_name = file_name_of(&file_url);
        if file_name.is_empty() {
            return Err(WorkflowError::Validation(
                "file reference must name a file".to_string(),
            ));
        }
        if file_name.chars().any(char::is_whitespace) {
            return Err(WorkflowError::Validation(
                "file names may not contain spaces".to_string(),
            ));
        }
        let content_type = mime_guess::from_path(file_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        let outcome = self.store.transact(request.application_id, &mut |txn| {
            authorize_on(actor, Capability::UploadDocument, txn.application())?;
            ensure_documents_open(txn.application())?;
            txn.add_document(NewDocument {
                application_id: request.application_id,
                kind: request.kind,
                file_url: file_url.clone(),
                content_type: content_type.clone(),
            });
            Ok(())
        })?;

        let document = outcome
            .created_documents
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Unavailable("upload was not persisted".to_string()))?;
        info!(
            application_id = %document.application_id,
            document_id = %document.id,
            kind = document.kind.as_wire(),
            "document uploaded"
        );
        Ok(document)
    }

    pub fn delete_document(
        &self,
        actor: &Actor,
        id: DocumentId,
    ) -> Result<Document, WorkflowError> {
        authorize(actor, Capability::DeleteDocument)?;
        let document = self
            .store
            .document(id)?
            .ok_or_else(|| StoreError::document(id))?;

        let outcome = self.store.transact(document.application_id, &mut |txn| {
            authorize_on(actor, Capability::DeleteDocument, txn.application())?;
            ensure_documents_open(txn.application())?;
            let current = txn.document(id).ok_or_else(|| StoreError::document(id))?;
            if current.status == DocumentStatus::Approved {
                return Err(WorkflowError::PreconditionFailed(
                    "approved documents cannot be removed".to_string(),
                ));
            }
            txn.remove_document(id);
            Ok(())
        })?;

        let removed = outcome
            .removed_documents
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::document(id))?;
        info!(
            application_id = %removed.application_id,
            document_id = %removed.id,
            "document deleted"
        );
        Ok(removed)
    }

    /// Approve or reject one pending document. A rejection while the application is under review
    /// also moves it to action required in the same commit.
    pub fn review_document(
        &self,
        actor: &Actor,
        id: DocumentId,
        decision: ReviewDecision,
    ) -> Result<DocumentReview, WorkflowError> {
        authorize(actor, Capability::ReviewDocument)?;
        if decision.status == DocumentStatus::Pending {
            return Err(WorkflowError::Validation(
                "a review must approve or reject the document".to_string(),
            ));
        }
        let note = decision
            .comment
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string);
        let document = self
            .store
            .document(id)?
            .ok_or_else(|| StoreError::document(id))?;

        let outcome = self.store.transact(document.application_id, &mut |txn| {
            authorize_on(actor, Capability::ReviewDocument, txn.application())?;
            let status = txn.application().status;
            if !matches!(
                status,
                ApplicationStatus::UnderReview | ApplicationStatus::ActionRequired
            ) {
                return Err(WorkflowError::PreconditionFailed(format!(
                    "documents can only be reviewed while an application is under review; \
                     this one is {}",
                    status.label()
                )));
            }
            let current = txn.document(id).ok_or_else(|| StoreError::document(id))?;
            if current.status != DocumentStatus::Pending {
                return Err(WorkflowError::PreconditionFailed(format!(
                    "document {} was already {}",
                    id,
                    current.status.as_wire()
                )));
            }
            txn.set_document_status(id, decision.status);

            if decision.status == DocumentStatus::Rejected {
                if let Some(text) = &note {
                    txn.append_comment(NewComment {
                        application_id: txn.application().id,
                        document_id: Some(id),
                        user_id: actor.account_id,
                        text: text.clone(),
                    });
                }
                if status == ApplicationStatus::UnderReview {
                    apply_event(actor, txn, WorkflowEvent::DocumentRejected)?;
                }
            }
            Ok(())
        })?;

        let reviewed = outcome
            .documents
            .iter()
            .find(|doc| doc.id == id)
            .cloned()
            .ok_or_else(|| StoreError::document(id))?;
        if reviewed.status == DocumentStatus::Rejected && note.is_none() {
            warn!(
                document_id = %id,
                application_id = %reviewed.application_id,
                "document rejected without feedback comment"
            );
        }
        info!(
            document_id = %id,
            application_id = %reviewed.application_id,
            status = reviewed.status.as_wire(),
            reviewer = %actor.account_id,
            "document reviewed"
        );

        Ok(DocumentReview {
            document: reviewed,
            application: outcome.application,
            comment: outcome.created_comments.into_iter().next(),
        })
    }

    pub fn add_comment(
        &self,
        actor: &Actor,
        request: CommentRequest,
    ) -> Result<Comment, WorkflowError> {
        authorize(actor, Capability::WriteComment)?;
        if let Some(author) = request.user_id {
            if author != actor.account_id {
                return Err(AccessError::ForeignAuthor.into());
            }
        }
        let text = request.text.trim().to_string();
        if text.is_empty() {
            return Err(WorkflowError::Validation(
                "comment cannot be empty".to_string(),
            ));
        }

        let outcome = self.store.transact(request.application_id, &mut |txn| {
            authorize_on(actor, Capability::WriteComment, txn.application())?;
            if let Some(document_id) = request.document_id {
                if txn.document(document_id).is_none() {
                    return Err(StoreError::document(document_id).into());
                }
            }
            txn.append_comment(NewComment {
                application_id: request.application_id,
                document_id: request.document_id,
                user_id: actor.account_id,
                text: text.clone(),
            });
            Ok(())
        })?;

        let comment = outcome
            .created_comments
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Unavailable("comment was not persisted".to_string()))?;
        debug!(
            application_id = %comment.application_id,
            author = %comment.user_id,
            "comment added"
        );
        Ok(comment)
    }

    /// Hand an application to another agent. The caller verifies the target account.
    pub fn reassign(
        &self,
        actor: &Actor,
        id: ApplicationId,
        agent_id: AccountId,
    ) -> Result<Application, WorkflowError> {
        authorize(actor, Capability::ReassignApplication)?;
        let mut previous = None;
        let outcome = self.store.transact(id, &mut |txn| {
            authorize_on(actor, Capability::ReassignApplication, txn.application())?;
            previous = Some(txn.application().owner);
            txn.set_owner(agent_id, Utc::now());
            Ok(())
        })?;
        info!(
            application_id = %id,
            from = ?previous,
            to = %agent_id,
            "application reassigned"
        );
        Ok(outcome.application)
    }

    /// Applications owned by `owner`, regardless of who is asking.
    pub fn owned_by(&self, owner: AccountId) -> Result<Vec<Application>, WorkflowError> {
        Ok(self
            .store
            .applications()?
            .into_iter()
            .filter(|application| application.owner == owner)
            .collect())
    }
}

fn apply_event(
    actor: &Actor,
    txn: &mut ApplicationTxn,
    event: WorkflowEvent,
) -> Result<(), WorkflowError> {
    authorize_on(actor, Capability::Transition(event), txn.application())?;
    let from = txn.application().status;
    let to = transition(from, event, &txn.guard())?;
    txn.set_status(to, Utc::now());
    info!(
        application_id = %txn.application().id,
        from = from.as_wire(),
        to = to.as_wire(),
        actor = %actor.account_id,
        "application status changed"
    );
    Ok(())
}

fn ensure_documents_open(application: &Application) -> Result<(), WorkflowError> {
    if application.status.is_terminal() {
        return Err(WorkflowError::PreconditionFailed(format!(
            "documents cannot change once an application is {}",
            application.status.label()
        )));
    }
    Ok(())
}

fn normalize_profile(profile: &mut StudentProfile) {
    for field in [
        &mut profile.student_name,
        &mut profile.mobile,
        &mut profile.email,
        &mut profile.country,
        &mut profile.state,
        &mut profile.university,
        &mut profile.course_name,
        &mut profile.course_url,
    ] {
        *field = field.trim().to_string();
    }
}

fn validate_profile(profile: &StudentProfile) -> Result<(), WorkflowError> {
    let missing = profile.missing_fields();
    if !missing.is_empty() {
        return Err(WorkflowError::Validation(format!(
            "missing required fields: {}",
            missing.join(", ")
        )));
    }
    if !profile.email.contains('@') {
        return Err(WorkflowError::Validation(
            "email must be a valid address".to_string(),
        ));
    }
    Ok(())
}

fn comment_view(actor: &Actor, documents: &[Document], comment: Comment) -> CommentView {
    let tag = comment.document_id.and_then(|document_id| {
        documents
            .iter()
            .find(|doc| doc.id == document_id)
            .map(|doc| doc.kind.label())
    });
    CommentView {
        mine: comment.user_id == actor.account_id,
        tag,
        comment,
    }
}
