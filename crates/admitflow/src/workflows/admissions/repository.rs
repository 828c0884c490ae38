use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{
    AccountId, Application, ApplicationId, ApplicationStatus, Comment, Document, DocumentId,
    DocumentStatus, NewApplication, NewComment, NewDocument, ProfilePatch,
};
use super::lifecycle::GuardSnapshot;
use super::service::WorkflowError;

/// Storage abstraction for applications and the documents and comments they own.
///
/// Reads return owned snapshots. Every write that depends on existing state goes through
/// [`ApplicationStore::transact`], which must run the closure and apply its staged changes as one
/// atomic step, or apply nothing when the closure fails.
pub trait ApplicationStore: Send + Sync {
    fn insert_application(&self, new: NewApplication) -> Result<Application, StoreError>;
    fn application(&self, id: ApplicationId) -> Result<Option<Application>, StoreError>;
    /// All applications ordered by id.
    fn applications(&self) -> Result<Vec<Application>, StoreError>;
    fn documents(&self, application_id: ApplicationId) -> Result<Vec<Document>, StoreError>;
    fn document(&self, id: DocumentId) -> Result<Option<Document>, StoreError>;
    fn comments(&self, application_id: ApplicationId) -> Result<Vec<Comment>, StoreError>;

    fn transact(
        &self,
        id: ApplicationId,
        unit: &mut dyn FnMut(&mut ApplicationTxn) -> Result<(), WorkflowError>,
    ) -> Result<TxnOutcome, WorkflowError>;

    /// Remove an application with its documents and comments once `check` accepts it.
    fn delete_application(
        &self,
        id: ApplicationId,
        check: &dyn Fn(&Application) -> Result<(), WorkflowError>,
    ) -> Result<CascadeReport, WorkflowError>;
}

/// Error enumeration for store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: u64 },
    #[error("{0}")]
    Conflict(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn application(id: ApplicationId) -> Self {
        StoreError::NotFound {
            entity: "application",
            id: id.0,
        }
    }

    pub fn document(id: DocumentId) -> Self {
        StoreError::NotFound {
            entity: "document",
            id: id.0,
        }
    }
}

/// Working copy of one application handed to a transaction closure.
///
/// Mutations are staged; the store applies them only after the closure returns `Ok`.
#[derive(Debug, Clone)]
pub struct ApplicationTxn {
    application: Application,
    documents: Vec<Document>,
    staged_documents: Vec<NewDocument>,
    removed_documents: Vec<DocumentId>,
    staged_comments: Vec<NewComment>,
}

impl ApplicationTxn {
    pub fn new(application: Application, documents: Vec<Document>) -> Self {
        Self {
            application,
            documents,
            staged_documents: Vec::new(),
            removed_documents: Vec::new(),
            staged_comments: Vec::new(),
        }
    }

    pub fn application(&self) -> &Application {
        &self.application
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn document(&self, id: DocumentId) -> Option<&Document> {
        self.documents.iter().find(|doc| doc.id == id)
    }

    /// Guard facts including documents staged earlier in this transaction.
    pub fn guard(&self) -> GuardSnapshot {
        GuardSnapshot::new(
            self.documents
                .iter()
                .map(|doc| (doc.kind, doc.status))
                .chain(
                    self.staged_documents
                        .iter()
                        .map(|doc| (doc.kind, DocumentStatus::Pending)),
                ),
        )
    }

    pub fn set_status(&mut self, status: ApplicationStatus, at: DateTime<Utc>) {
        self.application.status = status;
        self.application.updated_at = at;
    }

    pub fn set_owner(&mut self, owner: AccountId, at: DateTime<Utc>) {
        self.application.owner = owner;
        self.application.updated_at = at;
    }

    pub fn apply_patch(&mut self, patch: &ProfilePatch, at: DateTime<Utc>) {
        patch.apply(&mut self.application.profile);
        self.application.updated_at = at;
    }

    /// Returns false when the document is not part of this application.
    pub fn set_document_status(&mut self, id: DocumentId, status: DocumentStatus) -> bool {
        match self.documents.iter_mut().find(|doc| doc.id == id) {
            Some(doc) => {
                doc.status = status;
                true
            }
            None => false,
        }
    }

    pub fn add_document(&mut self, document: NewDocument) {
        self.staged_documents.push(document);
    }

    pub fn remove_document(&mut self, id: DocumentId) -> Option<Document> {
        let index = self.documents.iter().position(|doc| doc.id == id)?;
        self.removed_documents.push(id);
        Some(self.documents.remove(index))
    }

    pub fn append_comment(&mut self, comment: NewComment) {
        self.staged_comments.push(comment);
    }

    /// Hands the staged changes to a store implementation for commit.
    pub fn into_changes(self) -> TxnChanges {
        TxnChanges {
            application: self.application,
            documents: self.documents,
            staged_documents: self.staged_documents,
            removed_documents: self.removed_documents,
            staged_comments: self.staged_comments,
        }
    }
}

/// Everything a store must persist when committing an [`ApplicationTxn`].
#[derive(Debug, Clone)]
pub struct TxnChanges {
    pub application: Application,
    pub documents: Vec<Document>,
    pub staged_documents: Vec<NewDocument>,
    pub removed_documents: Vec<DocumentId>,
    pub staged_comments: Vec<NewComment>,
}

/// Committed state returned from a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxnOutcome {
    pub application: Application,
    pub documents: Vec<Document>,
    pub created_documents: Vec<Document>,
    pub removed_documents: Vec<Document>,
    pub created_comments: Vec<Comment>,
}

/// Rows removed alongside a deleted application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CascadeReport {
    pub documents: usize,
    pub comments: usize,
}
