//! Application status state machine.
//!
//! `transition` is the single place where legal status changes are decided. It is pure: callers
//! gather a [`GuardSnapshot`] from the store of record and commit the returned status inside the
//! same store transaction.

use serde::{Deserialize, Serialize};

use super::catalog::{missing_required, DocumentKind};
use super::domain::{ApplicationStatus, Document, DocumentStatus};

/// Events that can move an application between statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// Agent marks a draft as actively being worked on.
    Activate,
    /// Agent submits (or resubmits) the application for review.
    Submit,
    /// Reviewer approves the whole application.
    Approve,
    /// Reviewer rejects the whole application.
    Reject,
    /// Reviewer sends the application back without rejecting a specific document.
    FlagActionRequired,
    /// A document on the application was rejected.
    DocumentRejected,
}

impl WorkflowEvent {
    /// Event requested by `PATCH /applications/:id {status}`.
    pub fn for_target(target: ApplicationStatus) -> Option<Self> {
        match target {
            ApplicationStatus::Draft => None,
            ApplicationStatus::Active => Some(WorkflowEvent::Activate),
            ApplicationStatus::UnderReview => Some(WorkflowEvent::Submit),
            ApplicationStatus::ActionRequired => Some(WorkflowEvent::FlagActionRequired),
            ApplicationStatus::Approved => Some(WorkflowEvent::Approve),
            ApplicationStatus::Rejected => Some(WorkflowEvent::Reject),
        }
    }

    pub const fn describe(self) -> &'static str {
        match self {
            WorkflowEvent::Activate => "activate",
            WorkflowEvent::Submit => "submit",
            WorkflowEvent::Approve => "approve",
            WorkflowEvent::Reject => "reject",
            WorkflowEvent::FlagActionRequired => "flag action required on",
            WorkflowEvent::DocumentRejected => "record a document rejection on",
        }
    }
}

/// Document facts the guards need, captured at commit time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuardSnapshot {
    documents: Vec<(DocumentKind, DocumentStatus)>,
}

impl GuardSnapshot {
    pub fn new<I>(documents: I) -> Self
    where
        I: IntoIterator<Item = (DocumentKind, DocumentStatus)>,
    {
        Self {
            documents: documents.into_iter().collect(),
        }
    }

    pub fn from_documents<'a, I>(documents: I) -> Self
    where
        I: IntoIterator<Item = &'a Document>,
    {
        Self::new(documents.into_iter().map(|doc| (doc.kind, doc.status)))
    }

    pub fn missing_required(&self) -> Vec<DocumentKind> {
        missing_required(self.documents.iter().map(|(kind, _)| *kind))
    }

    pub fn all_approved(&self) -> bool {
        self.documents
            .iter()
            .all(|(_, status)| *status == DocumentStatus::Approved)
    }

    pub fn count(&self, status: DocumentStatus) -> usize {
        self.documents
            .iter()
            .filter(|(_, candidate)| *candidate == status)
            .count()
    }

    pub fn any_rejected(&self) -> bool {
        self.count(DocumentStatus::Rejected) > 0
    }
}

/// Why a transition was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("missing required documents: {}", labels(.missing))]
    MissingRequiredDocuments { missing: Vec<DocumentKind> },
    #[error("{rejected} rejected document(s) must be replaced before resubmitting")]
    RejectedDocumentsOutstanding { rejected: usize },
    #[error("{outstanding} document(s) are not yet approved")]
    DocumentsNotApproved { outstanding: usize },
    #[error("no rejected document is attached")]
    NoRejectedDocument,
    #[error("cannot {} an application that is {}", event_phrase(.event), status_label(.from))]
    IllegalTransition {
        from: ApplicationStatus,
        event: WorkflowEvent,
    },
}

fn event_phrase(event: &WorkflowEvent) -> &'static str {
    event.describe()
}

fn status_label(status: &ApplicationStatus) -> &'static str {
    status.label()
}

fn labels(kinds: &[DocumentKind]) -> String {
    kinds
        .iter()
        .map(|kind| kind.label())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Decide the next status for `event` given the current status and document facts.
pub fn transition(
    from: ApplicationStatus,
    event: WorkflowEvent,
    guard: &GuardSnapshot,
) -> Result<ApplicationStatus, TransitionError> {
    use ApplicationStatus::*;
    use WorkflowEvent::*;

    match (from, event) {
        (Draft, Activate) => Ok(Active),
        (Draft | Active, Submit) => {
            require_complete(guard)?;
            Ok(UnderReview)
        }
        (ActionRequired, Submit) => {
            require_complete(guard)?;
            let rejected = guard.count(DocumentStatus::Rejected);
            if rejected > 0 {
                return Err(TransitionError::RejectedDocumentsOutstanding { rejected });
            }
            Ok(UnderReview)
        }
        (UnderReview, Approve) => {
            if guard.all_approved() {
                Ok(Approved)
            } else {
                Err(TransitionError::DocumentsNotApproved {
                    outstanding: guard.documents.len() - guard.count(DocumentStatus::Approved),
                })
            }
        }
        (UnderReview, Reject) => Ok(Rejected),
        (UnderReview, DocumentRejected) => {
            if guard.any_rejected() {
                Ok(ActionRequired)
            } else {
                Err(TransitionError::NoRejectedDocument)
            }
        }
        (UnderReview, FlagActionRequired) => Ok(ActionRequired),
        (from, event) => Err(TransitionError::IllegalTransition { from, event }),
    }
}

fn require_complete(guard: &GuardSnapshot) -> Result<(), TransitionError> {
    let missing = guard.missing_required();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(TransitionError::MissingRequiredDocuments { missing })
    }
}
