//! Study-abroad application intake, document review, and lifecycle tracking.
//!
//! Agents assemble a student's case file, reviewers approve or reject each document, and the
//! application moves through the lifecycle in [`lifecycle`]. Every write that depends on current
//! state runs inside an [`ApplicationStore::transact`] closure so guards and writes commit
//! together.

pub mod access;
pub mod catalog;
pub mod domain;
pub mod lifecycle;
pub mod memory;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use access::{AccessError, Actor, Capability};
pub use catalog::{DocumentGroup, DocumentKind, DocumentSpec, CATALOG};
pub use domain::{
    AccountId, Application, ApplicationId, ApplicationStatus, Comment, CommentId, Document,
    DocumentId, DocumentStatus, ProfilePatch, Role, StudentProfile,
};
pub use lifecycle::{transition, GuardSnapshot, TransitionError, WorkflowEvent};
pub use memory::InMemoryApplicationStore;
pub use repository::{ApplicationStore, ApplicationTxn, CascadeReport, StoreError, TxnOutcome};
pub use router::{admissions_router, AdmissionsState};
pub use service::{
    AdmissionsService, ApplicationDetail, ApplicationPatch, CommentRequest, CommentView,
    ErrorKind, ReviewDecision, StatusCount, UploadRequest, WorkflowError,
};
