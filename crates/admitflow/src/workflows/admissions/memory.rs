use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;

use super::domain::{
    Application, ApplicationId, ApplicationStatus, Comment, CommentId, Document, DocumentId,
    DocumentStatus, NewApplication, NewComment, NewDocument,
};
use super::repository::{
    ApplicationStore, ApplicationTxn, CascadeReport, StoreError, TxnChanges, TxnOutcome,
};
use super::service::WorkflowError;

/// Process-local store of record. One mutex serializes writers so a transaction closure and its
/// commit observe no interleaved changes.
#[derive(Default, Clone)]
pub struct InMemoryApplicationStore {
    state: Arc<Mutex<StoreState>>,
}

#[derive(Default)]
struct StoreState {
    applications: BTreeMap<ApplicationId, Application>,
    documents: BTreeMap<DocumentId, Document>,
    comments: BTreeMap<CommentId, Comment>,
    last_application: u64,
    last_document: u64,
    last_comment: u64,
}

impl StoreState {
    fn documents_of(&self, id: ApplicationId) -> Vec<Document> {
        self.documents
            .values()
            .filter(|doc| doc.application_id == id)
            .cloned()
            .collect()
    }

    fn insert_document(&mut self, new: NewDocument) -> Document {
        self.last_document += 1;
        let document = Document {
            id: DocumentId(self.last_document),
            application_id: new.application_id,
            kind: new.kind,
            file_url: new.file_url,
            content_type: new.content_type,
            status: DocumentStatus::Pending,
            uploaded_at: Utc::now(),
        };
        self.documents.insert(document.id, document.clone());
        document
    }

    fn insert_comment(&mut self, new: NewComment) -> Comment {
        self.last_comment += 1;
        let comment = Comment {
            id: CommentId(self.last_comment),
            application_id: new.application_id,
            document_id: new.document_id,
            user_id: new.user_id,
            text: new.text,
            created_at: Utc::now(),
        };
        self.comments.insert(comment.id, comment.clone());
        comment
    }

    fn commit(&mut self, changes: TxnChanges) -> TxnOutcome {
        let TxnChanges {
            application,
            documents,
            staged_documents,
            removed_documents,
            staged_comments,
        } = changes;

        let removed_documents: Vec<Document> = removed_documents
            .into_iter()
            .filter_map(|id| self.documents.remove(&id))
            .collect();
        for comment in self.comments.values_mut() {
            if removed_documents
                .iter()
                .any(|removed| comment.document_id == Some(removed.id))
            {
                comment.document_id = None;
            }
        }
        for document in documents {
            self.documents.insert(document.id, document);
        }
        let created_documents: Vec<Document> = staged_documents
            .into_iter()
            .map(|new| self.insert_document(new))
            .collect();
        let created_comments: Vec<Comment> = staged_comments
            .into_iter()
            .map(|new| self.insert_comment(new))
            .collect();

        let id = application.id;
        self.applications.insert(id, application.clone());

        TxnOutcome {
            application,
            documents: self.documents_of(id),
            created_documents,
            removed_documents,
            created_comments,
        }
    }
}

impl InMemoryApplicationStore {
    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("application store lock poisoned".to_string()))
    }
}

impl ApplicationStore for InMemoryApplicationStore {
    fn insert_application(&self, new: NewApplication) -> Result<Application, StoreError> {
        let mut state = self.lock()?;
        state.last_application += 1;
        let now = Utc::now();
        let application = Application {
            id: ApplicationId(state.last_application),
            owner: new.owner,
            profile: new.profile,
            status: ApplicationStatus::Draft,
            created_at: now,
            updated_at: now,
        };
        state
            .applications
            .insert(application.id, application.clone());
        Ok(application)
    }

    fn application(&self, id: ApplicationId) -> Result<Option<Application>, StoreError> {
        Ok(self.lock()?.applications.get(&id).cloned())
    }

    fn applications(&self) -> Result<Vec<Application>, StoreError> {
        Ok(self.lock()?.applications.values().cloned().collect())
    }

    fn documents(&self, application_id: ApplicationId) -> Result<Vec<Document>, StoreError> {
        Ok(self.lock()?.documents_of(application_id))
    }

    fn document(&self, id: DocumentId) -> Result<Option<Document>, StoreError> {
        Ok(self.lock()?.documents.get(&id).cloned())
    }

    fn comments(&self, application_id: ApplicationId) -> Result<Vec<Comment>, StoreError> {
        Ok(self
            .lock()?
            .comments
            .values()
            .filter(|comment| comment.application_id == application_id)
            .cloned()
            .collect())
    }

    fn transact(
        &self,
        id: ApplicationId,
        unit: &mut dyn FnMut(&mut ApplicationTxn) -> Result<(), WorkflowError>,
    ) -> Result<TxnOutcome, WorkflowError> {
        let mut state = self.lock()?;
        let application = state
            .applications
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::application(id))?;
        let mut txn = ApplicationTxn::new(application, state.documents_of(id));
        unit(&mut txn)?;
        Ok(state.commit(txn.into_changes()))
    }

    fn delete_application(
        &self,
        id: ApplicationId,
        check: &dyn Fn(&Application) -> Result<(), WorkflowError>,
    ) -> Result<CascadeReport, WorkflowError> {
        let mut state = self.lock()?;
        let application = state
            .applications
            .get(&id)
            .ok_or_else(|| StoreError::application(id))?;
        check(application)?;

        state.applications.remove(&id);
        let documents_before = state.documents.len();
        state.documents.retain(|_, doc| doc.application_id != id);
        let comments_before = state.comments.len();
        state
            .comments
            .retain(|_, comment| comment.application_id != id);

        Ok(CascadeReport {
            documents: documents_before - state.documents.len(),
            comments: comments_before - state.comments.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::admissions::catalog::DocumentKind;
    use crate::workflows::admissions::domain::{AccountId, StudentProfile};

    fn seeded() -> (InMemoryApplicationStore, Application) {
        let store = InMemoryApplicationStore::default();
        let application = store
            .insert_application(NewApplication {
                owner: AccountId(1),
                profile: StudentProfile::default(),
            })
            .expect("insert succeeds");
        (store, application)
    }

    fn upload(kind: DocumentKind, application_id: ApplicationId) -> NewDocument {
        NewDocument {
            application_id,
            kind,
            file_url: format!("uploads/{}.pdf", kind.as_wire()),
            content_type: "application/pdf".to_string(),
        }
    }

    #[test]
    fn ids_are_allocated_from_one() {
        let (store, first) = seeded();
        assert_eq!(first.id, ApplicationId(1));
        assert_eq!(first.status, ApplicationStatus::Draft);
        let outcome = store
            .transact(first.id, &mut |txn| {
                txn.add_document(upload(DocumentKind::CvResume, first.id));
                Ok(())
            })
            .expect("commit");
        assert_eq!(outcome.created_documents[0].id, DocumentId(1));
        assert_eq!(outcome.created_documents[0].status, DocumentStatus::Pending);
    }

    #[test]
    fn failed_transactions_leave_state_untouched() {
        let (store, app) = seeded();
        let result = store.transact(app.id, &mut |txn| {
            txn.add_document(upload(DocumentKind::Mark10, app.id));
            txn.set_status(ApplicationStatus::UnderReview, Utc::now());
            Err(WorkflowError::Validation("abort".to_string()))
        });
        assert!(result.is_err());
        assert!(store.documents(app.id).expect("read").is_empty());
        assert_eq!(
            store.application(app.id).expect("read").expect("present").status,
            ApplicationStatus::Draft
        );
    }

    #[test]
    fn transact_reports_missing_application() {
        let store = InMemoryApplicationStore::default();
        match store.transact(ApplicationId(42), &mut |_| Ok(())) {
            Err(WorkflowError::Store(StoreError::NotFound { entity, id })) => {
                assert_eq!((entity, id), ("application", 42));
            }
            other => panic!("expected not found, got {other:?}"),
        }
    }

    #[test]
    fn delete_cascades_documents_and_comments() {
        let (store, app) = seeded();
        let other = store
            .insert_application(NewApplication {
                owner: AccountId(1),
                profile: StudentProfile::default(),
            })
            .expect("insert");
        for id in [app.id, other.id] {
            store
                .transact(id, &mut |txn| {
                    txn.add_document(upload(DocumentKind::PassportCopy, id));
                    txn.append_comment(NewComment {
                        application_id: id,
                        document_id: None,
                        user_id: AccountId(1),
                        text: "uploaded".to_string(),
                    });
                    Ok(())
                })
                .expect("commit");
        }

        let report = store
            .delete_application(app.id, &|_| Ok(()))
            .expect("delete");
        assert_eq!(report, CascadeReport { documents: 1, comments: 1 });
        assert!(store.application(app.id).expect("read").is_none());
        assert_eq!(store.documents(other.id).expect("read").len(), 1);
        assert_eq!(store.comments(other.id).expect("read").len(), 1);
    }

    #[test]
    fn delete_respects_check() {
        let (store, app) = seeded();
        let result = store.delete_application(app.id, &|_| {
            Err(WorkflowError::PreconditionFailed("locked".to_string()))
        });
        assert!(matches!(result, Err(WorkflowError::PreconditionFailed(_))));
        assert!(store.application(app.id).expect("read").is_some());
    }
}
