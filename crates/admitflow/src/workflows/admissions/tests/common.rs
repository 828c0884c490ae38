use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request};
use axum::response::Response;
use chrono::Duration;
use serde_json::Value;

use crate::workflows::accounts::{
    AccountService, AccountStore, InMemoryAccountStore, SessionAuthority,
};
use crate::workflows::admissions::access::Actor;
use crate::workflows::admissions::catalog::{required_kinds, DocumentKind};
use crate::workflows::admissions::domain::{
    AccountId, Application, ApplicationId, Document, Role, StudentProfile,
};
use crate::workflows::admissions::memory::InMemoryApplicationStore;
use crate::workflows::admissions::router::{admissions_router, AdmissionsState};
use crate::workflows::admissions::service::{AdmissionsService, UploadRequest};

pub(super) const AGENT_A: Actor = Actor::new(AccountId(1), Role::Agent);
pub(super) const AGENT_B: Actor = Actor::new(AccountId(2), Role::Agent);
pub(super) const REVIEWER: Actor = Actor::new(AccountId(3), Role::Reviewer);
pub(super) const AGENT_ADMIN: Actor = Actor::new(AccountId(4), Role::AgentAdmin);
pub(super) const REVIEW_ADMIN: Actor = Actor::new(AccountId(5), Role::ReviewAdmin);

pub(super) type Service = AdmissionsService<InMemoryApplicationStore>;

pub(super) fn profile() -> StudentProfile {
    StudentProfile {
        student_name: "Priya Raman".to_string(),
        mobile: "+91 98450 12345".to_string(),
        email: "priya.raman@example.com".to_string(),
        country: "Germany".to_string(),
        state: "Bavaria".to_string(),
        university: "TU Munich".to_string(),
        course_name: "MSc Informatics".to_string(),
        course_url: "https://www.tum.de/informatics".to_string(),
    }
}

pub(super) fn service() -> (Service, Arc<InMemoryApplicationStore>) {
    let store = Arc::new(InMemoryApplicationStore::default());
    (AdmissionsService::new(store.clone()), store)
}

pub(super) fn draft(service: &Service, owner: &Actor) -> Application {
    service
        .create_application(owner, profile())
        .expect("application created")
}

pub(super) fn upload(
    service: &Service,
    actor: &Actor,
    application_id: ApplicationId,
    kind: DocumentKind,
) -> Document {
    service
        .upload_document(
            actor,
            UploadRequest {
                application_id,
                kind,
                file_url: format!("uploads/{}/{}.pdf", application_id, kind.as_wire()),
            },
        )
        .expect("document uploaded")
}

pub(super) fn upload_required(
    service: &Service,
    actor: &Actor,
    application_id: ApplicationId,
) -> Vec<Document> {
    required_kinds()
        .into_iter()
        .map(|kind| upload(service, actor, application_id, kind))
        .collect()
}

/// Router wired to real sessions. Accounts are provisioned in the order of the actor constants.
pub(super) struct RoutedHarness {
    pub(super) router: axum::Router,
    pub(super) service: Arc<Service>,
    pub(super) tokens: Vec<(Actor, String)>,
}

impl RoutedHarness {
    pub(super) fn token(&self, actor: &Actor) -> &str {
        self.tokens
            .iter()
            .find(|(candidate, _)| candidate == actor)
            .map(|(_, token)| token.as_str())
            .expect("token issued for actor")
    }
}

pub(super) fn routed() -> RoutedHarness {
    let accounts: Arc<dyn AccountStore> = Arc::new(InMemoryAccountStore::default());
    let sessions = Arc::new(SessionAuthority::new(
        "routing-secret",
        Duration::minutes(30),
        accounts.clone(),
    ));
    let account_service = AccountService::new(accounts, sessions.clone());

    let mut tokens = Vec::new();
    for (index, actor) in [AGENT_A, AGENT_B, REVIEWER, AGENT_ADMIN, REVIEW_ADMIN]
        .into_iter()
        .enumerate()
    {
        let account = account_service
            .provision(
                "",
                &format!("user{index}@example.com"),
                "routing-pass",
                actor.role,
            )
            .expect("account provisioned");
        assert_eq!(account.id, actor.account_id);
        let issued = sessions.issue(&account).expect("token issued");
        tokens.push((actor, issued.token));
    }

    let (service, _) = service();
    let service = Arc::new(service);
    let router = admissions_router(AdmissionsState {
        service: service.clone(),
        sessions,
    });
    RoutedHarness {
        router,
        service,
        tokens,
    }
}

pub(super) fn json_request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(serde_json::to_vec(&value).expect("serialize body"))
        }
        None => Body::empty(),
    };
    builder.body(body).expect("request builds")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
