use std::sync::Arc;

use axum::extract::{FromRef, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::Router;
use serde::Deserialize;

use crate::error::error_response;
use crate::extract::{Json, Path, Query};
use crate::workflows::accounts::session::{Session, SessionAuthority};

use super::domain::{ApplicationId, DocumentId, StudentProfile};
use super::repository::ApplicationStore;
use super::service::{
    AdmissionsService, ApplicationPatch, CommentRequest, ErrorKind, ReviewDecision, UploadRequest,
    WorkflowError,
};

/// Shared state for the admissions routes.
pub struct AdmissionsState<S> {
    pub service: Arc<AdmissionsService<S>>,
    pub sessions: Arc<SessionAuthority>,
}

impl<S> Clone for AdmissionsState<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            sessions: Arc::clone(&self.sessions),
        }
    }
}

impl<S> FromRef<AdmissionsState<S>> for Arc<SessionAuthority> {
    fn from_ref(state: &AdmissionsState<S>) -> Self {
        Arc::clone(&state.sessions)
    }
}

pub fn admissions_router<S>(state: AdmissionsState<S>) -> Router
where
    S: ApplicationStore + 'static,
{
    Router::new()
        .route(
            "/applications",
            get(list_handler::<S>).post(create_handler::<S>),
        )
        .route("/applications/summary", get(summary_handler::<S>))
        .route(
            "/applications/:application_id",
            get(detail_handler::<S>)
                .patch(update_handler::<S>)
                .delete(delete_handler::<S>),
        )
        .route(
            "/applications/:application_id/documents",
            get(documents_handler::<S>),
        )
        .route(
            "/applications/:application_id/comments",
            get(comments_handler::<S>),
        )
        .route(
            "/documents",
            get(document_query_handler::<S>).post(upload_handler::<S>),
        )
        .route(
            "/documents/:document_id",
            patch(review_handler::<S>).delete(delete_document_handler::<S>),
        )
        .route("/comments", post(comment_handler::<S>))
        .with_state(state)
}

pub(crate) fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::PreconditionFailed => StatusCode::PRECONDITION_FAILED,
        ErrorKind::Authorization => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Transport => StatusCode::SERVICE_UNAVAILABLE,
    }
}

pub(crate) fn workflow_error_response(error: &WorkflowError) -> Response {
    error_response(status_for(error.kind()), error.to_string())
}

fn respond<T: serde::Serialize>(status: StatusCode, result: Result<T, WorkflowError>) -> Response {
    match result {
        Ok(body) => (status, axum::Json(body)).into_response(),
        Err(error) => workflow_error_response(&error),
    }
}

pub(crate) async fn list_handler<S>(
    State(state): State<AdmissionsState<S>>,
    session: Session,
) -> Response
where
    S: ApplicationStore + 'static,
{
    respond(StatusCode::OK, state.service.list_applications(&session.actor))
}

pub(crate) async fn create_handler<S>(
    State(state): State<AdmissionsState<S>>,
    session: Session,
    Json(profile): Json<StudentProfile>,
) -> Response
where
    S: ApplicationStore + 'static,
{
    respond(
        StatusCode::CREATED,
        state.service.create_application(&session.actor, profile),
    )
}

pub(crate) async fn summary_handler<S>(
    State(state): State<AdmissionsState<S>>,
    session: Session,
) -> Response
where
    S: ApplicationStore + 'static,
{
    respond(StatusCode::OK, state.service.summary(&session.actor))
}

pub(crate) async fn detail_handler<S>(
    State(state): State<AdmissionsState<S>>,
    session: Session,
    Path(application_id): Path<ApplicationId>,
) -> Response
where
    S: ApplicationStore + 'static,
{
    respond(
        StatusCode::OK,
        state.service.detail(&session.actor, application_id),
    )
}

pub(crate) async fn update_handler<S>(
    State(state): State<AdmissionsState<S>>,
    session: Session,
    Path(application_id): Path<ApplicationId>,
    Json(patch): Json<ApplicationPatch>,
) -> Response
where
    S: ApplicationStore + 'static,
{
    respond(
        StatusCode::OK,
        state
            .service
            .update_application(&session.actor, application_id, patch),
    )
}

pub(crate) async fn delete_handler<S>(
    State(state): State<AdmissionsState<S>>,
    session: Session,
    Path(application_id): Path<ApplicationId>,
) -> Response
where
    S: ApplicationStore + 'static,
{
    respond(
        StatusCode::OK,
        state
            .service
            .delete_application(&session.actor, application_id),
    )
}

pub(crate) async fn documents_handler<S>(
    State(state): State<AdmissionsState<S>>,
    session: Session,
    Path(application_id): Path<ApplicationId>,
) -> Response
where
    S: ApplicationStore + 'static,
{
    respond(
        StatusCode::OK,
        state.service.documents(&session.actor, application_id),
    )
}

#[derive(Debug, Deserialize)]
pub(crate) struct DocumentQuery {
    application_id: Option<ApplicationId>,
}

pub(crate) async fn document_query_handler<S>(
    State(state): State<AdmissionsState<S>>,
    session: Session,
    Query(query): Query<DocumentQuery>,
) -> Response
where
    S: ApplicationStore + 'static,
{
    match query.application_id {
        Some(application_id) => respond(
            StatusCode::OK,
            state.service.documents(&session.actor, application_id),
        ),
        None => error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "application_id query parameter is required",
        ),
    }
}

pub(crate) async fn comments_handler<S>(
    State(state): State<AdmissionsState<S>>,
    session: Session,
    Path(application_id): Path<ApplicationId>,
) -> Response
where
    S: ApplicationStore + 'static,
{
    respond(
        StatusCode::OK,
        state.service.comments(&session.actor, application_id),
    )
}

pub(crate) async fn upload_handler<S>(
    State(state): State<AdmissionsState<S>>,
    session: Session,
    Json(request): Json<UploadRequest>,
) -> Response
where
    S: ApplicationStore + 'static,
{
    respond(
        StatusCode::CREATED,
        state.service.upload_document(&session.actor, request),
    )
}

pub(crate) async fn review_handler<S>(
    State(state): State<AdmissionsState<S>>,
    session: Session,
    Path(document_id): Path<DocumentId>,
    Json(decision): Json<ReviewDecision>,
) -> Response
where
    S: ApplicationStore + 'static,
{
    respond(
        StatusCode::OK,
        state
            .service
            .review_document(&session.actor, document_id, decision),
    )
}

pub(crate) async fn delete_document_handler<S>(
    State(state): State<AdmissionsState<S>>,
    session: Session,
    Path(document_id): Path<DocumentId>,
) -> Response
where
    S: ApplicationStore + 'static,
{
    respond(
        StatusCode::OK,
        state.service.delete_document(&session.actor, document_id),
    )
}

pub(crate) async fn comment_handler<S>(
    State(state): State<AdmissionsState<S>>,
    session: Session,
    Json(request): Json<CommentRequest>,
) -> Response
where
    S: ApplicationStore + 'static,
{
    respond(
        StatusCode::CREATED,
        state.service.add_comment(&session.actor, request),
    )
}
