use std::sync::Arc;

use axum::extract::{FromRef, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::Router;

use crate::error::error_response;
use crate::extract::{Json, Path};
use crate::workflows::admissions::domain::{AccountId, ApplicationId};
use crate::workflows::admissions::repository::{ApplicationStore, StoreError};
use crate::workflows::admissions::router::status_for;

use super::admin::AdminService;
use super::domain::{AgentPatch, AssignRequest, LoginRequest, NewAgentRequest, PasswordChange};
use super::password::PasswordError;
use super::service::{AccountError, AccountService};
use super::session::{Session, SessionAuthority};

pub struct AccountsState<S> {
    pub accounts: Arc<AccountService>,
    pub admin: Arc<AdminService<S>>,
}

impl<S> Clone for AccountsState<S> {
    fn clone(&self) -> Self {
        Self {
            accounts: Arc::clone(&self.accounts),
            admin: Arc::clone(&self.admin),
        }
    }
}

impl<S> FromRef<AccountsState<S>> for Arc<SessionAuthority> {
    fn from_ref(state: &AccountsState<S>) -> Self {
        Arc::clone(state.accounts.sessions())
    }
}

pub fn accounts_router<S>(state: AccountsState<S>) -> Router
where
    S: ApplicationStore + 'static,
{
    Router::new()
        .route("/auth/login", post(login_handler::<S>))
        .route("/auth/logout", post(logout_handler::<S>))
        .route("/auth/me", get(me_handler::<S>))
        .route(
            "/admin/agents",
            get(list_agents_handler::<S>).post(create_agent_handler::<S>),
        )
        .route(
            "/admin/agents/:agent_id",
            get(agent_handler::<S>)
                .patch(update_agent_handler::<S>)
                .delete(delete_agent_handler::<S>),
        )
        .route(
            "/admin/agents/:agent_id/password",
            patch(password_handler::<S>),
        )
        .route(
            "/admin/applications/:application_id/assign",
            patch(assign_handler::<S>),
        )
        .route("/admin/dashboard", get(dashboard_handler::<S>))
        .with_state(state)
}

fn account_status(error: &AccountError) -> StatusCode {
    match error {
        AccountError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        AccountError::RoleMismatch(_) | AccountError::Access(_) => StatusCode::FORBIDDEN,
        AccountError::UnknownRole(_)
        | AccountError::Validation(_)
        | AccountError::Password(PasswordError::TooShort) => StatusCode::UNPROCESSABLE_ENTITY,
        AccountError::Password(PasswordError::Hashing(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        AccountError::NotAnAgent(_) => StatusCode::NOT_FOUND,
        AccountError::AgentHasApplications { .. } => StatusCode::CONFLICT,
        AccountError::Session(error) => error.status(),
        AccountError::Store(StoreError::NotFound { .. }) => StatusCode::NOT_FOUND,
        AccountError::Store(StoreError::Conflict(_)) => StatusCode::CONFLICT,
        AccountError::Store(StoreError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
        AccountError::Workflow(error) => status_for(error.kind()),
    }
}

fn respond<T: serde::Serialize>(status: StatusCode, result: Result<T, AccountError>) -> Response {
    match result {
        Ok(body) => (status, axum::Json(body)).into_response(),
        Err(error) => error_response(account_status(&error), error.to_string()),
    }
}

pub(crate) async fn login_handler<S>(
    State(state): State<AccountsState<S>>,
    Json(request): Json<LoginRequest>,
) -> Response
where
    S: ApplicationStore + 'static,
{
    respond(StatusCode::OK, state.accounts.login(request))
}

pub(crate) async fn logout_handler<S>(
    State(state): State<AccountsState<S>>,
    session: Session,
) -> Response
where
    S: ApplicationStore + 'static,
{
    state.accounts.logout(&session);
    StatusCode::NO_CONTENT.into_response()
}

pub(crate) async fn me_handler<S>(
    State(state): State<AccountsState<S>>,
    session: Session,
) -> Response
where
    S: ApplicationStore + 'static,
{
    respond(StatusCode::OK, state.accounts.me(&session))
}

pub(crate) async fn list_agents_handler<S>(
    State(state): State<AccountsState<S>>,
    session: Session,
) -> Response
where
    S: ApplicationStore + 'static,
{
    respond(StatusCode::OK, state.accounts.list_agents(&session.actor))
}

pub(crate) async fn create_agent_handler<S>(
    State(state): State<AccountsState<S>>,
    session: Session,
    Json(request): Json<NewAgentRequest>,
) -> Response
where
    S: ApplicationStore + 'static,
{
    respond(
        StatusCode::CREATED,
        state.accounts.create_agent(&session.actor, request),
    )
}

pub(crate) async fn agent_handler<S>(
    State(state): State<AccountsState<S>>,
    session: Session,
    Path(agent_id): Path<AccountId>,
) -> Response
where
    S: ApplicationStore + 'static,
{
    respond(StatusCode::OK, state.accounts.agent(&session.actor, agent_id))
}

pub(crate) async fn update_agent_handler<S>(
    State(state): State<AccountsState<S>>,
    session: Session,
    Path(agent_id): Path<AccountId>,
    Json(patch): Json<AgentPatch>,
) -> Response
where
    S: ApplicationStore + 'static,
{
    respond(
        StatusCode::OK,
        state.accounts.update_agent(&session.actor, agent_id, patch),
    )
}

pub(crate) async fn delete_agent_handler<S>(
    State(state): State<AccountsState<S>>,
    session: Session,
    Path(agent_id): Path<AccountId>,
) -> Response
where
    S: ApplicationStore + 'static,
{
    respond(
        StatusCode::OK,
        state.admin.delete_agent(&session.actor, agent_id),
    )
}

pub(crate) async fn password_handler<S>(
    State(state): State<AccountsState<S>>,
    session: Session,
    Path(agent_id): Path<AccountId>,
    Json(change): Json<PasswordChange>,
) -> Response
where
    S: ApplicationStore + 'static,
{
    match state
        .accounts
        .change_password(&session.actor, agent_id, change)
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(account_status(&error), error.to_string()),
    }
}

pub(crate) async fn assign_handler<S>(
    State(state): State<AccountsState<S>>,
    session: Session,
    Path(application_id): Path<ApplicationId>,
    Json(request): Json<AssignRequest>,
) -> Response
where
    S: ApplicationStore + 'static,
{
    respond(
        StatusCode::OK,
        state
            .admin
            .reassign(&session.actor, application_id, request.agent_id),
    )
}

pub(crate) async fn dashboard_handler<S>(
    State(state): State<AccountsState<S>>,
    session: Session,
) -> Response
where
    S: ApplicationStore + 'static,
{
    respond(StatusCode::OK, state.admin.dashboard(&session.actor))
}
