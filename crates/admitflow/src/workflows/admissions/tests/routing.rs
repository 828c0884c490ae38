use super::common::*;
use axum::http::{Method, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use crate::workflows::admissions::catalog::DocumentKind;
use crate::workflows::admissions::domain::ApplicationStatus;
use crate::workflows::admissions::lifecycle::WorkflowEvent;
use crate::workflows::admissions::repository::StoreError;
use crate::workflows::admissions::router::workflow_error_response;
use crate::workflows::admissions::service::WorkflowError;

#[tokio::test]
async fn requests_without_a_token_are_unauthorized() {
    let harness = routed();
    let response = harness
        .router
        .oneshot(json_request(Method::GET, "/applications", None, None))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["error"], "missing bearer token");
}

#[tokio::test]
async fn garbage_tokens_are_unauthorized() {
    let harness = routed();
    let response = harness
        .router
        .oneshot(json_request(
            Method::GET,
            "/applications",
            Some("not-a-jwt"),
            None,
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_route_returns_created_draft() {
    let harness = routed();
    let response = harness
        .router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/applications",
            Some(harness.token(&AGENT_A)),
            Some(serde_json::to_value(profile()).expect("profile json")),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["status"], "draft");
    assert_eq!(payload["agent_id"], 1);
    assert_eq!(payload["student_name"], "Priya Raman");
}

#[tokio::test]
async fn create_route_rejects_incomplete_profiles() {
    let harness = routed();
    let mut body = serde_json::to_value(profile()).expect("profile json");
    body["course_name"] = json!("");
    let response = harness
        .router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/applications",
            Some(harness.token(&AGENT_A)),
            Some(body),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let payload = read_json_body(response).await;
    assert!(payload["error"]
        .as_str()
        .expect("message")
        .contains("course_name"));
}

#[tokio::test]
async fn submit_via_patch_without_documents_is_unprocessable() {
    let harness = routed();
    let application = draft(&harness.service, &AGENT_A);

    let response = harness
        .router
        .clone()
        .oneshot(json_request(
            Method::PATCH,
            &format!("/applications/{}", application.id),
            Some(harness.token(&AGENT_A)),
            Some(json!({ "status": "under_review" })),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let payload = read_json_body(response).await;
    assert!(payload["error"]
        .as_str()
        .expect("message")
        .contains("Passport Copy"));
}

#[tokio::test]
async fn unknown_status_values_are_rejected_as_json() {
    let harness = routed();
    let application = draft(&harness.service, &AGENT_A);

    let response = harness
        .router
        .clone()
        .oneshot(json_request(
            Method::PATCH,
            &format!("/applications/{}", application.id),
            Some(harness.token(&AGENT_A)),
            Some(json!({ "status": "submitted" })),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let payload = read_json_body(response).await;
    assert!(payload["error"]
        .as_str()
        .expect("message")
        .contains("unknown variant"));
    let unchanged = harness
        .service
        .application(&AGENT_A, application.id)
        .expect("load");
    assert_eq!(unchanged.status, ApplicationStatus::Draft);
}

#[tokio::test]
async fn malformed_ids_are_rejected_as_json() {
    let harness = routed();
    let response = harness
        .router
        .clone()
        .oneshot(json_request(
            Method::GET,
            "/applications/not-a-number/documents",
            Some(harness.token(&REVIEWER)),
            None,
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload = read_json_body(response).await;
    assert!(payload["error"].is_string());
}

#[tokio::test]
async fn foreign_agent_patch_is_forbidden() {
    let harness = routed();
    let application = draft(&harness.service, &AGENT_A);

    let response = harness
        .router
        .clone()
        .oneshot(json_request(
            Method::PATCH,
            &format!("/applications/{}", application.id),
            Some(harness.token(&AGENT_B)),
            Some(json!({ "student_name": "Hijacked" })),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let unchanged = harness
        .service
        .application(&AGENT_A, application.id)
        .expect("load");
    assert_eq!(unchanged.profile.student_name, "Priya Raman");
}

#[tokio::test]
async fn approving_with_pending_documents_is_a_failed_precondition() {
    let harness = routed();
    let application = draft(&harness.service, &AGENT_A);
    upload_required(&harness.service, &AGENT_A, application.id);
    harness
        .service
        .transition(&AGENT_A, application.id, WorkflowEvent::Submit)
        .expect("submitted");

    let response = harness
        .router
        .clone()
        .oneshot(json_request(
            Method::PATCH,
            &format!("/applications/{}", application.id),
            Some(harness.token(&REVIEWER)),
            Some(json!({ "status": "approved" })),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::PRECONDITION_FAILED);
}

#[tokio::test]
async fn detail_route_returns_documents_and_comments() {
    let harness = routed();
    let application = draft(&harness.service, &AGENT_A);
    upload(
        &harness.service,
        &AGENT_A,
        application.id,
        DocumentKind::PassportCopy,
    );

    let response = harness
        .router
        .clone()
        .oneshot(json_request(
            Method::GET,
            &format!("/applications/{}", application.id),
            Some(harness.token(&REVIEWER)),
            None,
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["application"]["id"], application.id.0);
    assert_eq!(payload["documents"][0]["type"], "passport_copy");
    assert_eq!(payload["documents"][0]["status"], "pending");
    assert!(payload["comments"].as_array().expect("comments").is_empty());
}

#[tokio::test]
async fn missing_application_is_not_found() {
    let harness = routed();
    let response = harness
        .router
        .clone()
        .oneshot(json_request(
            Method::GET,
            "/applications/99",
            Some(harness.token(&REVIEWER)),
            None,
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn document_routes_upload_review_and_delete() {
    let harness = routed();
    let application = draft(&harness.service, &AGENT_A);

    let response = harness
        .router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/documents",
            Some(harness.token(&AGENT_A)),
            Some(json!({
                "application_id": application.id,
                "type": "lor1",
                "file_url": "uploads/lor1.png",
            })),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CREATED);
    let uploaded = read_json_body(response).await;
    assert_eq!(uploaded["content_type"], "image/png");
    let document_id = uploaded["id"].as_u64().expect("document id");

    let response = harness
        .router
        .clone()
        .oneshot(json_request(
            Method::GET,
            &format!("/documents?application_id={}", application.id),
            Some(harness.token(&AGENT_A)),
            None,
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        read_json_body(response)
            .await
            .as_array()
            .expect("documents")
            .len(),
        1
    );

    let response = harness
        .router
        .clone()
        .oneshot(json_request(
            Method::PATCH,
            &format!("/documents/{document_id}"),
            Some(harness.token(&REVIEWER)),
            Some(json!({ "status": "approved" })),
        ))
        .await
        .expect("route executes");
    assert_eq!(
        response.status(),
        StatusCode::PRECONDITION_FAILED,
        "drafts are not under review"
    );

    let response = harness
        .router
        .clone()
        .oneshot(json_request(
            Method::DELETE,
            &format!("/documents/{document_id}"),
            Some(harness.token(&AGENT_A)),
            None,
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    assert!(harness
        .service
        .documents(&AGENT_A, application.id)
        .expect("documents")
        .is_empty());
}

#[tokio::test]
async fn comment_route_refuses_foreign_user_id() {
    let harness = routed();
    let application = draft(&harness.service, &AGENT_A);

    let response = harness
        .router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/comments",
            Some(harness.token(&REVIEWER)),
            Some(json!({
                "application_id": application.id,
                "user_id": AGENT_A.account_id,
                "text": "posted as someone else",
            })),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = harness
        .router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/comments",
            Some(harness.token(&REVIEWER)),
            Some(json!({
                "application_id": application.id,
                "text": "Please upload a clearer scan",
            })),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["user_id"], REVIEWER.account_id.0);
}

#[tokio::test]
async fn summary_route_counts_visible_applications() {
    let harness = routed();
    draft(&harness.service, &AGENT_A);
    draft(&harness.service, &AGENT_B);

    let response = harness
        .router
        .clone()
        .oneshot(json_request(
            Method::GET,
            "/applications/summary",
            Some(harness.token(&AGENT_B)),
            None,
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    let draft_entry = payload
        .as_array()
        .expect("counts")
        .iter()
        .find(|entry| entry["status"] == ApplicationStatus::Draft.as_wire())
        .cloned()
        .expect("draft entry");
    assert_eq!(draft_entry["count"], 1);
    assert_eq!(draft_entry["label"], "Draft");
}

#[test]
fn unavailable_store_is_retryable() {
    let response = workflow_error_response(&WorkflowError::Store(StoreError::Unavailable(
        "database offline".to_string(),
    )));
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn unavailable_store_body_marks_retryable() {
    let response = workflow_error_response(&WorkflowError::Store(StoreError::Unavailable(
        "database offline".to_string(),
    )));
    let payload = read_json_body(response).await;
    assert_eq!(payload["retryable"], true);
}
