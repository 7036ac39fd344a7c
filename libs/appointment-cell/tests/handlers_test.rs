mod common;

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use appointment_cell::appointment_routes;
use shared_utils::test_utils::{JwtTestUtils, TestUser};

use common::Clinic;

struct Harness {
    clinic: Clinic,
    app: Router,
}

impl Harness {
    async fn with_open_monday(clinician: &TestUser, capacity: u32) -> Self {
        let clinic = Clinic::new();
        clinic.open_mondays(clinician.uuid(), capacity).await;
        let app = appointment_routes(clinic.state.clone());
        Self { clinic, app }
    }

    async fn send(&self, method: Method, uri: &str, user: Option<&TestUser>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(header::AUTHORIZATION, JwtTestUtils::bearer(user, &self.clinic.config));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn book(&self, user: &TestUser, clinician: &TestUser, patient: &TestUser, time: &str) -> (StatusCode, Value) {
        self.send(
            Method::POST,
            "/",
            Some(user),
            Some(json!({
                "clinician_id": clinician.id,
                "patient_id": patient.id,
                "date": "2024-06-03",
                "time": time
            })),
        )
        .await
    }
}

#[tokio::test]
async fn requests_without_token_are_rejected() {
    let clinician = TestUser::clinician("doc@example.com");
    let harness = Harness::with_open_monday(&clinician, 1).await;

    let (status, _) = harness
        .send(Method::GET, &format!("/available-slots/{}/2024-06-03", clinician.id), None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_role_or_non_uuid_subject_fails_closed() {
    let clinician = TestUser::clinician("doc@example.com");
    let harness = Harness::with_open_monday(&clinician, 1).await;
    let uri = format!("/available-slots/{}/2024-06-03", clinician.id);

    let nurse = TestUser::new("nurse@example.com", "nurse");
    let (status, _) = harness.send(Method::GET, &uri, Some(&nurse), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let mut numeric = TestUser::clinician("legacy@example.com");
    numeric.id = "12345".to_string();
    let (status, _) = harness.send(Method::GET, &uri, Some(&numeric), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn available_slots_over_http() {
    let clinician = TestUser::clinician("doc@example.com");
    let patient = TestUser::patient("pat@example.com");
    let harness = Harness::with_open_monday(&clinician, 1).await;

    let (status, body) = harness
        .send(Method::GET, &format!("/available-slots/{}/2024-06-03", clinician.id), Some(&patient), None)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let slots = body["data"].as_array().unwrap();
    assert_eq!(slots.len(), 5);
    assert_eq!(slots[2], json!({"start_time": "10:30", "end_time": "11:00"}));
}

#[tokio::test]
async fn malformed_date_is_bad_request() {
    let clinician = TestUser::clinician("doc@example.com");
    let harness = Harness::with_open_monday(&clinician, 1).await;

    let (status, _) = harness
        .send(Method::GET, &format!("/available-slots/{}/03-06-2024", clinician.id), Some(&clinician), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn book_cancel_rebook_cycle() {
    let clinician = TestUser::clinician("doc@example.com");
    let first = TestUser::patient("first@example.com");
    let second = TestUser::patient("second@example.com");
    let harness = Harness::with_open_monday(&clinician, 1).await;

    let (status, body) = harness.book(&first, &clinician, &first, "9:00").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "scheduled");
    assert_eq!(body["data"]["time"], "09:00");
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = harness.book(&second, &clinician, &second, "09:00").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Requested slot is not available");

    for _ in 0..2 {
        let (status, body) = harness.send(Method::POST, &format!("/{}/cancel", id), Some(&first), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "cancelled");
    }

    let (status, _) = harness.book(&second, &clinician, &second, "09:00").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn invalid_body_is_validation_error() {
    let clinician = TestUser::clinician("doc@example.com");
    let patient = TestUser::patient("pat@example.com");
    let harness = Harness::with_open_monday(&clinician, 1).await;

    let (status, _) = harness.book(&patient, &clinician, &patient, "25:00").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn reschedule_dispatches_on_role() {
    let clinician = TestUser::clinician("doc@example.com");
    let patient = TestUser::patient("pat@example.com");
    let harness = Harness::with_open_monday(&clinician, 1).await;

    let (_, body) = harness.book(&patient, &clinician, &patient, "09:00").await;
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = harness
        .send(
            Method::PATCH,
            &format!("/{}/reschedule", id),
            Some(&patient),
            Some(json!({"new_date": "2024-06-10", "new_time": "11:00"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "rescheduled");

    let (status, body) = harness
        .send(
            Method::PATCH,
            &format!("/{}/reschedule", id),
            Some(&clinician),
            Some(json!({"new_date": "2024-06-10", "new_time": "11:30"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["time"], "11:30");

    let stranger = TestUser::patient("stranger@example.com");
    let (status, _) = harness
        .send(
            Method::PATCH,
            &format!("/{}/reschedule", id),
            Some(&stranger),
            Some(json!({"new_date": "2024-06-10", "new_time": "09:00"})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn status_changes_after_completion_conflict() {
    let clinician = TestUser::clinician("doc@example.com");
    let patient = TestUser::patient("pat@example.com");
    let harness = Harness::with_open_monday(&clinician, 1).await;

    let (_, body) = harness.book(&patient, &clinician, &patient, "09:00").await;
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = harness.send(Method::POST, &format!("/{}/start", id), Some(&clinician), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "in_progress");

    let (status, _) = harness
        .send(Method::PATCH, &format!("/{}/status", id), Some(&patient), Some(json!({"status": "completed"})))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = harness
        .send(Method::PATCH, &format!("/{}/status", id), Some(&clinician), Some(json!({"status": "completed"})))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = harness
        .send(Method::PATCH, &format!("/{}/status", id), Some(&clinician), Some(json!({"status": "cancelled"})))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = harness
        .send(Method::PATCH, &format!("/{}/status", id), Some(&clinician), Some(json!({"status": "in_progress"})))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, body) = harness.send(Method::GET, &format!("/{}", id), Some(&patient), None).await;
    assert_eq!(body["data"]["status"], "completed");
}

#[tokio::test]
async fn notes_and_listings() {
    let clinician = TestUser::clinician("doc@example.com");
    let patient = TestUser::patient("pat@example.com");
    let admin = TestUser::admin("admin@example.com");
    let harness = Harness::with_open_monday(&clinician, 1).await;

    let (_, body) = harness.book(&patient, &clinician, &patient, "09:00").await;
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, _) = harness
        .send(Method::PATCH, &format!("/{}/notes", id), Some(&patient), Some(json!({"notes": "hi"})))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = harness
        .send(Method::PATCH, &format!("/{}/notes", id), Some(&clinician), Some(json!({"notes": "Bring lab results"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["notes"], "Bring lab results");

    let (status, body) = harness
        .send(
            Method::GET,
            &format!("/clinicians/{}?from=2024-06-01&to=2024-06-30", clinician.id),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, _) = harness
        .send(Method::GET, &format!("/clinicians/{}", clinician.id), Some(&patient), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = harness
        .send(Method::GET, &format!("/patients/{}", patient.id), Some(&patient), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["id"], id.as_str());
}

#[tokio::test]
async fn unknown_appointment_is_not_found() {
    let clinician = TestUser::clinician("doc@example.com");
    let harness = Harness::with_open_monday(&clinician, 1).await;

    let (status, _) = harness
        .send(Method::GET, &format!("/{}", uuid::Uuid::new_v4()), Some(&clinician), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = harness.send(Method::GET, "/not-a-uuid", Some(&clinician), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
