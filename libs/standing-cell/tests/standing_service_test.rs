use assert_matches::assert_matches;
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shared_utils::test_utils::TestConfig;
use standing_cell::models::StandingError;
use standing_cell::services::standing::StandingService;

fn standing_row(patient_id: Uuid, count: i32, blocked: bool) -> serde_json::Value {
    json!({
        "patient_id": patient_id,
        "absence_count": count,
        "is_blocked": blocked,
        "updated_at": Utc::now().to_rfc3339()
    })
}

#[tokio::test]
async fn missing_row_reads_as_clean_standing() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_base_url(&mock_server.uri()).to_app_config();
    let patient_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/patient_standing"))
        .and(query_param("patient_id", format!("eq.{}", patient_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let service = StandingService::new(&config);
    let standing = service
        .get_standing(patient_id, "test-token")
        .await
        .expect("lookup should succeed");

    assert_eq!(standing.patient_id, patient_id);
    assert_eq!(standing.absence_count, 0);
    assert!(!standing.is_blocked);
}

#[tokio::test]
async fn second_absence_does_not_block() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_base_url(&mock_server.uri()).to_app_config();
    let patient_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/patient_standing"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            standing_row(patient_id, 1, false)
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/patient_standing"))
        .and(body_partial_json(json!({
            "absence_count": 2,
            "is_blocked": false
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            standing_row(patient_id, 2, false)
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = StandingService::new(&config);
    let standing = service
        .record_absence(patient_id, "test-token")
        .await
        .expect("recording should succeed");

    assert_eq!(standing.absence_count, 2);
    assert!(!standing.is_blocked);
}

#[tokio::test]
async fn third_absence_blocks_the_patient() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_base_url(&mock_server.uri()).to_app_config();
    let patient_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/patient_standing"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            standing_row(patient_id, 2, false)
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/patient_standing"))
        .and(body_partial_json(json!({
            "absence_count": 3,
            "is_blocked": true
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            standing_row(patient_id, 3, true)
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = StandingService::new(&config);
    let standing = service
        .record_absence(patient_id, "test-token")
        .await
        .expect("recording should succeed");

    assert_eq!(standing.absence_count, 3);
    assert!(standing.is_blocked);
}

#[tokio::test]
async fn unblock_keeps_absence_counter() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_base_url(&mock_server.uri()).to_app_config();
    let patient_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/patient_standing"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            standing_row(patient_id, 3, true)
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/patient_standing"))
        .and(body_partial_json(json!({
            "absence_count": 3,
            "is_blocked": false
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            standing_row(patient_id, 3, false)
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = StandingService::new(&config);
    let standing = service
        .unblock(patient_id, "test-token")
        .await
        .expect("unblock should succeed");

    assert_eq!(standing.absence_count, 3);
    assert!(!standing.is_blocked);
}

#[tokio::test]
async fn unblocking_an_unblocked_patient_fails() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_base_url(&mock_server.uri()).to_app_config();
    let patient_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/patient_standing"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            standing_row(patient_id, 1, false)
        ])))
        .mount(&mock_server)
        .await;

    let service = StandingService::new(&config);
    let result = service.unblock(patient_id, "test-token").await;

    assert_matches!(result, Err(StandingError::NotBlocked));
}
