/// Integration tests with a mocked intelligence backend
/// Exercises the lead-detail flow end to end without a real backend
use lead_detail_bff::config::Config;
use lead_detail_bff::lead_detail::{LeadDetailService, ViewActivity};
use lead_detail_bff::models::{
    AlignmentSource, Confidence, QualificationDecision, RawServiceMatch, ValidationStatus,
};
use lead_detail_bff::session::ViewSlot;
use lead_detail_bff::view_state::{AlignmentState, LeadSlot, LeadView, ViewPhase};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper function to create a service pointed at the mock backend
fn create_service(server: &MockServer) -> LeadDetailService {
    LeadDetailService::new(&Config::with_backend(server.uri())).unwrap()
}

/// Waits for every background task started by an activation
async fn settle(activity: ViewActivity) {
    for task in activity.tasks {
        task.await.unwrap();
    }
}

fn lead_json(id: &str, matched_services: Value, validation_status: Option<&str>) -> Value {
    let mut lead = json!({
        "id": id,
        "companyName": "Acme Corp",
        "industry": "Retail",
        "companySize": "500-1000",
        "budget": "$200K-$500K",
        "timeline": "Q3",
        "painPoints": "Legacy checkout platform",
        "score": 92.0,
        "profileScore": 0,
        "finalScore": 0,
        "qualificationDecision": "Proceed",
        "matched_services": matched_services
    });
    if let Some(status) = validation_status {
        lead["validationStatus"] = json!(status);
    }
    lead
}

async fn mount_lead(server: &MockServer, id: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/leads/{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

fn completed_validation() -> Value {
    json!({
        "status": "completed",
        "profile_score": 68.0,
        "final_score": 80.0,
        "qualification_decision": "Proceed",
        "profile_validation": {
            "company_match_score": 90,
            "designation_score": 70,
            "content_relevance_score": 50,
            "total_profile_score": 68,
            "reasoning": "Current CTO at Acme",
            "designation": "CTO",
            "is_decision_maker": true
        }
    })
}

fn profile(view: &LeadView) -> &lead_detail_bff::view_state::LeadProfile {
    match &view.lead {
        LeadSlot::Loaded(profile) => profile,
        other => panic!("expected loaded lead, got {:?}", other),
    }
}

#[tokio::test]
async fn test_stored_alignment_skips_backend_and_validation_fires_once() {
    let server = MockServer::start().await;
    mount_lead(
        &server,
        "L1",
        lead_json(
            "L1",
            json!([{"service": "Cloud Migration", "cosine_similarity": 92}]),
            None,
        ),
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/intelligence/service-alignment/L1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/intelligence/validate-profile/L1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completed_validation()))
        .expect(1)
        .mount(&server)
        .await;

    let service = create_service(&server);
    let slot = Arc::new(ViewSlot::new());
    let activity = service.open(slot.clone(), "L1", None).await.unwrap();

    // Returned right after the lead loaded: both enrichments still running
    assert_eq!(activity.view.alignment, AlignmentState::Loading);
    assert!(activity.view.validation.in_flight);
    settle(activity).await;

    let view = slot.snapshot().await.unwrap();
    let alignment = view.alignment().unwrap();
    assert_eq!(alignment.source, AlignmentSource::Stored);
    assert_eq!(alignment.services[0].name, "Cloud Migration");
    assert_eq!(alignment.services[0].confidence, Confidence::High);

    assert_eq!(view.validation.status, ValidationStatus::Completed);
    let scores = view.validation.scores.as_ref().unwrap();
    assert_eq!(scores.profile_score, 68.0);
    assert_eq!(scores.final_score, 80.0);
    assert_eq!(scores.qualification_decision, QualificationDecision::Proceed);
    assert_eq!(
        scores
            .profile_validation
            .as_ref()
            .and_then(|p| p.designation.as_deref()),
        Some("CTO")
    );

    // Pre-existing lead fields survive the validation merge
    let lead = profile(&view);
    assert_eq!(lead.company_name.as_deref(), Some("Acme Corp"));
    assert_eq!(lead.industry.as_deref(), Some("Retail"));
    assert_eq!(lead.pain_points.as_deref(), Some("Legacy checkout platform"));
    assert_eq!(lead.score, 92.0);
    assert_eq!(view.phase(), ViewPhase::Ready);
}

#[tokio::test]
async fn test_failed_validation_then_manual_retry() {
    let server = MockServer::start().await;
    mount_lead(&server, "L1", lead_json("L1", json!([]), Some("pending"))).await;

    Mock::given(method("GET"))
        .and(path("/intelligence/service-alignment/L1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"service": "Data Platform", "score": 64, "reasoning": "Warehouse sprawl"},
            {"service": "Security Audit"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/intelligence/validate-profile/L1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status": "failed", "reason": "profile private"})),
        )
        .expect(2)
        .mount(&server)
        .await;

    let service = create_service(&server);
    let slot = Arc::new(ViewSlot::new());
    settle(service.open(slot.clone(), "L1", None).await.unwrap()).await;

    let view = slot.snapshot().await.unwrap();
    assert_eq!(view.validation.status, ValidationStatus::Failed);
    assert_eq!(view.validation.last_error.as_deref(), Some("profile private"));
    assert!(view.validation.scores.is_none());
    // Validation failure does not take the view down
    assert_eq!(view.phase(), ViewPhase::Ready);

    let alignment = view.alignment().unwrap();
    assert_eq!(alignment.source, AlignmentSource::Computed);
    assert_eq!(alignment.services[0].confidence, Confidence::Medium);
    assert_eq!(alignment.services[1].confidence, Confidence::Low);
    assert_eq!(alignment.services[1].match_score, 0.0);

    let retry = service.retry_validation(slot.clone()).await.unwrap();
    assert_eq!(retry.view.validation.status, ValidationStatus::Processing);
    assert!(retry.view.validation.in_flight);
    let alignment_before = retry.view.alignment.clone();
    settle(retry).await;

    let view = slot.snapshot().await.unwrap();
    assert_eq!(view.validation.status, ValidationStatus::Failed);
    assert_eq!(view.validation.last_error.as_deref(), Some("profile private"));
    assert_eq!(view.alignment, alignment_before);
}

#[tokio::test]
async fn test_stale_validation_is_not_merged_into_next_lead() {
    let server = MockServer::start().await;
    mount_lead(&server, "L1", lead_json("L1", json!([{"service": "A", "score": 90}]), None)).await;
    mount_lead(&server, "L2", lead_json("L2", json!([{"service": "B", "score": 50}]), None)).await;

    Mock::given(method("GET"))
        .and(path("/intelligence/validate-profile/L1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completed_validation())
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/intelligence/validate-profile/L2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status": "skipped", "reason": "No LinkedIn URL"})),
        )
        .mount(&server)
        .await;

    let service = create_service(&server);
    let slot = Arc::new(ViewSlot::new());

    let first = service.open(slot.clone(), "L1", None).await.unwrap();
    let second = service.open(slot.clone(), "L2", None).await.unwrap();
    settle(second).await;

    // L1's tasks were cancelled by the second activation
    for task in first.tasks {
        let _ = task.await;
    }
    tokio::time::sleep(Duration::from_millis(400)).await;

    let view = slot.snapshot().await.unwrap();
    assert_eq!(view.lead_id, "L2");
    assert_eq!(profile(&view).id, "L2");
    assert_eq!(view.validation.status, ValidationStatus::Skipped);
    assert!(view.validation.scores.is_none());
    assert_eq!(view.alignment().unwrap().services[0].name, "B");
}

#[tokio::test]
async fn test_missing_lead_renders_not_found_without_enrichment() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/leads/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "Lead not found"})))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/intelligence/service-alignment/missing"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/intelligence/validate-profile/missing"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completed_validation()))
        .expect(0)
        .mount(&server)
        .await;

    let service = create_service(&server);
    let slot = Arc::new(ViewSlot::new());
    let activity = service.open(slot, "missing", None).await.unwrap();

    assert!(activity.tasks.is_empty());
    assert_eq!(activity.view.lead, LeadSlot::NotFound);
    assert_eq!(activity.view.phase(), ViewPhase::NotFound);
}

#[tokio::test]
async fn test_backend_error_on_lead_is_unavailable() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/leads/L1"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .expect(1)
        .mount(&server)
        .await;

    let service = create_service(&server);
    let activity = service
        .open(Arc::new(ViewSlot::new()), "L1", None)
        .await
        .unwrap();

    assert!(matches!(activity.view.lead, LeadSlot::Unavailable(_)));
    assert_eq!(activity.view.phase(), ViewPhase::NotFound);
}

#[tokio::test]
async fn test_alignment_failure_is_terminal_but_validation_completes() {
    let server = MockServer::start().await;
    mount_lead(&server, "L1", lead_json("L1", json!([]), None)).await;

    Mock::given(method("GET"))
        .and(path("/intelligence/service-alignment/L1"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"detail": "vector store offline"})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/intelligence/validate-profile/L1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completed_validation()))
        .mount(&server)
        .await;

    let service = create_service(&server);
    let slot = Arc::new(ViewSlot::new());
    settle(service.open(slot.clone(), "L1", None).await.unwrap()).await;

    let view = slot.snapshot().await.unwrap();
    match &view.alignment {
        AlignmentState::Failed(message) => assert!(message.contains("vector store offline")),
        other => panic!("expected failed alignment, got {:?}", other),
    }
    assert_eq!(view.phase(), ViewPhase::Error);
    assert_eq!(view.validation.status, ValidationStatus::Completed);
}

#[tokio::test]
async fn test_completed_lead_does_not_revalidate() {
    let server = MockServer::start().await;
    let mut lead = lead_json(
        "L1",
        json!([{"service": "Cloud Migration", "cosine_similarity": 70}]),
        Some("completed"),
    );
    lead["profileScore"] = json!(75.0);
    lead["finalScore"] = json!(83.5);
    mount_lead(&server, "L1", lead).await;

    Mock::given(method("GET"))
        .and(path("/intelligence/validate-profile/L1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completed_validation()))
        .expect(0)
        .mount(&server)
        .await;

    let service = create_service(&server);
    let slot = Arc::new(ViewSlot::new());
    let activity = service.open(slot.clone(), "L1", None).await.unwrap();
    assert_eq!(activity.tasks.len(), 1);
    settle(activity).await;

    let view = slot.snapshot().await.unwrap();
    assert_eq!(view.validation.status, ValidationStatus::Completed);
    assert!(!view.validation.in_flight);
    assert_eq!(view.validation.scores.as_ref().unwrap().final_score, 83.5);
    assert!(service.retry_validation(slot).await.is_err());
}

#[tokio::test]
async fn test_navigation_alignment_used_when_nothing_stored() {
    let server = MockServer::start().await;
    mount_lead(&server, "L1", lead_json("L1", json!([]), Some("skipped"))).await;

    Mock::given(method("GET"))
        .and(path("/intelligence/service-alignment/L1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let navigation = vec![RawServiceMatch {
        service: Some("Data Platform".to_string()),
        cosine_similarity: Some(61.0),
        ..Default::default()
    }];

    let service = create_service(&server);
    let slot = Arc::new(ViewSlot::new());
    settle(
        service
            .open(slot.clone(), "L1", Some(navigation))
            .await
            .unwrap(),
    )
    .await;

    let view = slot.snapshot().await.unwrap();
    let alignment = view.alignment().unwrap();
    assert_eq!(alignment.source, AlignmentSource::Navigation);
    assert_eq!(alignment.services[0].confidence, Confidence::Medium);
    // Skipped is terminal and has no retry
    assert_eq!(view.validation.status, ValidationStatus::Skipped);
}

#[tokio::test]
async fn test_processing_answer_polls_again_when_configured() {
    let server = MockServer::start().await;
    mount_lead(
        &server,
        "L1",
        lead_json("L1", json!([{"service": "A", "score": 85}]), Some("processing")),
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/intelligence/validate-profile/L1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "processing"})))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/intelligence/validate-profile/L1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completed_validation()))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = Config::with_backend(server.uri());
    config.validation_max_polls = 3;
    config.validation_poll_interval_secs = 0;
    let service = LeadDetailService::new(&config).unwrap();
    let slot = Arc::new(ViewSlot::new());
    settle(service.open(slot.clone(), "L1", None).await.unwrap()).await;

    let view = slot.snapshot().await.unwrap();
    assert_eq!(view.validation.status, ValidationStatus::Completed);
}

#[tokio::test]
async fn test_single_shot_leaves_processing_without_spinner() {
    let server = MockServer::start().await;
    mount_lead(&server, "L1", lead_json("L1", json!([{"service": "A"}]), None)).await;

    Mock::given(method("GET"))
        .and(path("/intelligence/validate-profile/L1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "processing"})))
        .expect(1)
        .mount(&server)
        .await;

    let service = create_service(&server);
    let slot = Arc::new(ViewSlot::new());
    settle(service.open(slot.clone(), "L1", None).await.unwrap()).await;

    let view = slot.snapshot().await.unwrap();
    assert_eq!(view.validation.status, ValidationStatus::Processing);
    assert!(!view.validation.in_flight);
    assert!(view.validation.scores.is_none());
}

#[tokio::test]
async fn test_validation_http_error_surfaces_backend_detail() {
    let server = MockServer::start().await;
    mount_lead(&server, "L1", lead_json("L1", json!([{"service": "A"}]), None)).await;

    Mock::given(method("GET"))
        .and(path("/intelligence/validate-profile/L1"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({"detail": "OPENAI_API_KEY not found"})),
        )
        .mount(&server)
        .await;

    let service = create_service(&server);
    let slot = Arc::new(ViewSlot::new());
    settle(service.open(slot.clone(), "L1", None).await.unwrap()).await;

    let view = slot.snapshot().await.unwrap();
    assert_eq!(view.validation.status, ValidationStatus::Failed);
    assert_eq!(
        view.validation.last_error.as_deref(),
        Some("OPENAI_API_KEY not found")
    );
    assert!(service.retry_validation(slot).await.is_ok());
}
