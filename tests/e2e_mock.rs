//! End-to-end tests against a mocked generation service
//!
//! Every test starts its own `wiremock` server and drives the full stack:
//! pool initialization, round-robin dispatch, submission, polling and
//! classification.
//!
//! ```bash
//! cargo test --test e2e_mock
//! ```

mod common;

use common::{
    PNG_BYTES, config_for, done_with_png, init_tracing, mount_pipeline_listing,
    mount_run_accepting, mount_status,
};
use imagen_dispatch::{
    CredentialId, Error, Event, GenerationRequest, ImageGenerator, Notice, Outcome, Presentation,
    classify,
};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Startup
// ============================================================================

#[tokio::test]
async fn rejected_credential_is_excluded_and_rest_serve_in_turn() {
    init_tracing();
    let server = MockServer::start().await;
    mount_pipeline_listing(&server, &["key-2"]).await;
    mount_run_accepting(&server, "job-1").await;
    mount_status(&server, done_with_png()).await;

    let generator = ImageGenerator::new(config_for(&server, 3)).await.unwrap();
    assert_eq!(generator.pool_size(), 2);

    let mut served = Vec::new();
    for _ in 0..4 {
        let report = generator
            .generate(GenerationRequest::new("a red fox"))
            .unwrap()
            .await
            .unwrap();
        served.push(report.credential);

        match classify(&report.outcome) {
            Presentation::Image(image) => {
                assert_eq!(image.bytes, PNG_BYTES);
                assert_eq!(image.mime, "image/png");
            }
            other => panic!("expected image, got {other:?}"),
        }
    }

    assert_eq!(
        served,
        vec![
            CredentialId(1),
            CredentialId(3),
            CredentialId(1),
            CredentialId(3)
        ]
    );
    generator.shutdown().await.unwrap();
}

#[tokio::test]
async fn startup_fails_when_every_credential_is_rejected() {
    let server = MockServer::start().await;
    mount_pipeline_listing(&server, &["key-1", "key-2", "key-3"]).await;

    let err = ImageGenerator::new(config_for(&server, 3)).await.unwrap_err();

    assert!(matches!(err, Error::NoUsableCredentials { attempted: 3 }));
}

#[tokio::test]
async fn startup_fails_without_credentials() {
    let server = MockServer::start().await;

    let err = ImageGenerator::new(config_for(&server, 0)).await.unwrap_err();

    assert!(matches!(err, Error::Config { .. }));
}

// ============================================================================
// Outcomes
// ============================================================================

#[tokio::test]
async fn censored_job_is_reported_as_censored() {
    let server = MockServer::start().await;
    mount_pipeline_listing(&server, &[]).await;
    mount_run_accepting(&server, "job-nsfw").await;
    mount_status(
        &server,
        json!({"status": "DONE", "result": {"files": ["aGVsbG8="], "censored": true}}),
    )
    .await;
    let generator = ImageGenerator::new(config_for(&server, 1)).await.unwrap();

    let report = generator.run(GenerationRequest::new("x")).await;

    assert_eq!(report.outcome, Outcome::Censored);
    assert_eq!(
        classify(&report.outcome),
        Presentation::Notice(Notice::Censored)
    );
}

#[tokio::test]
async fn malformed_payload_in_done_response_is_a_generation_failure() {
    let server = MockServer::start().await;
    mount_pipeline_listing(&server, &[]).await;
    mount_run_accepting(&server, "job-bad").await;
    mount_status(
        &server,
        json!({"status": "DONE", "result": {"files": ["***not-base64***"], "censored": false}}),
    )
    .await;
    let generator = ImageGenerator::new(config_for(&server, 1)).await.unwrap();

    let report = generator.run(GenerationRequest::new("x")).await;

    assert!(matches!(report.outcome, Outcome::Images { .. }));
    assert_eq!(
        classify(&report.outcome),
        Presentation::Notice(Notice::GenerationFailed)
    );
}

#[tokio::test]
async fn stuck_job_times_out_after_budget() {
    let server = MockServer::start().await;
    mount_pipeline_listing(&server, &[]).await;
    mount_run_accepting(&server, "job-stuck").await;
    Mock::given(method("GET"))
        .and(path("/key/api/v1/pipeline/status/job-stuck"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "PROCESSING"})))
        .expect(5)
        .mount(&server)
        .await;
    let generator = ImageGenerator::new(config_for(&server, 1)).await.unwrap();

    let report = generator.run(GenerationRequest::new("x")).await;

    assert_eq!(report.outcome, Outcome::Timeout { attempts: 5 });
    assert_eq!(
        classify(&report.outcome),
        Presentation::Notice(Notice::TimedOut)
    );
}

#[tokio::test]
async fn rejected_submission_names_the_serving_credential() {
    let server = MockServer::start().await;
    mount_pipeline_listing(&server, &[]).await;
    Mock::given(method("POST"))
        .and(path("/key/api/v1/pipeline/run"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .mount(&server)
        .await;
    let generator = ImageGenerator::new(config_for(&server, 2)).await.unwrap();
    let mut events = generator.subscribe();

    let report = generator.run(GenerationRequest::new("x")).await;

    assert!(matches!(
        report.outcome,
        Outcome::SubmissionFailed {
            credential: CredentialId(1),
            ..
        }
    ));
    assert_eq!(
        classify(&report.outcome),
        Presentation::Notice(Notice::SubmissionFailed {
            credential: CredentialId(1)
        })
    );

    let mut kinds = Vec::new();
    while let Ok(event) = events.try_recv() {
        kinds.push(match event {
            Event::Dispatched { .. } => "dispatched",
            Event::Submitted { .. } => "submitted",
            Event::Finished { .. } => "finished",
            Event::Shutdown => "shutdown",
        });
    }
    assert_eq!(kinds, vec!["dispatched", "finished"]);
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_spread_evenly() {
    let server = MockServer::start().await;
    mount_pipeline_listing(&server, &[]).await;
    mount_run_accepting(&server, "job-many").await;
    Mock::given(method("GET"))
        .and(path("/key/api/v1/pipeline/status/job-many"))
        .respond_with(ResponseTemplate::new(200).set_body_json(done_with_png()))
        .mount(&server)
        .await;
    let generator = ImageGenerator::new(config_for(&server, 3)).await.unwrap();

    let handles: Vec<_> = (0..9)
        .map(|i| {
            generator
                .generate(GenerationRequest::new(format!("prompt {i}")))
                .unwrap()
        })
        .collect();

    let mut per_credential = [0usize; 4];
    for handle in handles {
        let report = handle.await.unwrap();
        assert!(matches!(report.outcome, Outcome::Images { .. }));
        per_credential[report.credential.0 as usize] += 1;
    }

    assert_eq!(&per_credential[1..], &[3, 3, 3]);
    generator.shutdown().await.unwrap();
}
