//! End-to-end pipeline scenarios against the tracing gateway.

use bytes::Bytes;
use veil_core::location::BucketName;
use veil_core::pipeline::{PipelineRun, RunFailure, Stage};
use veil_core::storage::StorageGateway;
use veil_core::SelectionPolicy;
use veil_test_utils::{
    FailOn, INPUT_LOCATION, INVOCATION_LOCATION, PEOPLE_CSV, PROCESSED_LOCATION, StorageOp,
    TestEnvironment, init_test_logging, request_document, state_document,
};

async fn processed_object(env: &TestEnvironment, key: &str) -> String {
    let location = BucketName::new(PROCESSED_LOCATION).unwrap();
    let data = env.gateway.get(&location, key).await.expect("processed object");
    String::from_utf8(data.to_vec()).unwrap()
}

#[tokio::test]
async fn successful_run_writes_output_and_clears_transient_locations() {
    init_test_logging();
    let env = TestEnvironment::new().await;
    env.seed_dataset("people.csv", PEOPLE_CSV).await;
    env.seed_request("people.json", "people.csv", &["name", "email"]).await;

    let result = env.pipeline().run().await;

    assert_eq!(result.status_code, 200, "{}", result.message);
    assert_eq!(env.gateway.keys(PROCESSED_LOCATION), vec!["processed/people.csv"]);
    assert_eq!(
        processed_object(&env, "processed/people.csv").await,
        "name,email,age\n***,***,30\n***,***,25\n"
    );
    assert!(env.gateway.keys(INPUT_LOCATION).is_empty());
    assert!(env.gateway.keys(INVOCATION_LOCATION).is_empty());
}

#[tokio::test]
async fn output_key_uses_basename_of_nested_source() {
    let env = TestEnvironment::new().await;
    env.seed_dataset("2024/01/people.csv", PEOPLE_CSV).await;
    env.seed_request("people.json", "2024/01/people.csv", &[]).await;

    let result = env.pipeline().run().await;

    assert!(result.is_success(), "{}", result.message);
    assert_eq!(processed_object(&env, "processed/people.csv").await, PEOPLE_CSV);
}

#[tokio::test]
async fn unknown_columns_still_succeed_unchanged() {
    let env = TestEnvironment::new().await;
    env.seed_dataset("people.csv", PEOPLE_CSV).await;
    env.seed_request("people.json", "people.csv", &["nonexistent"]).await;

    let result = env.pipeline().run().await;

    assert!(result.is_success());
    assert!(result.message.contains("1 not found"));
    assert_eq!(processed_object(&env, "processed/people.csv").await, PEOPLE_CSV);
}

#[tokio::test]
async fn transport_error_on_source_fetch_aborts_without_upload_or_cleanup() {
    let env = TestEnvironment::new().await;
    env.seed_dataset("people.csv", PEOPLE_CSV).await;
    env.seed_request("people.json", "people.csv", &["name"]).await;
    env.gateway
        .inject_failure_on(INPUT_LOCATION, "people.csv", FailOn::Get);

    let result = env.pipeline().run().await;

    assert_eq!(result.status_code, 500);
    assert!(env.gateway.puts().is_empty(), "no upload on failure");
    assert!(env.gateway.deletes().is_empty(), "no cleanup on failure");
    assert_eq!(env.gateway.keys(INPUT_LOCATION), vec!["people.csv"]);
    assert_eq!(env.gateway.keys(INVOCATION_LOCATION), vec!["people.json"]);
}

#[tokio::test]
async fn missing_state_document_is_configuration_failure() {
    let env = TestEnvironment::without_state();

    let result = env.pipeline().run().await;

    assert_eq!(result.status_code, 500);
    assert!(result.message.contains("storage locations"));
    assert!(env.gateway.puts().is_empty());
}

#[tokio::test]
async fn state_document_missing_output_is_configuration_failure() {
    let env = TestEnvironment::without_state();
    let document = state_document(INPUT_LOCATION, PROCESSED_LOCATION, INVOCATION_LOCATION);
    let mut state: serde_json::Value = serde_json::from_slice(&document).unwrap();
    state["outputs"]
        .as_object_mut()
        .unwrap()
        .remove("gdpr_processed_bucket");
    env.gateway
        .seed(
            &env.config.state_location,
            &env.config.state_key,
            serde_json::to_vec(&state).unwrap(),
        )
        .await;

    let mut run = PipelineRun::new();
    let failure = env.pipeline().execute(&mut run).await.expect_err("config failure");

    assert!(matches!(failure, RunFailure::Configuration(_)));
    assert_eq!(run.stage, Stage::Start);
}

#[tokio::test]
async fn no_request_document_is_not_found() {
    let env = TestEnvironment::new().await;
    env.seed_dataset("people.csv", PEOPLE_CSV).await;
    env.gateway
        .seed(INVOCATION_LOCATION, "readme.txt", "not a request")
        .await;

    let mut run = PipelineRun::new();
    let failure = env.pipeline().execute(&mut run).await.expect_err("no request");

    assert!(matches!(failure, RunFailure::RequestNotFound { .. }));
    assert_eq!(failure.status_code(), 500);
    assert_eq!(run.stage, Stage::LocationsResolved);
    assert!(env.gateway.deletes().is_empty());
}

#[tokio::test]
async fn unlistable_invocation_location_is_unreadable_request() {
    let env = TestEnvironment::new().await;
    env.seed_dataset("people.csv", PEOPLE_CSV).await;
    env.seed_request("people.json", "people.csv", &["name"]).await;
    env.gateway
        .inject_failure_on(INVOCATION_LOCATION, "", FailOn::List);

    let mut run = PipelineRun::new();
    let failure = env.pipeline().execute(&mut run).await.expect_err("list fails");

    assert!(matches!(failure, RunFailure::RequestUnreadable(_)));
    assert_eq!(failure.status_code(), 500);
    assert_eq!(run.stage, Stage::LocationsResolved);
    assert!(env.gateway.puts().is_empty());
    assert!(env.gateway.deletes().is_empty());
}

#[tokio::test]
async fn unfetchable_request_document_is_unreadable_request() {
    let env = TestEnvironment::new().await;
    env.seed_dataset("people.csv", PEOPLE_CSV).await;
    env.seed_request("people.json", "people.csv", &["name"]).await;
    env.gateway
        .inject_failure_on(INVOCATION_LOCATION, "", FailOn::Get);

    let mut run = PipelineRun::new();
    let failure = env.pipeline().execute(&mut run).await.expect_err("get fails");

    assert!(matches!(failure, RunFailure::RequestUnreadable(_)));
    assert_eq!(failure.status_code(), 500);
    assert_eq!(run.stage, Stage::RequestFound);
    assert_eq!(run.request_key.as_deref(), Some("people.json"));
    assert!(env.gateway.puts().is_empty());
    assert!(env.gateway.deletes().is_empty());

    let result = env.pipeline().run().await;
    assert_eq!(result.status_code, 500);
}

#[tokio::test]
async fn invalid_request_is_bad_request() {
    let env = TestEnvironment::new().await;
    env.seed_dataset("people.csv", PEOPLE_CSV).await;
    env.gateway
        .seed(
            INVOCATION_LOCATION,
            "people.json",
            r#"{"s3_file_path": "people.csv", "pii_fields": ["name"]}"#,
        )
        .await;

    let result = env.pipeline().run().await;

    assert_eq!(result.status_code, 400);
    assert!(env.gateway.puts().is_empty());
    assert!(env.gateway.deletes().is_empty());
}

#[tokio::test]
async fn malformed_dataset_is_processing_failure() {
    let env = TestEnvironment::new().await;
    env.seed_dataset("people.csv", "").await;
    env.seed_request("people.json", "people.csv", &["name"]).await;

    let mut run = PipelineRun::new();
    let failure = env.pipeline().execute(&mut run).await.expect_err("empty dataset");

    assert!(matches!(failure, RunFailure::Processing(_)));
    assert_eq!(run.stage, Stage::RequestParsed);
    assert!(env.gateway.puts().is_empty());
}

#[tokio::test]
async fn upload_failure_skips_cleanup() {
    let env = TestEnvironment::new().await;
    env.seed_dataset("people.csv", PEOPLE_CSV).await;
    env.seed_request("people.json", "people.csv", &["name"]).await;
    env.gateway.inject_failure(PROCESSED_LOCATION);

    let mut run = PipelineRun::new();
    let failure = env.pipeline().execute(&mut run).await.expect_err("upload fails");

    assert!(matches!(failure, RunFailure::Upload(_)));
    assert_eq!(run.stage, Stage::Redacted);
    assert!(env.gateway.deletes().is_empty());
    assert_eq!(env.gateway.keys(INPUT_LOCATION), vec!["people.csv"]);
}

#[tokio::test]
async fn cleanup_failures_do_not_fail_the_run() {
    let env = TestEnvironment::new().await;
    env.seed_dataset("people.csv", PEOPLE_CSV).await;
    env.seed_dataset("other.csv", PEOPLE_CSV).await;
    env.seed_request("people.json", "people.csv", &["email"]).await;
    env.gateway
        .inject_failure_on(INPUT_LOCATION, "other", FailOn::Delete);
    env.gateway
        .inject_failure_on(INVOCATION_LOCATION, "", FailOn::Delete);

    let mut run = PipelineRun::new();
    let summary = env.pipeline().execute(&mut run).await.expect("run succeeds");

    assert_eq!(run.stage, Stage::Cleaned);
    assert!(!summary.cleanup.is_complete());
    let input = summary.cleanup.input.expect("input listed");
    assert_eq!(input.deleted, vec!["people.csv"]);
    assert_eq!(input.failed.len(), 1);
    let invocation = summary.cleanup.invocation.expect("invocation listed");
    assert!(invocation.deleted.is_empty());
    assert_eq!(invocation.failed.len(), 1);

    assert_eq!(env.gateway.keys(INPUT_LOCATION), vec!["other.csv"]);
    assert_eq!(env.gateway.keys(PROCESSED_LOCATION), vec!["processed/people.csv"]);

    let result = {
        let env = TestEnvironment::new().await;
        env.seed_dataset("people.csv", PEOPLE_CSV).await;
        env.seed_request("people.json", "people.csv", &[]).await;
        env.gateway.inject_failure_on(INPUT_LOCATION, "", FailOn::Delete);
        env.pipeline().run().await
    };
    assert_eq!(result.status_code, 200);
}

#[tokio::test]
async fn cleanup_listing_failure_still_clears_other_location() {
    let env = TestEnvironment::new().await;
    env.seed_dataset("people.csv", PEOPLE_CSV).await;
    env.seed_request("people.json", "people.csv", &["name"]).await;
    env.gateway.inject_failure_on(INPUT_LOCATION, "", FailOn::List);

    let mut run = PipelineRun::new();
    let summary = env.pipeline().execute(&mut run).await.expect("run succeeds");

    assert_eq!(run.stage, Stage::Cleaned);
    assert!(summary.cleanup.input.is_none());
    assert!(!summary.cleanup.is_complete());
    let invocation = summary.cleanup.invocation.expect("invocation listed");
    assert_eq!(invocation.deleted, vec!["people.json"]);

    assert_eq!(env.gateway.keys(INPUT_LOCATION), vec!["people.csv"]);
    assert!(env.gateway.keys(INVOCATION_LOCATION).is_empty());
    assert_eq!(env.gateway.keys(PROCESSED_LOCATION), vec!["processed/people.csv"]);

    let result = {
        let env = TestEnvironment::new().await;
        env.seed_dataset("people.csv", PEOPLE_CSV).await;
        env.seed_request("people.json", "people.csv", &["name"]).await;
        env.gateway.inject_failure_on(INPUT_LOCATION, "", FailOn::List);
        env.pipeline().run().await
    };
    assert_eq!(result.status_code, 200, "{}", result.message);
}

#[tokio::test]
async fn first_listed_request_wins() {
    let env = TestEnvironment::new().await;
    env.seed_dataset("a.csv", "col\nx\n").await;
    env.seed_dataset("b.csv", "col\ny\n").await;
    env.seed_request("second.json", "b.csv", &["col"]).await;
    env.seed_request("first.json", "a.csv", &["col"]).await;

    let mut run = PipelineRun::new();
    env.pipeline().execute(&mut run).await.expect("run succeeds");

    assert_eq!(run.request_key.as_deref(), Some("second.json"));
    assert_eq!(env.gateway.keys(PROCESSED_LOCATION), vec!["processed/b.csv"]);
    // Both requests are cleared, the unselected one included.
    assert!(env.gateway.keys(INVOCATION_LOCATION).is_empty());
}

#[tokio::test]
async fn lexical_policy_picks_smallest_key() {
    let mut env = TestEnvironment::new().await;
    env.config.selection = SelectionPolicy::Lexical;
    env.seed_dataset("a.csv", "col\nx\n").await;
    env.seed_dataset("b.csv", "col\ny\n").await;
    env.seed_request("second.json", "b.csv", &["col"]).await;
    env.seed_request("first.json", "a.csv", &["col"]).await;

    let mut run = PipelineRun::new();
    env.pipeline().execute(&mut run).await.expect("run succeeds");

    assert_eq!(run.request_key.as_deref(), Some("first.json"));
    assert_eq!(env.gateway.keys(PROCESSED_LOCATION), vec!["processed/a.csv"]);
}

#[tokio::test]
async fn run_touches_storage_in_stage_order() {
    let env = TestEnvironment::new().await;
    env.seed_dataset("people.csv", PEOPLE_CSV).await;
    env.seed_request("people.json", "people.csv", &["name"]).await;

    let result = env.pipeline().run().await;
    assert!(result.is_success());

    let ops = env.gateway.operations();
    let first_put = ops
        .iter()
        .position(|op| matches!(op, StorageOp::Put { .. }))
        .expect("one put");
    let first_delete = ops
        .iter()
        .position(|op| matches!(op, StorageOp::Delete { .. }))
        .expect("deletes");
    assert!(first_put < first_delete, "cleanup only after upload: {ops:?}");
    assert_eq!(
        ops[0],
        StorageOp::Get {
            location: env.config.state_location.clone(),
            key: env.config.state_key.clone(),
        }
    );
    assert_eq!(env.gateway.puts().len(), 1);
}

#[tokio::test]
async fn rerun_after_success_reports_missing_request() {
    let env = TestEnvironment::new().await;
    env.seed_dataset("people.csv", PEOPLE_CSV).await;
    env.seed_request("people.json", "people.csv", &["name"]).await;

    assert!(env.pipeline().run().await.is_success());
    let second = env.pipeline().run().await;

    assert_eq!(second.status_code, 500);
    assert!(second.message.contains("no request document"));
}

#[tokio::test]
async fn request_for_foreign_source_still_processes() {
    let env = TestEnvironment::new().await;
    env.gateway
        .seed("elsewhere-bucket", "people.csv", PEOPLE_CSV.to_string())
        .await;
    env.gateway
        .seed(
            INVOCATION_LOCATION,
            "people.json",
            request_document("elsewhere-bucket", "people.csv", &["age"]),
        )
        .await;

    let result = env.pipeline().run().await;

    assert!(result.is_success());
    assert_eq!(
        processed_object(&env, "processed/people.csv").await,
        "name,email,age\nJohn,john@example.com,***\nJane,jane@example.com,***\n"
    );
    // The source object lives outside the cleared locations.
    let elsewhere = BucketName::new("elsewhere-bucket").unwrap();
    assert_eq!(
        env.gateway.get(&elsewhere, "people.csv").await.unwrap(),
        Bytes::from(PEOPLE_CSV)
    );
}
