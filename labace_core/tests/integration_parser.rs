mod common;

use std::sync::Arc;

use common::{RecordingObserver, ScriptedProvider};
use labace_core::{Error, ExtractionResult, NoopObserver, Oracle, Prompt, Stage, StructuredParser};

fn prompt() -> Prompt {
    Prompt {
        system: "You extract labs.".to_string(),
        user: "Extract all labs from: Na 140".to_string(),
        temperature: 0.1,
    }
}

#[tokio::test]
async fn clean_reply_parses_without_retry() {
    let provider = ScriptedProvider::new([
        "```json\n{\"labs\": [{\"name\": \"Na\", \"value\": \"140\", \"unit\": \"mEq/L\"}]}\n```",
    ]);
    let oracle = Oracle::new(Arc::clone(&provider));

    let result: ExtractionResult = StructuredParser::default()
        .run(&oracle, Stage::Extraction, &prompt(), &NoopObserver)
        .await
        .unwrap();

    assert_eq!(result.labs.len(), 1);
    assert_eq!(result.labs[0].name, "Na");
    assert_eq!(result.labs[0].date, "not specified");
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn malformed_reply_exhausts_budget() {
    let provider = ScriptedProvider::new(["{labs: oops", "still {broken", "last {try"]);
    let oracle = Oracle::new(Arc::clone(&provider));
    let observer = RecordingObserver::default();

    let err = StructuredParser::new(3)
        .run::<ExtractionResult, _>(&oracle, Stage::Extraction, &prompt(), &observer)
        .await
        .unwrap_err();

    assert_eq!(provider.call_count(), 3);
    match err {
        Error::Parse {
            stage,
            attempts,
            raw,
            message,
        } => {
            assert_eq!(stage, Stage::Extraction);
            assert_eq!(attempts, 3);
            assert_eq!(raw, "last {try");
            assert!(!message.is_empty());
        }
        other => panic!("expected parse error, got {other}"),
    }
    assert_eq!(
        observer.events(),
        vec!["retry extraction 1/3", "retry extraction 2/3"]
    );
}

#[tokio::test]
async fn retries_reuse_system_and_temperature() {
    let provider = ScriptedProvider::new(["not json at all", r#"{"labs": []}"#]);
    let oracle = Oracle::new(Arc::clone(&provider));
    let original = prompt();

    let result: ExtractionResult = StructuredParser::default()
        .run(&oracle, Stage::Extraction, &original, &NoopObserver)
        .await
        .unwrap();

    assert!(result.labs.is_empty());
    let calls = provider.calls();
    assert_eq!(calls.len(), 2);

    let retry = &calls[1];
    assert_eq!(retry.system, original.system);
    assert!((retry.temperature - original.temperature).abs() < f32::EPSILON);
    assert!(retry.user.contains("JSON formatting error"));
    assert!(retry.user.contains("Previous response:\nnot json at all"));
    assert!(retry.user.ends_with(&original.user));
}

#[tokio::test]
async fn oracle_failure_is_not_retried() {
    let provider = ScriptedProvider::new(Vec::<String>::new());
    provider.push_failure("connection refused");
    provider.push_reply(r#"{"labs": []}"#);
    let oracle = Oracle::new(Arc::clone(&provider));

    let err = StructuredParser::default()
        .run::<ExtractionResult, _>(&oracle, Stage::Extraction, &prompt(), &NoopObserver)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::OracleUnavailable {
            stage: Stage::Extraction,
            ..
        }
    ));
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn oracle_failure_during_retry_aborts() {
    let provider = ScriptedProvider::new(["garbage"]);
    provider.push_failure("timed out");
    let oracle = Oracle::new(Arc::clone(&provider));

    let err = StructuredParser::default()
        .run::<ExtractionResult, _>(&oracle, Stage::Reflection, &prompt(), &NoopObserver)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::OracleUnavailable { .. }));
    assert_eq!(err.stage(), Some(Stage::Reflection));
    assert_eq!(provider.call_count(), 2);
}
