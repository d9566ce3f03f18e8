//! Generation session behaviour against scripted collaborators

use atg_core::{
    test_path_for, GenerateError, GenerationSession, Message, RunOutcome, SessionConfig,
    SessionError, SessionOutcome, SessionSeed, SessionState, SourceFile,
};
use atg_test_utils::{ScriptedExecutor, ScriptedGenerator};
use pretty_assertions::assert_eq;
use std::path::Path;

fn session(root: &Path) -> GenerationSession {
    let source = SourceFile::new("util.js");
    let test_file = test_path_for(source.as_str(), "__tests__").unwrap();
    GenerationSession::new(
        source,
        "src/util.js",
        test_file,
        root,
        SessionSeed::Initial {
            source_code: "export const add = (a, b) => a + b;".to_string(),
        },
    )
}

fn repair_request(error: &str) -> Message {
    Message::user(format!(
        "The previous test failed with this error:\n\n{error}\n\nPlease revise the test to fix it."
    ))
}

#[tokio::test]
async fn repair_conversation_is_ordered() {
    let dir = tempfile::tempdir().unwrap();
    let generator = ScriptedGenerator::new(["draft A", "draft B"]);
    let executor = ScriptedExecutor::new([RunOutcome::failed("E1"), RunOutcome::passed()]);

    let report = session(dir.path())
        .run(&generator, &executor, SessionConfig::new(3))
        .await
        .unwrap();

    assert_eq!(report.outcome, SessionOutcome::Passed { repairs: 1 });
    assert_eq!(report.state, SessionState::Done);
    assert_eq!(report.last_outcome, Some(RunOutcome::passed()));
    assert_eq!(report.generation_calls, 2);
    assert_eq!(report.execute_calls, 2);

    let prompt = report.conversation.messages()[0].clone();
    assert_eq!(
        report.conversation.messages().to_vec(),
        vec![
            prompt.clone(),
            Message::assistant("draft A"),
            repair_request("E1"),
            Message::assistant("draft B"),
        ]
    );

    let requests = generator.requests();
    assert_eq!(requests[0], vec![prompt.clone()]);
    assert_eq!(
        requests[1],
        vec![prompt, Message::assistant("draft A"), repair_request("E1")]
    );

    let on_disk = std::fs::read_to_string(dir.path().join("__tests__/util.test.js")).unwrap();
    assert_eq!(on_disk, "draft B");
}

#[tokio::test]
async fn zero_retries_means_one_attempt() {
    let dir = tempfile::tempdir().unwrap();
    let generator = ScriptedGenerator::repeating("draft");
    let executor = ScriptedExecutor::new([RunOutcome::failed("E1")]);

    let report = session(dir.path())
        .run(&generator, &executor, SessionConfig::new(0))
        .await
        .unwrap();

    assert_eq!(
        report.outcome,
        SessionOutcome::Exhausted {
            repairs: 0,
            last_error: "E1".to_string()
        }
    );
    assert_eq!(generator.call_count(), 1);
    assert_eq!(executor.call_count(), 1);
}

#[tokio::test]
async fn exhaustion_reports_last_failure_and_leaves_draft() {
    let dir = tempfile::tempdir().unwrap();
    let generator = ScriptedGenerator::new(["d1", "d2", "d3"]);
    let executor = ScriptedExecutor::new([
        RunOutcome::failed("E1"),
        RunOutcome::failed("E2"),
        RunOutcome::failed("E3"),
    ]);

    let report = session(dir.path())
        .run(&generator, &executor, SessionConfig::new(2))
        .await
        .unwrap();

    assert_eq!(
        report.outcome,
        SessionOutcome::Exhausted {
            repairs: 2,
            last_error: "E3".to_string()
        }
    );
    assert_eq!(generator.call_count(), 3);
    assert_eq!(executor.call_count(), 3);
    assert_eq!(report.state, SessionState::Exhausted);
    assert_eq!(report.last_outcome, Some(RunOutcome::failed("E3")));
    assert_eq!(report.last_code, "d3");
    assert_eq!(
        std::fs::read_to_string(dir.path().join("__tests__/util.test.js")).unwrap(),
        "d3"
    );
}

#[tokio::test]
async fn empty_draft_is_passed_through() {
    let dir = tempfile::tempdir().unwrap();
    let generator = ScriptedGenerator::new([""]);
    let executor = ScriptedExecutor::passing();

    let report = session(dir.path())
        .run(&generator, &executor, SessionConfig::new(1))
        .await
        .unwrap();

    assert!(report.outcome.is_passed());
    let calls = executor.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].code, "");
    assert!(calls[0].path.ends_with("__tests__/util.test.js"));
}

#[tokio::test]
async fn history_limit_trims_requests_not_conversation() {
    let dir = tempfile::tempdir().unwrap();
    let generator = ScriptedGenerator::new(["d1", "d2", "d3", "d4"]);
    let executor = ScriptedExecutor::new([
        RunOutcome::failed("E1"),
        RunOutcome::failed("E2"),
        RunOutcome::failed("E3"),
    ]);
    let config = SessionConfig::new(5).with_history_limit(Some(1));

    let report = session(dir.path())
        .run(&generator, &executor, config)
        .await
        .unwrap();

    assert_eq!(report.outcome, SessionOutcome::Passed { repairs: 3 });
    assert_eq!(report.conversation.len(), 8);

    let prompt = report.conversation.messages()[0].clone();
    let requests = generator.requests();
    assert_eq!(
        requests[3],
        vec![prompt, Message::assistant("d3"), repair_request("E3")]
    );
}

#[tokio::test]
async fn zero_history_limit_still_sends_the_failure() {
    let dir = tempfile::tempdir().unwrap();
    let generator = ScriptedGenerator::new(["d1", "d2"]);
    let executor = ScriptedExecutor::new([RunOutcome::failed("E1")]);
    let config = SessionConfig::new(2).with_history_limit(Some(0));

    let report = session(dir.path())
        .run(&generator, &executor, config)
        .await
        .unwrap();

    assert!(report.outcome.is_passed());
    let prompt = report.conversation.messages()[0].clone();
    let requests = generator.requests();
    assert!(requests[1].iter().any(|m| m.content.contains("E1")));
    assert_eq!(
        requests[1],
        vec![prompt, Message::assistant("d1"), repair_request("E1")]
    );
}

#[tokio::test]
async fn generation_failure_during_repair_ends_session() {
    let dir = tempfile::tempdir().unwrap();
    let generator = ScriptedGenerator::new(["d1"])
        .then_fail(GenerateError::Transport("connection reset".to_string()));
    let executor = ScriptedExecutor::new([RunOutcome::failed("E1")]);

    let err = session(dir.path())
        .run(&generator, &executor, SessionConfig::new(3))
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::Generate(GenerateError::Transport(_))));
    assert_eq!(executor.call_count(), 1);
}
