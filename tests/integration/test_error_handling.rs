//! Integration Tests for Error Handling
//!
//! Host failures, faulted sessions and configuration errors.

#[path = "../test_utils/mod.rs"]
mod test_utils;

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use termpool::config::loader::validate_config;
use termpool::error::Error;
use termpool::models::SessionStatus;
use termpool::{ConfigLoader, ProcessEvent};
use tokio_test::{assert_err, assert_ok};
use test_utils::{collect_events, fast_config, lines_of, mock_pool, MockChunk, MockHost};

#[tokio::test]
async fn test_stream_failure_faults_session() {
    let host = Arc::new(MockHost::new());
    host.script(
        "tail -f server.log",
        vec![
            MockChunk::text("Partial\r\n"),
            MockChunk::Fail("terminal closed".to_string()),
        ],
    );
    let pool = mock_pool(host, &fast_config());

    let session = pool.acquire_session(Path::new("/work")).await;
    let mut handle = pool.run_command(session.id, "tail -f server.log").await.unwrap();

    let events = collect_events(&mut handle).await;
    assert_eq!(lines_of(&events), vec!["", "Partial"]);
    assert!(matches!(events.last(), Some(ProcessEvent::Error(reason)) if reason.contains("terminal closed")));
    assert!(!events.contains(&ProcessEvent::Continue));

    let err = handle.wait().await.unwrap_err();
    assert!(matches!(err, Error::HostStreamFailed { .. }));
    assert!(err.is_host_error());

    let faulted = pool.session(session.id).await.unwrap();
    assert_eq!(faulted.status, SessionStatus::Faulted);

    // Faulted sessions are listed as busy and never handed out
    let busy = pool.list_sessions(true).await;
    assert_eq!(busy.len(), 1);
    let replacement = pool.acquire_session(Path::new("/work")).await;
    assert_ne!(replacement.id, session.id);

    let refused = pool.run_command(session.id, "ls").await.unwrap_err();
    assert!(matches!(refused, Error::SessionBusy { .. }));
}

#[tokio::test]
async fn test_release_on_error_returns_session_to_idle() {
    let host = Arc::new(MockHost::new());
    host.script("tail -f server.log", vec![MockChunk::Fail("reset".to_string())]);
    let mut config = fast_config();
    config.execution.release_on_error = true;
    let pool = mock_pool(host, &config);

    let session = pool.acquire_session(Path::new("/work")).await;
    let handle = pool.run_command(session.id, "tail -f server.log").await.unwrap();
    assert!(handle.wait().await.is_err());

    let released = pool.session(session.id).await.unwrap();
    assert!(released.is_idle());

    let again = pool.acquire_session(Path::new("/work")).await;
    assert_eq!(again.id, session.id);
}

#[tokio::test]
async fn test_execution_refused_by_host() {
    let host = Arc::new(MockHost::new());
    host.fail_execution("terminal disposed");
    let pool = mock_pool(host, &fast_config());

    let session = pool.acquire_session(Path::new("/work")).await;
    let mut handle = pool.run_command(session.id, "ls").await.unwrap();

    let events = collect_events(&mut handle).await;
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], ProcessEvent::Error(reason) if reason.contains("terminal disposed")));

    let err = handle.wait().await.unwrap_err();
    assert!(matches!(err, Error::HostExecutionFailed { session_id, .. } if session_id == session.id));
}

#[tokio::test]
async fn test_dropped_process_task_aborts_completion() {
    let (process, handle) = termpool::CommandProcess::new(
        termpool::SessionId::new(9),
        "never started",
        termpool::config::ExecutionConfig::default(),
        termpool::config::NormalizerConfig::default(),
    );
    drop(process);

    // Only the handle's clone keeps the process alive, and it never runs
    let (events, completion) = handle.into_parts();
    drop(events);
    let err = completion.await.unwrap_err();
    assert!(matches!(err, Error::ProcessAborted { command } if command == "never started"));
}

#[test]
fn test_invalid_timeouts_rejected() {
    let mut config = fast_config();
    config.execution.hot_timeout_normal_ms = 0;
    let err = validate_config(&config).unwrap_err();
    assert!(matches!(err, Error::ConfigValidationFailed { field, .. } if field == "execution.hot_timeout_normal_ms"));

    let mut config = fast_config();
    config.execution.hot_timeout_compiling_ms = 1_000;
    assert_err!(validate_config(&config));

    assert_ok!(validate_config(&fast_config()));
}

#[test]
fn test_malformed_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[execution").unwrap();

    let err = ConfigLoader::load_file(file.path()).unwrap_err();
    assert!(matches!(err, Error::ConfigParseFailed { .. }));
}

#[test]
fn test_missing_config_file() {
    let err = ConfigLoader::load_file(Path::new("/nonexistent/termpool.toml")).unwrap_err();
    assert!(matches!(err, Error::ConfigLoadFailed { .. }));
}
