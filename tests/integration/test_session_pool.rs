//! Integration Tests for the Session Pool
//!
//! Session reuse, busy tracking, directory moves and disposal.

#[path = "../test_utils/mod.rs"]
mod test_utils;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Notify;

use termpool::error::Error;
use termpool::models::{SessionId, SessionStatus};
use termpool::{SessionRegistry, TerminalHost, TerminalPool};
use test_utils::{collect_events, fast_config, mock_pool, MockChunk, MockHost};

/// The `cd` the pool runs to move a session into `dir`
fn cd_to(dir: &str) -> String {
    if cfg!(windows) {
        format!("cd \"{}\"", dir)
    } else {
        format!("cd '{}'", dir)
    }
}

async fn run_to_end(pool: &TerminalPool, id: SessionId, command: &str) {
    let mut handle = pool.run_command(id, command).await.unwrap();
    collect_events(&mut handle).await;
    handle.wait().await.unwrap();
}

#[tokio::test]
async fn test_acquire_creates_session_in_cwd() {
    let host = Arc::new(MockHost::new());
    let pool = mock_pool(host, &fast_config());

    let session = pool.acquire_session(Path::new("/work/app")).await;
    assert_eq!(session.working_directory, PathBuf::from("/work/app"));
    assert_eq!(session.status, SessionStatus::Idle);

    let idle = pool.list_sessions(false).await;
    assert_eq!(idle.len(), 1);
    assert_eq!(idle[0].id, session.id);
    assert!(idle[0].last_command.is_none());
    assert!(pool.list_sessions(true).await.is_empty());
}

#[tokio::test]
async fn test_idle_session_in_same_cwd_is_reused() {
    let host = Arc::new(MockHost::new());
    let pool = mock_pool(host, &fast_config());

    let first = pool.acquire_session(Path::new("/work")).await;
    run_to_end(&pool, first.id, "git status").await;

    let second = pool.acquire_session(Path::new("/work/./")).await;
    assert_eq!(second.id, first.id);
    assert_eq!(pool.registry().len().await, 1);
    assert_eq!(second.last_command.as_deref(), Some("git status"));
}

#[tokio::test]
async fn test_busy_session_refuses_second_command() {
    let gate = Arc::new(Notify::new());
    let host = Arc::new(MockHost::new());
    host.script("sleep 5", vec![MockChunk::Gate(gate.clone())]);
    let pool = mock_pool(host, &fast_config());

    let session = pool.acquire_session(Path::new("/work")).await;
    let mut handle = pool.run_command(session.id, "sleep 5").await.unwrap();

    let err = pool.run_command(session.id, "ls").await.unwrap_err();
    match err {
        Error::SessionBusy {
            session_id,
            last_command,
        } => {
            assert_eq!(session_id, session.id);
            assert_eq!(last_command, "sleep 5");
        }
        other => panic!("expected SessionBusy, got {:?}", other),
    }

    let busy = pool.list_sessions(true).await;
    assert_eq!(busy.len(), 1);
    assert_eq!(busy[0].last_command.as_deref(), Some("sleep 5"));

    // A busy session is never handed out again
    let other = pool.acquire_session(Path::new("/work")).await;
    assert_ne!(other.id, session.id);

    gate.notify_one();
    collect_events(&mut handle).await;
    assert!(handle.wait().await.is_ok());
    assert_eq!(pool.list_sessions(false).await.len(), 2);
}

#[tokio::test]
async fn test_idle_session_moved_to_new_cwd() {
    let host = Arc::new(MockHost::new());
    let pool = mock_pool(host.clone(), &fast_config());

    let first = pool.acquire_session(Path::new("/work/a")).await;
    run_to_end(&pool, first.id, "make").await;

    let moved = pool.acquire_session(Path::new("/work/b")).await;
    assert_eq!(moved.id, first.id);
    assert_eq!(moved.working_directory, PathBuf::from("/work/b"));
    assert!(moved.is_idle());
    assert_eq!(host.executed(), vec!["make".to_string(), cd_to("/work/b")]);

    let host_cwd = pool.registry().host_cwd(&moved);
    assert_eq!(host_cwd, Some(PathBuf::from("/work/b")));
}

#[tokio::test]
async fn test_failed_move_provisions_new_session() {
    let host = Arc::new(MockHost::new());
    host.script(
        &cd_to("/work/b"),
        vec![MockChunk::Fail("terminal closed".to_string())],
    );
    let pool = mock_pool(host.clone(), &fast_config());

    let first = pool.acquire_session(Path::new("/work/a")).await;
    run_to_end(&pool, first.id, "make").await;

    let acquired = pool.acquire_session(Path::new("/work/b")).await;
    assert_ne!(acquired.id, first.id);
    assert!(acquired.is_idle());
    assert_eq!(acquired.working_directory, PathBuf::from("/work/b"));

    let faulted = pool.session(first.id).await.unwrap();
    assert_eq!(faulted.status, SessionStatus::Faulted);

    // The acquired session takes commands
    run_to_end(&pool, acquired.id, "ls").await;
}

#[tokio::test]
async fn test_move_that_leaves_cwd_provisions_new_session() {
    let host = Arc::new(MockHost::new());
    host.ignore_cd();
    let pool = mock_pool(host.clone(), &fast_config());

    let first = pool.acquire_session(Path::new("/work/a")).await;
    let acquired = pool.acquire_session(Path::new("/work/b")).await;
    assert_ne!(acquired.id, first.id);
    assert_eq!(
        pool.registry().host_cwd(&acquired),
        Some(PathBuf::from("/work/b"))
    );
    assert_eq!(host.executed(), vec![cd_to("/work/b")]);

    let stayed = pool.session(first.id).await.unwrap();
    assert!(stayed.is_idle());
    assert_eq!(stayed.working_directory, PathBuf::from("/work/a"));
}

#[cfg(not(windows))]
#[tokio::test]
async fn test_move_quotes_directory_for_the_shell() {
    let host = Arc::new(MockHost::new());
    let pool = mock_pool(host.clone(), &fast_config());

    let first = pool.acquire_session(Path::new("/work/a")).await;
    let target = Path::new("/work/it's $HOME");
    let moved = pool.acquire_session(target).await;

    assert_eq!(moved.id, first.id);
    assert_eq!(host.executed(), vec![r"cd '/work/it'\''s $HOME'"]);
    assert_eq!(moved.working_directory, target);
    assert_eq!(pool.registry().host_cwd(&moved), Some(target.to_path_buf()));
}

#[tokio::test]
async fn test_sessions_shared_across_pools_on_one_registry() {
    let host = Arc::new(MockHost::new());
    let config = fast_config();
    let dyn_host: Arc<dyn TerminalHost> = host;
    let registry = Arc::new(SessionRegistry::new(dyn_host));
    let first_pool = TerminalPool::from_config(Arc::clone(&registry), &config);
    let second_pool = TerminalPool::from_config(Arc::clone(&registry), &config);

    let session = first_pool.acquire_session(Path::new("/work")).await;
    assert!(second_pool.list_sessions(false).await.is_empty());

    let adopted = second_pool.acquire_session(Path::new("/work")).await;
    assert_eq!(adopted.id, session.id);
    assert_eq!(second_pool.list_sessions(false).await.len(), 1);
    assert_eq!(registry.len().await, 1);
}

#[tokio::test]
async fn test_unknown_session_is_rejected() {
    let host = Arc::new(MockHost::new());
    let pool = mock_pool(host, &fast_config());

    let err = pool.run_command(SessionId::new(42), "ls").await.unwrap_err();
    assert!(matches!(err, Error::SessionNotFound { session_id } if session_id == SessionId::new(42)));
    assert_eq!(pool.unretrieved_output(SessionId::new(42)).await, "");
    assert!(!pool.is_hot(SessionId::new(42)).await);
}

#[tokio::test]
async fn test_dispose_all_forgets_members() {
    let host = Arc::new(MockHost::new());
    host.respond("ls", &["a.txt\r\n"]);
    let pool = mock_pool(host, &fast_config());

    let first = pool.acquire_session(Path::new("/work/a")).await;
    run_to_end(&pool, first.id, "ls").await;

    pool.dispose_all().await;
    assert!(pool.list_sessions(false).await.is_empty());
    assert!(pool.list_sessions(true).await.is_empty());
    assert_eq!(pool.unretrieved_output(first.id).await, "");

    // The registry still knows the sessions
    assert!(pool.registry().contains(first.id).await);
}

#[tokio::test]
async fn test_unretrieved_output_after_waiting_without_listening() {
    let host = Arc::new(MockHost::new());
    let gate = Arc::new(Notify::new());
    host.script(
        "tail -n 2 app.log",
        vec![
            MockChunk::Gate(gate.clone()),
            MockChunk::text("line one\r\nline two\r\n"),
        ],
    );
    let pool = mock_pool(host, &fast_config());

    let session = pool.acquire_session(Path::new("/work")).await;
    let handle = pool.run_command(session.id, "tail -n 2 app.log").await.unwrap();
    let (events, completion) = handle.into_parts();
    drop(events);

    gate.notify_one();
    completion.await.unwrap();

    assert_eq!(pool.unretrieved_output(session.id).await, "line one\nline two");
    assert_eq!(pool.unretrieved_output(session.id).await, "");
}
