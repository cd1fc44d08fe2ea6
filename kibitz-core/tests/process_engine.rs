//! End-to-end tests against a real child process
//!
//! A small shell script stands in for a UCI engine so these run without
//! a chess engine installed.

#![cfg(unix)]

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use kibitz_core::{
    AnalysisError, EngineConfig, EngineError, EngineManager, ManagerConfig, ProcessBackendFactory,
};

const START: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

const FAKE_ENGINE: &str = r#"
while read -r cmd rest; do
  case "$cmd" in
    uci) echo "id name ShellFish"; echo "uciok" ;;
    isready) echo "readyok" ;;
    go)
      echo "info depth 1 score cp 15 pv d2d4"
      echo "info depth 2 score cp 31 nodes 200 pv e2e4 e7e5"
      echo "bestmove e2e4 ponder e7e5"
      ;;
    quit) exit 0 ;;
  esac
done
"#;

const CRASHING_ENGINE: &str = r#"
while read -r cmd rest; do
  case "$cmd" in
    go) exit 3 ;;
  esac
done
"#;

fn write_script(body: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(body.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn manager_for(script: &tempfile::NamedTempFile) -> EngineManager {
    let engine = EngineConfig {
        path: PathBuf::from("sh"),
        args: vec![script.path().display().to_string()],
        search_timeout: Some(Duration::from_secs(10)),
        ..EngineConfig::default()
    };
    let factory = Arc::new(ProcessBackendFactory::new(engine.clone()));
    EngineManager::new(
        factory,
        ManagerConfig {
            engine,
            ..ManagerConfig::default()
        },
    )
}

#[tokio::test]
async fn evaluates_against_scripted_engine() {
    let script = write_script(FAKE_ENGINE);
    let manager = manager_for(&script);

    let result = manager.evaluate("game", START, 2).await.unwrap();

    assert_eq!(result.cp(), Some(31));
    assert_eq!(result.best_move.as_deref(), Some("e2e4"));
    assert_eq!(result.pv, vec!["e2e4", "e7e5"]);

    // Same process serves the next search
    let again = manager.evaluate("game", START, 2).await.unwrap();
    assert_eq!(again.best_move.as_deref(), Some("e2e4"));
    assert_eq!(manager.sessions().await[0].searches, 2);

    manager.shutdown().await;
    assert!(manager.sessions().await.is_empty());
}

#[tokio::test]
async fn engine_exit_is_reported_as_unavailable() {
    let script = write_script(CRASHING_ENGINE);
    let manager = manager_for(&script);

    let result = manager.evaluate("game", START, 2).await;

    assert!(matches!(
        result,
        Err(AnalysisError::EngineUnavailable(EngineError::ProcessExited { .. }))
    ));
    assert!(manager.sessions().await.is_empty());
}

#[tokio::test]
async fn missing_binary_is_reported_as_unavailable() {
    let engine = EngineConfig {
        path: PathBuf::from("/nonexistent/kibitz-test-engine"),
        args: Vec::new(),
        ..EngineConfig::default()
    };
    let manager = EngineManager::new(
        Arc::new(ProcessBackendFactory::new(engine)),
        ManagerConfig::default(),
    );

    let result = manager.evaluate("game", START, 2).await;

    assert!(matches!(
        result,
        Err(AnalysisError::EngineUnavailable(EngineError::NotFound(_)))
    ));
}
