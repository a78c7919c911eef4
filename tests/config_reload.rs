//! Hot reload of the fallback section from a watched config file.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use assistant_orchestrator::backends::{BackendAdapter, BackendId};
use assistant_orchestrator::config::watcher::ConfigWatcher;
use assistant_orchestrator::config::{FallbackConfig, OrchestratorConfig};
use assistant_orchestrator::lifecycle::AssistantRuntime;
use tokio::sync::mpsc;

mod common;
use common::ScriptedAdapter;

struct ScratchDir(PathBuf);

impl ScratchDir {
    fn new() -> Self {
        let dir = std::env::temp_dir().join(format!("orchestrator-reload-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        Self(dir)
    }

    fn file(&self, name: &str) -> PathBuf {
        self.0.join(name)
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

fn chain_toml(chain: &str) -> String {
    format!("[fallback]\nchain = [{}]\n", chain)
}

fn runtime() -> AssistantRuntime {
    let primary = ScriptedAdapter::healthy(BackendId::Primary);
    let specialist = ScriptedAdapter::healthy(BackendId::Specialist);
    AssistantRuntime::with_adapters(
        vec![
            (primary as Arc<dyn BackendAdapter>, None),
            (specialist as Arc<dyn BackendAdapter>, None),
        ],
        FallbackConfig {
            chain: vec![BackendId::Primary, BackendId::Specialist],
            ..FallbackConfig::default()
        },
        Duration::from_secs(5),
    )
}

async fn wait_for_chain(runtime: &AssistantRuntime, expected: &[BackendId]) {
    for _ in 0..100 {
        if runtime.orchestrator().chain() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("chain never became {:?}", expected);
}

#[tokio::test]
async fn test_watcher_sends_valid_edits_and_drops_invalid_ones() {
    let scratch = ScratchDir::new();
    let path = scratch.file("orchestrator.toml");
    std::fs::write(&path, chain_toml(r#""primary", "specialist""#)).unwrap();

    let (watcher, mut updates) = ConfigWatcher::start_with_debounce(&path, Duration::from_millis(50)).unwrap();
    assert_eq!(watcher.path(), path.as_path());
    tokio::time::sleep(Duration::from_millis(200)).await;

    std::fs::write(&path, chain_toml(r#""specialist", "primary""#)).unwrap();
    let reloaded = tokio::time::timeout(Duration::from_secs(10), updates.recv())
        .await
        .expect("valid edit was not delivered")
        .unwrap();
    assert_eq!(reloaded.fallback.chain, vec![BackendId::Specialist, BackendId::Primary]);

    // Let any trailing events from the same write settle.
    tokio::time::sleep(Duration::from_millis(500)).await;
    while updates.try_recv().is_ok() {}

    std::fs::write(&path, chain_toml("")).unwrap();
    let nothing = tokio::time::timeout(Duration::from_millis(1_500), updates.recv()).await;
    assert!(nothing.is_err(), "invalid config must not be delivered");

    // Unrelated files in the same directory are ignored.
    std::fs::write(scratch.file("other.toml"), chain_toml(r#""primary""#)).unwrap();
    let nothing = tokio::time::timeout(Duration::from_millis(1_000), updates.recv()).await;
    assert!(nothing.is_err());
}

#[tokio::test]
async fn test_runtime_applies_reloaded_fallback_section() {
    let scratch = ScratchDir::new();
    let path = scratch.file("orchestrator.toml");
    std::fs::write(&path, chain_toml(r#""primary", "specialist""#)).unwrap();

    let runtime = runtime();
    let (_watcher, updates) = ConfigWatcher::start_with_debounce(&path, Duration::from_millis(50)).unwrap();
    let follower = runtime.follow_config_updates(updates);
    tokio::time::sleep(Duration::from_millis(200)).await;

    std::fs::write(&path, chain_toml(r#""specialist""#)).unwrap();
    wait_for_chain(&runtime, &[BackendId::Specialist]).await;

    runtime.shutdown().await;
    tokio::time::timeout(Duration::from_secs(1), follower).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_invalid_update_keeps_current_chain() {
    let runtime = runtime();
    let (tx, rx) = mpsc::unbounded_channel();
    let follower = runtime.follow_config_updates(rx);

    let mut invalid = OrchestratorConfig::default();
    invalid.fallback.chain = vec![BackendId::Specialist, BackendId::Specialist];
    tx.send(invalid).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(runtime.orchestrator().chain(), vec![BackendId::Primary, BackendId::Specialist]);

    let mut valid = OrchestratorConfig::default();
    valid.fallback.chain = vec![BackendId::Specialist, BackendId::Primary];
    tx.send(valid).unwrap();
    wait_for_chain(&runtime, &[BackendId::Specialist, BackendId::Primary]).await;

    // Closing the channel ends the loop.
    drop(tx);
    tokio::time::timeout(Duration::from_secs(1), follower).await.unwrap().unwrap();
}
