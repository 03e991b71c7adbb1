//! Config file watching.

use std::time::Duration;

use ordnung_gate::config::{ConfigWatcher, GateConfig};

#[tokio::test]
async fn test_watcher_delivers_valid_changes_only() {
    let path = std::env::temp_dir().join(format!("gate_watch_{}.toml", std::process::id()));
    std::fs::write(&path, "[rate_limit]\ncalls = 5\n").unwrap();

    let mut initial = GateConfig::default();
    initial.rate_limit.calls = 5;
    let (watcher, mut updates) = ConfigWatcher::new(&path, &initial);
    let _guard = watcher.run().unwrap();

    // Invalid: dropped with an error log
    std::fs::write(&path, "[rate_limit]\ncalls = 0\n").unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    std::fs::write(&path, "[rate_limit]\ncalls = 42\n").unwrap();

    let config = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            match updates.recv().await {
                Some(config) if config.rate_limit.calls == 42 => break config,
                // A truncated mid-write file can surface as defaults
                Some(other) => assert_ne!(other.rate_limit.calls, 0),
                None => panic!("watcher channel closed"),
            }
        }
    })
    .await
    .expect("No config update received");

    assert_eq!(config.rate_limit.calls, 42);
    std::fs::remove_file(&path).unwrap_or_default();
}
