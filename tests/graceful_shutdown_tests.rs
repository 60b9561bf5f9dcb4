//! Graceful shutdown tests.
//!
//! On shutdown the server stops accepting requests and then stops the
//! monitor, waiting briefly for it to exit.

#[path = "common.rs"]
mod common;

use common::TestHost;
use std::time::Duration;

#[cfg(unix)]
#[tokio::test]
async fn test_shutdown_stops_running_monitor() {
    let host = TestHost::builder()
        .with_shell("exec sleep 30")
        .start()
        .await
        .unwrap();

    let (status, _) = host.post_json("/start", "").await.unwrap();
    assert_eq!(status, 200);

    let supervisor = host.supervisor().clone();
    let url = host.url("/health");
    tokio::time::timeout(Duration::from_secs(10), host.shutdown())
        .await
        .expect("shutdown timed out")
        .unwrap();

    assert!(!supervisor.status().await.running);
    let sys: Vec<String> = supervisor
        .logs()
        .tail(usize::MAX)
        .into_iter()
        .map(|e| e.text)
        .collect();
    assert!(sys.iter().any(|t| t.starts_with("Sent termination signal")));

    assert!(reqwest::get(url).await.is_err());
}

#[tokio::test]
async fn test_shutdown_when_idle() {
    let host = TestHost::builder().start().await.unwrap();
    let resp = host.get("/health").await.unwrap();
    assert_eq!(resp.status(), 200);

    tokio::time::timeout(Duration::from_secs(5), host.shutdown())
        .await
        .expect("shutdown timed out")
        .unwrap();
}
