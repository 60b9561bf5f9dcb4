//! Common test utilities for integration tests.
//!
//! [`TestHost`] runs the real snapwatch router on an ephemeral port with a
//! temporary snapshot root, and shuts it down when dropped.
//!
//! ```rust,ignore
//! #[tokio::test]
//! async fn test_health() {
//!     let host = TestHost::builder().start().await.unwrap();
//!     let resp = host.get("/health").await.unwrap();
//!     assert_eq!(resp.status(), 200);
//! }
//! ```

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use snapwatch::config::LastDirectoryHint;
use snapwatch::http::{AppState, run};
use snapwatch::supervisor::{MonitorCommand, SharedLogRing, Supervisor};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Hint file name inside the temporary root.
pub const HINT_FILE: &str = "monitor_config.json";

/// A snapwatch server on `127.0.0.1:<ephemeral>`.
pub struct TestHost {
    addr: SocketAddr,
    server_handle: Option<JoinHandle<anyhow::Result<()>>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    client: reqwest::Client,
    supervisor: Supervisor,
    root: TempDir,
}

/// Builder for configuring a [`TestHost`].
pub struct TestHostBuilder {
    command: MonitorCommand,
    log_capacity: Option<usize>,
}

impl Default for TestHostBuilder {
    fn default() -> Self {
        Self {
            command: MonitorCommand::new("/nonexistent/snapwatch-monitor", Vec::<String>::new()),
            log_capacity: None,
        }
    }
}

impl TestHostBuilder {
    #[must_use]
    pub fn with_command(mut self, command: MonitorCommand) -> Self {
        self.command = command;
        self
    }

    /// Runs `script` with `sh -c`; launch flags arrive as `$@`.
    #[must_use]
    pub fn with_shell(self, script: &str) -> Self {
        self.with_command(MonitorCommand::new("sh", ["-c", script, "monitor"]))
    }

    #[must_use]
    pub fn with_log_capacity(mut self, capacity: usize) -> Self {
        self.log_capacity = Some(capacity);
        self
    }

    pub async fn start(self) -> anyhow::Result<TestHost> {
        let root = tempfile::tempdir()?;
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let logs = self
            .log_capacity
            .map_or_else(SharedLogRing::default, SharedLogRing::with_capacity);
        let supervisor = Supervisor::spawn(self.command, logs);
        let state = Arc::new(AppState::new(
            supervisor.clone(),
            root.path(),
            LastDirectoryHint::new(root.path().join(HINT_FILE)),
        ));

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server_handle = tokio::spawn(run(listener, state, async {
            let _ = shutdown_rx.await;
        }));

        Ok(TestHost {
            addr,
            server_handle: Some(server_handle),
            shutdown_tx: Some(shutdown_tx),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()?,
            supervisor,
            root,
        })
    }
}

impl TestHost {
    pub fn builder() -> TestHostBuilder {
        TestHostBuilder::default()
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn get(&self, path: &str) -> reqwest::Result<reqwest::Response> {
        self.client.get(self.url(path)).send().await
    }

    pub async fn get_json(&self, path: &str) -> anyhow::Result<(u16, Value)> {
        let resp = self.get(path).await?;
        let status = resp.status().as_u16();
        Ok((status, resp.json().await?))
    }

    pub async fn post(&self, path: &str, body: &str) -> reqwest::Result<reqwest::Response> {
        self.client
            .post(self.url(path))
            .header("content-type", "application/json")
            .body(body.to_string())
            .send()
            .await
    }

    pub async fn post_json(&self, path: &str, body: &str) -> anyhow::Result<(u16, Value)> {
        let resp = self.post(path, body).await?;
        let status = resp.status().as_u16();
        Ok((status, resp.json().await?))
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    /// Writes a file under the snapshot root, creating parent directories.
    pub fn write_file(&self, relative: &str, contents: &[u8]) {
        let path = self.root.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, contents).unwrap();
    }

    /// Waits until the monitor is idle and its exit line is in the log.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        self.supervisor.wait_for_exit(timeout).await
    }

    /// Polls `GET /status` until it reports idle, without waiting for the
    /// exited monitor's output to drain.
    pub async fn poll_status_idle(&self, timeout: Duration) -> Option<Value> {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if let Ok((_, body)) = self.get_json("/status").await
                && body["running"] == false
            {
                return Some(body);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        None
    }

    /// Captured lines for one source (`out`, `err` or `sys`).
    pub async fn log_texts(&self, source: &str) -> Vec<String> {
        let (_, body) = self.get_json("/status").await.unwrap();
        body["logs"]
            .as_array()
            .unwrap()
            .iter()
            .filter(|e| e["src"] == source)
            .filter_map(|e| e["text"].as_str().map(String::from))
            .collect()
    }

    /// Triggers graceful shutdown and waits for the server task.
    pub async fn shutdown(mut self) -> anyhow::Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        match self.server_handle.take() {
            Some(handle) => handle.await?,
            None => Ok(()),
        }
    }
}

impl Drop for TestHost {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
