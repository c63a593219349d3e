//! Shared utilities for integration tests.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use tracestack::config::{Config, ServerConfig};
use tracestack::ring::Ring;
use tracestack::{App, ModuleName, Shutdown};

/// An [`App`] serving on an ephemeral port in a background task.
pub struct RunningApp {
    pub addr: SocketAddr,
    pub ring: Option<Arc<Ring>>,
    shutdown: Shutdown,
    task: JoinHandle<App>,
}

impl RunningApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// End `run`, then stop every module. Returns the stopped app for inspection.
    pub async fn stop(self) -> App {
        self.shutdown.trigger();
        let mut app = tokio::time::timeout(Duration::from_secs(10), self.task)
            .await
            .expect("server did not stop in time")
            .unwrap();
        app.stop();
        app
    }
}

/// Start `target` on 127.0.0.1 with an OS-assigned port.
pub async fn start_app(target: ModuleName, configure: impl FnOnce(&mut Config)) -> RunningApp {
    let mut config = Config {
        target,
        server: ServerConfig {
            http_listen_address: "127.0.0.1".into(),
            http_listen_port: 0,
            ..ServerConfig::default()
        },
        ..Config::default()
    };
    configure(&mut config);

    let mut app = App::new(config).unwrap();
    let addr = app.local_addr().unwrap();
    let ring = app.components().ring.clone();
    let shutdown = app.shutdown_handle();

    let task = tokio::spawn(async move {
        app.run().await.unwrap();
        app
    });

    RunningApp {
        addr,
        ring,
        shutdown,
        task,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// Start a fake ingester answering every request with the status and body
/// produced by `f`. Returns its base URL.
#[allow(dead_code)]
pub async fn start_fake_ingester<F, Fut>(f: F) -> String
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let f = f.clone();
            tokio::spawn(async move {
                // The request itself is ignored; read what has arrived so the
                // client is not reset mid-write.
                let mut buf = [0u8; 8192];
                let _ = tokio::time::timeout(Duration::from_millis(200), socket.read(&mut buf)).await;

                let (status, body) = f().await;
                let status_text = match status {
                    200 => "200 OK",
                    204 => "204 No Content",
                    404 => "404 Not Found",
                    429 => "429 Too Many Requests",
                    500 => "500 Internal Server Error",
                    503 => "503 Service Unavailable",
                    _ => "200 OK",
                };

                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status_text,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    format!("http://{addr}")
}
