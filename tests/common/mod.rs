//! Shared utilities for integration and load testing.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lineage_hub::config::HubConfig;
use lineage_hub::consumers::{LineageForwarder, MarquezSink, MemoryStore, TelemetryBatcher};
use lineage_hub::http::HttpServer;
use lineage_hub::lifecycle::Shutdown;
use lineage_hub::log::{MemoryLog, Topics};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// One request seen by a recording backend.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

#[derive(Clone, Default)]
pub struct Recorded(Arc<Mutex<Vec<RecordedRequest>>>);

impl Recorded {
    pub fn all(&self) -> Vec<RecordedRequest> {
        self.0.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    /// Poll until `count` requests arrived or `timeout` passed.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if self.len() >= count {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.len() >= count
    }
}

/// Start a backend on an ephemeral port that records every request and
/// answers with the status `status_for(n)` for the n-th request (0-based).
pub async fn start_recording_backend<F>(status_for: F) -> (SocketAddr, Recorded)
where
    F: Fn(usize) -> u16 + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let recorded = Recorded::default();
    let status_for = Arc::new(status_for);

    let sink = recorded.clone();
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    let sink = sink.clone();
                    let status_for = status_for.clone();
                    tokio::spawn(async move {
                        handle_connection(socket, sink, status_for).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    (addr, recorded)
}

async fn handle_connection(
    mut socket: TcpStream,
    recorded: Recorded,
    status_for: Arc<dyn Fn(usize) -> u16 + Send + Sync>,
) {
    let Some(request) = read_request(&mut socket).await else {
        return;
    };

    let index = {
        let mut all = recorded.0.lock().unwrap();
        all.push(request);
        all.len() - 1
    };
    let status = status_for(index);
    let status_text = match status {
        200 => "200 OK",
        201 => "201 Created",
        400 => "400 Bad Request",
        500 => "500 Internal Server Error",
        503 => "503 Service Unavailable",
        _ => "200 OK",
    };

    let body = "{}";
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status_text,
        body.len(),
        body
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

async fn read_request(socket: &mut TcpStream) -> Option<RecordedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();

    let content_length = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);

    let mut body = buf[header_end + 4..].to_vec();
    while body.len() < content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }

    Some(RecordedRequest {
        method,
        path,
        headers,
        body: String::from_utf8_lossy(&body).to_string(),
    })
}

/// Gateway and both consumers wired over one in-memory log.
pub struct TestHub {
    pub url: String,
    pub log: MemoryLog,
    pub store: Arc<MemoryStore>,
    pub shutdown: Shutdown,
    tasks: Vec<JoinHandle<()>>,
}

impl TestHub {
    pub async fn start(mut config: HubConfig) -> Self {
        config.health.check_dependencies = false;
        let log = MemoryLog::new(config.log.partitions);
        let shutdown = Shutdown::new();
        let topics = Topics::from_config(&config.log);
        let mut tasks = Vec::new();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let server = HttpServer::new(&config, Arc::new(log.clone()));
        let rx = shutdown.subscribe();
        tasks.push(tokio::spawn(async move {
            server.run(listener, rx).await.unwrap();
        }));

        let consumer = log.subscribe(&config.log.lineage_group, &[topics.lineage.as_str()]);
        let sink = MarquezSink::new(&config.forwarder).unwrap();
        let forwarder = LineageForwarder::new(&config.forwarder, Arc::new(sink));
        tasks.push(tokio::spawn(forwarder.run(Box::new(consumer), shutdown.subscribe())));

        let store = Arc::new(MemoryStore::new());
        let consumer = log.subscribe(
            &config.log.telemetry_group,
            &[topics.spans.as_str(), topics.metrics.as_str()],
        );
        let batcher = Arc::new(TelemetryBatcher::new(&config.batcher, &topics, store.clone()));
        tasks.push(tokio::spawn(batcher.run(Box::new(consumer), shutdown.subscribe())));

        Self {
            url,
            log,
            store,
            shutdown,
            tasks,
        }
    }

    /// Trigger shutdown and wait for every component to stop.
    pub async fn stop(self) {
        self.shutdown.trigger();
        for task in self.tasks {
            task.await.unwrap();
        }
    }
}
