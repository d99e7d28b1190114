//! Shared utilities for integration testing: mock backends and a fully
//! wired proxy (aggregator + health monitor + one entry point) fed by a
//! synthetic provider channel.

use std::collections::BTreeMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::AtomicU32;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use switchyard::aggregator::{Aggregator, AggregatorSettings};
use switchyard::config::dynamic::{
    Backend, Configuration, Frontend, MatchRule, ServerConfig,
};
use switchyard::config::schema::{ForwardingConfig, TimeoutConfig};
use switchyard::health::{HealthMonitor, HealthRegistry, HealthThresholds};
use switchyard::http::{upstream_client, EntryPointServer};
use switchyard::lifecycle::Shutdown;
use switchyard::provider::ConfigurationMessage;
use switchyard::resilience::circuit_breaker::BreakerRegistry;
use switchyard::routing::TableSwitch;

/// Start a mock backend returning a fixed 200 response.
#[allow(dead_code)]
pub async fn start_mock_backend(response: &'static str) -> SocketAddr {
    start_programmable_backend(move |_path| async move { (200, response.to_string()) }).await
}

/// Start a mock backend whose status/body depend on the request path.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let mut buf = [0u8; 4096];
                        let n = socket.read(&mut buf).await.unwrap_or(0);
                        let head = String::from_utf8_lossy(&buf[..n]);
                        let path = head
                            .lines()
                            .next()
                            .and_then(|line| line.split_whitespace().nth(1))
                            .unwrap_or("/")
                            .to_string();

                        let (status, body) = f(path).await;
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            502 => "502 Bad Gateway",
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
                Err(_) => break,
            }
        }
    });

    addr
}

/// Start a backend that accepts connections, counts them, and slams the
/// socket shut: every dial is a transport failure from the proxy's side.
#[allow(dead_code)]
pub async fn start_counting_dead_backend() -> (SocketAddr, Arc<AtomicU32>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let count = Arc::new(AtomicU32::new(0));
    let counter = count.clone();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    drop(socket);
                }
                Err(_) => break,
            }
        }
    });

    (addr, count)
}

/// Issue a raw HTTP/1.1 GET with an explicit Host header.
#[allow(dead_code)]
pub async fn raw_get(addr: SocketAddr, host: &str, path: &str) -> (u16, String) {
    let mut stream = TcpStream::connect(addr).await.expect("proxy unreachable");
    let request = format!("GET {path} HTTP/1.1\r\nHost: {host}\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let text = String::from_utf8_lossy(&raw).to_string();

    let status = text
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .expect("malformed status line");
    let body = text
        .split_once("\r\n\r\n")
        .map(|(_, b)| b.to_string())
        .unwrap_or_default();
    (status, body)
}

/// Knobs the failure-injection tests need to turn.
pub struct ProxyOptions {
    pub debounce_ms: u64,
    pub max_attempts: u32,
    pub unhealthy_threshold: u32,
    pub healthy_threshold: u32,
}

impl Default for ProxyOptions {
    fn default() -> Self {
        Self {
            debounce_ms: 100,
            max_attempts: 3,
            unhealthy_threshold: 3,
            healthy_threshold: 2,
        }
    }
}

/// A running proxy wired exactly like `main`, minus signals and metrics.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub tx: mpsc::Sender<ConfigurationMessage>,
    /// Held so the broadcast sender stays open and tasks keep running.
    #[allow(dead_code)]
    pub shutdown: Shutdown,
    pub switch: Arc<TableSwitch>,
}

impl TestProxy {
    /// Send one provider message.
    pub async fn push(&self, provider: &str, configuration: Configuration) {
        self.tx
            .send(ConfigurationMessage {
                provider_name: provider.to_string(),
                configuration,
            })
            .await
            .expect("aggregator gone");
    }

    /// Block until at least `generation` tables have been published.
    pub async fn wait_for_generation(&self, generation: u64) {
        for _ in 0..100 {
            if self.switch.generation() >= generation {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("routing table generation never reached {generation}");
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

pub async fn spawn_proxy(options: ProxyOptions) -> TestProxy {
    let shutdown = Shutdown::new();
    let switch = Arc::new(TableSwitch::empty());
    let (tx, rx) = mpsc::channel(16);

    let aggregator = Aggregator::new(
        switch.clone(),
        Arc::new(HealthRegistry::new()),
        Arc::new(BreakerRegistry::new()),
        ["http".to_string()].into_iter().collect(),
        HealthThresholds {
            unhealthy: options.unhealthy_threshold,
            healthy: options.healthy_threshold,
        },
        AggregatorSettings {
            debounce: Duration::from_millis(options.debounce_ms),
            forget_after_builds: 3,
        },
    );
    tokio::spawn(aggregator.run(rx, shutdown.subscribe()));

    let monitor = HealthMonitor::new(switch.clone());
    tokio::spawn(monitor.run(shutdown.subscribe()));

    let timeouts = TimeoutConfig {
        connect_secs: 1,
        request_secs: 10,
        attempt_secs: 2,
    };
    let forwarding = ForwardingConfig {
        max_attempts: options.max_attempts,
        retry_buffer_limit: 1024 * 1024,
    };
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = EntryPointServer::new(
        "http",
        switch.clone(),
        upstream_client(&timeouts),
        forwarding,
        &timeouts,
    );
    tokio::spawn(server.run(listener, shutdown.subscribe()));

    TestProxy {
        addr,
        tx,
        shutdown,
        switch,
    }
}

/// A configuration with one host-matched frontend over one pool.
#[allow(dead_code)]
pub fn host_route(host: &str, servers: &[SocketAddr]) -> Configuration {
    route_with_rule(
        MatchRule::Host {
            host: host.to_string(),
        },
        servers,
    )
}

/// A configuration with one prefix-matched frontend over one pool.
pub fn prefix_route(prefix: &str, servers: &[SocketAddr]) -> Configuration {
    route_with_rule(
        MatchRule::PathPrefix {
            prefix: prefix.to_string(),
        },
        servers,
    )
}

pub fn route_with_rule(rule: MatchRule, servers: &[SocketAddr]) -> Configuration {
    let mut frontends = BTreeMap::new();
    frontends.insert(
        "web".to_string(),
        Frontend {
            entry_points: vec![],
            backend: "pool".to_string(),
            priority: 0,
            rule,
        },
    );
    let mut backends = BTreeMap::new();
    backends.insert("pool".to_string(), backend_for(servers));
    Configuration {
        frontends,
        backends,
    }
}

pub fn backend_for(servers: &[SocketAddr]) -> Backend {
    Backend {
        servers: servers
            .iter()
            .map(|addr| ServerConfig {
                url: format!("http://{addr}"),
                weight: 1,
            })
            .collect(),
        load_balancer: Default::default(),
        health_check: None,
        circuit_breaker: None,
    }
}

/// A reqwest client that neither pools nor proxies, so each request is an
/// honest fresh connection to the entry point.
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
