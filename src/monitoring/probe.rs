//! Reachability probes
//!
//! A probe tests one target over one protocol and reports an outcome. Transport
//! failures (timeouts, refused connections, DNS or TLS errors) are outcomes, not
//! errors: they yield `is_up = false`. `Err` is reserved for targets that cannot
//! be probed at all, such as an unparseable TCP address.
//!
//! | Protocol       | Check                               | Up when                 |
//! |----------------|-------------------------------------|-------------------------|
//! | `http`/`https` | GET, redirects followed, 10s limit  | status code < 500       |
//! | `tcp`          | bare connect, 5s limit              | connection established  |
//! | `ping`         | none                                | never                   |

use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{instrument, trace};

use crate::storage::schema::{MonitoredTarget, Protocol};

/// Request timeout for HTTP-family probes
pub const HTTP_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Connect timeout for TCP probes
pub const TCP_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Port used when a TCP address has none
pub const DEFAULT_TCP_PORT: u16 = 80;

/// Error recorded for targets using the `ping` protocol
pub const PING_UNSUPPORTED: &str = "ping probes are not supported";

/// Result of one probe attempt
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeOutcome {
    pub is_up: bool,
    pub status_code: Option<u16>,
    pub latency_ms: Option<f64>,
    pub error: Option<String>,
}

/// Tests reachability of a target
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, target: &MonitoredTarget) -> Result<ProbeOutcome>;
}

/// A response below 500 means the service answered
pub fn is_up_status(status_code: u16) -> bool {
    status_code < 500
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// HTTP/HTTPS probe
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self { client })
    }

    pub async fn check(&self, url: &str) -> ProbeOutcome {
        let start = Instant::now();

        match self.client.get(url).send().await {
            Ok(response) => {
                let latency_ms = elapsed_ms(start);
                let status_code = response.status().as_u16();
                let is_up = is_up_status(status_code);

                ProbeOutcome {
                    is_up,
                    status_code: Some(status_code),
                    latency_ms: Some(latency_ms),
                    error: (!is_up).then(|| format!("server error: {status_code}")),
                }
            }
            Err(e) => {
                let latency_ms = elapsed_ms(start);
                let error = if e.is_timeout() {
                    "request timed out".to_string()
                } else {
                    e.to_string()
                };
                trace!("HTTP probe of {url} failed: {error}");

                ProbeOutcome {
                    is_up: false,
                    status_code: None,
                    latency_ms: Some(latency_ms),
                    error: Some(error),
                }
            }
        }
    }
}

/// Split a TCP target address into host and port
///
/// Accepts `host`, `host:port`, `[v6]:port` and an optional `tcp://` prefix.
pub fn parse_tcp_address(address: &str) -> Result<(String, u16)> {
    let rest = address.strip_prefix("tcp://").unwrap_or(address);
    let rest = rest.trim_end_matches('/');

    if rest.is_empty() {
        return Err(anyhow!("empty TCP address"));
    }

    if let Some(v6) = rest.strip_prefix('[') {
        let (host, tail) = v6
            .split_once(']')
            .ok_or_else(|| anyhow!("unterminated IPv6 address: {address}"))?;
        let port = match tail.strip_prefix(':') {
            Some(port) => port
                .parse()
                .with_context(|| format!("invalid port in {address}"))?,
            None => DEFAULT_TCP_PORT,
        };
        return Ok((host.to_string(), port));
    }

    match rest.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse()
                .with_context(|| format!("invalid port in {address}"))?;
            Ok((host.to_string(), port))
        }
        None => Ok((rest.to_string(), DEFAULT_TCP_PORT)),
    }
}

/// TCP connect probe
pub struct TcpProbe {
    connect_timeout: Duration,
}

impl TcpProbe {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    pub async fn check(&self, host: &str, port: u16) -> ProbeOutcome {
        let start = Instant::now();

        let result = timeout(self.connect_timeout, TcpStream::connect((host, port))).await;
        let latency_ms = Some(elapsed_ms(start));

        match result {
            Ok(Ok(stream)) => {
                // Connection establishment is the whole check
                drop(stream);
                ProbeOutcome {
                    is_up: true,
                    status_code: None,
                    latency_ms,
                    error: None,
                }
            }
            Ok(Err(e)) => ProbeOutcome {
                is_up: false,
                status_code: None,
                latency_ms,
                error: Some(format!("TCP connection failed: {e}")),
            },
            Err(_) => ProbeOutcome {
                is_up: false,
                status_code: None,
                latency_ms,
                error: Some("TCP connection timeout".to_string()),
            },
        }
    }
}

/// Dispatches each target to the probe matching its protocol
pub struct ProtocolProbe {
    http: HttpProbe,
    tcp: TcpProbe,
}

impl ProtocolProbe {
    /// Probes with the standard timeouts
    pub fn new() -> Result<Self> {
        Self::with_timeouts(HTTP_PROBE_TIMEOUT, TCP_PROBE_TIMEOUT)
    }

    pub fn with_timeouts(http_timeout: Duration, tcp_timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: HttpProbe::new(http_timeout)?,
            tcp: TcpProbe::new(tcp_timeout),
        })
    }
}

#[async_trait]
impl Probe for ProtocolProbe {
    #[instrument(skip_all, fields(target = %target.name, protocol = %target.protocol))]
    async fn probe(&self, target: &MonitoredTarget) -> Result<ProbeOutcome> {
        match target.protocol {
            Protocol::Http | Protocol::Https => Ok(self.http.check(&target.address).await),
            Protocol::Tcp => {
                let (host, port) = parse_tcp_address(&target.address)?;
                Ok(self.tcp.check(&host, port).await)
            }
            Protocol::Ping => Ok(ProbeOutcome {
                is_up: false,
                status_code: None,
                latency_ms: None,
                error: Some(PING_UNSUPPORTED.to_string()),
            }),
        }
    }
}
