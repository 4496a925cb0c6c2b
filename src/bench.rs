//! Latency benchmark comparing QUIC and TCP transports.
//!
//! # Responsibilities
//! - Generate the random request payload
//! - Run `iterations` rounds of `calls_per_iteration` unary calls, each
//!   round over a freshly dialed connection
//! - Report the average time per call
//!
//! # Design Decisions
//! - Errors end the run; callers decide whether that is fatal
//! - The whole run shares one overall timeout

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time::Instant;

use crate::config::BenchConfig;
use crate::net::quic::{DialError, QuicDialer};
use crate::rpc::{FileServiceClient, RpcError};

const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Random string of `size` ASCII letters.
pub fn random_payload(size: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..size)
        .map(|_| LETTERS[rng.gen_range(0..LETTERS.len())] as char)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Quic,
    Tcp,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Quic => write!(f, "QUIC"),
            Transport::Tcp => write!(f, "TCP"),
        }
    }
}

#[derive(Debug, Error)]
pub enum BenchError {
    #[error("Dial failed: {0}")]
    Dial(#[from] DialError),

    #[error("TCP connect failed: {0}")]
    Connect(#[source] std::io::Error),

    #[error("Call failed: {0}")]
    Rpc(#[from] RpcError),

    #[error("Unexpected response: {0:?}")]
    UnexpectedResponse(String),

    #[error("Benchmark exceeded {0:?}")]
    Timeout(Duration),
}

/// Outcome of one benchmark run.
#[derive(Debug, Clone, Copy)]
pub struct BenchReport {
    pub transport: Transport,
    pub calls: u32,
    pub elapsed: Duration,
}

impl BenchReport {
    pub fn avg_millis_per_call(&self) -> f64 {
        if self.calls == 0 {
            return 0.0;
        }
        self.elapsed.as_secs_f64() * 1000.0 / f64::from(self.calls)
    }
}

/// Runs the benchmark against one server.
#[derive(Debug, Clone)]
pub struct BenchRunner {
    payload: String,
    iterations: u32,
    calls_per_iteration: u32,
    timeout: Duration,
}

impl BenchRunner {
    pub fn new(config: &BenchConfig) -> Self {
        Self {
            payload: random_payload(config.payload_size),
            iterations: config.iterations,
            calls_per_iteration: config.calls_per_iteration,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Benchmark over QUIC, dialing a new session per iteration.
    pub async fn run_quic(&self, dialer: &QuicDialer, addr: SocketAddr) -> Result<BenchReport, BenchError> {
        self.run(Transport::Quic, move || async move {
            let socket = dialer.dial(addr).await?;
            Ok(FileServiceClient::connect(socket, addr.to_string()).await?)
        })
        .await
    }

    /// Benchmark over plain TCP, connecting anew per iteration.
    pub async fn run_tcp(&self, addr: SocketAddr) -> Result<BenchReport, BenchError> {
        self.run(Transport::Tcp, move || async move {
            let stream = TcpStream::connect(addr).await.map_err(BenchError::Connect)?;
            stream.set_nodelay(true).map_err(BenchError::Connect)?;
            Ok(FileServiceClient::connect(stream, addr.to_string()).await?)
        })
        .await
    }

    async fn run<F, Fut>(&self, transport: Transport, mut connect: F) -> Result<BenchReport, BenchError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<FileServiceClient, BenchError>>,
    {
        let start = Instant::now();
        let rounds = async {
            for iteration in 0..self.iterations {
                let mut client = connect().await?;
                self.round(&mut client).await?;
                tracing::debug!(%transport, iteration, "Benchmark iteration done");
            }
            Ok::<_, BenchError>(())
        };
        tokio::time::timeout(self.timeout, rounds)
            .await
            .map_err(|_| BenchError::Timeout(self.timeout))??;

        let report = BenchReport {
            transport,
            calls: self.iterations * self.calls_per_iteration,
            elapsed: start.elapsed(),
        };
        tracing::info!(
            %transport,
            calls = report.calls,
            avg_ms = report.avg_millis_per_call(),
            "Benchmark finished"
        );
        Ok(report)
    }

    async fn round(&self, client: &mut FileServiceClient) -> Result<(), BenchError> {
        for _ in 0..self.calls_per_iteration {
            let response = client.get_simple_response(self.payload.as_str()).await?;
            if response.message.len() != self.payload.len() + "Hello ".len() {
                return Err(BenchError::UnexpectedResponse(
                    response.message.chars().take(32).collect(),
                ));
            }
        }
        Ok(())
    }
}
