use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use rpc_over_quic::bench::BenchRunner;
use rpc_over_quic::config::validation::validate_config;
use rpc_over_quic::config::{load_or_default, ConfigError};
use rpc_over_quic::net::QuicDialer;
use rpc_over_quic::observability::init_logging;

#[derive(Parser)]
#[command(name = "bench-client")]
#[command(about = "Compare RPC latency over QUIC and TCP", long_about = None)]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override client.quic_address
    #[arg(long)]
    quic_addr: Option<String>,

    /// Override client.tcp_address
    #[arg(long)]
    tcp_addr: Option<String>,

    /// Override bench.payload_size (bytes)
    #[arg(long)]
    payload_size: Option<usize>,

    /// Override bench.iterations
    #[arg(long)]
    iterations: Option<u32>,

    /// Override bench.calls_per_iteration
    #[arg(long)]
    calls: Option<u32>,

    /// Which transports to benchmark
    #[arg(short, long, value_enum, default_value_t = Mode::Both)]
    mode: Mode,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    Quic,
    Tcp,
    Both,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = load_or_default(cli.config.as_deref())?;
    if let Some(addr) = cli.quic_addr {
        config.client.quic_address = addr;
    }
    if let Some(addr) = cli.tcp_addr {
        config.client.tcp_address = addr;
    }
    if let Some(size) = cli.payload_size {
        config.bench.payload_size = size;
    }
    if let Some(iterations) = cli.iterations {
        config.bench.iterations = iterations;
    }
    if let Some(calls) = cli.calls {
        config.bench.calls_per_iteration = calls;
    }

    validate_config(&config).map_err(ConfigError::Validation)?;
    init_logging(&config.observability)?;

    let runner = BenchRunner::new(&config.bench);
    tracing::info!(
        payload_size = runner.payload().len(),
        iterations = config.bench.iterations,
        calls_per_iteration = config.bench.calls_per_iteration,
        "Benchmark starting"
    );

    if cli.mode != Mode::Tcp {
        let addr: SocketAddr = config.client.quic_address.parse()?;
        let dialer = QuicDialer::from_config(&config)?;
        let report = runner.run_quic(&dialer, addr).await?;
        dialer.shutdown().await;
        println!("{} avg per call: {:.3} ms", report.transport, report.avg_millis_per_call());
    }

    if cli.mode != Mode::Quic {
        let addr: SocketAddr = config.client.tcp_address.parse()?;
        let report = runner.run_tcp(addr).await?;
        println!("{} avg per call: {:.3} ms", report.transport, report.avg_millis_per_call());
    }

    Ok(())
}
