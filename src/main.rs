use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use telemetry_reporter::sensor::CounterSensor;
use telemetry_reporter::status::TracingStatus;
use telemetry_reporter::transmitter::UdpTransmitter;
use telemetry_reporter::{Receiver, Reporter, ReporterConfig, ReporterConfigBuilder, Result};

/// Periodic UDP telemetry reporter with acknowledgement backoff
#[derive(Parser, Debug)]
#[command(name = "telemetry-reporter", version, about)]
struct Args {
    /// Collector address
    #[arg(long, default_value = "127.0.0.1:4123")]
    dest: SocketAddr,

    /// Local bind address
    #[arg(long, default_value = "0.0.0.0:0")]
    bind: SocketAddr,

    /// Sender identifier stamped on every frame
    #[arg(long, default_value_t = telemetry_reporter::DEFAULT_SENDER_ID)]
    sender_id: u16,

    /// Telemetry period, in time units
    #[arg(long, default_value_t = 10)]
    packet_interval: u64,

    /// Acknowledgement-request period and backoff step, in time units
    #[arg(long, default_value_t = 60)]
    ack_interval: u64,

    /// Acknowledgement wait, in time units
    #[arg(long, default_value_t = 5)]
    ack_wait: u64,

    /// Backoff ceiling, in time units
    #[arg(long, default_value_t = 600)]
    max_backoff: u64,

    /// Upper bound of random jitter added to each backoff, in time units
    #[arg(long, default_value_t = 0)]
    jitter: u64,

    /// Length of one time unit in milliseconds
    #[arg(long, default_value_t = 1000)]
    unit_ms: u64,
}

impl Args {
    fn into_config(self) -> Result<ReporterConfig> {
        ReporterConfigBuilder::new()
            .with_destination(self.dest)
            .with_bind_address(self.bind)
            .with_sender_id(self.sender_id)
            .with_base_packet_interval(Duration::from_secs(self.packet_interval))
            .with_base_ack_interval(Duration::from_secs(self.ack_interval))
            .with_ack_wait_timeout(Duration::from_secs(self.ack_wait))
            .with_max_backoff_interval(Duration::from_secs(self.max_backoff))
            .with_backoff_jitter(Duration::from_secs(self.jitter))
            .with_time_unit(Duration::from_millis(self.unit_ms))
            .build()
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match run(Args::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "reporter failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let config = args.into_config()?;

    // bring-up failures are the only fatal errors
    let socket = Arc::new(UdpSocket::bind(config.bind_address).await?);
    info!(local = %socket.local_addr()?, "socket bound");

    let transmitter = UdpTransmitter::new(Arc::clone(&socket), config.destination);
    let sensor = CounterSensor::new(200, 300, 5);
    let receive_timeout = config.receive_timeout;
    let reporter = Reporter::new(config, transmitter, sensor, TracingStatus);

    let (stop_tx, stop_rx) = watch::channel(false);
    let receiver = Receiver::spawn(socket, reporter.inbox(), receive_timeout, stop_rx.clone());

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("shutdown requested"),
            Err(e) => {
                warn!(error = %e, "Ctrl-C handler unavailable, running until killed");
                std::future::pending::<()>().await;
            }
        }
        let _ = stop_tx.send(true);
    });

    let stats = reporter.run(stop_rx).await;
    let _ = receiver.await;
    info!(?stats, "done");
    Ok(())
}
