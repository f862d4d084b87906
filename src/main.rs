//! `iec104-sim`: IEC 60870-5-104 RTU simulator.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use voltage_iec104_sim::config::{
    DEFAULT_COMMON_ADDRESS, DEFAULT_K, DEFAULT_PORT, DEFAULT_SPONTANEOUS_INTERVAL,
    DEFAULT_SPONTANEOUS_PROBABILITY, DEFAULT_T1_TIMEOUT, DEFAULT_T2_TIMEOUT, DEFAULT_T3_TIMEOUT,
    DEFAULT_W,
};
use voltage_iec104_sim::{default_catalog, load_catalog, Iec104Server, PointRegistry, ServerConfig};

/// IEC 60870-5-104 controlled station simulator
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// TCP port
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Log at debug level unless RUST_LOG is set
    #[arg(long)]
    debug: bool,

    /// Common address of the station
    #[arg(long, default_value_t = DEFAULT_COMMON_ADDRESS)]
    common_address: u16,

    /// Max unacknowledged I-frames sent
    #[arg(long, default_value_t = DEFAULT_K)]
    k: u16,

    /// Received I-frames before an S-frame is sent
    #[arg(long, default_value_t = DEFAULT_W)]
    w: u16,

    /// Confirmation timeout in seconds
    #[arg(long, default_value_t = DEFAULT_T1_TIMEOUT)]
    t1: u64,

    /// Acknowledgement timeout in seconds
    #[arg(long, default_value_t = DEFAULT_T2_TIMEOUT)]
    t2: u64,

    /// Idle time before a test frame, in seconds
    #[arg(long, default_value_t = DEFAULT_T3_TIMEOUT)]
    t3: u64,

    /// Seconds between spontaneous update cycles
    #[arg(long, default_value_t = DEFAULT_SPONTANEOUS_INTERVAL)]
    spontaneous_interval: u64,

    /// Chance of each point being reported in a cycle
    #[arg(long, default_value_t = DEFAULT_SPONTANEOUS_PROBABILITY)]
    spontaneous_probability: f64,

    /// YAML point catalog; the built-in substation is used when absent
    #[arg(long, value_name = "FILE")]
    points: Option<PathBuf>,
}

impl Args {
    fn server_config(&self) -> ServerConfig {
        ServerConfig::new(format!("{}:{}", self.host, self.port))
            .common_address(self.common_address)
            .k(self.k)
            .w(self.w)
            .t1_timeout(Duration::from_secs(self.t1))
            .t2_timeout(Duration::from_secs(self.t2))
            .t3_timeout(Duration::from_secs(self.t3))
            .spontaneous_interval(Duration::from_secs(self.spontaneous_interval))
            .spontaneous_probability(self.spontaneous_probability)
    }
}

fn init_logging(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() -> Result<&'static str> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate =
            signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("failed to listen for SIGINT")?;
                Ok("SIGINT")
            }
            _ = terminate.recv() => Ok("SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for Ctrl-C")?;
        Ok("Ctrl-C")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.debug);

    let points = match &args.points {
        Some(path) => load_catalog(path)
            .with_context(|| format!("failed to load point catalog {}", path.display()))?,
        None => default_catalog(),
    };
    let registry = PointRegistry::new(points).context("invalid point catalog")?;

    let config = args.server_config();
    let server = Iec104Server::bind(config.clone(), registry)
        .await
        .with_context(|| format!("failed to start server on {}", config.bind_address))?;

    let shutdown = CancellationToken::new();
    let mut server_task = tokio::spawn(server.run(shutdown.clone()));

    tokio::select! {
        signal = shutdown_signal() => {
            info!("Received {}, shutting down", signal?);
            shutdown.cancel();
            server_task.await.context("server task panicked")??;
        }
        result = &mut server_task => {
            result.context("server task panicked")??;
        }
    }

    info!("IEC 104 simulator stopped");
    Ok(())
}
