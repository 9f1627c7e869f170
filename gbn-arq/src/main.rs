//! Entry point for `gbn-arq`.
//!
//! Parses CLI arguments and dispatches into either **server** or **client** mode.
//! All protocol work is delegated to the library; `main.rs` owns only process
//! setup (logging, argument parsing, stdin/stdout plumbing).
//!
//! ```text
//! gbn-arq server --bind 127.0.0.1:9000 > received.bin
//! gbn-arq client --server 127.0.0.1:9000 --loss 0.1 < payload.bin
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use gbn_arq::{
    DatagramChannel, LossyChannel, Session, SimulatorConfig, TransportConfig, UdpChannel,
};

/// Go-Back-N reliable byte stream over UDP.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,

    #[command(flatten)]
    transport: TransportArgs,

    #[command(flatten)]
    faults: FaultArgs,
}

#[derive(Subcommand)]
enum Mode {
    /// Receive one stream and write it to stdout.
    Server {
        /// Local address to bind (e.g. 0.0.0.0:9000).
        #[arg(short, long, default_value = "0.0.0.0:9000")]
        bind: SocketAddr,
        /// Seconds to keep acknowledging retransmissions after the stream ends.
        #[arg(long, default_value_t = 2)]
        linger_secs: u64,
    },
    /// Read stdin and send it to a server.
    Client {
        /// Remote server address (e.g. 127.0.0.1:9000).
        #[arg(short, long)]
        server: SocketAddr,
        /// Local address to bind.
        #[arg(short, long, default_value = "0.0.0.0:0")]
        bind: SocketAddr,
    },
}

#[derive(Args)]
struct TransportArgs {
    /// Frames in flight.
    #[arg(long, global = true, default_value_t = gbn_arq::config::DEFAULT_WINDOW_CAPACITY)]
    window: usize,
    /// Retransmit interval in milliseconds.
    #[arg(long, global = true, default_value_t = 500)]
    rto_ms: u64,
    /// Give up on unacknowledged frames at close after this many seconds (0 = never).
    #[arg(long, global = true, default_value_t = 30)]
    close_timeout_secs: u64,
}

impl TransportArgs {
    fn config(&self) -> TransportConfig {
        let close_timeout = (self.close_timeout_secs > 0).then(|| Duration::from_secs(self.close_timeout_secs));
        TransportConfig::default()
            .with_window_capacity(self.window)
            .with_retransmit_interval(Duration::from_millis(self.rto_ms))
            .with_close_timeout(close_timeout)
    }
}

/// Fault injection applied to this endpoint's outbound datagrams.
#[derive(Args)]
struct FaultArgs {
    #[arg(long, global = true, default_value_t = 0.0)]
    loss: f64,
    #[arg(long, global = true, default_value_t = 0.0)]
    corrupt: f64,
    #[arg(long, global = true, default_value_t = 0.0)]
    duplicate: f64,
    #[arg(long, global = true)]
    seed: Option<u64>,
}

impl FaultArgs {
    fn simulator(&self) -> Result<Option<SimulatorConfig>> {
        for (name, p) in [("loss", self.loss), ("corrupt", self.corrupt), ("duplicate", self.duplicate)] {
            ensure!((0.0..=1.0).contains(&p), "--{name} must be within [0, 1], got {p}");
        }
        if self.loss == 0.0 && self.corrupt == 0.0 && self.duplicate == 0.0 {
            return Ok(None);
        }
        let mut config = SimulatorConfig {
            loss_rate: self.loss,
            corrupt_rate: self.corrupt,
            duplicate_rate: self.duplicate,
            ..SimulatorConfig::default()
        };
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        Ok(Some(config))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise env_logger; set RUST_LOG to control verbosity.
    env_logger::init();

    let cli = Cli::parse();
    let config = cli.transport.config();
    let faults = cli.faults.simulator()?;

    let bind = match cli.mode {
        Mode::Server { bind, .. } | Mode::Client { bind, .. } => bind,
    };
    let udp = UdpChannel::bind(bind)
        .await
        .with_context(|| format!("binding {bind}"))?;

    match faults {
        Some(sim) => {
            log::info!(
                "fault injection: loss={} corrupt={} duplicate={} seed={}",
                sim.loss_rate,
                sim.corrupt_rate,
                sim.duplicate_rate,
                sim.seed
            );
            run(cli.mode, Session::with_channel(LossyChannel::new(udp, sim), config)?).await
        }
        None => run(cli.mode, Session::with_channel(udp, config)?).await,
    }
}

async fn run<C: DatagramChannel>(mode: Mode, session: Session<C>) -> Result<()> {
    match mode {
        Mode::Server { linger_secs, .. } => {
            log::info!("server listening on {}", session.local_addr()?);
            let data = session.receive_to_end().await.context("receiving stream")?;
            log::info!("received {} byte(s)", data.len());

            let mut stdout = tokio::io::stdout();
            stdout.write_all(&data).await?;
            stdout.flush().await?;

            session.linger(Duration::from_secs(linger_secs)).await?;
            session.close().await?;
        }
        Mode::Client { server, .. } => {
            let mut data = Vec::new();
            tokio::io::stdin().read_to_end(&mut data).await?;
            log::info!("sending {} byte(s) to {server}", data.len());

            session.connect(server).await;
            session.send_all(&data).await.context("sending stream")?;
            session.finish().await?;
            session.close().await.context("waiting for final acknowledgements")?;
            log::info!("all data acknowledged");
        }
    }
    Ok(())
}
