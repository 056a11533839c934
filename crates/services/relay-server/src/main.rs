//! RtpForward relay binary entry point
//!
//! Negotiates one WebRTC session with a signaling peer, then relays RTP
//! arriving on local UDP ports into the session's tracks until Ctrl+C.
//!
//! # Usage
//!
//! ```bash
//! # Prompt for the signaling peer, default ports (video 6000, audio 6001)
//! cargo run -p rtpforward-server
//!
//! # Non-interactive, WebSocket signaling
//! cargo run -p rtpforward-server -- \
//!   --host 192.168.1.20 --port 5000 --mode websocket
//!
//! # Start from a JSON config file, override one field
//! cargo run -p rtpforward-server -- --config ./rtpforward.json --video-ssrc 1000
//! ```

use clap::Parser;
use rtpforward_core::{RelayConfig, RelaySession, RunningFlag, SignalingMode};
use rtpforward_webrtc::{WebRtcMediaSession, WebRtcSessionConfig};
use std::io::{BufRead, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// RtpForward relay
///
/// Forwards RTP from local UDP sockets into a WebRTC peer connection,
/// rewriting each packet's SSRC to the one declared in the offer.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON configuration file; CLI arguments override its values
    #[arg(short, long, env = "RTPFORWARD_CONFIG")]
    config: Option<PathBuf>,

    /// Signaling peer host or IP (prompted on stdin when absent)
    #[arg(long, env = "RTPFORWARD_SIGNALING_HOST")]
    host: Option<String>,

    /// Signaling peer port
    #[arg(short, long, env = "RTPFORWARD_SIGNALING_PORT")]
    port: Option<u16>,

    /// Signaling transport: 'datagram' (UDP) or 'websocket'
    #[arg(short, long, env = "RTPFORWARD_SIGNALING_MODE")]
    mode: Option<SignalingModeArg>,

    /// Answer receive timeout in milliseconds
    #[arg(long, env = "RTPFORWARD_RECEIVE_TIMEOUT_MS")]
    receive_timeout_ms: Option<u64>,

    /// Video ingress address
    #[arg(long, env = "RTPFORWARD_VIDEO_BIND")]
    video_bind: Option<SocketAddr>,

    /// Audio ingress address
    #[arg(long, env = "RTPFORWARD_AUDIO_BIND")]
    audio_bind: Option<SocketAddr>,

    /// SSRC declared for the video track
    #[arg(long, env = "RTPFORWARD_VIDEO_SSRC")]
    video_ssrc: Option<u32>,

    /// SSRC declared for the audio track
    #[arg(long, env = "RTPFORWARD_AUDIO_SSRC")]
    audio_ssrc: Option<u32>,

    /// STUN/TURN server URLs (comma-separated)
    #[arg(long, value_delimiter = ',', env = "RTPFORWARD_ICE_SERVERS")]
    ice_servers: Vec<String>,

    /// Write the final per-stream counters to this file as JSON
    #[arg(long, env = "RTPFORWARD_REPORT_FILE")]
    report_file: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, default_value_t = false, env = "RTPFORWARD_JSON_LOGS")]
    json_logs: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum SignalingModeArg {
    /// One UDP datagram per message
    Datagram,
    /// One WebSocket frame per message
    Websocket,
}

impl From<SignalingModeArg> for SignalingMode {
    fn from(arg: SignalingModeArg) -> Self {
        match arg {
            SignalingModeArg::Datagram => SignalingMode::Datagram,
            SignalingModeArg::Websocket => SignalingMode::WebSocket,
        }
    }
}

/// Build the relay configuration from an optional file plus CLI overrides
///
/// Without a file the signaling host starts empty so that it is prompted for.
fn build_config_from_args(args: &Args) -> Result<RelayConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => {
            info!(path = ?path, "Loading configuration file");
            RelayConfig::from_file(path)?
        }
        None => {
            let mut config = RelayConfig::default();
            config.signaling.host.clear();
            config
        }
    };

    if let Some(host) = &args.host {
        config.signaling.host = host.clone();
    }
    if let Some(port) = args.port {
        config.signaling.port = port;
    }
    if let Some(mode) = args.mode {
        config.signaling.mode = mode.into();
    }
    if let Some(timeout) = args.receive_timeout_ms {
        config.signaling.receive_timeout_ms = timeout;
    }
    if let Some(address) = args.video_bind {
        config.video.bind_address = address;
    }
    if let Some(address) = args.audio_bind {
        config.audio.bind_address = address;
    }
    if let Some(ssrc) = args.video_ssrc {
        config.video.ssrc = ssrc;
    }
    if let Some(ssrc) = args.audio_ssrc {
        config.audio.ssrc = ssrc;
    }
    if !args.ice_servers.is_empty() {
        config.ice_servers = args.ice_servers.clone();
    }

    Ok(config)
}

/// Ask for the signaling peer on stdin
fn prompt_signaling_host(
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> Result<String, Box<dyn std::error::Error>> {
    write!(output, "Insert the signaling server IP: ")?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err("no signaling server address given on stdin".into());
    }
    Ok(line.trim().to_string())
}

fn install_ctrlc_handler(running: RunningFlag) -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(move || {
        eprintln!("\n[SIGNAL] Ctrl+C received, shutting down");

        if !running.stop() {
            eprintln!("[SIGNAL] Shutdown already in progress, forcing immediate exit");
            std::process::exit(0);
        }

        std::thread::spawn(|| {
            std::thread::sleep(std::time::Duration::from_secs(3));
            eprintln!("[WATCHDOG] Graceful shutdown timeout (3s), forcing exit");
            std::process::exit(0);
        });
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_tracing(args.json_logs);

    let mut config = build_config_from_args(&args)?;
    if config.signaling.host.trim().is_empty() {
        let stdin = std::io::stdin();
        config.signaling.host = prompt_signaling_host(&mut stdin.lock(), &mut std::io::stdout())?;
    }
    config.validate()?;

    let running = RunningFlag::new();
    install_ctrlc_handler(running.clone())?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(num_cpus::get())
        .thread_name("rtpforward-worker")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(config, running, args.report_file))
}

async fn async_main(
    config: RelayConfig,
    running: RunningFlag,
    report_file: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %config.signaling.host,
        port = config.signaling.port,
        mode = ?config.signaling.mode,
        video = %config.video.bind_address,
        audio = %config.audio.bind_address,
        "RtpForward relay starting"
    );

    let session = Arc::new(
        WebRtcMediaSession::new(WebRtcSessionConfig::from(&config), &config.descriptors()).await?,
    );
    let relay = RelaySession::new(config, session, running);
    let report = relay.run().await?;

    for (kind, stats) in &report.streams {
        info!(
            kind = %kind,
            received = stats.received,
            forwarded = stats.forwarded,
            dropped_short = stats.dropped_short,
            dropped_not_ready = stats.dropped_not_ready,
            send_failures = stats.send_failures,
            "Stream summary"
        );
    }
    if let Some(path) = report_file {
        std::fs::write(&path, serde_json::to_string_pretty(&report.to_json()?)?)?;
        info!(path = ?path, "Relay report written");
    }
    info!("RtpForward relay stopped");
    Ok(())
}

fn init_tracing(json: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
