use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use reflect_relay::audio::{AudioDeviceFactory, AudioPlaybackSink, EchoGate, MuteSwitch};
use reflect_relay::{
    create_router, AppState, AudioCapturePipeline, CaptureSupervisor, Config, HttpSignalingClient,
    LanLightClient, LightAgent, LightCommand, LightSink, LoopbackConnector, OpusDecoder,
    OpusEncoder, PeerConfig, SessionManager, SignalingHandshake, SignalingMode,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "reflect-relay", version, about = "Voice relay between a microphone/speaker and a realtime voice agent")]
struct Cli {
    /// Configuration file (extension optional)
    #[arg(long, default_value = "config/reflect")]
    config: String,

    /// Log filter, e.g. "info" or "reflect_relay=debug"
    #[arg(long)]
    log_level: Option<String>,

    /// Override signaling.mode
    #[arg(long, value_enum)]
    mode: Option<SignalingMode>,

    /// Override service.http.port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match &cli.log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut cfg = Config::load(&cli.config)?;
    if let Some(mode) = cli.mode {
        cfg.signaling.mode = mode;
    }
    if let Some(port) = cli.port {
        cfg.service.http.port = port;
    }

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));

    let profile = cfg.audio.profile()?;
    info!(
        "Audio profile: {} Hz, {} samples/frame, {} bps",
        profile.sample_rate,
        profile.frame_samples(),
        profile.bitrate
    );

    let gate = EchoGate::new();
    let mute = MuteSwitch::new();

    // Capture side
    let input = AudioDeviceFactory::open_input(&cfg.audio.input_device(), &profile)?;
    let encoder = OpusEncoder::new(&profile).context("Failed to create Opus encoder")?;
    let pipeline = AudioCapturePipeline::new(
        profile,
        input,
        Box::new(encoder),
        gate.clone(),
        cfg.audio.capture_gain,
    );
    let capture = CaptureSupervisor::new(pipeline, cfg.relay.capture_task());

    // Playback side
    let output = AudioDeviceFactory::open_output(&cfg.audio.output_device(), &profile)?;
    let decoder = OpusDecoder::new(&profile).context("Failed to create Opus decoder")?;
    let playback = Arc::new(
        AudioPlaybackSink::new(
            &profile,
            Box::new(decoder),
            output,
            gate.clone(),
            cfg.audio.playback_gain,
        )
        .with_mute(mute.clone()),
    );

    let connector = Arc::new(LoopbackConnector);
    info!("Transport: loopback");

    let mut manager = SessionManager::new(
        connector,
        PeerConfig::new(),
        cfg.relay.relay(),
        capture,
        playback,
    );

    if cfg.lights.enabled {
        let lights = Arc::new(LanLightClient::new(cfg.lights.broadcast, cfg.lights.port)?);
        if let Err(e) = lights.send(&LightCommand::SetPower {
            on: true,
            duration_ms: 5000,
        }) {
            warn!("Failed to power on light: {:#}", e);
        }
        manager = manager.with_data_channel(Arc::new(LightAgent::new(lights)));
    }

    let manager = Arc::new(manager);
    let transport_loop = manager.spawn_transport_loop()?;

    let handshake = Arc::new(SignalingHandshake::new(
        Arc::clone(&manager),
        cfg.handshake.handshake(),
    ));

    if cfg.signaling.mode == SignalingMode::Client {
        let client = HttpSignalingClient::new(
            cfg.signaling.url.clone(),
            cfg.signaling.api_key.clone(),
            handshake.config().answer_timeout,
        )?;
        let retry_delay = Duration::from_millis(cfg.signaling.reconnect_delay_ms);
        let supervisor = Arc::clone(&handshake);

        info!("Client mode: negotiating with {}", client.url());
        tokio::spawn(async move {
            supervisor.maintain(&client, retry_delay).await;
        });
    }

    let mut state = AppState::new(Arc::clone(&handshake), mute, gate);
    if cfg.signaling.mode == SignalingMode::Client {
        state = state.without_offers();
    }
    let app = create_router(state);

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind HTTP server to {}", addr))?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutting down");
        })
        .await
        .context("HTTP server failed")?;

    tokio::task::spawn_blocking(move || {
        manager.shutdown();
        if transport_loop.join().is_err() {
            warn!("Transport loop thread panicked");
        }
    })
    .await
    .context("Shutdown task failed")?;

    Ok(())
}
