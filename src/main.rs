use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ptt_cam::api::{ApiClient, CameraBackend};
use ptt_cam::config::ApiConfig;
use ptt_cam::media::AudioChannel;
use ptt_cam::session::{classify, QualityTier, SessionState};
use ptt_cam::state::{AppState, StartupOptions};

/// Log level for the application
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Verbose,
    Debug,
    Trace,
}

/// ptt-cam command line arguments
#[derive(Parser, Debug)]
#[command(name = "ptt-cam")]
#[command(version, about = "Watch and control a remote camera stream", long_about = None)]
struct CliArgs {
    /// Backend base URL (overrides database config for this run)
    #[arg(short = 'u', long, value_name = "URL", global = true)]
    api_url: Option<String>,

    /// Data directory path (default: $HOME/.config/ptt-cam)
    #[arg(short = 'd', long, value_name = "DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Log level (error, warn, info, verbose, debug, trace)
    #[arg(short = 'l', long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    /// Increase verbosity (-v for verbose, -vv for debug, -vvv for trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connect and follow the session until Ctrl+C
    Watch {
        /// Set the recording flag once connected
        #[arg(long)]
        record: bool,
    },
    /// Show the backend's stream status
    Status,
    /// Probe backend health and latency
    Health,
    /// Connect, grab one still image and save it
    Snapshot {
        /// Output file (default: data directory, timestamped name)
        #[arg(short = 'o', long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Show or set the preferred quality tier
    Quality {
        /// 480p, 720p or 1080p
        tier: Option<QualityTier>,
    },
    /// Log in with admin credentials
    Login {
        #[arg(long)]
        identifier: String,
        /// Password (prompting is not supported; prefer the environment variable)
        #[arg(long, env = "PTT_CAM_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the stored admin token
    Logout,
    /// Show who the backend thinks we are
    Whoami,
    /// List cameras the backend can see
    Debug,
    /// Local audio settings
    Audio {
        #[command(subcommand)]
        action: AudioAction,
    },
    /// Stored configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

impl Command {
    /// Commands that talk to the backend and should carry a stored admin token
    fn uses_admin_token(&self) -> bool {
        matches!(
            self,
            Command::Watch { .. }
                | Command::Status
                | Command::Health
                | Command::Snapshot { .. }
                | Command::Whoami
                | Command::Debug
        )
    }
}

#[derive(Subcommand, Debug)]
enum AudioAction {
    Show,
    /// Toggle the microphone
    Mic,
    /// Toggle the speaker
    Speaker,
    /// Set a volume (0-100)
    Volume {
        channel: ChannelArg,
        volume: u8,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ChannelArg {
    Mic,
    Speaker,
}

impl From<ChannelArg> for AudioChannel {
    fn from(arg: ChannelArg) -> Self {
        match arg {
            ChannelArg::Mic => AudioChannel::Microphone,
            ChannelArg::Speaker => AudioChannel::Speaker,
        }
    }
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    Show,
    /// Persist a new backend URL
    SetUrl { url: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    init_logging(args.log_level, args.verbose);

    let data_dir = args.data_dir.clone().unwrap_or_else(get_data_dir);
    tracing::debug!("Data directory: {}", data_dir.display());

    let api_url = args
        .api_url
        .clone()
        .or_else(|| std::env::var("PTT_CAM_API_BASE_URL").ok());
    let state = AppState::init(data_dir, StartupOptions { api_url })
        .await
        .context("Failed to initialize")?;

    if args.command.uses_admin_token() {
        if let Err(e) = state.admin.restore().await {
            tracing::warn!("Could not validate stored admin token: {}", e);
        }
    }

    let result = run(&state, args.command, args.json).await;
    state.shutdown().await;
    result
}

async fn run(state: &Arc<AppState>, command: Command, json: bool) -> anyhow::Result<()> {
    match command {
        Command::Watch { record } => watch(state, record, json).await,
        Command::Status => {
            let status = state.api.stream_status().await?;
            if json {
                print_json(&status)?;
            } else {
                println!("streaming:        {}", status.streaming);
                println!("camera available: {}", status.camera_available);
                if let Some((w, h)) = status.resolution {
                    println!("resolution:       {}x{}", w, h);
                }
                if let Some(fps) = status.fps {
                    println!("fps:              {}", fps);
                }
                if !status.is_live() {
                    println!("reason:           {}", status.failure_reason());
                }
            }
            Ok(())
        }
        Command::Health => {
            let (latency, healthy) = state.api.probe_latency().await;
            let quality = classify(latency, healthy, &state.effective.thresholds);
            if json {
                print_json(&serde_json::json!({
                    "healthy": healthy,
                    "latency_ms": latency.as_millis(),
                    "quality": quality,
                }))?;
            } else if latency.is_failed() {
                println!("unreachable");
            } else {
                println!(
                    "{} ({} ms, {})",
                    if healthy { "healthy" } else { "unhealthy" },
                    latency.as_millis(),
                    quality
                );
            }
            Ok(())
        }
        Command::Snapshot { output } => {
            let session = state.session.connect().await;
            if !session.is_connected() {
                anyhow::bail!(
                    "Camera not connected: {}",
                    session.last_error.unwrap_or_else(|| "unknown error".to_string())
                );
            }
            let snapshot = state.session.take_snapshot().await?;
            let path = output.unwrap_or_else(|| state.data_dir().join(snapshot.file_name()));
            snapshot
                .save_to(&path)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("{} ({} bytes)", path.display(), snapshot.len());
            Ok(())
        }
        Command::Quality { tier } => {
            match tier {
                Some(tier) => {
                    let session = state.session.change_quality(tier).await;
                    println!("{}", session.quality.label());
                }
                None => println!("{}", state.session.state().quality.label()),
            }
            Ok(())
        }
        Command::Login {
            identifier,
            password,
        } => {
            let response = state.admin.login(&identifier, &password).await?;
            if json {
                print_json(&response)?;
            } else {
                println!("Logged in as {}", identifier.trim());
            }
            Ok(())
        }
        Command::Logout => {
            state.admin.logout().await?;
            println!("Logged out");
            Ok(())
        }
        Command::Whoami => {
            let info = state.admin.whoami().await?;
            if json {
                print_json(&info)?;
            } else if info.authenticated {
                println!("{}", info.user_id.as_deref().unwrap_or("authenticated"));
            } else {
                println!("not authenticated");
            }
            Ok(())
        }
        Command::Debug => {
            let debug = state.api.camera_debug().await?;
            if json {
                print_json(&debug)?;
            } else {
                for probe in &debug.available_cameras {
                    let marker = if debug.current_camera == Some(probe.index) {
                        "*"
                    } else {
                        " "
                    };
                    println!(
                        "{} camera {}: {}x{} @ {} fps{}",
                        marker,
                        probe.index,
                        probe.resolution.0,
                        probe.resolution.1,
                        probe.fps,
                        if probe.working { "" } else { " (not working)" }
                    );
                }
                if let Some(err) = debug.error {
                    println!("error: {}", err);
                }
            }
            Ok(())
        }
        Command::Audio { action } => audio(state, action, json).await,
        Command::Config { action } => match action {
            ConfigAction::Show => print_json(&*state.config.get()),
            ConfigAction::SetUrl { url } => {
                let api = ApiConfig {
                    base_url: url,
                    ..state.config.get().api.clone()
                };
                // Same validation the gateway applies at startup
                let client = ApiClient::new(&api, None)?;
                let base_url = client.base_url().to_string();
                state
                    .config
                    .update(|config| config.api.base_url = base_url.clone())
                    .await?;
                println!("Backend URL set to {}", base_url);
                Ok(())
            }
        },
    }
}

async fn watch(state: &Arc<AppState>, record: bool, json: bool) -> anyhow::Result<()> {
    let mut states = state.session.subscribe();
    let mut events = state.events.subscribe();

    let session = state.session.connect().await;
    print_state(&session, json)?;
    if record && session.is_connected() {
        state.session.start_recording()?;
    }

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            res = &mut shutdown => {
                res.context("Failed to listen for Ctrl+C")?;
                tracing::info!("Shutdown signal received");
                break;
            }
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = states.borrow_and_update().clone();
                print_state(&current, json)?;
                if record && current.is_connected() && !current.is_recording {
                    state.session.start_recording()?;
                }
            }
            event = events.recv() => match event {
                Ok(event) => {
                    if json {
                        print_json(&event)?;
                    } else {
                        tracing::info!("event: {}", event.event_name());
                    }
                }
                Err(RecvError::Lagged(n)) => tracing::warn!("Skipped {} events", n),
                Err(RecvError::Closed) => break,
            },
        }
    }

    if record {
        state.session.stop_recording();
    }
    Ok(())
}

async fn audio(state: &Arc<AppState>, action: AudioAction, json: bool) -> anyhow::Result<()> {
    match action {
        AudioAction::Show => {}
        AudioAction::Mic => {
            state.audio.toggle_microphone().await?;
        }
        AudioAction::Speaker => {
            state.audio.toggle_speaker().await?;
        }
        AudioAction::Volume { channel, volume } => {
            state.audio.set_volume(channel.into(), volume).await?;
        }
    }

    let audio = state.audio.state().await;
    if json {
        print_json(&audio)?;
    } else {
        println!(
            "microphone: {} ({}%)",
            on_off(audio.microphone_enabled),
            audio.microphone_volume
        );
        println!(
            "speaker:    {} ({}%)",
            on_off(audio.speaker_enabled),
            audio.speaker_volume
        );
        if !state.audio.device_available() {
            println!("no audio device on this host");
        }
    }
    Ok(())
}

fn print_state(session: &SessionState, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(session);
    }

    let mut line = format!(
        "{} [{}] quality={}",
        session.connection, session.connection_quality, session.quality
    );
    if !session.latency.is_failed() {
        line.push_str(&format!(" latency={}ms", session.latency.as_millis()));
    }
    if session.is_recording {
        line.push_str(" REC");
    }
    if let Some(err) = &session.last_error {
        line.push_str(&format!(" error=\"{}\"", err));
    }
    println!("{}", line);
    Ok(())
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}

/// Initialize logging with tracing
fn init_logging(level: LogLevel, verbose_count: u8) {
    // Verbose count overrides log level
    let effective_level = match verbose_count {
        0 => level,
        1 => LogLevel::Verbose,
        2 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };

    let filter = match effective_level {
        LogLevel::Error => "ptt_cam=error",
        LogLevel::Warn => "ptt_cam=warn",
        LogLevel::Info => "ptt_cam=info",
        LogLevel::Verbose => "ptt_cam=debug,reqwest=info",
        LogLevel::Debug => "ptt_cam=debug,reqwest=debug",
        LogLevel::Trace => "ptt_cam=trace,reqwest=debug,sqlx=debug",
    };

    // Environment variable takes highest priority
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    if let Err(err) = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
    {
        eprintln!("failed to initialize tracing: {}", err);
    }
}

/// Get the application data directory
fn get_data_dir() -> PathBuf {
    // Check environment variable first
    if let Ok(path) = std::env::var("PTT_CAM_DATA_DIR") {
        return PathBuf::from(path);
    }

    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(".config").join("ptt-cam"),
        None => PathBuf::from(".ptt-cam"),
    }
}
