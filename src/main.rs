use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use simplelog::{ColorChoice, CombinedLogger, LevelFilter, TermLogger, TerminalMode, WriteLogger};
use tokio::sync::mpsc;

use ralphtv_watch::cache::{AssetCache, HttpFetcher};
use ralphtv_watch::config::Config;
use ralphtv_watch::monitor::notify::{DesktopNotifier, LiveNotifier, NullNotifier};
use ralphtv_watch::monitor::{MonitorMessage, StatusMonitor};
use ralphtv_watch::player::engine::hls::HlsEngine;
use ralphtv_watch::player::engine::native::NativeEngine;
use ralphtv_watch::player::engine::{self, AdaptiveEngine, Capability, EngineConfig, EngineEvent};
use ralphtv_watch::player::state::{Overlay, PlaybackState, PlayerEvent};
use ralphtv_watch::player::PlaybackSession;

#[derive(Parser, Debug)]
#[command(name = "ralphtv-watch", about = "Watch the RalphTV live relay")]
struct Args {
    /// Relay base url, overrides the configured one
    #[arg(long)]
    relay: Option<String>,
    /// External player binary
    #[arg(long)]
    player: Option<String>,
    /// Pre-roll bumper file
    #[arg(long)]
    bumper: Option<String>,
    /// Skip the pre-roll bumper
    #[arg(long)]
    no_bumper: bool,
    #[arg(short, long)]
    verbose: bool,
}

fn setup_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let mut loggers: Vec<Box<dyn simplelog::SharedLogger>> = vec![TermLogger::new(
        level,
        simplelog::Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];
    if let Ok(file) = std::fs::File::create(std::env::temp_dir().join("ralphtv-watch.log")) {
        loggers.push(WriteLogger::new(level, simplelog::Config::default(), file));
    }
    let _ = CombinedLogger::init(loggers);
}

fn overlay_line(overlay: Overlay) -> Option<String> {
    let icon = match overlay {
        Overlay::Hidden => return None,
        Overlay::Spinner => "⏳",
        Overlay::CrossedIcon => "❌",
        Overlay::EmptyCircle => "📡",
    };
    overlay.hint().map(|hint| format!("{icon} {hint}"))
}

/// Play the pre-roll bumper and report how it finished. Load failure and
/// natural end both move the session forward.
async fn run_bumper(player_command: String, bumper: String) -> PlayerEvent {
    if !std::path::Path::new(&bumper).exists() {
        log::warn!("Bumper {bumper} not found");
        return PlayerEvent::BumperFailed;
    }
    let child = tokio::process::Command::new(&player_command)
        .arg("--no-terminal")
        .arg(&bumper)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn();
    match child {
        Ok(mut child) => match child.wait().await {
            Ok(status) if status.success() => PlayerEvent::BumperEnded,
            Ok(status) => {
                log::warn!("Bumper playback exited with {status}");
                PlayerEvent::BumperFailed
            }
            Err(e) => {
                log::warn!("Bumper playback failed: {e}");
                PlayerEvent::BumperFailed
            }
        },
        Err(e) => {
            log::warn!("Failed to start bumper playback: {e}");
            PlayerEvent::BumperFailed
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    setup_logging(args.verbose);

    let mut config = Config::load();
    if let Some(relay) = &args.relay {
        config.set_relay_url(relay);
    }
    if let Some(player) = args.player {
        config.player_command = player;
    }
    if let Some(bumper) = args.bumper {
        config.bumper = bumper;
    }

    let client = reqwest::Client::new();
    let relay_configured = !config.relay_url.is_empty();

    // Asset cache: purge stale generations, then precache the manifest.
    let asset_cache = AssetCache::new(&config.cache, Arc::new(HttpFetcher::new(client.clone())));
    if let Err(e) = asset_cache.activate() {
        log::warn!("Cache activation failed: {e}");
    }
    if relay_configured {
        let relay_url = config.relay_url.clone();
        tokio::spawn(async move { asset_cache.install(&relay_url).await });
    }

    // Background status monitor, fed the relay url exactly once.
    let notifier: Arc<dyn LiveNotifier> = if config.live_notify {
        Arc::new(DesktopNotifier)
    } else {
        Arc::new(NullNotifier)
    };
    let monitor = StatusMonitor::new(notifier, Duration::from_secs(config.poll_interval));
    let (monitor_tx, monitor_rx) = mpsc::channel(16);
    tokio::spawn(monitor.run(monitor_rx));
    if relay_configured {
        let _ = monitor_tx
            .send(MonitorMessage::SetRelayUrl(config.relay_url.clone()))
            .await;
    }

    // Playback session wiring.
    let (engine_tx, mut engine_rx) = mpsc::unbounded_channel::<EngineEvent>();
    let capability = engine::probe(&config.player_command).await;
    log::info!("Playback capability: {capability:?}");
    let engine_config = EngineConfig::default();
    let player_command = config.player_command.clone();
    let factory_client = client.clone();
    let factory = Box::new(move || match capability {
        Capability::Adaptive => Ok(Box::new(HlsEngine::new(
            factory_client.clone(),
            engine_config.clone(),
            &player_command,
            engine_tx.clone(),
        )) as Box<dyn AdaptiveEngine>),
        Capability::NativePlaylist => {
            Ok(Box::new(NativeEngine::new(engine_tx.clone())) as Box<dyn AdaptiveEngine>)
        }
        Capability::None => Err(ralphtv_watch::errors::WatchError::NoPlaybackSupport),
    });

    let stream_url = relay_configured.then(|| config.stream_url());
    let mut session = PlaybackSession::new(stream_url, config.volume, config.muted, factory);

    let (player_tx, mut player_rx) = mpsc::unbounded_channel::<PlayerEvent>();

    if capability == Capability::None {
        // No point in the bumper when the join can never succeed.
        let _ = player_tx.send(PlayerEvent::NoPlaybackSupport);
    } else if session.state() == PlaybackState::Bumper {
        if args.no_bumper {
            let _ = player_tx.send(PlayerEvent::BumperEnded);
        } else {
            let tx = player_tx.clone();
            let player_command = config.player_command.clone();
            let bumper = config.bumper.clone();
            tokio::spawn(async move {
                let _ = tx.send(run_bumper(player_command, bumper).await);
            });
        }
    }

    // Console input doubles as the pointer: any line is activity, a few
    // one-letter commands drive the transport controls.
    let (input_tx, mut input_rx) = mpsc::unbounded_channel::<String>();
    tokio::spawn(async move {
        use tokio::io::AsyncBufReadExt;
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if input_tx.send(line).is_err() {
                break;
            }
        }
    });

    if let Some(line) = overlay_line(session.overlay()) {
        println!("{line}");
    }

    let mut tick = tokio::time::interval(Duration::from_millis(500));
    loop {
        let previous_overlay = session.overlay();
        tokio::select! {
            Some(event) = player_rx.recv() => {
                let state = session.handle_event(event).await;
                if state == PlaybackState::JoinPrompt {
                    println!("Press Enter to join the live stream");
                }
            }
            Some(engine_event) = engine_rx.recv() => {
                match engine_event {
                    EngineEvent::ManifestParsed => {
                        session.handle_event(PlayerEvent::ManifestParsed).await;
                    }
                    EngineEvent::FragmentLoaded { sequence } => {
                        session.handle_event(PlayerEvent::FragmentLoaded { sequence }).await;
                    }
                    EngineEvent::Error { kind, fatal: true } => {
                        session.handle_event(PlayerEvent::FatalError { kind }).await;
                    }
                    EngineEvent::Error { kind, fatal: false } => {
                        log::debug!("Non-fatal engine error: {kind:?}");
                    }
                }
            }
            Some(line) = input_rx.recv() => {
                session.pointer_activity(Instant::now());
                match line.trim() {
                    "" => {
                        if session.state() == PlaybackState::JoinPrompt {
                            session.handle_event(PlayerEvent::JoinRequested).await;
                        }
                    }
                    "p" => session.toggle_pause(Instant::now()).await,
                    "m" => session.toggle_mute().await,
                    "f" => session.toggle_fullscreen().await,
                    "q" => break,
                    other => {
                        if let Some(volume) = other.strip_prefix("v ") {
                            match volume.parse::<f64>() {
                                Ok(volume) => session.set_volume(volume).await,
                                Err(_) => log::warn!("Not a volume: {volume}"),
                            }
                        }
                    }
                }
            }
            _ = tick.tick() => {
                session.tick_controls(Instant::now());
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("Interrupted, shutting down");
                break;
            }
        }

        let overlay = session.overlay();
        if overlay != previous_overlay {
            if let Some(line) = overlay_line(overlay) {
                println!("{line}");
            }
        }

        if session.state() == PlaybackState::Error {
            log::error!("Playback is in a terminal error state");
            break;
        }
    }

    session.teardown().await;
}
