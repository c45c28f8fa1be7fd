//! Seam around the adaptive-streaming player.
//!
//! Playback itself (segmented HTTP fetch, buffering, bitrate adaptation,
//! in-stream recovery) belongs to the external player; this module only
//! defines the trait the session drives and the closed set of events the
//! engines report back.

pub mod hls;
pub mod native;

use async_trait::async_trait;
use tokio::process::Command;

use crate::errors::WatchError;

/// Error classes reported by an engine. `Network` and `Media` are
/// fatal-but-recoverable in place; `Other` tears the session down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorKind {
    Network,
    Media,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    ManifestParsed,
    FragmentLoaded { sequence: u64 },
    Error { kind: EngineErrorKind, fatal: bool },
}

/// Tuning forwarded to the adaptive engine for low-latency live playback.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub enable_worker: bool,
    pub low_latency_mode: bool,
    pub max_buffer_length: u64,
    pub max_max_buffer_length: u64,
    pub live_sync_duration_count: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enable_worker: true,
            low_latency_mode: true,
            max_buffer_length: 10,
            max_max_buffer_length: 20,
            live_sync_duration_count: 3,
        }
    }
}

/// The opaque adaptive-streaming player behind a trait, so the session's
/// transition logic stays independent of the binding.
#[async_trait]
pub trait AdaptiveEngine: Send + Sync {
    /// Point the engine at the stream url and attach output. Emits
    /// `ManifestParsed` once the playlist is accepted.
    async fn load(&mut self, url: &str) -> Result<(), WatchError>;

    /// Request playback. Returns `WatchError::AutoplayRejected` when the
    /// platform audio policy refuses the attempt.
    async fn play(&mut self, muted: bool) -> Result<(), WatchError>;

    async fn set_volume(&mut self, volume: f64);
    async fn set_muted(&mut self, muted: bool);
    async fn set_fullscreen(&mut self, fullscreen: bool);
    /// Pause or resume playback without tearing the pipeline down.
    async fn set_paused(&mut self, paused: bool);

    /// Resume loading after a fatal network error, without teardown.
    async fn recover_network(&mut self);
    /// Recover the media pipeline in place after a fatal media error.
    async fn recover_media(&mut self);

    async fn destroy(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// The adaptive player binary is available.
    Adaptive,
    /// Only native playlist playback is available.
    NativePlaylist,
    None,
}

/// Check what playback path the platform offers. The adaptive path needs
/// the configured player binary; the native fallback hands the playlist to
/// the platform opener.
pub async fn probe(player_command: &str) -> Capability {
    if run_silent(player_command, &["--version"]).await {
        return Capability::Adaptive;
    }

    #[cfg(target_os = "linux")]
    let opener = "xdg-open";
    #[cfg(target_os = "macos")]
    let opener = "open";
    #[cfg(target_os = "windows")]
    let opener = "cmd";
    if run_silent(opener, &["--help"]).await {
        return Capability::NativePlaylist;
    }

    Capability::None
}

async fn run_silent(command: &str, args: &[&str]) -> bool {
    Command::new(command)
        .args(args)
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .await
        .is_ok()
}
