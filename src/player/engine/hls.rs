//! Adaptive playback path: playlist validation plus an external player
//! process tuned for low-latency live playback. Live property updates
//! (volume, mute, fullscreen) go over the player's JSON IPC socket.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{atomic, Arc};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use super::{AdaptiveEngine, EngineConfig, EngineErrorKind, EngineEvent};
use crate::errors::WatchError;

/// Media sequence of the live playlist, `None` when it cannot be fetched
/// or parsed.
async fn media_sequence(client: &reqwest::Client, url: &str) -> Option<u64> {
    let response = client.get(url).send().await.ok()?;
    if !response.status().is_success() {
        return None;
    }
    let content = response.bytes().await.ok()?;
    match m3u8_rs::parse_playlist_res(&content).ok()? {
        m3u8_rs::Playlist::MediaPlaylist(playlist) => Some(playlist.media_sequence),
        m3u8_rs::Playlist::MasterPlaylist(_) => Some(0),
    }
}

pub struct HlsEngine {
    client: reqwest::Client,
    config: EngineConfig,
    player_command: String,
    event_tx: mpsc::UnboundedSender<EngineEvent>,
    stream_url: Option<String>,
    child: Arc<Mutex<Option<Child>>>,
    watch_task: Option<JoinHandle<()>>,
    /// Set while we are intentionally replacing the player process, so the
    /// watcher does not report the kill as a fatal error.
    restarting: Arc<atomic::AtomicBool>,
    ipc_path: PathBuf,
    volume: f64,
    muted: bool,
    paused: bool,
    fullscreen: bool,
}

impl HlsEngine {
    pub fn new(
        client: reqwest::Client,
        config: EngineConfig,
        player_command: &str,
        event_tx: mpsc::UnboundedSender<EngineEvent>,
    ) -> Self {
        let ipc_path =
            std::env::temp_dir().join(format!("ralphtv-watch-{}.sock", std::process::id()));
        Self {
            client,
            config,
            player_command: player_command.to_string(),
            event_tx,
            stream_url: None,
            child: Arc::new(Mutex::new(None)),
            watch_task: None,
            restarting: Arc::new(atomic::AtomicBool::new(false)),
            ipc_path,
            volume: 0.7,
            muted: false,
            paused: false,
            fullscreen: false,
        }
    }

    async fn fetch_playlist(&self, url: &str) -> Result<(), WatchError> {
        url::Url::parse(url).map_err(|_| WatchError::InvalidRelayUrl {
            url: url.to_string(),
        })?;

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(WatchError::InvalidResponseStatus {
                status: response.status(),
            });
        }

        let content = response.bytes().await?;
        if m3u8_rs::parse_playlist_res(&content).is_err() {
            return Err(WatchError::M3u8ParseFailed {
                content: String::from_utf8_lossy(&content).to_string(),
            });
        }

        Ok(())
    }

    fn player_args(&self, url: &str, muted: bool) -> Vec<String> {
        let mut args = vec![
            "--no-terminal".to_string(),
            format!("--input-ipc-server={}", self.ipc_path.display()),
            format!("--volume={}", (self.volume * 100.0).round() as u64),
            format!("--cache-secs={}", self.config.max_buffer_length),
            format!(
                "--demuxer-readahead-secs={}",
                self.config.max_max_buffer_length
            ),
            format!(
                "--demuxer-thread={}",
                if self.config.enable_worker { "yes" } else { "no" }
            ),
        ];
        if self.config.low_latency_mode {
            args.push("--profile=low-latency".to_string());
            args.push(format!(
                "--demuxer-hysteresis-secs={}",
                self.config.live_sync_duration_count
            ));
        }
        if muted {
            args.push("--mute=yes".to_string());
        }
        if self.paused {
            args.push("--pause".to_string());
        }
        if self.fullscreen {
            args.push("--fullscreen".to_string());
        }
        args.push(url.to_string());
        args
    }

    async fn spawn_player(&mut self, muted: bool) -> Result<(), WatchError> {
        let url = self
            .stream_url
            .clone()
            .ok_or(WatchError::EngineDestroyed)?;

        let mut child = Command::new(&self.player_command)
            .args(self.player_args(&url, muted))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|_| WatchError::PlayerCommandFailed {
                command: self.player_command.clone(),
            })?;

        // An immediate exit means the platform refused playback (audio
        // device policy, output unavailable). Surfaced as an autoplay
        // rejection so the session can retry muted.
        tokio::time::sleep(Duration::from_millis(500)).await;
        if let Ok(Some(status)) = child.try_wait() {
            log::warn!("Player exited immediately with {status}");
            return Err(WatchError::AutoplayRejected);
        }

        *self.child.lock().await = Some(child);
        self.muted = muted;

        if let Some(task) = self.watch_task.take() {
            task.abort();
        }
        let child_slot = self.child.clone();
        let event_tx = self.event_tx.clone();
        let restarting = self.restarting.clone();
        let client = self.client.clone();
        self.watch_task = Some(tokio::spawn(async move {
            let mut last_sequence = 0u64;
            let mut ticks = 0u64;
            loop {
                tokio::time::sleep(Duration::from_secs(1)).await;
                ticks += 1;

                {
                    let mut slot = child_slot.lock().await;
                    let Some(child) = slot.as_mut() else {
                        break;
                    };
                    match child.try_wait() {
                        Ok(Some(status)) => {
                            *slot = None;
                            if !restarting.load(atomic::Ordering::Relaxed) {
                                log::error!("Player exited unexpectedly with {status}");
                                // A dead playlist means the network went away,
                                // not the pipeline.
                                let kind = if media_sequence(&client, &url).await.is_some() {
                                    EngineErrorKind::Media
                                } else {
                                    EngineErrorKind::Network
                                };
                                let _ = event_tx.send(EngineEvent::Error { kind, fatal: true });
                            }
                            break;
                        }
                        Ok(None) => {}
                        Err(e) => {
                            log::error!("Failed to poll player process: {e}");
                            break;
                        }
                    }
                }

                // Observe live-edge progress at a gentler cadence.
                if ticks % 5 == 0 {
                    if let Some(sequence) = media_sequence(&client, &url).await {
                        if sequence > last_sequence {
                            last_sequence = sequence;
                            let _ = event_tx.send(EngineEvent::FragmentLoaded { sequence });
                        }
                    }
                }
            }
        }));

        Ok(())
    }

    async fn kill_player(&mut self) {
        self.restarting.store(true, atomic::Ordering::Relaxed);
        if let Some(mut child) = self.child.lock().await.take() {
            let _ = child.kill().await;
        }
        if let Some(task) = self.watch_task.take() {
            task.abort();
        }
        self.restarting.store(false, atomic::Ordering::Relaxed);
    }

    /// Best-effort property update over the player IPC socket. The value is
    /// also kept locally so a respawn starts from the latest state.
    async fn set_property(&self, name: &str, value: serde_json::Value) {
        let command = serde_json::json!({ "command": ["set_property", name, value] });

        #[cfg(unix)]
        {
            use tokio::io::AsyncWriteExt;
            match tokio::net::UnixStream::connect(&self.ipc_path).await {
                Ok(mut stream) => {
                    let mut line = command.to_string();
                    line.push('\n');
                    if let Err(e) = stream.write_all(line.as_bytes()).await {
                        log::warn!("Player IPC write failed: {e}");
                    }
                }
                Err(e) => {
                    log::debug!("Player IPC unavailable ({e}), value applies on next spawn");
                }
            }
        }

        #[cfg(not(unix))]
        {
            log::debug!("Player IPC unsupported, {command} applies on next spawn");
        }
    }
}

#[async_trait]
impl AdaptiveEngine for HlsEngine {
    async fn load(&mut self, url: &str) -> Result<(), WatchError> {
        self.fetch_playlist(url).await?;
        self.stream_url = Some(url.to_string());
        let _ = self.event_tx.send(EngineEvent::ManifestParsed);
        Ok(())
    }

    async fn play(&mut self, muted: bool) -> Result<(), WatchError> {
        self.spawn_player(muted).await
    }

    async fn set_volume(&mut self, volume: f64) {
        self.volume = volume.clamp(0.0, 1.0);
        self.set_property("volume", serde_json::json!(self.volume * 100.0))
            .await;
    }

    async fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        self.set_property("mute", serde_json::json!(muted)).await;
    }

    async fn set_fullscreen(&mut self, fullscreen: bool) {
        self.fullscreen = fullscreen;
        self.set_property("fullscreen", serde_json::json!(fullscreen))
            .await;
    }

    async fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
        self.set_property("pause", serde_json::json!(paused)).await;
    }

    async fn recover_network(&mut self) {
        // Resume loading without teardown: revalidate the playlist and
        // respawn the player only if it is gone.
        let Some(url) = self.stream_url.clone() else {
            return;
        };
        if let Err(e) = self.fetch_playlist(&url).await {
            log::warn!("Network recovery probe failed: {e}");
            return;
        }
        if self.child.lock().await.is_none() {
            let muted = self.muted;
            if let Err(e) = self.spawn_player(muted).await {
                log::error!("Network recovery respawn failed: {e}");
            }
        }
    }

    async fn recover_media(&mut self) {
        // In-place media recovery: restart the pipeline on the same url.
        let muted = self.muted;
        self.kill_player().await;
        if let Err(e) = self.spawn_player(muted).await {
            log::error!("Media recovery respawn failed: {e}");
        }
    }

    async fn destroy(&mut self) {
        self.kill_player().await;
        self.stream_url = None;
        let _ = std::fs::remove_file(&self.ipc_path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(config: EngineConfig) -> HlsEngine {
        let (tx, _rx) = mpsc::unbounded_channel();
        HlsEngine::new(reqwest::Client::new(), config, "mpv", tx)
    }

    #[test]
    fn player_args_carry_the_tuning() {
        let engine = engine(EngineConfig::default());
        let args = engine.player_args("http://relay.test/hls/stream.m3u8", false);
        assert!(args.contains(&"--demuxer-thread=yes".to_string()));
        assert!(args.contains(&"--cache-secs=10".to_string()));
        assert!(args.contains(&"--demuxer-readahead-secs=20".to_string()));
        assert!(args.contains(&"--profile=low-latency".to_string()));
        assert!(!args.contains(&"--mute=yes".to_string()));
        assert!(!args.contains(&"--pause".to_string()));
    }

    #[test]
    fn worker_disabled_demuxes_on_the_playback_thread() {
        let config = EngineConfig {
            enable_worker: false,
            ..EngineConfig::default()
        };
        let engine = engine(config);
        let args = engine.player_args("http://relay.test/hls/stream.m3u8", true);
        assert!(args.contains(&"--demuxer-thread=no".to_string()));
        assert!(args.contains(&"--mute=yes".to_string()));
    }

    #[test]
    fn paused_state_survives_a_respawn() {
        let mut engine = engine(EngineConfig::default());
        engine.paused = true;
        let args = engine.player_args("http://relay.test/hls/stream.m3u8", false);
        assert!(args.contains(&"--pause".to_string()));
    }
}
