//! Fallback path for platforms without the adaptive player: hand the
//! playlist url straight to the platform opener and let native playlist
//! support take over. No adaptive tuning, no in-place recovery.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

use super::{AdaptiveEngine, EngineEvent};
use crate::errors::WatchError;

pub struct NativeEngine {
    event_tx: mpsc::UnboundedSender<EngineEvent>,
    stream_url: Option<String>,
    child: Option<Child>,
}

impl NativeEngine {
    pub fn new(event_tx: mpsc::UnboundedSender<EngineEvent>) -> Self {
        Self {
            event_tx,
            stream_url: None,
            child: None,
        }
    }

    fn opener() -> (&'static str, Vec<&'static str>) {
        #[cfg(target_os = "linux")]
        {
            ("xdg-open", vec![])
        }
        #[cfg(target_os = "macos")]
        {
            ("open", vec![])
        }
        #[cfg(target_os = "windows")]
        {
            ("cmd", vec!["/C", "start"])
        }
    }
}

#[async_trait]
impl AdaptiveEngine for NativeEngine {
    async fn load(&mut self, url: &str) -> Result<(), WatchError> {
        url::Url::parse(url).map_err(|_| WatchError::InvalidRelayUrl {
            url: url.to_string(),
        })?;
        self.stream_url = Some(url.to_string());
        let _ = self.event_tx.send(EngineEvent::ManifestParsed);
        Ok(())
    }

    async fn play(&mut self, _muted: bool) -> Result<(), WatchError> {
        let url = self
            .stream_url
            .clone()
            .ok_or(WatchError::EngineDestroyed)?;
        let (command, args) = Self::opener();
        let child = Command::new(command)
            .args(args)
            .arg(&url)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|_| WatchError::PlayerCommandFailed {
                command: command.to_string(),
            })?;
        self.child = Some(child);
        Ok(())
    }

    // The native path exposes no live property control.
    async fn set_volume(&mut self, _volume: f64) {}
    async fn set_muted(&mut self, _muted: bool) {}
    async fn set_fullscreen(&mut self, _fullscreen: bool) {}
    async fn set_paused(&mut self, _paused: bool) {}
    async fn recover_network(&mut self) {}
    async fn recover_media(&mut self) {}

    async fn destroy(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill().await;
        }
        self.stream_url = None;
    }
}
