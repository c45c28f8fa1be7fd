pub mod autoplay;
pub mod controls;
pub mod engine;
pub mod state;

use std::time::Instant;

use crate::errors::WatchError;
use autoplay::{AutoplayDecision, AutoplayPolicy};
use controls::Controls;
use engine::AdaptiveEngine;
use state::{transition, Action, Overlay, PlaybackState, PlayerEvent};

/// Constructs an engine when the user joins the stream. Returns
/// `WatchError::NoPlaybackSupport` when the platform offers no playback path.
pub type EngineFactory =
    Box<dyn FnMut() -> Result<Box<dyn AdaptiveEngine>, WatchError> + Send>;

/// One watch session: owns the playback state machine and the engine
/// lifecycle. All mutation happens on the single task driving
/// [`PlaybackSession::handle_event`], so no internal locking is needed.
pub struct PlaybackSession {
    state: PlaybackState,
    controls: Controls,
    autoplay: AutoplayPolicy,
    engine: Option<Box<dyn AdaptiveEngine>>,
    engine_factory: EngineFactory,
    stream_url: Option<String>,
    is_playing: bool,
    bumper_ended: bool,
    stream_ready: bool,
}

impl PlaybackSession {
    pub fn new(
        stream_url: Option<String>,
        volume: f64,
        muted: bool,
        engine_factory: EngineFactory,
    ) -> Self {
        // Missing relay configuration is the Offline state, not an error.
        let state = if stream_url.is_some() {
            PlaybackState::Bumper
        } else {
            PlaybackState::Offline
        };
        Self {
            state,
            controls: Controls::new(volume, muted),
            autoplay: AutoplayPolicy::new(),
            engine: None,
            engine_factory,
            stream_url,
            is_playing: false,
            bumper_ended: false,
            stream_ready: false,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn overlay(&self) -> Overlay {
        Overlay::for_state(self.state)
    }

    pub fn controls(&self) -> &Controls {
        &self.controls
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn bumper_ended(&self) -> bool {
        self.bumper_ended
    }

    pub fn stream_ready(&self) -> bool {
        self.stream_ready
    }

    /// Feed one event through the state machine and execute the side
    /// effect it requests.
    pub async fn handle_event(&mut self, event: PlayerEvent) -> PlaybackState {
        match &event {
            PlayerEvent::BumperEnded | PlayerEvent::BumperFailed => {
                self.bumper_ended = true;
            }
            PlayerEvent::ManifestParsed => {
                self.stream_ready = true;
            }
            _ => {}
        }

        let step = transition(self.state, &event);
        if step.state != self.state {
            log::info!("Playback state {:?} -> {:?}", self.state, step.state);
        }
        self.state = step.state;

        if let Some(action) = step.action {
            self.run_action(action).await;
        }

        self.state
    }

    async fn run_action(&mut self, action: Action) {
        match action {
            Action::AttachEngine => self.attach_engine().await,
            Action::RequestAutoplay => self.request_autoplay().await,
            Action::RecoverNetwork => {
                if let Some(engine) = self.engine.as_mut() {
                    engine.recover_network().await;
                }
            }
            Action::RecoverMedia => {
                if let Some(engine) = self.engine.as_mut() {
                    engine.recover_media().await;
                }
            }
            Action::DestroyEngine => self.teardown().await,
        }
    }

    async fn attach_engine(&mut self) {
        let Some(url) = self.stream_url.clone() else {
            self.state = PlaybackState::Offline;
            return;
        };

        // The previous instance must be gone before a new one attaches to
        // the output.
        self.teardown().await;

        let engine = match (self.engine_factory)() {
            Ok(engine) => engine,
            Err(e) => {
                log::error!("No playback path available: {e}");
                self.state = PlaybackState::Error;
                return;
            }
        };
        let engine = self.engine.insert(engine);

        if let Err(e) = engine.load(&url).await {
            log::error!("Failed to load stream: {e}");
            self.teardown().await;
            self.state = PlaybackState::Error;
        }
    }

    /// Two-step autoplay: unmuted first, muted retry with a follow-up
    /// unmute, then escalate.
    async fn request_autoplay(&mut self) {
        loop {
            let muted = self.autoplay.muted();
            let Some(engine) = self.engine.as_mut() else {
                self.state = PlaybackState::Error;
                return;
            };
            match engine.play(muted).await {
                Ok(()) => {
                    self.is_playing = true;
                    let volume = self.controls.effective_volume();
                    engine.set_volume(volume).await;
                    if self.autoplay.unmute_after_start() {
                        engine.set_muted(false).await;
                        self.controls.set_muted(false);
                    }
                    return;
                }
                Err(WatchError::AutoplayRejected) => match self.autoplay.on_rejected() {
                    AutoplayDecision::RetryMuted => {
                        log::warn!("Autoplay rejected, retrying muted");
                    }
                    AutoplayDecision::Escalate => {
                        log::error!("Autoplay rejected twice, giving up");
                        self.teardown().await;
                        self.state = PlaybackState::Error;
                        return;
                    }
                },
                Err(e) => {
                    log::error!("Playback start failed: {e}");
                    self.teardown().await;
                    self.state = PlaybackState::Error;
                    return;
                }
            }
        }
    }

    pub async fn set_volume(&mut self, volume: f64) {
        let was_muted = self.controls.is_muted();
        self.controls.set_volume(volume);
        if let Some(engine) = self.engine.as_mut() {
            engine.set_volume(self.controls.volume()).await;
            if was_muted && !self.controls.is_muted() {
                engine.set_muted(false).await;
            }
        }
    }

    /// User play/pause toggle. Pausing keeps the transport controls
    /// visible; resuming re-arms the hide timer.
    pub async fn toggle_pause(&mut self, now: Instant) {
        if self.state != PlaybackState::Playing {
            return;
        }
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        let paused = self.is_playing;
        engine.set_paused(paused).await;
        self.is_playing = !paused;
        self.controls.register_activity(self.is_playing, now);
    }

    pub async fn toggle_mute(&mut self) {
        self.controls.toggle_mute();
        if let Some(engine) = self.engine.as_mut() {
            engine.set_muted(self.controls.is_muted()).await;
        }
    }

    pub async fn toggle_fullscreen(&mut self) {
        let fullscreen = self.controls.toggle_fullscreen();
        if let Some(engine) = self.engine.as_mut() {
            engine.set_fullscreen(fullscreen).await;
        }
    }

    pub fn pointer_activity(&mut self, now: Instant) {
        self.controls.register_activity(self.is_playing, now);
    }

    pub fn tick_controls(&mut self, now: Instant) {
        if self.controls.tick(now) {
            log::debug!("Transport controls hidden after inactivity");
        }
    }

    /// Destroy the engine instance. Safe to call repeatedly.
    pub async fn teardown(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            engine.destroy().await;
        }
        self.is_playing = false;
    }
}
