//! Playback state machine for the watch session.
//!
//! Transitions are pure: `transition` consumes the current state and one
//! tagged event and returns the next state plus at most one side effect for
//! the session loop to execute. Engine callbacks and user input both arrive
//! as [`PlayerEvent`]s, so the whole machine is testable without an engine.

use crate::player::engine::EngineErrorKind;

/// Session-level playback state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// Pre-roll bumper is playing (or failing to).
    Bumper,
    /// Bumper is done, waiting for the user to join the live stream.
    JoinPrompt,
    /// Engine constructed, waiting for the manifest.
    Initializing,
    Playing,
    /// Terminal: unrecoverable playback failure or no playback capability.
    Error,
    /// No relay configured.
    Offline,
}

/// Closed set of inputs into the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    BumperEnded,
    BumperFailed,
    JoinRequested,
    ManifestParsed,
    FragmentLoaded { sequence: u64 },
    FatalError { kind: EngineErrorKind },
    /// Neither the adaptive engine nor native playlist support is available.
    NoPlaybackSupport,
}

/// Side effect requested by a transition, executed by the session loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Construct the engine, load the stream url and attach output.
    AttachEngine,
    /// Run the autoplay policy against the freshly parsed manifest.
    RequestAutoplay,
    /// Ask the engine to resume loading in place.
    RecoverNetwork,
    /// Ask the engine to recover the media pipeline in place.
    RecoverMedia,
    /// Tear the engine down.
    DestroyEngine,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub state: PlaybackState,
    pub action: Option<Action>,
}

impl Step {
    fn to(state: PlaybackState) -> Self {
        Self {
            state,
            action: None,
        }
    }

    fn with(state: PlaybackState, action: Action) -> Self {
        Self {
            state,
            action: Some(action),
        }
    }
}

pub fn transition(state: PlaybackState, event: &PlayerEvent) -> Step {
    use PlaybackState::*;

    match (state, event) {
        // A broken bumper asset must never block forward progress, so load
        // failure and natural end are the same transition.
        (Bumper, PlayerEvent::BumperEnded) | (Bumper, PlayerEvent::BumperFailed) => {
            Step::to(JoinPrompt)
        }
        (JoinPrompt, PlayerEvent::JoinRequested) => Step::with(Initializing, Action::AttachEngine),
        (Initializing, PlayerEvent::ManifestParsed) => {
            Step::with(Playing, Action::RequestAutoplay)
        }
        (Initializing, PlayerEvent::FatalError { .. }) => {
            Step::with(Error, Action::DestroyEngine)
        }
        // Fatal-but-recoverable errors are handled in place without leaving
        // Playing; only an unrecognized fatal kind escalates.
        (Playing, PlayerEvent::FatalError { kind }) => match kind {
            EngineErrorKind::Network => Step::with(Playing, Action::RecoverNetwork),
            EngineErrorKind::Media => Step::with(Playing, Action::RecoverMedia),
            EngineErrorKind::Other => Step::with(Error, Action::DestroyEngine),
        },
        (Playing, PlayerEvent::FragmentLoaded { .. }) => Step::to(Playing),
        // Error is terminal, Offline only leaves via a fresh session.
        (Error, _) | (Offline, _) => Step::to(state),
        (_, PlayerEvent::NoPlaybackSupport) => Step::to(Error),
        // Everything else is a no-op in the current state.
        _ => Step::to(state),
    }
}

/// Status overlay rendered for every non-playing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overlay {
    Hidden,
    Spinner,
    CrossedIcon,
    EmptyCircle,
}

impl Overlay {
    pub fn for_state(state: PlaybackState) -> Self {
        match state {
            PlaybackState::Playing => Overlay::Hidden,
            PlaybackState::Error => Overlay::CrossedIcon,
            PlaybackState::Offline => Overlay::EmptyCircle,
            _ => Overlay::Spinner,
        }
    }

    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Overlay::Hidden => None,
            Overlay::Spinner => Some("Loading stream..."),
            Overlay::CrossedIcon => Some("Stream unavailable"),
            Overlay::EmptyCircle => Some("Stream offline"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bumper_end_and_failure_both_reach_join_prompt() {
        let ended = transition(PlaybackState::Bumper, &PlayerEvent::BumperEnded);
        let failed = transition(PlaybackState::Bumper, &PlayerEvent::BumperFailed);
        assert_eq!(ended.state, PlaybackState::JoinPrompt);
        assert_eq!(failed.state, PlaybackState::JoinPrompt);
        assert_eq!(ended, failed);
    }

    #[test]
    fn join_attaches_engine() {
        let step = transition(PlaybackState::JoinPrompt, &PlayerEvent::JoinRequested);
        assert_eq!(step.state, PlaybackState::Initializing);
        assert_eq!(step.action, Some(Action::AttachEngine));
    }

    #[test]
    fn manifest_parsed_requests_autoplay() {
        let step = transition(PlaybackState::Initializing, &PlayerEvent::ManifestParsed);
        assert_eq!(step.state, PlaybackState::Playing);
        assert_eq!(step.action, Some(Action::RequestAutoplay));
    }

    #[test]
    fn network_error_recovers_in_place() {
        let step = transition(
            PlaybackState::Playing,
            &PlayerEvent::FatalError {
                kind: EngineErrorKind::Network,
            },
        );
        assert_eq!(step.state, PlaybackState::Playing);
        assert_eq!(step.action, Some(Action::RecoverNetwork));
    }

    #[test]
    fn media_error_recovers_in_place() {
        let step = transition(
            PlaybackState::Playing,
            &PlayerEvent::FatalError {
                kind: EngineErrorKind::Media,
            },
        );
        assert_eq!(step.state, PlaybackState::Playing);
        assert_eq!(step.action, Some(Action::RecoverMedia));
    }

    #[test]
    fn unrecognized_fatal_error_is_terminal() {
        let step = transition(
            PlaybackState::Playing,
            &PlayerEvent::FatalError {
                kind: EngineErrorKind::Other,
            },
        );
        assert_eq!(step.state, PlaybackState::Error);
        assert_eq!(step.action, Some(Action::DestroyEngine));

        // Terminal: no further recovery attempted.
        let after = transition(
            PlaybackState::Error,
            &PlayerEvent::FatalError {
                kind: EngineErrorKind::Network,
            },
        );
        assert_eq!(after.state, PlaybackState::Error);
        assert_eq!(after.action, None);
    }

    #[test]
    fn no_playback_support_errors_directly() {
        let step = transition(PlaybackState::JoinPrompt, &PlayerEvent::NoPlaybackSupport);
        assert_eq!(step.state, PlaybackState::Error);
    }

    #[test]
    fn overlay_per_state() {
        assert_eq!(
            Overlay::for_state(PlaybackState::Playing),
            Overlay::Hidden
        );
        assert_eq!(
            Overlay::for_state(PlaybackState::Initializing),
            Overlay::Spinner
        );
        assert_eq!(
            Overlay::for_state(PlaybackState::Error),
            Overlay::CrossedIcon
        );
        assert_eq!(
            Overlay::for_state(PlaybackState::Offline),
            Overlay::EmptyCircle
        );
        assert!(Overlay::for_state(PlaybackState::Error).hint().is_some());
    }
}
