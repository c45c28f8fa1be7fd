use thiserror::Error;

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Invalid relay url: {url}")]
    InvalidRelayUrl { url: String },
    #[error("Parse m3u8 content failed: {content}")]
    M3u8ParseFailed { content: String },
    #[error("Invalid response status: {status}")]
    InvalidResponseStatus { status: reqwest::StatusCode },
    #[error("No playback support available")]
    NoPlaybackSupport,
    #[error("Autoplay rejected")]
    AutoplayRejected,
    #[error("Player command failed: {command}")]
    PlayerCommandFailed { command: String },
    #[error("Engine already destroyed")]
    EngineDestroyed,
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Client error: {0}")]
    ClientError(#[from] reqwest::Error),
}
