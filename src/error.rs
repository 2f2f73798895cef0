use thiserror::Error;

/// Failures turning a search term or URL into a playable track.
#[derive(Error, Debug)]
pub enum ResolutionError {
    #[error("Couldn't find anything that matches `{0}`")]
    NotFound(String),

    #[error("Couldn't fetch `{0}`")]
    FetchFailed(String),

    #[error("Media backend error: {0}")]
    Backend(String),
}

/// Failures reported by the voice connection.
#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("Not connected to any voice channel.")]
    NotConnected,

    #[error("Voice connection error: {0}")]
    Connection(String),

    #[error("Playback failed: {0}")]
    Playback(String),
}

#[derive(Error, Debug)]
pub enum PlayerError {
    #[error("Volume must be between 0 and 100, got {0}")]
    InvalidRange(i64),

    #[error("Index {index} is out of range for a queue of {len} tracks")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Nothing being played at the moment.")]
    NothingPlaying,

    #[error("No track arrived before the idle timeout")]
    Timeout,

    #[error("The player for this server has shut down")]
    Closed,

    #[error("Playback loop already running")]
    AlreadyRunning,

    #[error(transparent)]
    Voice(#[from] VoiceError),
}
