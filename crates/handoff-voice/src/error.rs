use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("LiveKit API error: {0}")]
    LiveKit(#[from] livekit_api::access_token::AccessTokenError),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Reasoning engine error: {0}")]
    Engine(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Timed out after {seconds}s waiting for {waiting_for}")]
    Timeout {
        waiting_for: &'static str,
        seconds: u64,
    },
}
