use crate::config::LiveKitConfig;
use crate::error::VoiceError;
use handoff_types::supervisor_identity;
use livekit_api::access_token::{AccessToken, VideoGrants};
use std::time::Duration;

/// Issues LiveKit join tokens for the agent and for supervisors.
#[derive(Debug, Clone)]
pub struct VoiceService {
    config: LiveKitConfig,
}

impl VoiceService {
    pub fn new(config: LiveKitConfig) -> Self {
        Self { config }
    }

    pub fn is_enabled(&self) -> bool {
        !self.config.url.is_empty()
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    pub fn generate_join_token(
        &self,
        room_name: &str,
        participant_identity: &str,
        participant_name: &str,
    ) -> Result<String, VoiceError> {
        if self.config.api_key.is_empty() || self.config.api_secret.is_empty() {
            return Err(VoiceError::Config(
                "LiveKit API key and secret are required to issue tokens".to_string(),
            ));
        }

        let token = AccessToken::with_api_key(&self.config.api_key, &self.config.api_secret)
            .with_identity(participant_identity)
            .with_name(participant_name)
            .with_grants(VideoGrants {
                room_join: true,
                room: room_name.to_string(),
                can_publish: true,
                can_subscribe: true,
                can_publish_data: true,
                ..Default::default()
            })
            .with_ttl(Duration::from_secs(self.config.token_ttl_seconds));

        token.to_jwt().map_err(VoiceError::LiveKit)
    }

    /// Issues a token whose identity carries the supervisor suffix, so the
    /// agent in the room recognizes the holder and stays quiet.
    ///
    /// Returns the identity alongside the token.
    pub fn generate_supervisor_token(
        &self,
        room_name: &str,
        display_name: &str,
    ) -> Result<(String, String), VoiceError> {
        let identity = supervisor_identity(display_name);
        let token = self.generate_join_token(room_name, &identity, display_name)?;
        Ok((identity, token))
    }
}
