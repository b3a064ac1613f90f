use async_trait::async_trait;
use guide_console_core::session::{ConnectParams, VoiceSession};
use guide_console_core::{ConsoleError, Result};
use rtvi_types::SessionEvent;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;

/// Adapts the RTVI WebSocket client to the console's voice session.
pub struct RtviSession {
    client: rtvi_client::Client,
}

impl RtviSession {
    pub fn new(client: rtvi_client::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl VoiceSession for RtviSession {
    async fn connect(&self, params: &ConnectParams) -> Result<()> {
        // The WebSocket transport negotiates no media, so ICE servers only
        // matter to browser-side peers.
        tracing::debug!("ice servers: {:?}", params.ice_servers);
        self.client
            .connect(&params.webrtc_url)
            .await
            .map_err(|e| ConsoleError::VoiceSession(format!("{e:#}")))
    }

    async fn disconnect(&self) -> Result<()> {
        self.client
            .disconnect()
            .await
            .map_err(|e| ConsoleError::VoiceSession(format!("{e:#}")))
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.client.events()
    }

    fn enable_mic(&self, enabled: bool) {
        self.client.enable_mic(enabled);
    }

    fn mic_enabled(&self) -> bool {
        self.client.mic_enabled()
    }
}

/// Used with `--no-voice`: every connect fails and no events are produced.
pub struct NoVoice {
    events: broadcast::Sender<SessionEvent>,
    mic: AtomicBool,
}

impl NoVoice {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(1);
        Self {
            events,
            mic: AtomicBool::new(false),
        }
    }
}

impl Default for NoVoice {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VoiceSession for NoVoice {
    async fn connect(&self, _params: &ConnectParams) -> Result<()> {
        Err(ConsoleError::VoiceSession(
            "voice is disabled (--no-voice)".to_string(),
        ))
    }

    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn enable_mic(&self, enabled: bool) {
        self.mic.store(enabled, Ordering::SeqCst);
    }

    fn mic_enabled(&self) -> bool {
        self.mic.load(Ordering::SeqCst)
    }
}
