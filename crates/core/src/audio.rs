use crate::error::Result;
use crate::robot::StopId;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use std::collections::HashMap;

/// Identifies one playback request. Each `play` returns a fresh id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlaybackId(pub u64);

impl PlaybackId {
    pub fn next(self) -> Self {
        PlaybackId(self.0.wrapping_add(1))
    }
}

/// Completion report from an audio player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioEvent {
    Ended(PlaybackId),
    Failed(PlaybackId, String),
}

impl AudioEvent {
    pub fn id(&self) -> PlaybackId {
        match self {
            AudioEvent::Ended(id) | AudioEvent::Failed(id, _) => *id,
        }
    }
}

/// The single playback channel owned by the tour sequencer.
///
/// `play` must stop whatever is playing before starting the new asset and
/// returns once playback has started. The end of playback is reported
/// separately as an [`AudioEvent`] carrying the returned id.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AudioPlayer: Send {
    async fn play(&mut self, asset: &str) -> Result<PlaybackId>;

    fn stop(&mut self);
}

/// Maps each stop to exactly one audio asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioAssets {
    assets: HashMap<StopId, String>,
}

impl AudioAssets {
    pub fn new(assets: HashMap<StopId, String>) -> Self {
        Self { assets }
    }

    pub fn asset_for(&self, stop: StopId) -> Option<&str> {
        self.assets.get(&stop).map(String::as_str)
    }
}

impl Default for AudioAssets {
    fn default() -> Self {
        let assets = (1..=3)
            .map(|stop| (stop, format!("/simulation-audio/base{stop}.mp3")))
            .collect();
        Self { assets }
    }
}
