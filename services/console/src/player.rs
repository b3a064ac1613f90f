use async_trait::async_trait;
use guide_console_core::audio::{AudioEvent, AudioPlayer, PlaybackId};
use guide_console_core::{ConsoleError, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Plays assets by running an external command, one at a time.
///
/// Each playback runs in a task that owns the child process; aborting the
/// task drops the child, and `kill_on_drop` terminates it.
pub struct ProcessPlayer {
    command: Vec<String>,
    asset_dir: PathBuf,
    events: mpsc::Sender<AudioEvent>,
    current: Option<JoinHandle<()>>,
    last: PlaybackId,
}

impl ProcessPlayer {
    pub fn new(command: Vec<String>, asset_dir: PathBuf, events: mpsc::Sender<AudioEvent>) -> Self {
        Self {
            command,
            asset_dir,
            events,
            current: None,
            last: PlaybackId::default(),
        }
    }

    /// `/simulation-audio/base1.mp3` resolves to `<asset_dir>/simulation-audio/base1.mp3`.
    pub fn resolve(&self, asset: &str) -> PathBuf {
        self.asset_dir.join(asset.trim_start_matches('/'))
    }

    fn spawn(&self, path: &Path) -> Result<tokio::process::Child> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| ConsoleError::Configuration("audio player command is empty".to_string()))?;
        tokio::process::Command::new(program)
            .args(args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ConsoleError::AudioPlayback(format!("failed to start {program}: {e}")))
    }
}

#[async_trait]
impl AudioPlayer for ProcessPlayer {
    async fn play(&mut self, asset: &str) -> Result<PlaybackId> {
        self.stop();

        let path = self.resolve(asset);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(ConsoleError::AudioPlayback(format!(
                "asset not found: {}",
                path.display()
            )));
        }

        let mut child = self.spawn(&path)?;
        self.last = self.last.next();
        let id = self.last;
        tracing::info!("playing {} ({:?})", path.display(), id);

        let events = self.events.clone();
        self.current = Some(tokio::spawn(async move {
            let event = match child.wait().await {
                Ok(status) if status.success() => AudioEvent::Ended(id),
                Ok(status) => AudioEvent::Failed(id, format!("player exited with {status}")),
                Err(e) => AudioEvent::Failed(id, e.to_string()),
            };
            if events.send(event).await.is_err() {
                tracing::debug!("audio event dropped, console is gone");
            }
        }));
        Ok(id)
    }

    fn stop(&mut self) {
        if let Some(task) = self.current.take() {
            task.abort();
        }
    }
}

impl Drop for ProcessPlayer {
    fn drop(&mut self) {
        self.stop();
    }
}
