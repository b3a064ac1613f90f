use std::time::Duration;

/// Both transcript buffers are wiped on this cadence while the console runs.
pub const TRANSCRIPT_CLEAR_INTERVAL: Duration = Duration::from_secs(60);

/// User and bot transcript buffers, one finalized utterance per line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcripts {
    user: String,
    bot: String,
}

impl Transcripts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interim fragments are dropped; only finalized text is kept.
    pub fn append_user(&mut self, text: &str, is_final: bool) {
        if !is_final {
            return;
        }
        self.user.push_str(text);
        self.user.push('\n');
    }

    pub fn append_bot(&mut self, text: &str) {
        self.bot.push_str(text);
        self.bot.push('\n');
    }

    pub fn clear(&mut self) {
        self.user.clear();
        self.bot.clear();
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn bot(&self) -> &str {
        &self.bot
    }
}
