use super::consts;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    capacity: usize,
    connect_timeout: Duration,
    mic_enabled: bool,
}

pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = capacity;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn with_mic_enabled(mut self, enabled: bool) -> Self {
        self.config.mic_enabled = enabled;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capacity: consts::DEFAULT_CAPACITY,
            connect_timeout: Duration::from_secs(consts::DEFAULT_CONNECT_TIMEOUT_SECS),
            // The browser client starts with the mic on; so does this one.
            mic_enabled: true,
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn mic_enabled(&self) -> bool {
        self.mic_enabled
    }
}
