use crate::error::{ConsoleError, Result};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::Client;
use std::time::Duration;

pub type StopId = u32;

/// Per-request timeout for robot backend calls.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

const POSITION_PATH: &str = "/api/v1/robot/position";
const MOVE_PATH: &str = "/api/v1/robot/move";

/// Where the robot is, as reported by the backend or the simulated driver.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RobotPosition {
    pub position: StopId,
    pub position_name: String,
    pub is_moving: bool,
}

/// The robot backend's HTTP contract.
///
/// `move_position` only issues the command; callers poll `fetch_position`
/// until `is_moving` turns false.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RobotApi: Send + Sync {
    async fn fetch_position(&self) -> Result<RobotPosition>;

    async fn move_position(&self) -> Result<()>;
}

pub struct RobotClient {
    client: Client,
    position_url: String,
    move_url: String,
}

impl RobotClient {
    pub fn new(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            client: Client::new(),
            position_url: format!("{base}{POSITION_PATH}"),
            move_url: format!("{base}{MOVE_PATH}"),
        }
    }
}

#[async_trait]
impl RobotApi for RobotClient {
    async fn fetch_position(&self) -> Result<RobotPosition> {
        let response = self
            .client
            .get(&self.position_url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                ConsoleError::BackendUnreachable(format!("GET {} failed: {e}", self.position_url))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ConsoleError::BackendUnreachable(format!(
                "HTTP {} from {}",
                status.as_u16(),
                self.position_url
            )));
        }

        response.json::<RobotPosition>().await.map_err(|e| {
            ConsoleError::BackendUnreachable(format!(
                "invalid position payload from {}: {e}",
                self.position_url
            ))
        })
    }

    async fn move_position(&self) -> Result<()> {
        let response = self
            .client
            .post(&self.move_url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                ConsoleError::BackendUnreachable(format!("POST {} failed: {e}", self.move_url))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ConsoleError::BackendUnreachable(format!(
                "HTTP {} from {}",
                status.as_u16(),
                self.move_url
            )));
        }

        // The ack body is not typed; keep it for debugging only.
        let ack = response.text().await.unwrap_or_default();
        tracing::debug!("move acknowledged: {}", ack);
        Ok(())
    }
}
