use crate::error::{ConsoleError, Result};
use reqwest::Client;
use reqwest::header::ACCEPT;
use serde_json::Value;

/// Read-only client for `GET {base}/latest/{topic}`.
pub struct TelemetryClient {
    client: Client,
    base_url: String,
}

impl TelemetryClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Latest payload published on `topic`, as-is.
    pub async fn latest(&self, topic: &str) -> Result<Value> {
        let url = format!("{}/latest/{}", self.base_url, urlencoding::encode(topic));
        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/json")
            .timeout(crate::robot::REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| ConsoleError::BackendUnreachable(format!("GET {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ConsoleError::BackendUnreachable(format!(
                "HTTP {} querying {url}: {body}",
                status.as_u16()
            )));
        }

        response.json::<Value>().await.map_err(|e| {
            ConsoleError::BackendUnreachable(format!("invalid telemetry payload from {url}: {e}"))
        })
    }

    /// Fetch the battery, dock, velocity and goal topics concurrently.
    /// Failed topics are left empty and their errors collected.
    pub async fn dashboard(&self) -> DashboardSnapshot {
        let (battery, dock, velocity, goal) = tokio::join!(
            self.latest("battery"),
            self.latest("dock"),
            self.latest("velocity"),
            self.latest("goal"),
        );

        let mut errors = Vec::new();
        let mut keep = |topic: &str, result: Result<Value>| match result {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("telemetry topic {} unavailable: {}", topic, e);
                errors.push(e.to_string());
                None
            }
        };

        let battery = keep("battery", battery);
        let dock = keep("dock", dock);
        let velocity = keep("velocity", velocity);
        let goal = keep("goal", goal);
        DashboardSnapshot {
            battery,
            dock,
            velocity,
            goal,
            errors,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardSnapshot {
    pub battery: Option<Value>,
    pub dock: Option<Value>,
    pub velocity: Option<Value>,
    pub goal: Option<Value>,
    pub errors: Vec<String>,
}

impl DashboardSnapshot {
    pub fn battery_percent(&self) -> Option<f64> {
        self.battery
            .as_ref()
            .and_then(|payload| numeric_value(payload, &["percentage", "percent", "level", "data"]))
    }

    pub fn dock_status(&self) -> Option<String> {
        self.dock
            .as_ref()
            .and_then(|payload| string_value(payload, &["status", "state", "data"]))
    }

    pub fn linear_velocity(&self) -> Option<(f64, f64)> {
        self.velocity
            .as_ref()
            .and_then(|payload| payload.get("linear").or(Some(payload)))
            .and_then(|payload| xy(payload, &["x"], &["y"]))
    }

    pub fn goal_xy(&self) -> Option<(f64, f64)> {
        self.goal.as_ref().and_then(|payload| {
            let pose = payload
                .pointer("/pose/position")
                .or_else(|| payload.get("position"))
                .unwrap_or(payload);
            xy(pose, &["x"], &["y"])
        })
    }
}

/// The payload itself if it is a number, otherwise the first numeric field
/// among `keys`.
pub fn numeric_value(payload: &Value, keys: &[&str]) -> Option<f64> {
    payload.as_f64().or_else(|| first_number(payload, keys))
}

/// The payload itself if it is a string, otherwise the first string field
/// among `keys`, otherwise the JSON text of any non-null payload.
pub fn string_value(payload: &Value, keys: &[&str]) -> Option<String> {
    if let Some(text) = payload.as_str() {
        return Some(text.to_string());
    }
    keys.iter()
        .find_map(|key| payload.get(*key).and_then(Value::as_str))
        .map(str::to_string)
        .or_else(|| (!payload.is_null()).then(|| payload.to_string()))
}

pub fn xy(payload: &Value, x_keys: &[&str], y_keys: &[&str]) -> Option<(f64, f64)> {
    Some((first_number(payload, x_keys)?, first_number(payload, y_keys)?))
}

// Field lookup only; a bare number is not an (x, y) component.
fn first_number(payload: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .find_map(|key| payload.get(*key).and_then(Value::as_f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_numeric_value_prefers_bare_number() {
        assert_eq!(numeric_value(&json!(87.5), &["percentage"]), Some(87.5));
        assert_eq!(
            numeric_value(&json!({"level": "high", "percentage": 40}), &["level", "percentage"]),
            Some(40.0)
        );
        assert_eq!(numeric_value(&json!({"level": "high"}), &["level"]), None);
    }

    #[test]
    fn test_string_value_falls_back_to_json_text() {
        assert_eq!(string_value(&json!("docked"), &["status"]), Some("docked".to_string()));
        assert_eq!(
            string_value(&json!({"status": "charging"}), &["status"]),
            Some("charging".to_string())
        );
        assert_eq!(
            string_value(&json!({"code": 3}), &["status"]),
            Some(r#"{"code":3}"#.to_string())
        );
        assert_eq!(string_value(&Value::Null, &["status"]), None);
    }

    #[test]
    fn test_xy_requires_both_components() {
        assert_eq!(xy(&json!({"x": 1.0, "y": -2.5}), &["x"], &["y"]), Some((1.0, -2.5)));
        assert_eq!(xy(&json!({"x": 1.0}), &["x"], &["y"]), None);
        assert_eq!(xy(&json!(4.0), &["x"], &["y"]), None);
    }

    #[tokio::test]
    async fn test_latest_encodes_topic_and_returns_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/robot/latest/cmd%2Fvel"))
            .and(header("accept", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"linear": {"x": 0.2, "y": 0.0}})))
            .expect(1)
            .mount(&server)
            .await;

        let client = TelemetryClient::new(&format!("{}/api/v1/robot", server.uri()));
        let payload = client.latest("cmd/vel").await.unwrap();
        assert_eq!(payload["linear"]["x"], 0.2);
    }

    #[tokio::test]
    async fn test_latest_error_includes_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/latest/battery"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no data yet"))
            .mount(&server)
            .await;

        let client = TelemetryClient::new(&server.uri());
        match client.latest("battery").await {
            Err(ConsoleError::BackendUnreachable(message)) => {
                assert!(message.contains("404"));
                assert!(message.ends_with("no data yet"));
            }
            other => panic!("expected BackendUnreachable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_dashboard_tolerates_missing_topics() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/latest/battery"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"percentage": 76})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/latest/dock"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!("docked")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/latest/goal"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({"pose": {"position": {"x": 3.0, "y": 4.5}}}),
            ))
            .mount(&server)
            .await;

        let client = TelemetryClient::new(&server.uri());
        let snapshot = client.dashboard().await;

        assert_eq!(snapshot.battery_percent(), Some(76.0));
        assert_eq!(snapshot.dock_status(), Some("docked".to_string()));
        assert_eq!(snapshot.goal_xy(), Some((3.0, 4.5)));
        assert_eq!(snapshot.velocity, None);
        assert_eq!(snapshot.linear_velocity(), None);
        assert_eq!(snapshot.errors.len(), 1);
        assert!(snapshot.errors[0].contains("404"));
    }
}
