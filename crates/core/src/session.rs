use crate::error::{ConsoleError, Result};
use crate::error_log::ErrorLog;
use crate::events::{ConnectivityState, TransportState};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use rtvi_types::SessionEvent;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

/// Passed through to the session transport unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectParams {
    pub webrtc_url: String,
    pub ice_servers: Vec<Value>,
}

/// The real-time voice session, treated as a black box.
///
/// One handle is created at startup and shared by the connection manager
/// and the event normalizer.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait VoiceSession: Send + Sync {
    async fn connect(&self, params: &ConnectParams) -> Result<()>;

    async fn disconnect(&self) -> Result<()>;

    /// Raw session events, in emission order.
    fn subscribe(&self) -> broadcast::Receiver<SessionEvent>;

    fn enable_mic(&self, enabled: bool);

    fn mic_enabled(&self) -> bool;
}

/// Serializes connect/disconnect on the shared session and owns the
/// connectivity state.
pub struct SessionManager {
    session: Arc<dyn VoiceSession>,
    params: ConnectParams,
    state: watch::Sender<ConnectivityState>,
    errors: ErrorLog,
}

impl SessionManager {
    pub fn new(session: Arc<dyn VoiceSession>, params: ConnectParams, errors: ErrorLog) -> Self {
        let (state, _) = watch::channel(ConnectivityState::Disconnected);
        Self {
            session,
            params,
            state,
            errors,
        }
    }

    pub fn session(&self) -> &Arc<dyn VoiceSession> {
        &self.session
    }

    pub fn connectivity(&self) -> ConnectivityState {
        *self.state.borrow()
    }

    pub fn watch(&self) -> watch::Receiver<ConnectivityState> {
        self.state.subscribe()
    }

    pub fn mic_enabled(&self) -> bool {
        self.session.mic_enabled()
    }

    /// Connect unless already connecting or connected.
    ///
    /// A failure is recorded in the error log before it is returned, and
    /// connectivity goes back to disconnected.
    pub async fn connect(&self) -> Result<()> {
        let claimed = self.state.send_if_modified(|state| {
            if *state == ConnectivityState::Disconnected {
                *state = ConnectivityState::Connecting;
                true
            } else {
                false
            }
        });
        if !claimed {
            tracing::debug!("connect ignored, session is {:?}", self.connectivity());
            return Ok(());
        }

        tracing::info!("connecting voice session to {}", self.params.webrtc_url);
        match self.session.connect(&self.params).await {
            Ok(()) => {
                self.state.send_replace(ConnectivityState::Connected);
                Ok(())
            }
            Err(e) => {
                let e = match e {
                    ConsoleError::VoiceSession(_) => e,
                    other => ConsoleError::VoiceSession(other.to_string()),
                };
                self.errors.push(e.to_string());
                self.state.send_replace(ConnectivityState::Disconnected);
                Err(e)
            }
        }
    }

    /// Always ends disconnected, even if the session reports an error.
    pub async fn disconnect(&self) {
        if let Err(e) = self.session.disconnect().await {
            self.errors.push(e.to_string());
        }
        self.state.send_replace(ConnectivityState::Disconnected);
        tracing::info!("voice session disconnected");
    }

    /// Apply a raw transport change reported by the session.
    pub fn on_transport(&self, raw: &TransportState) {
        self.state.send_if_modified(|state| {
            let next = state.apply(raw);
            let changed = next != *state;
            *state = next;
            changed
        });
    }

    pub fn enable_mic(&self, enabled: bool) {
        self.session.enable_mic(enabled);
    }

    /// Flip the microphone. Only meaningful while connected; returns the new
    /// state, or `None` when the toggle was ignored.
    pub fn toggle_mic(&self) -> Option<bool> {
        if self.connectivity() != ConnectivityState::Connected {
            tracing::warn!("microphone toggle ignored while {:?}", self.connectivity());
            return None;
        }
        let enabled = !self.session.mic_enabled();
        self.session.enable_mic(enabled);
        Some(enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Notify;

    // A session whose connect blocks until released, counting calls.
    struct GatedSession {
        calls: AtomicUsize,
        gate: Notify,
        mic: AtomicBool,
        events: broadcast::Sender<SessionEvent>,
    }

    impl GatedSession {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                gate: Notify::new(),
                mic: AtomicBool::new(false),
                events: broadcast::channel(8).0,
            }
        }
    }

    #[async_trait]
    impl VoiceSession for GatedSession {
        async fn connect(&self, _params: &ConnectParams) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.gate.notified().await;
            Ok(())
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

    fn params() -> ConnectParams {
        ConnectParams {
            webrtc_url: "ws://127.0.0.1:7860/client".to_string(),
            ice_servers: vec![],
        }
    }

    #[tokio::test]
    async fn test_connect_while_pending_is_a_noop() {
        let session = Arc::new(GatedSession::new());
        let manager = SessionManager::new(session.clone(), params(), ErrorLog::new());

        let (first, second) = tokio::join!(manager.connect(), async {
            // The first connect has claimed the state by the time we get here.
            assert_eq!(manager.connectivity(), ConnectivityState::Connecting);
            let result = manager.connect().await;
            session.gate.notify_one();
            result
        });

        assert!(first.is_ok());
        assert!(second.is_ok());
        assert_eq!(session.calls.load(Ordering::SeqCst), 1);
        assert_eq!(manager.connectivity(), ConnectivityState::Connected);

        // Connected: still a no-op.
        session.gate.notify_one();
        manager.connect().await.unwrap();
        assert_eq!(session.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_connect_failure_reverts_and_logs() {
        let mut session = MockVoiceSession::new();
        session
            .expect_connect()
            .times(1)
            .returning(|_| Err(ConsoleError::VoiceSession("offer rejected".to_string())));
        let errors = ErrorLog::new();
        let manager = SessionManager::new(Arc::new(session), params(), errors.clone());

        let result = manager.connect().await;
        assert_eq!(
            result,
            Err(ConsoleError::VoiceSession("offer rejected".to_string()))
        );
        assert_eq!(manager.connectivity(), ConnectivityState::Disconnected);
        assert_eq!(errors.entries(), vec!["voice session error: offer rejected"]);
    }

    #[tokio::test]
    async fn test_disconnect_is_fail_open() {
        let mut session = MockVoiceSession::new();
        session.expect_connect().returning(|_| Ok(()));
        session
            .expect_disconnect()
            .times(1)
            .returning(|| Err(ConsoleError::VoiceSession("socket gone".to_string())));
        let errors = ErrorLog::new();
        let manager = SessionManager::new(Arc::new(session), params(), errors.clone());

        manager.connect().await.unwrap();
        assert_eq!(manager.connectivity(), ConnectivityState::Connected);
        manager.disconnect().await;
        assert_eq!(manager.connectivity(), ConnectivityState::Disconnected);
        assert_eq!(errors.len(), 1);
    }

    #[tokio::test]
    async fn test_transport_signals_drive_connectivity() {
        let manager = SessionManager::new(Arc::new(GatedSession::new()), params(), ErrorLog::new());
        let mut rx = manager.watch();

        manager.on_transport(&TransportState::Connecting);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), ConnectivityState::Connecting);

        manager.on_transport(&TransportState::Ready);
        assert_eq!(manager.connectivity(), ConnectivityState::Connected);
        rx.borrow_and_update();

        manager.on_transport(&TransportState::Other("negotiating".to_string()));
        assert!(!rx.has_changed().unwrap());
        assert_eq!(manager.connectivity(), ConnectivityState::Connected);

        manager.on_transport(&TransportState::Closed);
        assert_eq!(manager.connectivity(), ConnectivityState::Disconnected);
    }

    #[tokio::test]
    async fn test_mic_toggle_requires_connection() {
        let session = Arc::new(GatedSession::new());
        let manager = SessionManager::new(session.clone(), params(), ErrorLog::new());

        assert_eq!(manager.toggle_mic(), None);
        assert!(!manager.mic_enabled());

        manager.on_transport(&TransportState::Connected);
        assert_eq!(manager.toggle_mic(), Some(true));
        assert_eq!(manager.toggle_mic(), Some(false));
    }
}
