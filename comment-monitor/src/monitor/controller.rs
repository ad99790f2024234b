//! Owns at most one running monitoring session.

use std::sync::Arc;
use std::time::Duration;

use comment_source::{CommentSource, Credential};
use serde::Serialize;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use super::engine::{EngineConfig, PollingEngine};
use super::events::SessionEvents;
use super::session::{MonitorSession, SessionSnapshot};
use crate::credentials::CredentialPool;
use crate::database::CommentRepository;
use crate::hub::BroadcastHub;
use crate::{Error, Result};

/// How long `stop` waits for the engine before aborting it.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Parameters of a new session.
#[derive(Debug, Clone)]
pub struct StartRequest {
    /// BV id or `av` id of the video.
    pub target: String,
    /// Accounts to rotate through. Empty means the configured defaults.
    pub credentials: Vec<Credential>,
    pub expand_sub_comments: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StartOutcome {
    Started {
        session_id: Uuid,
        account_count: usize,
    },
    AlreadyRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StopOutcome {
    Stopped,
    NotRunning,
}

/// Controller view for status queries.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorStatus {
    pub running: bool,
    pub session: Option<SessionSnapshot>,
}

struct ActiveSession {
    id: Uuid,
    cancel: CancellationToken,
    handle: JoinHandle<MonitorSession>,
    state: watch::Receiver<SessionSnapshot>,
    events: SessionEvents,
}

impl ActiveSession {
    fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

pub struct MonitorController {
    source: Arc<dyn CommentSource>,
    repository: Arc<dyn CommentRepository>,
    hub: Arc<BroadcastHub>,
    engine_config: EngineConfig,
    default_credentials: Vec<Credential>,
    stop_timeout: Duration,
    active: Mutex<Option<ActiveSession>>,
    cancel_token: CancellationToken,
}

impl MonitorController {
    pub fn new(
        source: Arc<dyn CommentSource>,
        repository: Arc<dyn CommentRepository>,
        hub: Arc<BroadcastHub>,
    ) -> Self {
        Self {
            source,
            repository,
            hub,
            engine_config: EngineConfig::default(),
            default_credentials: Vec::new(),
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            active: Mutex::new(None),
            cancel_token: CancellationToken::new(),
        }
    }

    pub fn with_engine_config(mut self, config: EngineConfig) -> Self {
        self.engine_config = config;
        self
    }

    /// Accounts used when a start request carries none.
    pub fn with_default_credentials(mut self, credentials: Vec<Credential>) -> Self {
        self.default_credentials = credentials;
        self
    }

    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    /// Start monitoring `request.target`.
    ///
    /// Fails with a configuration error when the target is blank or no usable
    /// credential is available.
    pub async fn start(&self, request: StartRequest) -> Result<StartOutcome> {
        let mut active = self.active.lock().await;
        if active.as_ref().is_some_and(ActiveSession::is_running) {
            return Ok(StartOutcome::AlreadyRunning);
        }

        let target = request.target.trim();
        if target.is_empty() {
            return Err(Error::config("Target video id is required"));
        }

        let mut credentials: Vec<Credential> = request
            .credentials
            .into_iter()
            .filter(Credential::is_usable)
            .collect();
        if credentials.is_empty() {
            credentials = self.default_credentials.clone();
        }
        let cancel = self.cancel_token.child_token();
        let pool = CredentialPool::new(credentials)?.with_cancel_token(cancel.clone());
        let account_count = pool.len();

        let id = Uuid::new_v4();
        let (session, state) = MonitorSession::new(id, target, Arc::new(pool));
        let events = SessionEvents::new(id, Arc::clone(&self.hub), cancel.clone());
        let config = self
            .engine_config
            .clone()
            .with_sub_comments(request.expand_sub_comments);
        let engine = PollingEngine::new(
            session,
            Arc::clone(&self.source),
            Arc::clone(&self.repository),
            events.clone(),
            config,
            cancel.clone(),
        );

        let handle = tokio::spawn(engine.run());
        info!(session = %id, bvid = target, accounts = account_count, "monitoring started");

        *active = Some(ActiveSession {
            id,
            cancel,
            handle,
            state,
            events,
        });
        Ok(StartOutcome::Started {
            session_id: id,
            account_count,
        })
    }

    /// Stop the running session.
    ///
    /// Waits up to the stop timeout for the engine to observe cancellation,
    /// then aborts it.
    pub async fn stop(&self) -> StopOutcome {
        let mut guard = self.active.lock().await;
        let Some(mut active) = guard.take() else {
            return StopOutcome::NotRunning;
        };
        if !active.is_running() {
            return StopOutcome::NotRunning;
        }

        active.cancel.cancel();
        match tokio::time::timeout(self.stop_timeout, &mut active.handle).await {
            Ok(Ok(session)) => {
                info!(session = %active.id, hwm = session.high_water_mark(), "monitoring stopped");
            }
            Ok(Err(e)) => warn!(session = %active.id, error = %e, "monitor task failed"),
            Err(_) => {
                warn!(session = %active.id, "monitor task did not stop in time, aborting");
                active.handle.abort();
            }
        }

        active.events.announce_stopped("Monitoring stopped");
        StopOutcome::Stopped
    }

    pub async fn status(&self) -> MonitorStatus {
        let active = self.active.lock().await;
        match active.as_ref() {
            Some(session) => MonitorStatus {
                running: session.is_running(),
                session: Some(session.state.borrow().clone()),
            },
            None => MonitorStatus {
                running: false,
                session: None,
            },
        }
    }

    pub async fn is_running(&self) -> bool {
        self.active
            .lock()
            .await
            .as_ref()
            .is_some_and(ActiveSession::is_running)
    }

    /// Stop the session and refuse to outlive the process.
    pub async fn shutdown(&self) {
        self.stop().await;
        self.cancel_token.cancel();
    }
}
