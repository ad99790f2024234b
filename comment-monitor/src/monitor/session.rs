//! State of one monitoring session.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use uuid::Uuid;

use crate::credentials::CredentialPool;

/// Lifecycle phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Initializing,
    Backfilling,
    Incremental,
    Stopped,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Backfilling => "backfilling",
            Self::Incremental => "incremental",
            Self::Stopped => "stopped",
        }
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped)
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Largest `rpid` processed so far. Never decreases while a session lives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct HighWaterMark(u64);

impl HighWaterMark {
    pub fn get(self) -> u64 {
        self.0
    }

    /// Raise the mark to `candidate` if it is larger. Returns whether it moved.
    pub fn advance(&mut self, candidate: u64) -> bool {
        if candidate > self.0 {
            self.0 = candidate;
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.0 = 0;
    }
}

/// Read-only view of a session, published on every change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub target: String,
    pub oid: Option<u64>,
    pub title: Option<String>,
    pub phase: SessionPhase,
    pub high_water_mark: u64,
    pub account_count: usize,
    pub started_at: DateTime<Utc>,
}

/// A monitoring session, owned by its engine task.
pub struct MonitorSession {
    id: Uuid,
    target: String,
    oid: Option<u64>,
    title: Option<String>,
    phase: SessionPhase,
    hwm: HighWaterMark,
    pool: Arc<CredentialPool>,
    started_at: DateTime<Utc>,
    state_tx: watch::Sender<SessionSnapshot>,
}

impl MonitorSession {
    /// Create a session in `Initializing` and the receiver for its snapshots.
    pub fn new(
        id: Uuid,
        target: impl Into<String>,
        pool: Arc<CredentialPool>,
    ) -> (Self, watch::Receiver<SessionSnapshot>) {
        let target = target.into();
        let started_at = Utc::now();
        let snapshot = SessionSnapshot {
            session_id: id,
            target: target.clone(),
            oid: None,
            title: None,
            phase: SessionPhase::Initializing,
            high_water_mark: 0,
            account_count: pool.len(),
            started_at,
        };
        let (state_tx, state_rx) = watch::channel(snapshot);

        let session = Self {
            id,
            target,
            oid: None,
            title: None,
            phase: SessionPhase::Initializing,
            hwm: HighWaterMark::default(),
            pool,
            started_at,
            state_tx,
        };
        (session, state_rx)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn oid(&self) -> Option<u64> {
        self.oid
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn high_water_mark(&self) -> u64 {
        self.hwm.get()
    }

    pub fn pool(&self) -> &Arc<CredentialPool> {
        &self.pool
    }

    /// Record the resolved video. Selecting a different video resets the mark.
    pub fn set_video(&mut self, oid: u64, title: impl Into<String>) {
        if self.oid.is_some_and(|current| current != oid) {
            self.hwm.reset();
        }
        self.oid = Some(oid);
        self.title = Some(title.into());
        self.publish();
    }

    pub fn set_phase(&mut self, phase: SessionPhase) {
        if self.phase != phase {
            tracing::debug!(session = %self.id, from = %self.phase, to = %phase, "phase change");
            self.phase = phase;
            self.publish();
        }
    }

    /// Raise the high-water mark. Returns whether it moved.
    pub fn advance_hwm(&mut self, candidate: u64) -> bool {
        let moved = self.hwm.advance(candidate);
        if moved {
            self.publish();
        }
        moved
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id,
            target: self.target.clone(),
            oid: self.oid,
            title: self.title.clone(),
            phase: self.phase,
            high_water_mark: self.hwm.get(),
            account_count: self.pool.len(),
            started_at: self.started_at,
        }
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.snapshot());
    }
}
