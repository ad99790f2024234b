//! Events pushed to live subscribers.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use comment_source::Comment;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::hub::BroadcastHub;

/// Severity of a status message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Display projection of a comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentView {
    pub rpid: u64,
    pub user: String,
    pub mid: u64,
    pub avatar: String,
    pub content: String,
    pub ctime: i64,
    /// `ctime` in server-local time.
    pub time: String,
    pub level: Option<u8>,
}

impl From<&Comment> for CommentView {
    fn from(comment: &Comment) -> Self {
        Self {
            rpid: comment.rpid,
            user: comment.user.clone(),
            mid: comment.mid,
            avatar: comment.avatar.clone(),
            content: comment.content.clone(),
            ctime: comment.ctime,
            time: comment.local_time(),
            level: comment.level,
        }
    }
}

impl CommentView {
    pub fn from_slice(comments: &[Comment]) -> Vec<Self> {
        comments.iter().map(Self::from).collect()
    }
}

/// Event payload, tagged by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MonitorEvent {
    Connected {
        bvid: String,
        oid: u64,
        title: String,
        account_count: usize,
    },
    Status {
        level: StatusLevel,
        msg: String,
    },
    /// Latest comments after backfill, most recent first.
    Snapshot { comments: Vec<CommentView> },
    /// Newly observed comments, oldest first.
    NewItems { comments: Vec<CommentView> },
}

impl MonitorEvent {
    pub fn status(level: StatusLevel, msg: impl Into<String>) -> Self {
        Self::Status {
            level,
            msg: msg.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::Status { .. } => "status",
            Self::Snapshot { .. } => "snapshot",
            Self::NewItems { .. } => "new_items",
        }
    }
}

/// A sequenced event as delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventEnvelope {
    pub seq: u64,
    pub session_id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: MonitorEvent,
}

/// Per-session event emitter.
///
/// Stamps every event with the session id and the next sequence number.
/// Once the session token is cancelled, regular events are dropped; only
/// [`announce_stopped`](Self::announce_stopped) still goes through.
#[derive(Clone)]
pub struct SessionEvents {
    session_id: Uuid,
    seq: Arc<AtomicU64>,
    hub: Arc<BroadcastHub>,
    cancel: CancellationToken,
}

impl SessionEvents {
    pub fn new(session_id: Uuid, hub: Arc<BroadcastHub>, cancel: CancellationToken) -> Self {
        Self {
            session_id,
            seq: Arc::new(AtomicU64::new(0)),
            hub,
            cancel,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Broadcast `event` unless the session has been cancelled.
    ///
    /// Returns `false` when the event was suppressed.
    pub fn emit(&self, event: MonitorEvent) -> bool {
        if self.cancel.is_cancelled() {
            tracing::trace!(kind = event.kind(), "session cancelled, event suppressed");
            return false;
        }
        self.publish(event);
        true
    }

    pub fn status(&self, level: StatusLevel, msg: impl Into<String>) -> bool {
        self.emit(MonitorEvent::status(level, msg))
    }

    /// Final status of a session, delivered even after cancellation.
    pub fn announce_stopped(&self, msg: impl Into<String>) {
        self.publish(MonitorEvent::status(StatusLevel::Info, msg));
    }

    fn publish(&self, event: MonitorEvent) {
        let envelope = EventEnvelope {
            seq: self.seq.fetch_add(1, Ordering::Relaxed) + 1,
            session_id: self.session_id,
            timestamp: Utc::now(),
            event,
        };
        self.hub.broadcast(Arc::new(envelope));
    }
}
