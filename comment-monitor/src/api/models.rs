//! Request and response bodies of the control surface.

use comment_source::Credential;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::models::{CommentDbModel, VideoMetadataDbModel};
use crate::monitor::{MonitorStatus, SessionPhase};

fn default_true() -> bool {
    true
}

/// One account in a start request.
#[derive(Debug, Clone, Deserialize)]
pub struct CookieInput {
    pub sessdata: String,
    #[serde(default)]
    pub buvid3: Option<String>,
    #[serde(default)]
    pub bili_jct: Option<String>,
}

impl From<CookieInput> for Credential {
    fn from(input: CookieInput) -> Self {
        let mut credential = Credential::new(input.sessdata.trim());
        if let Some(buvid3) = input.buvid3.filter(|v| !v.trim().is_empty()) {
            credential = credential.with_buvid3(buvid3.trim());
        }
        if let Some(bili_jct) = input.bili_jct.filter(|v| !v.trim().is_empty()) {
            credential = credential.with_bili_jct(bili_jct.trim());
        }
        credential
    }
}

/// Body of `POST /api/start`.
///
/// `cookies` wins over the single-account fields.
#[derive(Debug, Clone, Deserialize)]
pub struct StartMonitorRequest {
    pub bvid: String,
    #[serde(default)]
    pub cookies: Vec<CookieInput>,
    #[serde(default)]
    pub sessdata: Option<String>,
    #[serde(default)]
    pub buvid3: Option<String>,
    #[serde(default)]
    pub bili_jct: Option<String>,
    #[serde(default = "default_true")]
    pub fetch_sub_comments: bool,
}

impl StartMonitorRequest {
    /// Accounts carried by the request, possibly none.
    pub fn credentials(&self) -> Vec<Credential> {
        let list: Vec<Credential> = self
            .cookies
            .iter()
            .cloned()
            .map(Credential::from)
            .filter(Credential::is_usable)
            .collect();
        if !list.is_empty() {
            return list;
        }

        match &self.sessdata {
            Some(sessdata) if !sessdata.trim().is_empty() => vec![Credential::from(CookieInput {
                sessdata: sessdata.clone(),
                buvid3: self.buvid3.clone(),
                bili_jct: self.bili_jct.clone(),
            })],
            _ => Vec::new(),
        }
    }
}

/// Body of `GET /api/status`.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub running: bool,
    pub session_id: Option<Uuid>,
    pub bvid: Option<String>,
    pub title: Option<String>,
    pub phase: Option<SessionPhase>,
    pub high_water_mark: u64,
    pub account_count: usize,
    pub subscribers: usize,
}

impl StatusResponse {
    pub fn new(status: MonitorStatus, subscribers: usize) -> Self {
        let session = status.session;
        Self {
            running: status.running,
            session_id: session.as_ref().map(|s| s.session_id),
            bvid: session.as_ref().map(|s| s.target.clone()),
            title: session.as_ref().and_then(|s| s.title.clone()),
            phase: session.as_ref().map(|s| s.phase),
            high_water_mark: session.as_ref().map_or(0, |s| s.high_water_mark),
            account_count: session.as_ref().map_or(0, |s| s.account_count),
            subscribers,
        }
    }
}

/// Query of `GET /api/comments/{bvid}`.
#[derive(Debug, Deserialize)]
pub struct CommentsQuery {
    pub limit: Option<i64>,
}

pub const DEFAULT_COMMENTS_LIMIT: i64 = 50;
pub const MAX_COMMENTS_LIMIT: i64 = 500;

impl CommentsQuery {
    pub fn effective_limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_COMMENTS_LIMIT)
            .clamp(1, MAX_COMMENTS_LIMIT)
    }
}

/// Body of `GET /api/comments/{bvid}`.
#[derive(Debug, Serialize)]
pub struct CommentsResponse {
    pub bvid: String,
    pub metadata: Option<VideoMetadataDbModel>,
    pub comments: Vec<CommentDbModel>,
}

/// Body of `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// First message sent on a new WebSocket connection.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename = "init")]
pub struct WsInitMessage {
    pub running: bool,
    pub session_id: Option<Uuid>,
    pub title: Option<String>,
    pub phase: Option<SessionPhase>,
}
