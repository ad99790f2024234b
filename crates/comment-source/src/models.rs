//! Domain records produced by a comment source.

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// A single comment or reply.
///
/// `rpid` is the global identity. `parent` and `root` are `0` for top-level
/// comments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub rpid: u64,
    pub oid: u64,
    pub mid: u64,
    pub user: String,
    pub avatar: String,
    pub content: String,
    /// Unix seconds.
    pub ctime: i64,
    pub likes: u64,
    pub reply_count: u64,
    pub parent: u64,
    pub root: u64,
    pub sex: Option<String>,
    pub level: Option<u8>,
    pub fans_medal: Option<String>,
    pub location: Option<String>,
}

impl Comment {
    pub fn is_top_level(&self) -> bool {
        self.root == 0 && self.parent == 0
    }

    pub fn has_replies(&self) -> bool {
        self.reply_count > 0
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.ctime, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// Creation time rendered in the server's local timezone.
    pub fn local_time(&self) -> String {
        self.created_at()
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
    }
}

/// Metadata of the monitored video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoInfo {
    /// Numeric resource id (`aid`) used by every comment endpoint.
    pub oid: u64,
    pub bvid: String,
    pub title: String,
    /// Comment count advertised by the video page, when present.
    pub total_count: Option<u64>,
}

/// One page of top-level comments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentPage {
    pub items: Vec<Comment>,
    /// Total number of top-level comments reported by the remote side.
    pub total_count: u64,
}

/// One page of replies under a root comment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubCommentPage {
    pub items: Vec<Comment>,
}

/// Newest window of the time-ordered comment feed, most recent first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LatestFeed {
    pub items: Vec<Comment>,
}

/// Ordering of paginated top-level comments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentOrder {
    Time,
    #[default]
    Likes,
}

impl CommentOrder {
    /// Value of the `sort` query parameter.
    pub fn sort_param(self) -> u8 {
        match self {
            Self::Time => 0,
            Self::Likes => 1,
        }
    }
}
