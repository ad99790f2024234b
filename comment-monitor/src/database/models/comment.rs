//! Comment and video metadata database models.

use comment_source::Comment;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A stored comment row.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct CommentDbModel {
    pub rpid: i64,
    /// Target video the comment was collected for.
    pub bvid: String,
    pub oid: i64,
    pub mid: i64,
    pub user: String,
    pub avatar: String,
    pub sex: Option<String>,
    pub content: String,
    /// Unix seconds.
    pub ctime: i64,
    pub likes: i64,
    pub reply_count: i64,
    pub parent: i64,
    pub root: i64,
    pub level: Option<i64>,
    pub fans_medal: Option<String>,
    pub location: Option<String>,
    /// Unix epoch milliseconds (UTC) of the first upsert.
    pub first_seen_at: i64,
    /// Unix epoch milliseconds (UTC) of the latest upsert.
    pub fetched_at: i64,
}

impl CommentDbModel {
    /// Build a row from a fetched comment, stamped with `now_ms`.
    pub fn from_comment(bvid: &str, comment: &Comment, now_ms: i64) -> Self {
        Self {
            rpid: comment.rpid as i64,
            bvid: bvid.to_string(),
            oid: comment.oid as i64,
            mid: comment.mid as i64,
            user: comment.user.clone(),
            avatar: comment.avatar.clone(),
            sex: comment.sex.clone(),
            content: comment.content.clone(),
            ctime: comment.ctime,
            likes: comment.likes as i64,
            reply_count: comment.reply_count as i64,
            parent: comment.parent as i64,
            root: comment.root as i64,
            level: comment.level.map(i64::from),
            fans_medal: comment.fans_medal.clone(),
            location: comment.location.clone(),
            first_seen_at: now_ms,
            fetched_at: now_ms,
        }
    }
}

/// Per-video bookkeeping, refreshed after every batch.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct VideoMetadataDbModel {
    pub bvid: String,
    pub oid: i64,
    pub title: String,
    pub comment_count: i64,
    /// Unix epoch milliseconds (UTC).
    pub last_updated: i64,
}
