//! Comment repository.
//!
//! Upserts are keyed by `rpid`: writing the same comment again updates the
//! stored row in place with the latest content and counters.

use async_trait::async_trait;
use serde::Serialize;
use sqlx::SqlitePool;

use crate::Result;
use crate::database::models::{CommentDbModel, VideoMetadataDbModel};
use crate::database::retry::retry_on_sqlite_busy;

/// Result of a single upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    /// The comment was not stored before.
    Stored,
    /// An existing row was overwritten.
    Updated,
}

/// Comment repository trait.
#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Insert or update a comment, keyed by `rpid`.
    async fn upsert_comment(&self, comment: &CommentDbModel) -> Result<UpsertOutcome>;

    /// Insert or update the metadata row of a video.
    async fn upsert_metadata(&self, metadata: &VideoMetadataDbModel) -> Result<()>;

    /// Number of stored comments for a video.
    async fn count_for_target(&self, bvid: &str) -> Result<i64>;

    /// Find a comment by id.
    async fn find_by_rpid(&self, rpid: i64) -> Result<Option<CommentDbModel>>;

    /// Most recent comments of a video, newest first.
    async fn list_recent(&self, bvid: &str, limit: i64) -> Result<Vec<CommentDbModel>>;

    /// Metadata row of a video.
    async fn find_metadata(&self, bvid: &str) -> Result<Option<VideoMetadataDbModel>>;
}

/// SQLx implementation of CommentRepository.
pub struct SqlxCommentRepository {
    pool: SqlitePool,
    write_pool: SqlitePool,
}

impl SqlxCommentRepository {
    /// Create a repository reading from `pool` and writing through `write_pool`.
    pub fn new(pool: SqlitePool, write_pool: SqlitePool) -> Self {
        Self { pool, write_pool }
    }

    async fn upsert_once(&self, comment: &CommentDbModel) -> Result<UpsertOutcome> {
        let mut tx = self.write_pool.begin().await?;

        let existing: Option<(i64,)> = sqlx::query_as("SELECT rpid FROM comments WHERE rpid = ?")
            .bind(comment.rpid)
            .fetch_optional(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO comments (
                rpid, bvid, oid, mid, user, avatar, sex, content, ctime, likes,
                reply_count, parent, root, level, fans_medal, location,
                first_seen_at, fetched_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(rpid) DO UPDATE SET
                bvid = excluded.bvid,
                oid = excluded.oid,
                mid = excluded.mid,
                user = excluded.user,
                avatar = excluded.avatar,
                sex = excluded.sex,
                content = excluded.content,
                ctime = excluded.ctime,
                likes = excluded.likes,
                reply_count = excluded.reply_count,
                parent = excluded.parent,
                root = excluded.root,
                level = excluded.level,
                fans_medal = excluded.fans_medal,
                location = excluded.location,
                fetched_at = excluded.fetched_at
            "#,
        )
        .bind(comment.rpid)
        .bind(&comment.bvid)
        .bind(comment.oid)
        .bind(comment.mid)
        .bind(&comment.user)
        .bind(&comment.avatar)
        .bind(&comment.sex)
        .bind(&comment.content)
        .bind(comment.ctime)
        .bind(comment.likes)
        .bind(comment.reply_count)
        .bind(comment.parent)
        .bind(comment.root)
        .bind(comment.level)
        .bind(&comment.fans_medal)
        .bind(&comment.location)
        .bind(comment.first_seen_at)
        .bind(comment.fetched_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(if existing.is_some() {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Stored
        })
    }
}

#[async_trait]
impl CommentRepository for SqlxCommentRepository {
    async fn upsert_comment(&self, comment: &CommentDbModel) -> Result<UpsertOutcome> {
        retry_on_sqlite_busy("upsert_comment", || self.upsert_once(comment)).await
    }

    async fn upsert_metadata(&self, metadata: &VideoMetadataDbModel) -> Result<()> {
        retry_on_sqlite_busy("upsert_metadata", || async {
            sqlx::query(
                r#"
                INSERT INTO video_metadata (bvid, oid, title, comment_count, last_updated)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(bvid) DO UPDATE SET
                    oid = excluded.oid,
                    title = excluded.title,
                    comment_count = excluded.comment_count,
                    last_updated = excluded.last_updated
                "#,
            )
            .bind(&metadata.bvid)
            .bind(metadata.oid)
            .bind(&metadata.title)
            .bind(metadata.comment_count)
            .bind(metadata.last_updated)
            .execute(&self.write_pool)
            .await?;
            Ok(())
        })
        .await
    }

    async fn count_for_target(&self, bvid: &str) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM comments WHERE bvid = ?")
            .bind(bvid)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn find_by_rpid(&self, rpid: i64) -> Result<Option<CommentDbModel>> {
        let comment =
            sqlx::query_as::<_, CommentDbModel>("SELECT * FROM comments WHERE rpid = ?")
                .bind(rpid)
                .fetch_optional(&self.pool)
                .await?;
        Ok(comment)
    }

    async fn list_recent(&self, bvid: &str, limit: i64) -> Result<Vec<CommentDbModel>> {
        let comments = sqlx::query_as::<_, CommentDbModel>(
            r#"
            SELECT * FROM comments
            WHERE bvid = ?
            ORDER BY ctime DESC, rpid DESC
            LIMIT ?
            "#,
        )
        .bind(bvid)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(comments)
    }

    async fn find_metadata(&self, bvid: &str) -> Result<Option<VideoMetadataDbModel>> {
        let metadata = sqlx::query_as::<_, VideoMetadataDbModel>(
            "SELECT * FROM video_metadata WHERE bvid = ?",
        )
        .bind(bvid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(metadata)
    }
}
