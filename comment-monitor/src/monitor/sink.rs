//! Writes comment batches through the repository.

use comment_source::Comment;
use serde::Serialize;
use tracing::{debug, warn};

use crate::database::models::{CommentDbModel, VideoMetadataDbModel};
use crate::database::time::now_ms;
use crate::database::{CommentRepository, UpsertOutcome};

/// Video a batch belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchTarget<'a> {
    pub bvid: &'a str,
    pub oid: u64,
    pub title: &'a str,
}

/// Counts of one persisted batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    /// Comments written, `stored + updated`.
    pub saved: usize,
    pub stored: usize,
    pub updated: usize,
    pub failed: usize,
}

/// Upsert `comments`, then refresh the metadata row of the target.
///
/// A comment that fails to persist is logged and skipped. A metadata refresh
/// failure is logged and does not affect the returned counts.
pub async fn persist_batch(
    repository: &dyn CommentRepository,
    target: &BatchTarget<'_>,
    comments: &[Comment],
) -> BatchSummary {
    let mut summary = BatchSummary::default();
    if comments.is_empty() {
        return summary;
    }

    let now = now_ms();
    for comment in comments {
        let row = CommentDbModel::from_comment(target.bvid, comment, now);
        match repository.upsert_comment(&row).await {
            Ok(UpsertOutcome::Stored) => summary.stored += 1,
            Ok(UpsertOutcome::Updated) => summary.updated += 1,
            Err(e) => {
                warn!(rpid = comment.rpid, error = %e, "failed to persist comment");
                summary.failed += 1;
            }
        }
    }
    summary.saved = summary.stored + summary.updated;

    match repository.count_for_target(target.bvid).await {
        Ok(comment_count) => {
            let metadata = VideoMetadataDbModel {
                bvid: target.bvid.to_string(),
                oid: target.oid as i64,
                title: target.title.to_string(),
                comment_count,
                last_updated: now_ms(),
            };
            if let Err(e) = repository.upsert_metadata(&metadata).await {
                warn!(bvid = target.bvid, error = %e, "failed to update video metadata");
            }
        }
        Err(e) => warn!(bvid = target.bvid, error = %e, "failed to count stored comments"),
    }

    debug!(
        bvid = target.bvid,
        stored = summary.stored,
        updated = summary.updated,
        failed = summary.failed,
        "batch persisted"
    );
    summary
}
