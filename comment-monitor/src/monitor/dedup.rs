//! Ordering and deduplication of comment batches.

use std::collections::HashMap;

use comment_source::Comment;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// How the incremental feed is split into new and seen comments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedScan {
    /// Scan in feed order and stop at the first comment at or below the
    /// high-water mark. Relies on the feed being most-recent-first.
    #[default]
    StopAtFirstSeen,
    /// Keep every comment above the high-water mark, wherever it sits.
    FullPage,
}

/// Sort ascending by creation time, ties broken by `rpid`.
pub fn sort_by_creation(comments: &mut [Comment]) {
    comments.sort_by(|a, b| a.ctime.cmp(&b.ctime).then(a.rpid.cmp(&b.rpid)));
}

/// Largest `rpid` in `comments`, or 0.
pub fn max_rpid(comments: &[Comment]) -> u64 {
    comments.iter().map(|c| c.rpid).max().unwrap_or(0)
}

/// Drop repeated `rpid`s, keeping the last occurrence at the position of the first.
pub fn dedup_by_rpid(comments: Vec<Comment>) -> Vec<Comment> {
    let mut index: HashMap<u64, usize> = HashMap::with_capacity(comments.len());
    let mut unique: Vec<Comment> = Vec::with_capacity(comments.len());

    for comment in comments {
        match index.get(&comment.rpid) {
            Some(&pos) => unique[pos] = comment,
            None => {
                index.insert(comment.rpid, unique.len());
                unique.push(comment);
            }
        }
    }
    unique
}

/// The `n` most recent comments, most recent first, ties broken by higher `rpid`.
pub fn latest_preview(comments: &[Comment], n: usize) -> Vec<Comment> {
    let mut sorted = comments.to_vec();
    sorted.sort_by(|a, b| b.ctime.cmp(&a.ctime).then(b.rpid.cmp(&a.rpid)));
    sorted.truncate(n);
    sorted
}

/// Split a most-recent-first feed page into comments newer than `hwm`.
///
/// The result is oldest first, ready for broadcast.
pub fn partition_new(feed: &[Comment], hwm: u64, scan: FeedScan) -> Vec<Comment> {
    let mut fresh: Vec<Comment> = match scan {
        FeedScan::StopAtFirstSeen => {
            let stop = feed.iter().position(|c| c.rpid <= hwm).unwrap_or(feed.len());
            let skipped = feed[stop..].iter().filter(|c| c.rpid > hwm).count();
            if skipped > 0 {
                warn!(
                    hwm,
                    skipped, "feed out of order: unseen comments after the first seen one"
                );
            }
            feed[..stop].to_vec()
        }
        FeedScan::FullPage => feed.iter().filter(|c| c.rpid > hwm).cloned().collect(),
    };
    fresh.reverse();
    fresh
}
