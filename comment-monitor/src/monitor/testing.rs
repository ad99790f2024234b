//! In-memory collaborators for engine and controller tests.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use comment_source::{
    CommentPage, CommentSource, CommentsPageRequest, Credential, LatestFeed, LatestFeedRequest,
    SourceError, SubCommentPage, SubCommentsPageRequest, VideoInfo,
};

use crate::database::models::{CommentDbModel, VideoMetadataDbModel};
use crate::database::{CommentRepository, UpsertOutcome};
use crate::{Error, Result};

type SourceResult<T> = std::result::Result<T, SourceError>;

/// A source answering from per-operation queues.
///
/// An exhausted queue answers with an empty page, and metadata defaults to a
/// fixed video.
#[derive(Default)]
pub struct ScriptedSource {
    metadata: Mutex<VecDeque<SourceResult<VideoInfo>>>,
    pages: Mutex<VecDeque<SourceResult<CommentPage>>>,
    sub_pages: Mutex<HashMap<u64, VecDeque<SourceResult<SubCommentPage>>>>,
    feeds: Mutex<VecDeque<SourceResult<LatestFeed>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedSource {
    pub fn video() -> VideoInfo {
        VideoInfo {
            oid: 170001,
            bvid: "BV17x411w7KC".into(),
            title: "scripted video".into(),
            total_count: None,
        }
    }

    pub fn push_metadata(&self, result: SourceResult<VideoInfo>) -> &Self {
        self.metadata.lock().unwrap().push_back(result);
        self
    }

    pub fn push_page(&self, result: SourceResult<CommentPage>) -> &Self {
        self.pages.lock().unwrap().push_back(result);
        self
    }

    pub fn push_sub_page(&self, root: u64, result: SourceResult<SubCommentPage>) -> &Self {
        self.sub_pages
            .lock()
            .unwrap()
            .entry(root)
            .or_default()
            .push_back(result);
        self
    }

    pub fn push_feed(&self, result: SourceResult<LatestFeed>) -> &Self {
        self.feeds.lock().unwrap().push_back(result);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl CommentSource for ScriptedSource {
    fn platform(&self) -> &'static str {
        "scripted"
    }

    async fn fetch_metadata(&self, _credential: &Credential, target: &str) -> SourceResult<VideoInfo> {
        self.record(format!("metadata {target}"));
        self.metadata
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Self::video()))
    }

    async fn fetch_comments_page(
        &self,
        _credential: &Credential,
        request: &CommentsPageRequest,
    ) -> SourceResult<CommentPage> {
        self.record(format!("page {}", request.page));
        self.pages
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(CommentPage::default()))
    }

    async fn fetch_sub_comments_page(
        &self,
        _credential: &Credential,
        request: &SubCommentsPageRequest,
    ) -> SourceResult<SubCommentPage> {
        self.record(format!("sub {} {}", request.root, request.page));
        self.sub_pages
            .lock()
            .unwrap()
            .get_mut(&request.root)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Ok(SubCommentPage::default()))
    }

    async fn fetch_latest_feed(
        &self,
        _credential: &Credential,
        _request: &LatestFeedRequest,
    ) -> SourceResult<LatestFeed> {
        self.record("feed".to_string());
        self.feeds
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(LatestFeed::default()))
    }
}

/// Repository keeping rows in memory.
#[derive(Default)]
pub struct MemoryRepository {
    comments: Mutex<BTreeMap<i64, CommentDbModel>>,
    metadata: Mutex<HashMap<String, VideoMetadataDbModel>>,
    failing: Mutex<HashSet<i64>>,
    upserts: Mutex<usize>,
}

impl MemoryRepository {
    /// Make every upsert of `rpid` fail.
    pub fn fail_rpid(&self, rpid: i64) {
        self.failing.lock().unwrap().insert(rpid);
    }

    pub fn stored_ids(&self) -> Vec<i64> {
        self.comments.lock().unwrap().keys().copied().collect()
    }

    pub fn upsert_count(&self) -> usize {
        *self.upserts.lock().unwrap()
    }

    pub fn metadata(&self, bvid: &str) -> Option<VideoMetadataDbModel> {
        self.metadata.lock().unwrap().get(bvid).cloned()
    }
}

#[async_trait]
impl CommentRepository for MemoryRepository {
    async fn upsert_comment(&self, comment: &CommentDbModel) -> Result<UpsertOutcome> {
        if self.failing.lock().unwrap().contains(&comment.rpid) {
            return Err(Error::Other(format!("cannot store {}", comment.rpid)));
        }
        *self.upserts.lock().unwrap() += 1;
        let previous = self
            .comments
            .lock()
            .unwrap()
            .insert(comment.rpid, comment.clone());
        Ok(if previous.is_some() {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Stored
        })
    }

    async fn upsert_metadata(&self, metadata: &VideoMetadataDbModel) -> Result<()> {
        self.metadata
            .lock()
            .unwrap()
            .insert(metadata.bvid.clone(), metadata.clone());
        Ok(())
    }

    async fn count_for_target(&self, bvid: &str) -> Result<i64> {
        Ok(self
            .comments
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.bvid == bvid)
            .count() as i64)
    }

    async fn find_by_rpid(&self, rpid: i64) -> Result<Option<CommentDbModel>> {
        Ok(self.comments.lock().unwrap().get(&rpid).cloned())
    }

    async fn list_recent(&self, bvid: &str, limit: i64) -> Result<Vec<CommentDbModel>> {
        let mut rows: Vec<CommentDbModel> = self
            .comments
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.bvid == bvid)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.ctime.cmp(&a.ctime).then(b.rpid.cmp(&a.rpid)));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn find_metadata(&self, bvid: &str) -> Result<Option<VideoMetadataDbModel>> {
        Ok(self.metadata(bvid))
    }
}
