//! The remote comment source boundary.
//!
//! Every remote call is expressed as a small request value implementing
//! [`SourceRequest`]. A retry layer only needs to know how to hand a
//! credential to `send`, not which endpoint is behind it.

use async_trait::async_trait;

use crate::credential::Credential;
use crate::error::Result;
use crate::models::{CommentOrder, CommentPage, LatestFeed, SubCommentPage, VideoInfo};

/// Credential-parameterized access to a remote comment API.
#[async_trait]
pub trait CommentSource: Send + Sync {
    /// Platform identifier, used in logs.
    fn platform(&self) -> &'static str;

    /// Resolve the target (BV id or `av` id) to its numeric id and title.
    async fn fetch_metadata(&self, credential: &Credential, target: &str) -> Result<VideoInfo>;

    /// Fetch one page of top-level comments.
    async fn fetch_comments_page(
        &self,
        credential: &Credential,
        request: &CommentsPageRequest,
    ) -> Result<CommentPage>;

    /// Fetch one page of replies under a root comment.
    async fn fetch_sub_comments_page(
        &self,
        credential: &Credential,
        request: &SubCommentsPageRequest,
    ) -> Result<SubCommentPage>;

    /// Fetch the newest window of the time-ordered feed.
    async fn fetch_latest_feed(
        &self,
        credential: &Credential,
        request: &LatestFeedRequest,
    ) -> Result<LatestFeed>;
}

/// A remote operation bundled with its arguments, awaiting a credential.
#[async_trait]
pub trait SourceRequest: Clone + Send + Sync + 'static {
    type Output: Send + 'static;

    /// Operation name for logs.
    fn operation(&self) -> &'static str;

    async fn send(
        &self,
        source: &dyn CommentSource,
        credential: &Credential,
    ) -> Result<Self::Output>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRequest {
    pub target: String,
}

impl MetadataRequest {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }
}

#[async_trait]
impl SourceRequest for MetadataRequest {
    type Output = VideoInfo;

    fn operation(&self) -> &'static str {
        "fetch_metadata"
    }

    async fn send(&self, source: &dyn CommentSource, credential: &Credential) -> Result<VideoInfo> {
        source.fetch_metadata(credential, &self.target).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentsPageRequest {
    pub oid: u64,
    pub order: CommentOrder,
    /// 1-based page index.
    pub page: u32,
}

#[async_trait]
impl SourceRequest for CommentsPageRequest {
    type Output = CommentPage;

    fn operation(&self) -> &'static str {
        "fetch_comments_page"
    }

    async fn send(
        &self,
        source: &dyn CommentSource,
        credential: &Credential,
    ) -> Result<CommentPage> {
        source.fetch_comments_page(credential, self).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubCommentsPageRequest {
    pub oid: u64,
    /// `rpid` of the root comment.
    pub root: u64,
    /// 1-based page index.
    pub page: u32,
    pub page_size: u32,
}

impl SubCommentsPageRequest {
    /// The request for the following page.
    pub fn next_page(self) -> Self {
        Self {
            page: self.page + 1,
            ..self
        }
    }
}

#[async_trait]
impl SourceRequest for SubCommentsPageRequest {
    type Output = SubCommentPage;

    fn operation(&self) -> &'static str {
        "fetch_sub_comments_page"
    }

    async fn send(
        &self,
        source: &dyn CommentSource,
        credential: &Credential,
    ) -> Result<SubCommentPage> {
        source.fetch_sub_comments_page(credential, self).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatestFeedRequest {
    pub oid: u64,
}

#[async_trait]
impl SourceRequest for LatestFeedRequest {
    type Output = LatestFeed;

    fn operation(&self) -> &'static str {
        "fetch_latest_feed"
    }

    async fn send(&self, source: &dyn CommentSource, credential: &Credential) -> Result<LatestFeed> {
        source.fetch_latest_feed(credential, self).await
    }
}
