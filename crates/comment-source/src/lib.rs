//! Credentialed access to remote video comment feeds.
//!
//! [`CommentSource`] is the boundary consumed by the monitor. Each remote
//! operation is also available as a [`SourceRequest`] value so a caller can
//! retry it against several credentials without knowing the endpoint.

pub mod bilibili;
pub mod credential;
pub mod error;
pub mod models;
pub mod source;

pub use credential::Credential;
pub use error::{Result, SourceError};
pub use models::{Comment, CommentOrder, CommentPage, LatestFeed, SubCommentPage, VideoInfo};
pub use source::{
    CommentSource, CommentsPageRequest, LatestFeedRequest, MetadataRequest, SourceRequest,
    SubCommentsPageRequest,
};
