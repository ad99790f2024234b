//! Database models.

mod comment;

pub use comment::{CommentDbModel, VideoMetadataDbModel};
