//! Repository layer for database access.

pub mod comment;

pub use comment::{CommentRepository, SqlxCommentRepository, UpsertOutcome};
