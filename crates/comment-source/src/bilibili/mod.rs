//! Bilibili implementation of the comment source.

mod client;
mod response;
mod target;
mod wbi;

pub use client::{BilibiliCommentClient, DEFAULT_UA, default_client, install_rustls_provider};
pub use target::TargetId;
