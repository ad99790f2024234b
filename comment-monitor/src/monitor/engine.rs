//! Polling engine: history backfill followed by incremental polling.
//!
//! The engine owns its [`MonitorSession`] for its whole life. Cancellation is
//! observed at the top of every page or cycle and during every pause; a
//! request already in flight is allowed to finish.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use comment_source::{
    Comment, CommentOrder, CommentSource, CommentsPageRequest, LatestFeedRequest, MetadataRequest,
    SubCommentsPageRequest, VideoInfo,
};
use rand::random;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::dedup::{self, FeedScan};
use super::events::{CommentView, MonitorEvent, SessionEvents, StatusLevel};
use super::session::{MonitorSession, SessionPhase};
use super::sink::{BatchTarget, persist_batch};
use crate::database::CommentRepository;

/// Tuning knobs of the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Upper bound on top-level pages fetched during backfill.
    pub page_cap: u32,
    pub order: CommentOrder,
    pub expand_sub_comments: bool,
    pub sub_page_size: u32,
    /// Number of comments in the post-backfill snapshot.
    pub preview_size: usize,
    pub page_delay_min: Duration,
    pub page_delay_max: Duration,
    pub sub_page_delay: Duration,
    pub poll_interval: Duration,
    /// The poll interval varies uniformly by up to this much either way.
    pub poll_jitter: Duration,
    pub feed_scan: FeedScan,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            page_cap: 100,
            order: CommentOrder::Likes,
            expand_sub_comments: true,
            sub_page_size: 20,
            preview_size: 20,
            page_delay_min: Duration::from_millis(500),
            page_delay_max: Duration::from_millis(1500),
            sub_page_delay: Duration::from_millis(100),
            poll_interval: Duration::from_secs(10),
            poll_jitter: Duration::from_secs(2),
            feed_scan: FeedScan::StopAtFirstSeen,
        }
    }
}

impl EngineConfig {
    pub fn with_sub_comments(mut self, enabled: bool) -> Self {
        self.expand_sub_comments = enabled;
        self
    }

    fn page_delay(&self) -> Duration {
        let spread = self.page_delay_max.saturating_sub(self.page_delay_min);
        self.page_delay_min + spread.mul_f64(random::<f64>())
    }

    fn poll_delay(&self) -> Duration {
        let low = self.poll_interval.saturating_sub(self.poll_jitter);
        low + (self.poll_jitter * 2).mul_f64(random::<f64>())
    }
}

/// Resolved video, fixed for the rest of the session.
#[derive(Debug, Clone)]
struct Target {
    bvid: String,
    oid: u64,
    title: String,
}

impl Target {
    fn batch(&self) -> BatchTarget<'_> {
        BatchTarget {
            bvid: &self.bvid,
            oid: self.oid,
            title: &self.title,
        }
    }
}

pub struct PollingEngine {
    session: MonitorSession,
    source: Arc<dyn CommentSource>,
    repository: Arc<dyn CommentRepository>,
    events: SessionEvents,
    config: EngineConfig,
    cancel: CancellationToken,
}

impl PollingEngine {
    pub fn new(
        session: MonitorSession,
        source: Arc<dyn CommentSource>,
        repository: Arc<dyn CommentRepository>,
        events: SessionEvents,
        config: EngineConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            session,
            source,
            repository,
            events,
            config,
            cancel,
        }
    }

    /// Drive the session until it is cancelled or fails to initialize.
    ///
    /// Returns the session in the `Stopped` phase.
    pub async fn run(mut self) -> MonitorSession {
        info!(
            session = %self.session.id(),
            bvid = self.session.target(),
            accounts = self.session.pool().len(),
            platform = self.source.platform(),
            "monitor session starting"
        );

        if let Some(target) = self.initialize().await
            && self.backfill(&target).await.is_continue()
        {
            self.incremental(&target).await;
        }

        self.session.set_phase(SessionPhase::Stopped);
        info!(
            session = %self.session.id(),
            hwm = self.session.high_water_mark(),
            "monitor session stopped"
        );
        self.session
    }

    async fn initialize(&mut self) -> Option<Target> {
        self.session.set_phase(SessionPhase::Initializing);
        let request = MetadataRequest::new(self.session.target());
        let pool = Arc::clone(self.session.pool());

        match pool.send(&self.source, &request).await {
            Ok(video) => Some(self.connect(video)),
            Err(e) if e.is_cancelled() => None,
            Err(e) => {
                error!(bvid = self.session.target(), error = %e, "failed to resolve video");
                self.events.status(
                    StatusLevel::Error,
                    format!("Failed to load video info: {e}"),
                );
                None
            }
        }
    }

    fn connect(&mut self, video: VideoInfo) -> Target {
        let bvid = if video.bvid.is_empty() {
            self.session.target().to_string()
        } else {
            video.bvid
        };
        self.session.set_video(video.oid, video.title.clone());
        info!(bvid = %bvid, oid = video.oid, title = %video.title, "video resolved");

        self.events.emit(MonitorEvent::Connected {
            bvid: bvid.clone(),
            oid: video.oid,
            title: video.title.clone(),
            account_count: self.session.pool().len(),
        });
        self.events.status(
            StatusLevel::Info,
            format!(
                "Connected to \"{}\" with {} account(s)",
                video.title,
                self.session.pool().len()
            ),
        );

        Target {
            bvid,
            oid: video.oid,
            title: video.title,
        }
    }

    async fn backfill(&mut self, target: &Target) -> ControlFlow<()> {
        self.session.set_phase(SessionPhase::Backfilling);
        self.events
            .status(StatusLevel::Info, "Fetching comment history...");

        let ControlFlow::Continue(mut working) = self.fetch_top_level(target).await else {
            return ControlFlow::Break(());
        };
        let top_level = working.len();

        if self.config.expand_sub_comments {
            let roots: Vec<u64> = working
                .iter()
                .filter(|c| c.is_top_level() && c.has_replies())
                .map(|c| c.rpid)
                .collect();
            for root in roots {
                match self.fetch_replies(target.oid, root).await {
                    ControlFlow::Continue(replies) => working.extend(replies),
                    ControlFlow::Break(()) => return ControlFlow::Break(()),
                }
            }
        }

        let mut working = dedup::dedup_by_rpid(working);
        dedup::sort_by_creation(&mut working);
        self.session.advance_hwm(dedup::max_rpid(&working));

        let summary = persist_batch(self.repository.as_ref(), &target.batch(), &working).await;
        info!(
            bvid = %target.bvid,
            top_level,
            total = working.len(),
            saved = summary.saved,
            hwm = self.session.high_water_mark(),
            "history loaded"
        );

        let preview = dedup::latest_preview(&working, self.config.preview_size);
        self.events.emit(MonitorEvent::Snapshot {
            comments: CommentView::from_slice(&preview),
        });
        self.events.status(
            StatusLevel::Success,
            format!(
                "History loaded: {} comments, {} saved",
                working.len(),
                summary.saved
            ),
        );
        ControlFlow::Continue(())
    }

    /// Top-level pages until an empty page, the reported total, or the page cap.
    async fn fetch_top_level(&mut self, target: &Target) -> ControlFlow<(), Vec<Comment>> {
        let pool = Arc::clone(self.session.pool());
        let mut collected: Vec<Comment> = Vec::new();

        for page in 1..=self.config.page_cap {
            if self.cancel.is_cancelled() {
                return ControlFlow::Break(());
            }

            let request = CommentsPageRequest {
                oid: target.oid,
                order: self.config.order,
                page,
            };
            match pool.send(&self.source, &request).await {
                Ok(result) => {
                    if result.items.is_empty() {
                        debug!(page, "no more comments");
                        break;
                    }
                    collected.extend(result.items);
                    info!(
                        page,
                        fetched = collected.len(),
                        total = result.total_count,
                        "comment page fetched"
                    );
                    if collected.len() as u64 >= result.total_count {
                        break;
                    }
                }
                Err(e) if e.is_cancelled() => return ControlFlow::Break(()),
                Err(e) => {
                    warn!(page, error = %e, "history fetch interrupted");
                    self.events.status(
                        StatusLevel::Warning,
                        format!("History fetch stopped at page {page}: {e}"),
                    );
                    break;
                }
            }

            if page < self.config.page_cap && !self.pause(self.config.page_delay()).await {
                return ControlFlow::Break(());
            }
        }

        ControlFlow::Continue(collected)
    }

    /// Every reply under `root`, until a short or empty page.
    ///
    /// A failure ends the expansion of this root only.
    async fn fetch_replies(&mut self, oid: u64, root: u64) -> ControlFlow<(), Vec<Comment>> {
        let pool = Arc::clone(self.session.pool());
        let mut request = SubCommentsPageRequest {
            oid,
            root,
            page: 1,
            page_size: self.config.sub_page_size,
        };
        let mut replies: Vec<Comment> = Vec::new();

        while request.page <= self.config.page_cap {
            if self.cancel.is_cancelled() {
                return ControlFlow::Break(());
            }

            match pool.send(&self.source, &request).await {
                Ok(result) => {
                    let fetched = result.items.len();
                    replies.extend(result.items);
                    if fetched < request.page_size as usize {
                        break;
                    }
                }
                Err(e) if e.is_cancelled() => return ControlFlow::Break(()),
                Err(e) => {
                    warn!(root, page = request.page, error = %e, "reply fetch failed");
                    break;
                }
            }

            request = request.next_page();
            if !self.pause(self.config.sub_page_delay).await {
                return ControlFlow::Break(());
            }
        }

        debug!(root, replies = replies.len(), "replies expanded");
        ControlFlow::Continue(replies)
    }

    async fn incremental(&mut self, target: &Target) {
        self.session.set_phase(SessionPhase::Incremental);
        self.events
            .status(StatusLevel::Info, "Watching for new comments");
        let pool = Arc::clone(self.session.pool());
        let request = LatestFeedRequest { oid: target.oid };

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            match pool.send(&self.source, &request).await {
                Ok(feed) => self.absorb(target, &feed.items).await,
                Err(e) if e.is_cancelled() => break,
                Err(e) => {
                    warn!(bvid = %target.bvid, error = %e, "poll failed");
                    self.events
                        .status(StatusLevel::Warning, format!("Poll failed: {e}"));
                }
            }

            if !self.pause(self.config.poll_delay()).await {
                break;
            }
        }
    }

    /// Persist and broadcast the part of `feed` above the high-water mark.
    async fn absorb(&mut self, target: &Target, feed: &[Comment]) {
        let fresh = dedup::partition_new(feed, self.session.high_water_mark(), self.config.feed_scan);
        if fresh.is_empty() {
            return;
        }

        self.session.advance_hwm(dedup::max_rpid(&fresh));
        let summary = persist_batch(self.repository.as_ref(), &target.batch(), &fresh).await;
        info!(
            bvid = %target.bvid,
            new = fresh.len(),
            saved = summary.saved,
            hwm = self.session.high_water_mark(),
            "new comments"
        );

        self.events.emit(MonitorEvent::NewItems {
            comments: CommentView::from_slice(&fresh),
        });
    }

    /// Sleep for `duration`. Returns `false` if cancelled first.
    async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}
