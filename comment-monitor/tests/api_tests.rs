//! Router tests for the control surface.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use comment_monitor::api::{ApiServer, ApiServerConfig, AppState};
use comment_monitor::database::models::CommentDbModel;
use comment_monitor::database::{
    CommentRepository, SqlxCommentRepository, init_pool_with_size, run_migrations,
};
use comment_monitor::hub::BroadcastHub;
use comment_monitor::monitor::MonitorController;
use comment_source::{
    Comment, CommentPage, CommentSource, CommentsPageRequest, Credential, LatestFeed,
    LatestFeedRequest, SubCommentPage, SubCommentsPageRequest, VideoInfo,
};
use serde_json::{Value, json};
use tower::ServiceExt;

/// Answers every call immediately with a fixed video and empty pages.
struct QuietSource;

#[async_trait]
impl CommentSource for QuietSource {
    fn platform(&self) -> &'static str {
        "quiet"
    }

    async fn fetch_metadata(
        &self,
        _credential: &Credential,
        target: &str,
    ) -> comment_source::Result<VideoInfo> {
        Ok(VideoInfo {
            oid: 170001,
            bvid: target.to_string(),
            title: "quiet video".to_string(),
            total_count: Some(0),
        })
    }

    async fn fetch_comments_page(
        &self,
        _credential: &Credential,
        _request: &CommentsPageRequest,
    ) -> comment_source::Result<CommentPage> {
        Ok(CommentPage::default())
    }

    async fn fetch_sub_comments_page(
        &self,
        _credential: &Credential,
        _request: &SubCommentsPageRequest,
    ) -> comment_source::Result<SubCommentPage> {
        Ok(SubCommentPage::default())
    }

    async fn fetch_latest_feed(
        &self,
        _credential: &Credential,
        _request: &LatestFeedRequest,
    ) -> comment_source::Result<LatestFeed> {
        Ok(LatestFeed::default())
    }
}

struct TestApp {
    router: Router,
    repository: Arc<dyn CommentRepository>,
}

async fn setup_app() -> TestApp {
    let pool = init_pool_with_size("sqlite::memory:", 1)
        .await
        .expect("Failed to create test pool");
    run_migrations(&pool).await.expect("Failed to run migrations");

    let repository: Arc<dyn CommentRepository> =
        Arc::new(SqlxCommentRepository::new(pool.clone(), pool));
    let controller = Arc::new(
        MonitorController::new(
            Arc::new(QuietSource),
            Arc::clone(&repository),
            Arc::new(BroadcastHub::new()),
        )
        .with_stop_timeout(Duration::from_secs(1)),
    );

    let server = ApiServer::new(
        ApiServerConfig::default(),
        AppState::new(controller, Arc::clone(&repository)),
    );
    TestApp {
        router: server.build_router(),
        repository,
    }
}

async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn health_reports_version() {
    let app = setup_app().await;
    let (status, body) = send(&app.router, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn idle_status_and_stop() {
    let app = setup_app().await;

    let (status, body) = send(&app.router, "GET", "/api/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["running"], false);
    assert_eq!(body["subscribers"], 0);

    let (status, body) = send(&app.router, "POST", "/api/stop", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "not_running" }));
}

#[tokio::test]
async fn start_without_cookies_is_config_error() {
    let app = setup_app().await;

    let (status, body) = send(
        &app.router,
        "POST",
        "/api/start",
        Some(json!({ "bvid": "BV17x411w7KC" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "CONFIG_ERROR");
}

#[tokio::test]
async fn start_twice_then_stop() {
    let app = setup_app().await;
    let start = json!({
        "bvid": "BV17x411w7KC",
        "cookies": [{ "sessdata": "one" }, { "sessdata": "two", "buvid3": "b" }],
        "fetch_sub_comments": false
    });

    let (status, body) = send(&app.router, "POST", "/api/start", Some(start.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "started");
    assert_eq!(body["account_count"], 2);
    assert!(body["session_id"].is_string());

    let (status, body) = send(&app.router, "POST", "/api/start", Some(start)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "already_running" }));

    let (_, body) = send(&app.router, "GET", "/api/status", None).await;
    assert_eq!(body["running"], true);
    assert_eq!(body["bvid"], "BV17x411w7KC");
    assert_eq!(body["account_count"], 2);

    let (status, body) = send(&app.router, "POST", "/api/stop", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "stopped" }));

    let (_, body) = send(&app.router, "GET", "/api/status", None).await;
    assert_eq!(body["running"], false);
}

#[tokio::test]
async fn legacy_single_account_start() {
    let app = setup_app().await;

    let (status, body) = send(
        &app.router,
        "POST",
        "/api/start",
        Some(json!({ "bvid": "BV17x411w7KC", "sessdata": "legacy" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["account_count"], 1);

    send(&app.router, "POST", "/api/stop", None).await;
}

#[tokio::test]
async fn lists_stored_comments() {
    let app = setup_app().await;
    for (rpid, ctime) in [(1u64, 10i64), (2, 20), (3, 30)] {
        let comment = Comment {
            rpid,
            oid: 170001,
            mid: 7,
            user: "viewer".to_string(),
            avatar: String::new(),
            content: format!("comment {rpid}"),
            ctime,
            likes: 0,
            reply_count: 0,
            parent: 0,
            root: 0,
            sex: None,
            level: Some(4),
            fans_medal: None,
            location: None,
        };
        app.repository
            .upsert_comment(&CommentDbModel::from_comment("BV17x411w7KC", &comment, 1))
            .await
            .unwrap();
    }

    let (status, body) = send(&app.router, "GET", "/api/comments/BV17x411w7KC?limit=2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["bvid"], "BV17x411w7KC");
    assert!(body["metadata"].is_null());
    let comments = body["comments"].as_array().unwrap();
    assert_eq!(comments.len(), 2);
    assert_eq!(comments[0]["rpid"], 3);
    assert_eq!(comments[1]["content"], "comment 2");
}
