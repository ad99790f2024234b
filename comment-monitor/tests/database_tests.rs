//! Integration tests for the comment database layer.
//!
//! These tests use a real SQLite database (in-memory) to verify
//! repository operations work correctly with the actual schema.

use comment_monitor::database::models::{CommentDbModel, VideoMetadataDbModel};
use comment_monitor::database::{
    CommentRepository, DbPool, SqlxCommentRepository, UpsertOutcome, init_pool_with_size,
    run_migrations,
};
use comment_monitor::monitor::{BatchTarget, persist_batch};
use comment_source::Comment;

/// Helper to create a test database pool with migrations applied.
///
/// An in-memory database lives in a single connection, so the pool is capped at one.
async fn setup_test_db() -> DbPool {
    let pool = init_pool_with_size("sqlite::memory:", 1)
        .await
        .expect("Failed to create test pool");

    run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    pool
}

fn repository(pool: &DbPool) -> SqlxCommentRepository {
    SqlxCommentRepository::new(pool.clone(), pool.clone())
}

fn comment(rpid: u64, ctime: i64, content: &str) -> Comment {
    Comment {
        rpid,
        oid: 170001,
        mid: 42,
        user: "viewer".to_string(),
        avatar: "https://i0.hdslb.com/face.jpg".to_string(),
        content: content.to_string(),
        ctime,
        likes: 3,
        reply_count: 0,
        parent: 0,
        root: 0,
        sex: Some("保密".to_string()),
        level: Some(5),
        fans_medal: Some("medal".to_string()),
        location: Some("IP属地：上海".to_string()),
    }
}

fn row(rpid: u64, ctime: i64, content: &str) -> CommentDbModel {
    CommentDbModel::from_comment("BV17x411w7KC", &comment(rpid, ctime, content), 1_000)
}

#[tokio::test]
async fn migrations_create_tables() {
    let pool = setup_test_db().await;

    let tables: Vec<(String,)> =
        sqlx::query_as("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .fetch_all(&pool)
            .await
            .expect("Failed to query tables");
    let names: Vec<&str> = tables.iter().map(|t| t.0.as_str()).collect();

    assert!(names.contains(&"comments"), "comments table missing");
    assert!(names.contains(&"video_metadata"), "video_metadata table missing");
}

#[tokio::test]
async fn upsert_is_idempotent_and_keeps_latest_content() {
    let pool = setup_test_db().await;
    let repo = repository(&pool);

    let outcome = repo.upsert_comment(&row(1, 100, "first")).await.unwrap();
    assert_eq!(outcome, UpsertOutcome::Stored);

    let mut edited = row(1, 100, "edited");
    edited.likes = 99;
    edited.first_seen_at = 5_000;
    edited.fetched_at = 5_000;
    let outcome = repo.upsert_comment(&edited).await.unwrap();
    assert_eq!(outcome, UpsertOutcome::Updated);

    assert_eq!(repo.count_for_target("BV17x411w7KC").await.unwrap(), 1);
    let stored = repo.find_by_rpid(1).await.unwrap().unwrap();
    assert_eq!(stored.content, "edited");
    assert_eq!(stored.likes, 99);
    assert_eq!(stored.first_seen_at, 1_000);
    assert_eq!(stored.fetched_at, 5_000);
    assert_eq!(stored.location.as_deref(), Some("IP属地：上海"));
}

#[tokio::test]
async fn list_recent_is_newest_first() {
    let pool = setup_test_db().await;
    let repo = repository(&pool);

    for (rpid, ctime) in [(1, 10), (2, 30), (3, 20), (4, 30)] {
        repo.upsert_comment(&row(rpid, ctime, "c")).await.unwrap();
    }

    let recent = repo.list_recent("BV17x411w7KC", 3).await.unwrap();
    let ids: Vec<i64> = recent.iter().map(|c| c.rpid).collect();
    assert_eq!(ids, vec![4, 2, 3]);

    assert!(repo.list_recent("BVother", 10).await.unwrap().is_empty());
    assert!(repo.find_by_rpid(404).await.unwrap().is_none());
}

#[tokio::test]
async fn metadata_upsert_replaces_row() {
    let pool = setup_test_db().await;
    let repo = repository(&pool);

    let mut metadata = VideoMetadataDbModel {
        bvid: "BV17x411w7KC".to_string(),
        oid: 170001,
        title: "old title".to_string(),
        comment_count: 1,
        last_updated: 1,
    };
    repo.upsert_metadata(&metadata).await.unwrap();

    metadata.title = "new title".to_string();
    metadata.comment_count = 7;
    metadata.last_updated = 2;
    repo.upsert_metadata(&metadata).await.unwrap();

    let stored = repo.find_metadata("BV17x411w7KC").await.unwrap().unwrap();
    assert_eq!(stored, metadata);
    assert!(repo.find_metadata("BVmissing").await.unwrap().is_none());
}

#[tokio::test]
async fn persist_batch_reports_stored_and_updated() {
    let pool = setup_test_db().await;
    let repo = repository(&pool);
    let target = BatchTarget {
        bvid: "BV17x411w7KC",
        oid: 170001,
        title: "a video",
    };

    let first = persist_batch(&repo, &target, &[comment(1, 1, "a"), comment(2, 2, "b")]).await;
    assert_eq!((first.stored, first.updated), (2, 0));

    let second = persist_batch(&repo, &target, &[comment(2, 2, "b2"), comment(3, 3, "c")]).await;
    assert_eq!((second.stored, second.updated, second.saved), (1, 1, 2));

    let metadata = repo.find_metadata("BV17x411w7KC").await.unwrap().unwrap();
    assert_eq!(metadata.comment_count, 3);
    assert_eq!(metadata.title, "a video");
}
