use chrono::Duration;
use storage::repository::{ProgressRepository, Storage, StorageError, StorageKind};
use storage::sqlite::SqliteRepository;
use watch_core::engine::{MergePolicy, ProgressUpdate, ingest};
use watch_core::model::{Interval, ProgressKey, ProgressRecord, UserId, VideoId};
use watch_core::time::fixed_now;

fn key(user: &str, video: &str) -> ProgressKey {
    ProgressKey::new(UserId::new(user).unwrap(), VideoId::new(video).unwrap())
}

fn report(
    existing: Option<&ProgressRecord>,
    key: ProgressKey,
    intervals: &[(f64, f64)],
    minutes: i64,
) -> ProgressRecord {
    let update = ProgressUpdate {
        key,
        intervals: intervals
            .iter()
            .map(|&(s, e)| Interval::new(s, e).unwrap())
            .collect(),
        video_duration: 100.0,
        current_time: None,
    };
    ingest(
        existing,
        &update,
        MergePolicy::strict(),
        fixed_now() + Duration::minutes(minutes),
    )
    .unwrap()
}

#[tokio::test]
async fn sqlite_roundtrip_preserves_record() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_roundtrip?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let record = report(None, key("u1", "v1"), &[(0.0, 15.0), (20.0, 25.5)], 0);
    repo.put_progress(&record).await.unwrap();

    let fetched = repo
        .get_progress(record.key())
        .await
        .expect("fetch")
        .expect("record present");
    assert_eq!(fetched, record);
    assert_eq!(fetched.intervals().len(), 2);

    let missing = repo.get_progress(&key("u1", "other")).await.unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn sqlite_upsert_replaces_by_key() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_upsert?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let first = report(None, key("u1", "v1"), &[(0.0, 50.0)], 0);
    repo.put_progress(&first).await.unwrap();

    let second = report(Some(&first), key("u1", "v1"), &[(40.0, 120.0)], 1);
    repo.put_progress(&second).await.unwrap();

    let all = repo
        .list_user_progress(&UserId::new("u1").unwrap())
        .await
        .unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].intervals(), &[Interval::new(0.0, 120.0).unwrap()]);
    assert_eq!(all[0].progress_percent(), 100.0);
}

#[tokio::test]
async fn sqlite_lists_user_records_newest_first() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_list?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    repo.put_progress(&report(None, key("u1", "a"), &[(0.0, 10.0)], 0))
        .await
        .unwrap();
    repo.put_progress(&report(None, key("u1", "b"), &[(0.0, 10.0)], 3))
        .await
        .unwrap();
    repo.put_progress(&report(None, key("u2", "c"), &[(0.0, 10.0)], 7))
        .await
        .unwrap();

    let listed = repo
        .list_user_progress(&UserId::new("u1").unwrap())
        .await
        .unwrap();
    let videos: Vec<&str> = listed.iter().map(|r| r.video_id().as_str()).collect();
    assert_eq!(videos, vec!["b", "a"]);

    let empty = repo
        .list_user_progress(&UserId::new("u3").unwrap())
        .await
        .unwrap();
    assert!(empty.is_empty());
}

#[tokio::test]
async fn sqlite_migrations_are_repeatable() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_migrate?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("first migrate");
    repo.migrate().await.expect("second migrate");
}

#[tokio::test]
async fn sqlite_corrupt_row_surfaces_serialization_error() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_corrupt?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    sqlx::query(
        r#"
            INSERT INTO progress_records (
                user_id, video_id, intervals, video_duration,
                last_watched_position, progress_percent, updated_at
            )
            VALUES (
                'u1', 'v1', '[{"start":10,"end":20},{"start":0,"end":5}]',
                100, 0, 15, ?1
            )
        "#,
    )
    .bind(fixed_now())
    .execute(repo.pool())
    .await
    .unwrap();

    let err = repo.get_progress(&key("u1", "v1")).await.unwrap_err();
    assert!(matches!(err, StorageError::Serialization(_)));
}

#[tokio::test]
async fn storage_sqlite_reports_kind() {
    let storage = Storage::sqlite("sqlite:file:memdb_storage?mode=memory&cache=shared")
        .await
        .expect("storage");
    assert_eq!(storage.kind, StorageKind::Sqlite);
    assert!(
        storage
            .progress
            .get_progress(&key("u", "v"))
            .await
            .unwrap()
            .is_none()
    );
}
