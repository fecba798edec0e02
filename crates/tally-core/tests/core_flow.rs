use std::fs;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use tally_core::app::{App, AppSettings, Intent};
use tally_core::datastore::{FileKvStore, Hydration, TaskStore};
use tally_core::notify::{Level, RecordingNotifier};
use tally_core::task::Task;
use tempfile::tempdir;

fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 9, 30, 0)
        .single()
        .expect("valid now")
}

fn open_file_app(dir: &std::path::Path, notifier: &RecordingNotifier) -> App {
    let kv = FileKvStore::open(dir).expect("open kv");
    App::open(
        AppSettings::default(),
        TaskStore::new(Box::new(kv)),
        None,
        Arc::new(notifier.clone()),
    )
    .expect("open app")
    .with_clock(fixed_now)
}

#[test]
fn file_store_round_trip_keeps_order() {
    let temp = tempdir().expect("tempdir");
    let store = TaskStore::new(Box::new(FileKvStore::open(temp.path()).expect("open kv")));
    let day = NaiveDate::from_ymd_opt(2024, 1, 10).expect("valid day");

    let mut tasks = vec![
        Task::new("first".to_string(), day),
        Task::new("second".to_string(), day),
        Task::new("third".to_string(), day),
    ];
    tasks[1].completed = true;

    store.save(&tasks).expect("save");
    assert!(temp.path().join("todos.json").exists());

    match store.load().expect("load") {
        Hydration::Loaded(loaded) => assert_eq!(loaded, tasks),
        other => panic!("unexpected hydration: {other:?}"),
    }
}

#[test]
fn missing_file_hydrates_empty_without_notices() {
    let temp = tempdir().expect("tempdir");
    let notifier = RecordingNotifier::new();
    let app = open_file_app(temp.path(), &notifier);

    assert!(app.tasks().is_empty());
    assert!(notifier.notices().is_empty());
}

#[test]
fn corrupt_file_hydrates_empty_with_warning() {
    let temp = tempdir().expect("tempdir");
    fs::write(temp.path().join("todos.json"), "[{\"title\": 42").expect("seed corrupt store");

    let notifier = RecordingNotifier::new();
    let app = open_file_app(temp.path(), &notifier);

    assert!(app.tasks().is_empty());
    assert_eq!(notifier.count(Level::Warning), 1);
    assert_eq!(
        notifier.last().map(|notice| notice.message),
        Some("Unable to load saved todos. Starting with empty list.".to_string())
    );
}

#[test]
fn legacy_records_without_ids_still_load() {
    let temp = tempdir().expect("tempdir");
    fs::write(
        temp.path().join("todos.json"),
        r#"[{"title":"old","completed":true,"createdDate":"2023-12-01"}]"#,
    )
    .expect("seed legacy store");

    let notifier = RecordingNotifier::new();
    let app = open_file_app(temp.path(), &notifier);
    assert_eq!(app.tasks().len(), 1);
    assert!(app.tasks()[0].completed);
    assert_eq!(
        app.tasks()[0].created_date,
        NaiveDate::from_ymd_opt(2023, 12, 1).expect("valid day")
    );
}

#[tokio::test]
async fn edits_survive_a_restart() {
    let temp = tempdir().expect("tempdir");
    let notifier = RecordingNotifier::new();

    {
        let mut app = open_file_app(temp.path(), &notifier);
        for n in 1..=23 {
            app.dispatch(Intent::Add(format!("chore {n}")))
                .await
                .expect("add");
        }
        app.dispatch(Intent::Toggle("chore 2".to_string()))
            .await
            .expect("toggle");
        app.dispatch(Intent::Remove("chore 3".to_string()))
            .await
            .expect("remove");
        let id = app.tasks()[0].id;
        app.dispatch(Intent::RemoveId(id)).await.expect("remove by id");
    }

    let mut app = open_file_app(temp.path(), &notifier);
    assert_eq!(app.tasks().len(), 21);
    assert_eq!(app.tasks()[0].title, "chore 2");
    assert!(app.tasks()[0].completed);
    assert!(app.tasks().iter().all(|task| task.created_date
        == NaiveDate::from_ymd_opt(2024, 1, 15).expect("valid day")));

    app.dispatch(Intent::GoToPage(3)).await.expect("page");
    let page = app.current_page();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.info_line(), "Showing 21-21 of 21 todos");
    assert!(!page.has_next());
}
