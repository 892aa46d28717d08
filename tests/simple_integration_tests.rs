use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use tempfile::TempDir;
use webmonitor::config::{MonitorConfig, WatcherConfig};
use webmonitor::core::{AppEvent, ChangeLog, EventKind, FilterState, RawNotification, WatchController};

fn quiet_controller() -> WatchController {
    let config = WatcherConfig {
        subscribe_delay_ms: 0,
        ..WatcherConfig::default()
    };
    WatchController::with_config(config, Arc::new(FilterState::all()), Arc::new(ChangeLog::new()))
}

#[test]
fn test_two_sources_produce_contiguous_sequences() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let controller = quiet_controller();
    controller.start(temp_dir.path(), true).unwrap();
    let sink = controller.sink().unwrap();

    let handles: Vec<_> = (0..2)
        .map(|source| {
            let sink = sink.clone();
            thread::spawn(move || {
                for i in 0..1000 {
                    let path = PathBuf::from(format!("/site/{}/{}.html", source, i));
                    sink.deliver(RawNotification::Modified(path));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    controller.stop().unwrap();

    let records = controller.log().snapshot();
    assert_eq!(records.len(), 2000);
    let mut sequences: Vec<u64> = records.iter().map(|r| r.sequence).collect();
    sequences.dedup();
    assert_eq!(sequences, (1..=2000).collect::<Vec<_>>());
}

#[test]
fn test_clear_restarts_numbering_mid_session() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let controller = quiet_controller();
    controller.start(temp_dir.path(), true).unwrap();
    let sink = controller.sink().unwrap();

    for name in ["a.txt", "b.txt", "c.txt"] {
        sink.deliver(RawNotification::Created(temp_dir.path().join(name)));
    }
    controller.log().clear();
    let record = sink
        .deliver(RawNotification::Deleted(temp_dir.path().join("a.txt")))
        .unwrap();
    controller.stop().unwrap();

    assert_eq!(record.sequence, 1);
    assert_eq!(record.file_name, "a.txt");
    assert_eq!(controller.log().len(), 1);
}

#[test]
fn test_only_created_enabled_ignores_deletes() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let mut config = MonitorConfig::default();
    config.watcher.subscribe_delay_ms = 0;
    config.filter.kinds = vec![EventKind::Created];
    let controller = WatchController::from_config(&config);

    controller.start(temp_dir.path(), true).unwrap();
    let sink = controller.sink().unwrap();
    sink.deliver(RawNotification::Created(temp_dir.path().join("a.txt")));
    let before = controller.log().last_sequence();

    assert!(sink
        .deliver(RawNotification::Deleted(temp_dir.path().join("a.txt")))
        .is_none());
    assert_eq!(controller.log().len(), 1);
    assert_eq!(controller.log().last_sequence(), before);
    controller.stop().unwrap();
}

#[test]
fn test_lifecycle_events_are_published_in_order() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let controller = quiet_controller();
    let rx = controller.log().subscribe_channel();

    let session = controller.start(temp_dir.path(), false).unwrap();
    controller
        .sink()
        .unwrap()
        .deliver(RawNotification::Renamed {
            from: temp_dir.path().join("old.html"),
            to: temp_dir.path().join("new.html"),
        });
    controller.stop().unwrap();

    let events: Vec<AppEvent> = rx.try_iter().collect();
    assert_eq!(events.len(), 3);
    assert!(matches!(
        &events[0],
        AppEvent::WatchStarted { root, recursive: false } if *root == session.root_path
    ));
    assert!(matches!(
        &events[1],
        AppEvent::RecordAppended(record) if record.file_name == "old.html→new.html"
    ));
    assert!(matches!(&events[2], AppEvent::WatchStopped { .. }));
}
