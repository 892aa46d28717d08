use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;

use super::events::{AppEvent, EventKind, RawNotification};
use super::filter::FilterState;
use super::log::ChangeLog;
use super::pipeline::{NotificationSink, Pipeline};
use crate::config::{MonitorConfig, WatchBackend, WatcherConfig};
use crate::error::{MonitorError, Result};

/// Snapshot of the current or most recent watch target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchSession {
    pub root_path: PathBuf,
    pub recursive: bool,
    pub active: bool,
}

/// Reassembles notify's rename halves into single `Renamed` notifications
/// and drops kinds the pipeline does not log.
pub struct RenameTracker {
    window: Duration,
    pending_from: Option<PendingFrom>,
    last_pair: Option<(PathBuf, PathBuf)>,
}

struct PendingFrom {
    path: PathBuf,
    tracker: Option<usize>,
    seen: Instant,
}

impl RenameTracker {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending_from: None,
            last_pair: None,
        }
    }

    pub fn translate(&mut self, event: Event) -> Vec<RawNotification> {
        let mut out = self.expire();

        match EventKind::classify(&event.kind) {
            EventKind::Created => {
                out.extend(event.paths.into_iter().map(RawNotification::Created));
            }
            EventKind::Deleted => {
                out.extend(event.paths.into_iter().map(RawNotification::Deleted));
            }
            EventKind::Modified => {
                out.extend(event.paths.into_iter().map(RawNotification::Modified));
            }
            EventKind::Renamed => self.translate_rename(event, &mut out),
            EventKind::Unknown => {
                tracing::trace!("Ignoring {:?} for {:?}", event.kind, event.paths);
            }
        }

        out
    }

    fn translate_rename(&mut self, event: Event, out: &mut Vec<RawNotification>) {
        let tracker = event.tracker();
        let mode = match event.kind {
            notify::EventKind::Modify(ModifyKind::Name(mode)) => mode,
            _ => RenameMode::Any,
        };
        let mut paths = event.paths;

        if paths.len() >= 2 {
            let to = paths.swap_remove(1);
            let from = paths.swap_remove(0);
            // inotify reports a matched move as `To` followed by `Both`
            if self.last_pair.as_ref() == Some(&(from.clone(), to.clone())) {
                self.last_pair = None;
                return;
            }
            if self.pending_from.as_ref().is_some_and(|p| p.path == from) {
                self.pending_from = None;
            }
            out.push(RawNotification::Renamed { from, to });
            return;
        }

        let Some(path) = paths.pop() else {
            return;
        };
        let is_from = match mode {
            RenameMode::From => true,
            RenameMode::To => false,
            // Single-path renames without a direction: the half that still
            // exists is the new name
            _ => !path.exists(),
        };

        if is_from {
            if let Some(previous) = self.pending_from.take() {
                out.push(RawNotification::Deleted(previous.path));
            }
            self.pending_from = Some(PendingFrom {
                path,
                tracker,
                seen: Instant::now(),
            });
            return;
        }

        let pairs = self.pending_from.as_ref().is_some_and(|pending| {
            pending.tracker.is_none() || tracker.is_none() || pending.tracker == tracker
        });
        let matched = if pairs { self.pending_from.take() } else { None };
        match matched {
            Some(pending) => {
                self.last_pair = Some((pending.path.clone(), path.clone()));
                out.push(RawNotification::Renamed {
                    from: pending.path,
                    to: path,
                });
            }
            // Moved in from outside the watched tree
            None => out.push(RawNotification::Created(path)),
        }
    }

    /// A rename-from that never found its rename-to within the window left
    /// the watched tree.
    pub fn expire(&mut self) -> Vec<RawNotification> {
        let expired = self
            .pending_from
            .as_ref()
            .is_some_and(|pending| pending.seen.elapsed() > self.window);
        if expired {
            self.drain()
        } else {
            Vec::new()
        }
    }

    /// Give up on any pending rename-from, reporting it as deleted.
    pub fn drain(&mut self) -> Vec<RawNotification> {
        self.last_pair = None;
        self.pending_from
            .take()
            .map(|pending| RawNotification::Deleted(pending.path))
            .into_iter()
            .collect()
    }
}

/// Expires pending rename halves while the tree is otherwise quiet.
struct RenameFlusher {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl RenameFlusher {
    fn spawn(tracker: Arc<Mutex<RenameTracker>>, sink: NotificationSink, period: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_clone = Arc::clone(&stop);

        let handle = thread::spawn(move || {
            while !stop_clone.load(Ordering::Acquire) {
                thread::park_timeout(period);
                let mut tracker = tracker.lock();
                for raw in tracker.expire() {
                    sink.deliver(raw);
                }
            }
        });

        Self {
            stop,
            handle: Some(handle),
        }
    }

    fn stop(mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            handle.thread().unpark();
            if handle.join().is_err() {
                tracing::warn!("Rename flusher thread panicked");
            }
        }
    }
}

/// One live subscription. Dropping it unsubscribes.
struct ActiveWatch {
    root: PathBuf,
    recursive: bool,
    sink: NotificationSink,
    tracker: Arc<Mutex<RenameTracker>>,
    flusher: RenameFlusher,
    watcher: Box<dyn Watcher + Send>,
}

impl ActiveWatch {
    fn close(mut self) {
        if let Err(err) = self.watcher.unwatch(&self.root) {
            tracing::debug!("Unwatch of {} failed: {}", self.root.display(), err);
        }
        self.flusher.stop();

        // A move out of the tree whose other half will never arrive
        {
            let mut tracker = self.tracker.lock();
            for raw in tracker.drain() {
                self.sink.deliver(raw);
            }
        }

        // Waits for in-flight deliveries and refuses later ones
        self.sink.close();
    }
}

#[derive(Default)]
struct ControllerState {
    active: Option<ActiveWatch>,
    last_target: Option<WatchSession>,
}

/// Owns the lifecycle of the single watch: `Idle -> Watching -> Idle`.
pub struct WatchController {
    config: WatcherConfig,
    pipeline: Pipeline,
    state: Mutex<ControllerState>,
}

impl WatchController {
    pub fn new(filter: Arc<FilterState>, log: Arc<ChangeLog>) -> Self {
        Self::with_config(WatcherConfig::default(), filter, log)
    }

    pub fn with_config(config: WatcherConfig, filter: Arc<FilterState>, log: Arc<ChangeLog>) -> Self {
        Self {
            config,
            pipeline: Pipeline::new(filter, log),
            state: Mutex::new(ControllerState::default()),
        }
    }

    /// Controller with its own filter and log, built from a full configuration.
    pub fn from_config(config: &MonitorConfig) -> Self {
        let filter = Arc::new(FilterState::from_kinds(config.filter.kinds.iter().copied()));
        Self::with_config(config.watcher.clone(), filter, Arc::new(ChangeLog::new()))
    }

    /// Start watching `root`. The subscription is live when this returns.
    pub fn start<P: AsRef<Path>>(&self, root: P, recursive: bool) -> Result<WatchSession> {
        let mut state = self.state.lock();
        if let Some(active) = &state.active {
            return Err(MonitorError::AlreadyWatching(active.root.clone()));
        }

        let root = validate_target(root.as_ref())?;

        if !self.config.subscribe_delay().is_zero() {
            thread::sleep(self.config.subscribe_delay());
        }

        // Held closed until the log is ready for the new session
        let sink = NotificationSink::closed(self.pipeline.clone());
        let tracker = Arc::new(Mutex::new(RenameTracker::new(self.config.rename_window())));
        let watcher = self.subscribe(&root, recursive, Arc::clone(&tracker), sink.clone())?;

        let new_target = state
            .last_target
            .as_ref()
            .map_or(true, |last| last.root_path != root);
        if new_target && !self.pipeline.log().is_empty() {
            tracing::info!("New watch target, clearing log");
            self.pipeline.log().clear();
        }
        sink.open();
        let flusher = RenameFlusher::spawn(
            Arc::clone(&tracker),
            sink.clone(),
            flush_period(self.config.rename_window()),
        );

        tracing::info!("Watching {} (recursive: {})", root.display(), recursive);
        self.pipeline.log().publish(AppEvent::WatchStarted {
            root: root.clone(),
            recursive,
        });

        let session = WatchSession {
            root_path: root.clone(),
            recursive,
            active: true,
        };
        state.last_target = Some(session.clone());
        state.active = Some(ActiveWatch {
            root,
            recursive,
            sink,
            tracker,
            flusher,
            watcher,
        });
        Ok(session)
    }

    /// Stop the active watch. No notification reaches the pipeline after
    /// this returns.
    pub fn stop(&self) -> Result<WatchSession> {
        let mut state = self.state.lock();
        let active = state.active.take().ok_or(MonitorError::NotWatching)?;
        let session = WatchSession {
            root_path: active.root.clone(),
            recursive: active.recursive,
            active: false,
        };
        active.close();

        tracing::info!("Stopped watching {}", session.root_path.display());
        self.pipeline.log().publish(AppEvent::WatchStopped {
            root: session.root_path.clone(),
        });
        state.last_target = Some(session.clone());
        Ok(session)
    }

    pub fn is_watching(&self) -> bool {
        self.state.lock().active.is_some()
    }

    /// The active session, or the last one if idle.
    pub fn session(&self) -> Option<WatchSession> {
        self.state.lock().last_target.clone()
    }

    /// Entry point of the active session, for injecting notifications from
    /// other sources through the same gate.
    pub fn sink(&self) -> Option<NotificationSink> {
        self.state.lock().active.as_ref().map(|active| active.sink.clone())
    }

    pub fn log(&self) -> &Arc<ChangeLog> {
        self.pipeline.log()
    }

    pub fn filter(&self) -> &Arc<FilterState> {
        self.pipeline.filter()
    }

    fn subscribe(
        &self,
        root: &Path,
        recursive: bool,
        tracker: Arc<Mutex<RenameTracker>>,
        sink: NotificationSink,
    ) -> Result<Box<dyn Watcher + Send>> {
        let handler = move |res: notify::Result<Event>| match res {
            Ok(event) => {
                tracing::trace!("Raw notification {:?}", event);
                let mut tracker = tracker.lock();
                for raw in tracker.translate(event) {
                    sink.deliver(raw);
                }
            }
            Err(err) => tracing::error!("File watcher error: {}", err),
        };

        let subscribe_err = |source| MonitorError::Subscribe {
            path: root.to_path_buf(),
            source,
        };

        let mut watcher: Box<dyn Watcher + Send> = match self.config.backend {
            WatchBackend::Native => Box::new(
                RecommendedWatcher::new(handler, notify::Config::default())
                    .map_err(subscribe_err)?,
            ),
            WatchBackend::Polling => Box::new(
                PollWatcher::new(
                    handler,
                    notify::Config::default().with_poll_interval(self.config.poll_interval()),
                )
                .map_err(subscribe_err)?,
            ),
        };

        let mode = if recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher.watch(root, mode).map_err(subscribe_err)?;
        Ok(watcher)
    }
}

impl Drop for WatchController {
    fn drop(&mut self) {
        if let Some(active) = self.state.get_mut().active.take() {
            active.close();
        }
    }
}

fn flush_period(window: Duration) -> Duration {
    (window / 4).clamp(Duration::from_millis(10), Duration::from_millis(100))
}

fn validate_target(root: &Path) -> Result<PathBuf> {
    if root.as_os_str().is_empty() {
        return Err(MonitorError::InvalidTarget("no directory selected".to_string()));
    }
    if !root.is_dir() {
        return Err(MonitorError::InvalidTarget(format!(
            "{} is not an existing directory",
            root.display()
        )));
    }
    root.canonicalize()
        .map_err(|err| MonitorError::InvalidTarget(format!("{}: {}", root.display(), err)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, RemoveKind};

    fn event(kind: notify::EventKind, paths: &[&str]) -> Event {
        paths
            .iter()
            .fold(Event::new(kind), |event, path| event.add_path(PathBuf::from(path)))
    }

    fn rename(mode: RenameMode, paths: &[&str], tracker: Option<usize>) -> Event {
        let event = event(notify::EventKind::Modify(ModifyKind::Name(mode)), paths);
        match tracker {
            Some(tracker) => event.set_tracker(tracker),
            None => event,
        }
    }

    fn controller() -> WatchController {
        let config = WatcherConfig {
            subscribe_delay_ms: 0,
            ..WatcherConfig::default()
        };
        WatchController::with_config(config, Arc::new(FilterState::all()), Arc::new(ChangeLog::new()))
    }

    #[test]
    fn test_translate_basic_kinds() {
        let mut tracker = RenameTracker::new(Duration::from_millis(500));

        assert_eq!(
            tracker.translate(event(notify::EventKind::Create(CreateKind::File), &["/s/a"])),
            vec![RawNotification::Created(PathBuf::from("/s/a"))]
        );
        assert_eq!(
            tracker.translate(event(
                notify::EventKind::Modify(ModifyKind::Data(DataChange::Any)),
                &["/s/a"]
            )),
            vec![RawNotification::Modified(PathBuf::from("/s/a"))]
        );
        assert_eq!(
            tracker.translate(event(notify::EventKind::Remove(RemoveKind::File), &["/s/a"])),
            vec![RawNotification::Deleted(PathBuf::from("/s/a"))]
        );
        assert!(tracker
            .translate(event(notify::EventKind::Access(notify::event::AccessKind::Any), &["/s/a"]))
            .is_empty());
    }

    #[test]
    fn test_inotify_style_rename_yields_one_record() {
        let mut tracker = RenameTracker::new(Duration::from_millis(500));

        assert!(tracker.translate(rename(RenameMode::From, &["/s/x.txt"], Some(7))).is_empty());
        assert_eq!(
            tracker.translate(rename(RenameMode::To, &["/s/y.txt"], Some(7))),
            vec![RawNotification::Renamed {
                from: PathBuf::from("/s/x.txt"),
                to: PathBuf::from("/s/y.txt"),
            }]
        );
        assert!(tracker
            .translate(rename(RenameMode::Both, &["/s/x.txt", "/s/y.txt"], Some(7)))
            .is_empty());
    }

    #[test]
    fn test_both_alone_is_a_rename() {
        let mut tracker = RenameTracker::new(Duration::from_millis(500));
        assert_eq!(
            tracker.translate(rename(RenameMode::Both, &["/s/a", "/s/b"], None)),
            vec![RawNotification::Renamed {
                from: PathBuf::from("/s/a"),
                to: PathBuf::from("/s/b"),
            }]
        );
    }

    #[test]
    fn test_unmatched_halves() {
        let mut tracker = RenameTracker::new(Duration::from_millis(500));

        // Moved in from outside
        assert_eq!(
            tracker.translate(rename(RenameMode::To, &["/s/in.txt"], Some(1))),
            vec![RawNotification::Created(PathBuf::from("/s/in.txt"))]
        );

        // Two consecutive froms: the first one left the tree
        tracker.translate(rename(RenameMode::From, &["/s/out1.txt"], Some(2)));
        assert_eq!(
            tracker.translate(rename(RenameMode::From, &["/s/out2.txt"], Some(3))),
            vec![RawNotification::Deleted(PathBuf::from("/s/out1.txt"))]
        );

        // Mismatched tracker does not pair
        assert_eq!(
            tracker.translate(rename(RenameMode::To, &["/s/other.txt"], Some(4))),
            vec![RawNotification::Created(PathBuf::from("/s/other.txt"))]
        );
    }

    #[test]
    fn test_expired_from_is_flushed_as_delete() {
        let mut tracker = RenameTracker::new(Duration::from_millis(10));
        tracker.translate(rename(RenameMode::From, &["/s/gone.txt"], Some(9)));
        thread::sleep(Duration::from_millis(30));

        let out = tracker.translate(event(notify::EventKind::Create(CreateKind::File), &["/s/new.txt"]));
        assert_eq!(
            out,
            vec![
                RawNotification::Deleted(PathBuf::from("/s/gone.txt")),
                RawNotification::Created(PathBuf::from("/s/new.txt")),
            ]
        );
    }

    #[test]
    fn test_expire_without_new_notifications() {
        let mut tracker = RenameTracker::new(Duration::from_millis(10));
        tracker.translate(rename(RenameMode::From, &["/s/moved.txt"], Some(3)));
        assert!(tracker.expire().is_empty());

        thread::sleep(Duration::from_millis(30));
        assert_eq!(
            tracker.expire(),
            vec![RawNotification::Deleted(PathBuf::from("/s/moved.txt"))]
        );
        assert!(tracker.expire().is_empty());
    }

    #[test]
    fn test_drain_gives_up_on_pending_from() {
        let mut tracker = RenameTracker::new(Duration::from_secs(60));
        assert!(tracker.drain().is_empty());

        tracker.translate(rename(RenameMode::From, &["/s/out.txt"], Some(5)));
        assert_eq!(
            tracker.drain(),
            vec![RawNotification::Deleted(PathBuf::from("/s/out.txt"))]
        );
        assert!(tracker.drain().is_empty());
    }

    #[test]
    fn test_flush_period_bounds() {
        assert_eq!(flush_period(Duration::from_millis(500)), Duration::from_millis(100));
        assert_eq!(flush_period(Duration::from_millis(200)), Duration::from_millis(50));
        assert_eq!(flush_period(Duration::ZERO), Duration::from_millis(10));
    }

    #[test]
    fn test_start_rejects_empty_and_missing_targets() {
        let controller = controller();

        assert!(matches!(controller.start("", true), Err(MonitorError::InvalidTarget(_))));
        assert!(matches!(
            controller.start("/nonexistent/webmonitor/root", true),
            Err(MonitorError::InvalidTarget(_))
        ));
        assert!(!controller.is_watching());
        assert!(controller.sink().is_none());
        assert!(controller.session().is_none());
    }

    #[test]
    fn test_start_rejects_a_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("index.html");
        std::fs::write(&file, "<html></html>").unwrap();

        let controller = controller();
        assert!(matches!(controller.start(&file, false), Err(MonitorError::InvalidTarget(_))));
    }

    #[test]
    fn test_state_machine() {
        let dir = tempfile::TempDir::new().unwrap();
        let controller = controller();

        assert!(matches!(controller.stop(), Err(MonitorError::NotWatching)));

        let session = controller.start(dir.path(), true).unwrap();
        assert!(session.active);
        assert!(controller.is_watching());

        assert!(matches!(
            controller.start(dir.path(), true),
            Err(MonitorError::AlreadyWatching(_))
        ));

        let stopped = controller.stop().unwrap();
        assert!(!stopped.active);
        assert_eq!(stopped.root_path, session.root_path);
        assert!(!controller.is_watching());
        assert!(matches!(controller.stop(), Err(MonitorError::NotWatching)));

        // The cycle repeats
        controller.start(dir.path(), false).unwrap();
        controller.stop().unwrap();
    }

    #[test]
    fn test_notification_after_stop_is_dropped() {
        let dir = tempfile::TempDir::new().unwrap();
        let controller = controller();
        controller.start(dir.path(), true).unwrap();

        let sink = controller.sink().unwrap();
        sink.deliver(RawNotification::Created(dir.path().join("a.txt"))).unwrap();
        controller.stop().unwrap();

        assert!(sink
            .deliver(RawNotification::Created(dir.path().join("b.txt")))
            .is_none());
        assert_eq!(controller.log().len(), 1);
        assert_eq!(controller.log().last_sequence(), 1);
    }

    #[test]
    fn test_each_start_gets_a_fresh_sink() {
        let dir = tempfile::TempDir::new().unwrap();
        let controller = controller();

        controller.start(dir.path(), true).unwrap();
        let first = controller.sink().unwrap();
        controller.stop().unwrap();

        controller.start(dir.path(), true).unwrap();
        let second = controller.sink().unwrap();

        assert!(!first.is_open());
        assert!(second.is_open());
        controller.stop().unwrap();
    }

    #[test]
    fn test_new_target_clears_log() {
        let first = tempfile::TempDir::new().unwrap();
        let second = tempfile::TempDir::new().unwrap();
        let controller = controller();

        controller.start(first.path(), true).unwrap();
        let sink = controller.sink().unwrap();
        sink.deliver(RawNotification::Created(first.path().join("a.txt")));
        sink.deliver(RawNotification::Created(first.path().join("b.txt")));
        controller.stop().unwrap();

        // Same target keeps numbering
        controller.start(first.path(), true).unwrap();
        assert_eq!(controller.log().len(), 2);
        controller.stop().unwrap();

        controller.start(second.path(), true).unwrap();
        assert!(controller.log().is_empty());
        let record = controller
            .sink()
            .unwrap()
            .deliver(RawNotification::Created(second.path().join("c.txt")))
            .unwrap();
        assert_eq!(record.sequence, 1);
        controller.stop().unwrap();
    }
}
