use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use super::events::AppEvent;

/// Seconds since the timer started, advanced by a background ticker.
///
/// Independent of any watch session; the ticker only stops when the handle
/// is dropped.
pub struct ElapsedTimer {
    elapsed: Arc<AtomicU64>,
    stop: Arc<AtomicBool>,
}

impl ElapsedTimer {
    pub fn start(period: Duration) -> Self {
        Self::spawn(period, None)
    }

    /// Like [`ElapsedTimer::start`], also sending `AppEvent::Tick` on every tick.
    pub fn start_with_sender(period: Duration, sender: Sender<AppEvent>) -> Self {
        Self::spawn(period, Some(sender))
    }

    fn spawn(period: Duration, mut sender: Option<Sender<AppEvent>>) -> Self {
        let elapsed = Arc::new(AtomicU64::new(0));
        let stop = Arc::new(AtomicBool::new(false));
        let started = Instant::now();

        let elapsed_clone = Arc::clone(&elapsed);
        let stop_clone = Arc::clone(&stop);
        thread::spawn(move || {
            while !stop_clone.load(Ordering::Relaxed) {
                thread::sleep(period);
                let secs = started.elapsed().as_secs();
                let secs = elapsed_clone.fetch_max(secs, Ordering::AcqRel).max(secs);

                if let Some(tx) = &sender {
                    if tx.send(AppEvent::Tick(secs)).is_err() {
                        // Nobody is listening any more, keep counting
                        sender = None;
                    }
                }
            }
        });

        Self { elapsed, stop }
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed.load(Ordering::Acquire)
    }

    pub fn formatted(&self) -> String {
        format_elapsed(self.elapsed_secs())
    }
}

impl Drop for ElapsedTimer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

/// `"H hours M minutes S seconds"`
pub fn format_elapsed(secs: u64) -> String {
    format!(
        "{} hours {} minutes {} seconds",
        secs / 3600,
        (secs % 3600) / 60,
        secs % 60
    )
}
