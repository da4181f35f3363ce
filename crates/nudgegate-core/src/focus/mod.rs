//! Focus State Monitor: turns polled frontmost-app snapshots into
//! durable focus sessions and enrichment signals.
//!
//! The monitor is a state machine driven by [`FocusMonitor::tick`] (or
//! [`FocusMonitor::handle_snapshot`] directly): unchanged identity
//! advances the no-progress clock, a title change resets it, an identity
//! change closes the open event and counts a switch. Signals are purely
//! for enrichment, never for safety decisions.

mod provider;
mod state;

pub use provider::{SnapshotError, SnapshotProvider};
pub use state::{
    derive_focus_state, NoProgressTracker, SwitchWindow, DEFAULT_NO_PROGRESS_HOLD_MS,
    DEFAULT_SWITCH_WINDOW_MS,
};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use tracing::{error, warn};

use crate::error::{DatabaseError, FocusError};
use crate::model::{FocusCurrent, FocusEvent, FocusSnapshot};
use crate::settings::keys;
use crate::storage::Database;

const DEFAULT_POLL_INTERVAL: StdDuration = StdDuration::from_secs(1);

struct MonitorState {
    last: Option<FocusEvent>,
    last_title: String,
    switches: SwitchWindow,
    no_progress: NoProgressTracker,
}

impl MonitorState {
    fn new(switch_window_ms: i64, no_progress_hold_ms: i64) -> Self {
        Self {
            last: None,
            last_title: String::new(),
            switches: SwitchWindow::new(switch_window_ms),
            no_progress: NoProgressTracker::new(no_progress_hold_ms),
        }
    }
}

/// Rolling-window monitor over frontmost-application snapshots.
///
/// Read accessors take the lock shared; the poll loop is the only
/// writer, one tick at a time.
pub struct FocusMonitor {
    store: Arc<Database>,
    provider: Option<Box<dyn SnapshotProvider>>,
    interval: StdDuration,
    enabled: AtomicBool,
    inner: RwLock<MonitorState>,
}

impl FocusMonitor {
    /// Creates a monitor with the default 10-minute switch window and
    /// 45-minute no-progress hold. Passing no provider yields the
    /// permanently-unsupported state.
    pub fn new(store: Arc<Database>, provider: Option<Box<dyn SnapshotProvider>>) -> Self {
        Self::with_windows(
            store,
            provider,
            DEFAULT_SWITCH_WINDOW_MS,
            DEFAULT_NO_PROGRESS_HOLD_MS,
        )
    }

    pub fn with_windows(
        store: Arc<Database>,
        provider: Option<Box<dyn SnapshotProvider>>,
        switch_window_ms: i64,
        no_progress_hold_ms: i64,
    ) -> Self {
        Self {
            store,
            provider,
            interval: DEFAULT_POLL_INTERVAL,
            enabled: AtomicBool::new(false),
            inner: RwLock::new(MonitorState::new(switch_window_ms, no_progress_hold_ms)),
        }
    }

    pub fn with_poll_interval(mut self, interval: StdDuration) -> Self {
        self.interval = interval;
        self
    }

    /// Whether the host can observe the frontmost application at all.
    pub fn supported(&self) -> bool {
        self.provider.is_some()
    }

    pub fn enabled(&self) -> bool {
        self.supported() && self.enabled.load(Ordering::SeqCst)
    }

    /// Restores the persisted enabled flag and starts the background
    /// poll loop. Returns `None` (and never polls) on unsupported hosts.
    pub fn start(self: Arc<Self>) -> Option<thread::JoinHandle<()>> {
        if !self.supported() {
            return None;
        }
        match self.store.get_setting(keys::FOCUS_MONITOR_ENABLED) {
            Ok(value) => {
                let enabled = value.as_deref() == Some("true");
                self.enabled.store(enabled, Ordering::SeqCst);
                if enabled {
                    self.load_last_event();
                }
            }
            Err(err) => error!(error = %err, "load focus monitor setting failed"),
        }

        let monitor = Arc::clone(&self);
        Some(thread::spawn(move || loop {
            thread::sleep(monitor.interval);
            if !monitor.enabled() {
                continue;
            }
            monitor.tick(Utc::now().timestamp_millis());
        }))
    }

    /// One poll: fetch a snapshot and run the transition. Skips empty
    /// snapshots and logs poll failures without stopping the loop.
    pub fn tick(&self, now_ms: i64) {
        let Some(provider) = self.provider.as_deref() else {
            return;
        };
        if !self.enabled() {
            return;
        }
        match provider.current() {
            Ok(snapshot) if snapshot.app_name.is_empty() => {}
            Ok(mut snapshot) => {
                if snapshot.ts_ms == 0 {
                    snapshot.ts_ms = now_ms;
                }
                self.handle_snapshot(snapshot);
            }
            Err(err) => warn!(error = %err, "focus poll failed"),
        }
    }

    /// Enables or disables monitoring. Disabling finalizes the open
    /// event and clears the in-memory window state; enabling reloads the
    /// most recent persisted event so an interrupted session's duration
    /// survives restarts.
    pub fn set_enabled(&self, enabled: bool) -> Result<(), FocusError> {
        if !self.supported() {
            self.enabled.store(false, Ordering::SeqCst);
            return Err(FocusError::Unsupported);
        }
        let previous = self.enabled.swap(enabled, Ordering::SeqCst);
        if previous && !enabled {
            self.close_current_event();
        }
        if enabled {
            self.clear_state();
            self.load_last_event();
        }
        if let Err(err) = self.store.upsert_setting(
            keys::FOCUS_MONITOR_ENABLED,
            if enabled { "true" } else { "false" },
            Utc::now().timestamp_millis(),
        ) {
            warn!(error = %err, "persist focus monitor setting failed");
        }
        Ok(())
    }

    /// Currently-focused application with its accumulated session
    /// minutes, or `None` when disabled or nothing is recorded.
    pub fn current(&self) -> Result<Option<FocusCurrent>, DatabaseError> {
        if !self.enabled() {
            return Ok(None);
        }
        let Some(event) = self.store.latest_focus_event()? else {
            return Ok(None);
        };
        if event.app_name.is_empty() {
            return Ok(None);
        }

        let mut focus_ms = event.duration_ms;
        if focus_ms == 0 {
            focus_ms = Utc::now().timestamp_millis() - event.ts_ms;
        }
        let focus_ms = focus_ms.max(0);

        let inner = self.read();
        let title = if inner.last_title.is_empty() {
            event.window_title.clone()
        } else {
            inner.last_title.clone()
        };

        Ok(Some(FocusCurrent {
            ts_ms: event.ts_ms,
            app_name: event.app_name,
            bundle_id: event.bundle_id,
            pid: event.pid,
            window_title: title,
            focus_minutes: focus_ms as f64 / 60_000.0,
        }))
    }

    /// Number of identity changes inside the trailing window.
    pub fn switch_count(&self) -> u32 {
        self.read().switches.count()
    }

    /// No-progress flag with the elapsed time since the last change.
    pub fn no_progress(&self) -> (bool, Duration) {
        let now_ms = Utc::now().timestamp_millis();
        let (flagged, elapsed_ms) = self.read().no_progress.status(now_ms);
        (flagged, Duration::milliseconds(elapsed_ms))
    }

    /// Runs one state-machine transition for a snapshot. This is the
    /// core of the monitor; `tick` is just poll-then-call.
    pub fn handle_snapshot(&self, snapshot: FocusSnapshot) {
        let now_ms = if snapshot.ts_ms == 0 {
            Utc::now().timestamp_millis()
        } else {
            snapshot.ts_ms
        };

        let mut pending_title: Option<(i64, String)> = None;
        let mut close_event: Option<(i64, i64)> = None;
        let same;
        {
            let mut inner = self.write();

            let prev_title = inner.last_title.clone();
            let current_title = if snapshot.window_title.is_empty() {
                prev_title.clone()
            } else {
                snapshot.window_title.clone()
            };
            let title_changed = !current_title.is_empty() && current_title != prev_title;
            if !current_title.is_empty() {
                inner.last_title = current_title.clone();
            }
            if title_changed || !inner.no_progress.has_baseline() {
                inner.no_progress.mark_change(now_ms);
            }

            same = inner
                .last
                .as_ref()
                .map(|last| same_app(&snapshot, last))
                .unwrap_or(false);

            if title_changed && same {
                if let Some(last) = inner.last.as_mut() {
                    if last.id != 0 {
                        pending_title = Some((last.id, current_title.clone()));
                        last.window_title = current_title;
                    }
                }
            }

            if inner.last.is_some() && !same {
                inner.switches.record(now_ms);
                inner.no_progress.mark_change(now_ms);
                if let Some(last) = inner.last.as_ref() {
                    if last.id != 0 {
                        close_event = Some((last.id, (now_ms - last.ts_ms).max(0)));
                    }
                }
            }

            if same && !title_changed {
                inner.no_progress.check(now_ms);
            }
        }

        if let Some((id, title)) = pending_title {
            if let Err(err) = self.store.update_focus_title(id, &title) {
                error!(error = %err, "update focus window title failed");
            }
        }

        if same {
            return;
        }

        if let Some((id, duration_ms)) = close_event {
            if let Err(err) = self.store.update_focus_duration(id, duration_ms) {
                error!(error = %err, "close focus event failed");
            }
        }

        let mut event = FocusEvent {
            id: 0,
            ts_ms: now_ms,
            app_name: snapshot.app_name,
            bundle_id: snapshot.bundle_id,
            pid: snapshot.pid,
            window_title: snapshot.window_title,
            duration_ms: 0,
        };
        match self.store.insert_focus_event(&event) {
            Ok(id) => {
                event.id = id;
                self.write().last = Some(event);
            }
            Err(err) => error!(error = %err, "insert focus event failed"),
        }
    }

    fn load_last_event(&self) {
        match self.store.latest_focus_event() {
            Ok(Some(event)) => {
                let mut inner = self.write();
                if !event.window_title.is_empty() {
                    inner.last_title = event.window_title.clone();
                }
                inner.last = Some(event);
            }
            Ok(None) => {}
            Err(err) => error!(error = %err, "load last focus event failed"),
        }
    }

    fn clear_state(&self) {
        let mut inner = self.write();
        inner.last = None;
        inner.last_title.clear();
        inner.switches.clear();
        inner.no_progress.clear();
    }

    /// Persists the duration of a still-open event, then drops all
    /// in-memory window state.
    fn close_current_event(&self) {
        let open = {
            let inner = self.read();
            inner
                .last
                .as_ref()
                .filter(|last| last.id != 0 && last.duration_ms == 0)
                .map(|last| (last.id, last.ts_ms))
        };

        if let Some((id, ts_ms)) = open {
            let duration = (Utc::now().timestamp_millis() - ts_ms).max(0);
            if let Err(err) = self.store.update_focus_duration(id, duration) {
                error!(error = %err, "close focus event failed");
            }
        }
        self.clear_state();
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, MonitorState> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, MonitorState> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn same_app(snapshot: &FocusSnapshot, event: &FocusEvent) -> bool {
    snapshot.app_name == event.app_name
        && snapshot.bundle_id == event.bundle_id
        && snapshot.pid == event.pid
}
