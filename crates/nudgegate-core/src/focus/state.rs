//! Windowed switch tracking, the no-progress clock, and the derived
//! focus-state label.

use crate::model::FocusState;

/// Trailing window for counting app switches.
pub const DEFAULT_SWITCH_WINDOW_MS: i64 = 10 * 60 * 1000;

/// How long the same app + window title must hold before the monitor
/// flags "no progress".
pub const DEFAULT_NO_PROGRESS_HOLD_MS: i64 = 45 * 60 * 1000;

/// Minimum no-progress time before the derived label reports it.
const NO_PROGRESS_LABEL_MS: i64 = 20 * 60 * 1000;

/// Switches inside the window at which the label becomes DISTRACTED.
const DISTRACTED_SWITCH_THRESHOLD: u32 = 8;

/// Session minutes at which the label becomes FOCUSED.
const FOCUSED_SESSION_MINUTES: f64 = 25.0;

/// Ordered switch timestamps pruned to a trailing duration; the length
/// is the switch count.
#[derive(Debug, Clone)]
pub struct SwitchWindow {
    window_ms: i64,
    switches: Vec<i64>,
}

impl SwitchWindow {
    pub fn new(window_ms: i64) -> Self {
        Self {
            window_ms,
            switches: Vec::new(),
        }
    }

    /// Records a switch at `now_ms` and drops entries older than the
    /// window.
    pub fn record(&mut self, now_ms: i64) {
        self.switches.push(now_ms);
        self.prune(now_ms);
    }

    pub fn prune(&mut self, now_ms: i64) {
        let cutoff = now_ms - self.window_ms;
        self.switches.retain(|ts| *ts >= cutoff);
    }

    pub fn count(&self) -> u32 {
        self.switches.len() as u32
    }

    pub fn clear(&mut self) {
        self.switches.clear();
    }
}

/// Tracks how long the current app + title combination has gone
/// unchanged. The flag trips once the hold threshold elapses and drops
/// on any change.
#[derive(Debug, Clone)]
pub struct NoProgressTracker {
    hold_ms: i64,
    last_change_ms: Option<i64>,
    flagged: bool,
}

impl NoProgressTracker {
    pub fn new(hold_ms: i64) -> Self {
        Self {
            hold_ms,
            last_change_ms: None,
            flagged: false,
        }
    }

    /// Resets the clock: something changed at `now_ms`.
    pub fn mark_change(&mut self, now_ms: i64) {
        self.last_change_ms = Some(now_ms);
        self.flagged = false;
    }

    pub fn has_baseline(&self) -> bool {
        self.last_change_ms.is_some()
    }

    /// Re-evaluates the flag against `now_ms` with nothing changed.
    pub fn check(&mut self, now_ms: i64) {
        if let Some(last) = self.last_change_ms {
            if now_ms - last >= self.hold_ms {
                self.flagged = true;
            }
        }
    }

    /// Current flag with elapsed time since the last change.
    pub fn status(&self, now_ms: i64) -> (bool, i64) {
        match self.last_change_ms {
            Some(last) if self.flagged => (true, (now_ms - last).max(0)),
            _ => (false, 0),
        }
    }

    pub fn clear(&mut self) {
        self.last_change_ms = None;
        self.flagged = false;
    }
}

/// Derives the enrichment label. Priority order is deliberate:
/// stagnation and thrashing are more diagnostic than raw session length.
pub fn derive_focus_state(
    focus_minutes: f64,
    switch_count: u32,
    no_progress: bool,
    no_progress_elapsed_ms: i64,
) -> FocusState {
    if no_progress && no_progress_elapsed_ms >= NO_PROGRESS_LABEL_MS {
        return FocusState::NoProgress;
    }
    if switch_count >= DISTRACTED_SWITCH_THRESHOLD {
        return FocusState::Distracted;
    }
    if focus_minutes >= FOCUSED_SESSION_MINUTES {
        return FocusState::Focused;
    }
    FocusState::Light
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIN: i64 = 60 * 1000;

    #[test]
    fn switch_window_prunes_old_entries() {
        let mut window = SwitchWindow::new(DEFAULT_SWITCH_WINDOW_MS);
        window.record(0);
        window.record(5 * MIN);
        window.record(9 * MIN);
        assert_eq!(window.count(), 3);

        // At t=11min the t=0 entry falls out.
        window.prune(11 * MIN);
        assert_eq!(window.count(), 2);

        window.prune(30 * MIN);
        assert_eq!(window.count(), 0);
    }

    #[test]
    fn switch_window_keeps_boundary_entry() {
        let mut window = SwitchWindow::new(10 * MIN);
        window.record(0);
        window.prune(10 * MIN);
        assert_eq!(window.count(), 1);
        window.prune(10 * MIN + 1);
        assert_eq!(window.count(), 0);
    }

    #[test]
    fn no_progress_trips_only_after_hold() {
        let mut tracker = NoProgressTracker::new(DEFAULT_NO_PROGRESS_HOLD_MS);
        tracker.mark_change(0);
        tracker.check(44 * MIN);
        assert_eq!(tracker.status(44 * MIN), (false, 0));

        tracker.check(45 * MIN);
        let (flagged, elapsed) = tracker.status(46 * MIN);
        assert!(flagged);
        assert_eq!(elapsed, 46 * MIN);
    }

    #[test]
    fn no_progress_resets_on_change() {
        let mut tracker = NoProgressTracker::new(10 * MIN);
        tracker.mark_change(0);
        tracker.check(10 * MIN);
        assert!(tracker.status(10 * MIN).0);

        tracker.mark_change(11 * MIN);
        assert!(!tracker.status(11 * MIN).0);
    }

    #[test]
    fn derive_priority_order() {
        // Stagnation wins over everything.
        assert_eq!(
            derive_focus_state(40.0, 12, true, 25 * MIN),
            FocusState::NoProgress
        );
        // A flag younger than the label threshold does not count.
        assert_eq!(
            derive_focus_state(0.0, 12, true, 10 * MIN),
            FocusState::Distracted
        );
        assert_eq!(derive_focus_state(40.0, 8, false, 0), FocusState::Distracted);
        assert_eq!(derive_focus_state(25.0, 2, false, 0), FocusState::Focused);
        assert_eq!(derive_focus_state(5.0, 2, false, 0), FocusState::Light);
    }
}
