//! Obstacle dwell tracking.
//!
//! Clear -> Present -> Alerted. The timer starts on first presence, the
//! duration is recomputed on every evaluated frame while the obstacle stays
//! present, and the first alert fires when the duration crosses the
//! threshold. While in Alerted the obstacle does not need to clear before
//! re-firing; it needs continued presence plus elapse of the post-alert
//! cooldown. Absence on any evaluated frame resets the whole machine.

use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DwellOutcome {
    /// Nothing present.
    Clear,
    /// Present, below the alert threshold.
    Tracking,
    /// Threshold crossed (or post-alert cooldown elapsed); emit the alert.
    Fired,
    /// Already alerted and still present, cooldown not yet elapsed.
    Holding,
}

#[derive(Debug)]
pub struct DwellTracker {
    alert_threshold: Duration,
    post_alert_cooldown: Duration,
    first_present: Option<Instant>,
    last_alert: Option<Instant>,
}

impl DwellTracker {
    pub fn new(alert_threshold: Duration, post_alert_cooldown: Duration) -> Self {
        Self {
            alert_threshold,
            post_alert_cooldown,
            first_present: None,
            last_alert: None,
        }
    }

    pub fn observe(&mut self, present: bool, now: Instant) -> DwellOutcome {
        if !present {
            self.first_present = None;
            self.last_alert = None;
            return DwellOutcome::Clear;
        }

        let since = *self.first_present.get_or_insert(now);
        let dwell = now.duration_since(since);

        match self.last_alert {
            None => {
                if dwell >= self.alert_threshold {
                    self.last_alert = Some(now);
                    DwellOutcome::Fired
                } else {
                    DwellOutcome::Tracking
                }
            }
            Some(at) => {
                if now.duration_since(at) >= self.post_alert_cooldown {
                    self.last_alert = Some(now);
                    DwellOutcome::Fired
                } else {
                    DwellOutcome::Holding
                }
            }
        }
    }

    /// How long the current obstacle has been present, if one is.
    pub fn dwell(&self, now: Instant) -> Option<Duration> {
        self.first_present.map(|at| now.duration_since(at))
    }

    pub fn is_alerted(&self) -> bool {
        self.last_alert.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seconds(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    fn tracker() -> DwellTracker {
        DwellTracker::new(seconds(60), seconds(300))
    }

    #[test]
    fn below_threshold_never_fires() {
        let mut t = tracker();
        let start = Instant::now();
        for i in 0..60 {
            let outcome = t.observe(true, start + seconds(i));
            assert_ne!(outcome, DwellOutcome::Fired, "fired at {}s", i);
        }
        assert_eq!(t.dwell(start + seconds(59)), Some(seconds(59)));
    }

    #[test]
    fn crossing_threshold_fires_once() {
        let mut t = tracker();
        let start = Instant::now();
        for i in 0..60 {
            t.observe(true, start + seconds(i));
        }
        assert_eq!(t.observe(true, start + seconds(60)), DwellOutcome::Fired);
        assert_eq!(t.observe(true, start + seconds(61)), DwellOutcome::Holding);
        assert!(t.is_alerted());
    }

    #[test]
    fn absence_resets_timer_and_state() {
        let mut t = tracker();
        let start = Instant::now();
        for i in 0..70 {
            t.observe(true, start + seconds(i));
        }
        assert_eq!(t.observe(false, start + seconds(70)), DwellOutcome::Clear);
        assert!(!t.is_alerted());
        assert_eq!(t.dwell(start + seconds(70)), None);

        // Reappearance starts from zero; no fire until a fresh 60s dwell.
        assert_eq!(t.observe(true, start + seconds(71)), DwellOutcome::Tracking);
        assert_eq!(
            t.observe(true, start + seconds(130)),
            DwellOutcome::Tracking
        );
        assert_eq!(t.observe(true, start + seconds(131)), DwellOutcome::Fired);
    }

    #[test]
    fn refire_requires_post_alert_cooldown_without_clearing() {
        let mut t = tracker();
        let start = Instant::now();
        assert_eq!(t.observe(true, start), DwellOutcome::Tracking);
        assert_eq!(t.observe(true, start + seconds(60)), DwellOutcome::Fired);
        assert_eq!(
            t.observe(true, start + seconds(359)),
            DwellOutcome::Holding
        );
        assert_eq!(t.observe(true, start + seconds(360)), DwellOutcome::Fired);
        assert_eq!(t.dwell(start + seconds(360)), Some(seconds(360)));
    }
}
