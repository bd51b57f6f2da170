//! Violation debouncing.
//!
//! Edge-triggered: a violation must persist for `threshold` consecutive
//! evaluated frames before a fire, and the counter resets the moment the
//! fire happens, so a sustained violation produces one fire per completed
//! streak rather than one per frame.
//!
//! The cooldown gates the emitted side effect, not the state machine: a
//! streak completed inside the cooldown window still resets the counter,
//! it just reports `Suppressed`. A clean frame ends the incident and clears
//! the cooldown, so the next completed streak is a new incident and emits.

use std::time::{Duration, Instant};

/// What one evaluated frame did to the debouncer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DebounceOutcome {
    /// No violation this frame; streak cleared.
    Idle,
    /// Violation present, streak below threshold.
    Counting,
    /// Streak reached threshold; emit the alert.
    Fired,
    /// Streak reached threshold inside the cooldown window; counter reset,
    /// nothing emitted.
    Suppressed,
}

#[derive(Debug)]
pub struct AlertDebouncer {
    threshold: u32,
    cooldown: Duration,
    streak: u32,
    last_fired: Option<Instant>,
}

impl AlertDebouncer {
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            threshold,
            cooldown,
            streak: 0,
            last_fired: None,
        }
    }

    /// Advance the machine by one evaluated frame. `now` comes from the
    /// caller so transitions stay in frame order under a mocked clock.
    pub fn observe(&mut self, violation: bool, now: Instant) -> DebounceOutcome {
        if !violation {
            self.streak = 0;
            self.last_fired = None;
            return DebounceOutcome::Idle;
        }

        self.streak += 1;
        if self.streak < self.threshold {
            return DebounceOutcome::Counting;
        }

        self.streak = 0;
        let in_cooldown = self
            .last_fired
            .is_some_and(|at| now.duration_since(at) < self.cooldown);
        if in_cooldown {
            DebounceOutcome::Suppressed
        } else {
            self.last_fired = Some(now);
            DebounceOutcome::Fired
        }
    }

    /// Streak adjustment for unevaluated cycles under the reset policy.
    pub fn reset_streak(&mut self) {
        self.streak = 0;
    }

    pub fn streak(&self) -> u32 {
        self.streak
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seconds(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    /// Drive the machine with 1s per evaluated frame, returning outcomes.
    fn run(debouncer: &mut AlertDebouncer, flags: &[bool]) -> Vec<DebounceOutcome> {
        let start = Instant::now();
        flags
            .iter()
            .enumerate()
            .map(|(i, &v)| debouncer.observe(v, start + seconds(i as u64)))
            .collect()
    }

    #[test]
    fn streak_below_threshold_never_fires() {
        let mut d = AlertDebouncer::new(3, seconds(5));
        let outcomes = run(&mut d, &[true, true, false, true, true, false]);
        assert!(outcomes
            .iter()
            .all(|o| !matches!(o, DebounceOutcome::Fired | DebounceOutcome::Suppressed)));
    }

    #[test]
    fn exact_threshold_fires_once_and_resets() {
        let mut d = AlertDebouncer::new(3, seconds(5));
        let outcomes = run(&mut d, &[true, true, true, true]);
        assert_eq!(
            outcomes,
            vec![
                DebounceOutcome::Counting,
                DebounceOutcome::Counting,
                DebounceOutcome::Fired,
                DebounceOutcome::Counting,
            ]
        );
    }

    #[test]
    fn unbroken_run_is_rate_limited_by_cooldown() {
        let mut d = AlertDebouncer::new(3, seconds(5));
        let outcomes = run(&mut d, &[true; 9]);
        let fired: Vec<usize> = outcomes
            .iter()
            .enumerate()
            .filter(|(_, o)| **o == DebounceOutcome::Fired)
            .map(|(i, _)| i)
            .collect();
        // Streaks complete at frames 2, 5, 8; frame 5 is 3s after the last
        // fire and gets suppressed, frame 8 is 6s after and emits.
        assert_eq!(fired, vec![2, 8]);
        assert_eq!(
            outcomes[5],
            DebounceOutcome::Suppressed,
            "mid-cooldown streak must be suppressed, not fired"
        );
    }

    #[test]
    fn clean_frame_starts_a_new_incident() {
        // T=3, cooldown 5s, one clean frame between two full streaks.
        let mut d = AlertDebouncer::new(3, seconds(5));
        let outcomes = run(&mut d, &[true, true, true, false, true, true, true]);
        let fires = outcomes
            .iter()
            .filter(|o| **o == DebounceOutcome::Fired)
            .count();
        assert_eq!(fires, 2);
        assert!(!outcomes.contains(&DebounceOutcome::Suppressed));
    }

    #[test]
    fn reset_streak_discards_partial_progress() {
        let mut d = AlertDebouncer::new(3, seconds(5));
        let start = Instant::now();
        d.observe(true, start);
        d.observe(true, start + seconds(1));
        d.reset_streak();
        assert_eq!(d.observe(true, start + seconds(2)), DebounceOutcome::Counting);
    }

    #[test]
    fn threshold_one_fires_immediately() {
        let mut d = AlertDebouncer::new(1, seconds(0));
        let start = Instant::now();
        assert_eq!(d.observe(true, start), DebounceOutcome::Fired);
        assert_eq!(d.observe(true, start + seconds(1)), DebounceOutcome::Fired);
    }
}
