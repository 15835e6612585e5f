//! One-shot streak signals derived from successive states.
//!
//! The tracker remembers the last applied [`StreakState`] for one friend
//! and turns each new state into at most a few signals: a streak started,
//! a streak was lost, or a streak is about to expire. Each signal fires
//! once per transition, not on every repeated state.

use encore_common::StreakState;

const HOUR_MS: i64 = 60 * 60 * 1000;

/// Where a new state came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateSource {
    /// Fetched from the backend (initial load or refresh).
    Fetch,
    /// Pushed by a live update or a local increment.
    Increment,
}

/// A transition worth telling the user about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreakSignal {
    /// The streak expires within the warning window.
    Warning { hours_remaining: u32 },
    /// The streak was lost.
    Expired,
    /// A streak went from zero to positive.
    Started { streak: u32 },
}

/// Derived view used for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakStatus {
    pub is_expired: bool,
    pub is_expiring_soon: bool,
    pub hours_remaining: Option<u32>,
}

/// Signal state for the streak with one friend.
#[derive(Debug, Clone)]
pub struct StreakTracker {
    friend_id: String,
    warning_threshold_hours: u32,
    previous: StreakState,
    warning_key: Option<String>,
    expired_notified: bool,
}

impl StreakTracker {
    pub fn new(friend_id: impl Into<String>, warning_threshold_hours: u32) -> Self {
        Self {
            friend_id: friend_id.into(),
            warning_threshold_hours,
            previous: StreakState::default(),
            warning_key: None,
            expired_notified: false,
        }
    }

    pub fn friend_id(&self) -> &str {
        &self.friend_id
    }

    pub fn state(&self) -> &StreakState {
        &self.previous
    }

    /// Forget everything, as if no state had ever been applied.
    pub fn reset(&mut self) {
        self.previous = StreakState::default();
        self.warning_key = None;
        self.expired_notified = false;
    }

    /// Apply `next` and return the signals it triggers.
    ///
    /// The first fetched state only primes the tracker: a streak that is
    /// already in the warning window when first loaded does not warn.
    pub fn apply(&mut self, next: StreakState, source: UpdateSource, now: i64) -> Vec<StreakSignal> {
        let prev = std::mem::replace(&mut self.previous, next.clone());
        let is_initial = prev.is_empty();
        let mut signals = Vec::new();

        if is_initial && source == UpdateSource::Fetch {
            if next.streak > 0 && next.is_active {
                self.expired_notified = false;
                self.warning_key = next
                    .expire_at
                    .filter(|&at| self.in_warning_window(at, now))
                    .map(|at| self.warning_key_for(&next, at));
            }
            return signals;
        }

        if next.expire_at.is_some_and(|at| at <= now) {
            if !self.expired_notified && prev.streak > 0 {
                self.expired_notified = true;
                signals.push(StreakSignal::Expired);
            }
            self.warning_key = None;
            return signals;
        }

        if !is_initial
            && !self.expired_notified
            && prev.streak > 0
            && (next.streak == 0 || !next.is_active)
        {
            self.expired_notified = true;
            self.warning_key = None;
            signals.push(StreakSignal::Expired);
            return signals;
        }

        let live = next.streak > 0 && next.is_active;
        if live {
            self.expired_notified = false;
        }

        if !is_initial && prev.streak == 0 && next.streak > 0 {
            signals.push(StreakSignal::Started {
                streak: next.streak,
            });
        }

        match next.expire_at {
            Some(at) if live && self.in_warning_window(at, now) => {
                let key = self.warning_key_for(&next, at);
                if self.warning_key.as_deref() != Some(key.as_str()) {
                    self.warning_key = Some(key);
                    if !is_initial || prev.expire_at != next.expire_at {
                        signals.push(StreakSignal::Warning {
                            hours_remaining: hours_remaining(at, now),
                        });
                    }
                }
            }
            _ => self.warning_key = None,
        }

        signals
    }

    /// Display flags for the current state.
    pub fn status(&self, now: i64) -> StreakStatus {
        let state = &self.previous;
        let hours = state
            .expire_at
            .filter(|&at| at > now)
            .map(|at| hours_remaining(at, now));
        let is_expired = state.expire_at.is_some_and(|at| at <= now)
            || (state.streak == 0 && !state.is_active && !state.is_empty());
        StreakStatus {
            is_expired,
            is_expiring_soon: !is_expired
                && state.streak > 0
                && hours.is_some_and(|h| h <= self.warning_threshold_hours),
            hours_remaining: hours,
        }
    }

    fn in_warning_window(&self, expire_at: i64, now: i64) -> bool {
        if expire_at <= now {
            return false;
        }
        let hours = hours_remaining(expire_at, now);
        hours > 0 && hours <= self.warning_threshold_hours
    }

    fn warning_key_for(&self, state: &StreakState, expire_at: i64) -> String {
        format!(
            "{}:{}:{}",
            self.friend_id,
            state.last_interaction.as_deref().unwrap_or("none"),
            expire_at
        )
    }
}

/// Whole hours until `expire_at`, rounded up.
fn hours_remaining(expire_at: i64, now: i64) -> u32 {
    let ms = (expire_at - now).max(0);
    u32::try_from((ms + HOUR_MS - 1) / HOUR_MS).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000_000;

    fn state(streak: u32, expire_in_hours: Option<f64>, active: bool) -> StreakState {
        StreakState {
            streak,
            expire_at: expire_in_hours.map(|h| NOW + (h * HOUR_MS as f64) as i64),
            last_interaction: Some("2024-05-01".into()),
            is_active: active,
        }
    }

    fn tracker() -> StreakTracker {
        StreakTracker::new("42", 4)
    }

    #[test]
    fn initial_fetch_never_signals() {
        let mut t = tracker();
        let signals = t.apply(state(3, Some(2.0), true), UpdateSource::Fetch, NOW);
        assert!(signals.is_empty());
        // Same state again does not warn either: the key was primed.
        let signals = t.apply(state(3, Some(2.0), true), UpdateSource::Fetch, NOW);
        assert!(signals.is_empty());
    }

    #[test]
    fn warning_fires_once_per_expiry() {
        let mut t = tracker();
        t.apply(state(3, Some(20.0), true), UpdateSource::Fetch, NOW);

        let signals = t.apply(state(3, Some(3.5), true), UpdateSource::Increment, NOW);
        assert_eq!(signals, vec![StreakSignal::Warning { hours_remaining: 4 }]);

        let signals = t.apply(state(3, Some(3.5), true), UpdateSource::Increment, NOW);
        assert!(signals.is_empty());

        // New expiry inside the window warns again.
        let signals = t.apply(state(3, Some(1.2), true), UpdateSource::Increment, NOW);
        assert_eq!(signals, vec![StreakSignal::Warning { hours_remaining: 2 }]);
    }

    #[test]
    fn outside_window_does_not_warn() {
        let mut t = tracker();
        t.apply(state(3, Some(20.0), true), UpdateSource::Fetch, NOW);
        let signals = t.apply(state(3, Some(4.5), true), UpdateSource::Increment, NOW);
        assert!(signals.is_empty());
    }

    #[test]
    fn passed_expiry_signals_expired_once() {
        let mut t = tracker();
        t.apply(state(5, Some(10.0), true), UpdateSource::Fetch, NOW);

        let signals = t.apply(state(5, Some(-1.0), true), UpdateSource::Fetch, NOW);
        assert_eq!(signals, vec![StreakSignal::Expired]);
        let signals = t.apply(state(5, Some(-1.0), true), UpdateSource::Fetch, NOW);
        assert!(signals.is_empty());
    }

    #[test]
    fn drop_to_zero_signals_expired_once() {
        let mut t = tracker();
        t.apply(state(5, Some(10.0), true), UpdateSource::Fetch, NOW);

        let signals = t.apply(state(0, None, false), UpdateSource::Increment, NOW);
        assert_eq!(signals, vec![StreakSignal::Expired]);
        let signals = t.apply(state(0, None, false), UpdateSource::Increment, NOW);
        assert!(signals.is_empty());
    }

    #[test]
    fn becoming_inactive_signals_expired() {
        let mut t = tracker();
        t.apply(state(5, Some(10.0), true), UpdateSource::Fetch, NOW);
        let signals = t.apply(state(5, Some(10.0), false), UpdateSource::Increment, NOW);
        assert_eq!(signals, vec![StreakSignal::Expired]);
    }

    #[test]
    fn zero_to_positive_signals_started() {
        let mut t = tracker();
        t.apply(state(0, None, false), UpdateSource::Fetch, NOW);
        let signals = t.apply(state(1, Some(24.0), true), UpdateSource::Increment, NOW);
        assert_eq!(signals, vec![StreakSignal::Started { streak: 1 }]);
    }

    #[test]
    fn restart_after_expiry_rearms_expired() {
        let mut t = tracker();
        t.apply(state(5, Some(10.0), true), UpdateSource::Fetch, NOW);
        t.apply(state(0, None, false), UpdateSource::Increment, NOW);

        let signals = t.apply(state(1, Some(24.0), true), UpdateSource::Increment, NOW);
        assert_eq!(signals, vec![StreakSignal::Started { streak: 1 }]);
        let signals = t.apply(state(0, None, false), UpdateSource::Increment, NOW);
        assert_eq!(signals, vec![StreakSignal::Expired]);
    }

    #[test]
    fn started_and_warning_can_fire_together() {
        let mut t = tracker();
        t.apply(state(0, None, false), UpdateSource::Fetch, NOW);
        let signals = t.apply(state(1, Some(2.0), true), UpdateSource::Increment, NOW);
        assert_eq!(
            signals,
            vec![
                StreakSignal::Started { streak: 1 },
                StreakSignal::Warning { hours_remaining: 2 },
            ]
        );
    }

    #[test]
    fn reset_returns_to_empty() {
        let mut t = tracker();
        t.apply(state(5, Some(10.0), true), UpdateSource::Fetch, NOW);
        t.reset();
        assert!(t.state().is_empty());
        assert!(t
            .apply(state(5, Some(-1.0), true), UpdateSource::Fetch, NOW)
            .is_empty());
    }

    #[test]
    fn status_flags() {
        let mut t = tracker();
        t.apply(state(3, Some(2.5), true), UpdateSource::Fetch, NOW);
        assert_eq!(
            t.status(NOW),
            StreakStatus {
                is_expired: false,
                is_expiring_soon: true,
                hours_remaining: Some(3),
            }
        );
        assert!(t.status(NOW + 3 * HOUR_MS).is_expired);
    }

    #[test]
    fn hours_round_up() {
        assert_eq!(hours_remaining(NOW + 1, NOW), 1);
        assert_eq!(hours_remaining(NOW + HOUR_MS, NOW), 1);
        assert_eq!(hours_remaining(NOW + HOUR_MS + 1, NOW), 2);
        assert_eq!(hours_remaining(NOW - 5, NOW), 0);
    }
}
