//! Continuous game clock with hour/day boundary detection.
//!
//! Time is measured in fractional game-hours since session start. `advance`
//! reports every boundary strictly crossed by the delta, in ascending
//! order, so a long wait never collapses intermediate hourly work into a
//! single re-evaluation. A boundary fires once time moves strictly past
//! it: landing on 24.0 exactly reports nothing, and the 24.0 boundary is
//! delivered by the next advance. At multiples of 24 the hour boundary is
//! reported before the day boundary for the same instant.

use std::fmt;

use contracts::HOURS_PER_DAY;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryKind {
    Hour,
    Day,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrossedBoundary {
    pub kind: BoundaryKind,
    pub at: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClockError {
    NegativeDelta(f64),
}

impl fmt::Display for ClockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NegativeDelta(delta) => {
                write!(f, "clock delta must be non-negative, got {delta}")
            }
        }
    }
}

impl std::error::Error for ClockError {}

#[derive(Debug, Clone)]
pub struct GameClock {
    now: f64,
    /// Highest integer hour mark already delivered. Marks at or before the
    /// starting time are considered delivered.
    last_boundary: f64,
}

impl GameClock {
    pub fn new() -> Self {
        Self::starting_at(0.0)
    }

    pub fn starting_at(now: f64) -> Self {
        let now = now.max(0.0);
        Self {
            now,
            last_boundary: now.floor(),
        }
    }

    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn hour_of_day(&self) -> f64 {
        self.now.rem_euclid(HOURS_PER_DAY)
    }

    pub fn day_index(&self) -> u64 {
        (self.now / HOURS_PER_DAY) as u64
    }

    /// Advance by `delta` game-hours and return crossed boundaries in
    /// chronological order. Zero delta crosses nothing and leaves the
    /// clock untouched.
    pub fn advance(&mut self, delta: f64) -> Result<Vec<CrossedBoundary>, ClockError> {
        if delta < 0.0 || !delta.is_finite() {
            return Err(ClockError::NegativeDelta(delta));
        }

        let end = self.now + delta;
        let mut crossed = Vec::new();

        let mut mark = self.last_boundary + 1.0;
        while mark < end {
            crossed.push(CrossedBoundary {
                kind: BoundaryKind::Hour,
                at: mark,
            });
            if (mark as u64) % (HOURS_PER_DAY as u64) == 0 {
                crossed.push(CrossedBoundary {
                    kind: BoundaryKind::Day,
                    at: mark,
                });
            }
            self.last_boundary = mark;
            mark += 1.0;
        }

        debug_assert!(end >= self.now, "game time regressed");
        self.now = end;
        Ok(crossed)
    }
}

impl Default for GameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_delta_is_rejected() {
        let mut clock = GameClock::new();
        assert!(matches!(
            clock.advance(-0.5),
            Err(ClockError::NegativeDelta(_))
        ));
        assert_eq!(clock.now(), 0.0);
    }

    #[test]
    fn zero_delta_crosses_nothing_and_keeps_time() {
        let mut clock = GameClock::starting_at(23.0);
        let crossed = clock.advance(0.0).expect("zero delta is valid");
        assert!(crossed.is_empty());
        assert_eq!(clock.now(), 23.0);
    }

    #[test]
    fn three_hours_from_twenty_three_fires_two_hourly_and_one_day() {
        let mut clock = GameClock::starting_at(23.0);
        let crossed = clock.advance(3.0).expect("advance");

        let hours: Vec<f64> = crossed
            .iter()
            .filter(|b| b.kind == BoundaryKind::Hour)
            .map(|b| b.at)
            .collect();
        assert_eq!(hours, vec![24.0, 25.0]);

        let days: Vec<f64> = crossed
            .iter()
            .filter(|b| b.kind == BoundaryKind::Day)
            .map(|b| b.at)
            .collect();
        assert_eq!(days, vec![24.0]);

        // Hour before day at the shared instant, ascending overall.
        assert_eq!(crossed[0].at, 24.0);
        assert_eq!(crossed[0].kind, BoundaryKind::Hour);
        assert_eq!(crossed[1].kind, BoundaryKind::Day);
        assert_eq!(clock.now(), 26.0);
    }

    #[test]
    fn landing_exactly_on_a_boundary_defers_it_to_the_next_advance() {
        let mut clock = GameClock::starting_at(23.0);
        let crossed = clock.advance(1.0).expect("advance");
        assert!(crossed.is_empty(), "boundary at 24.0 not yet passed");

        let crossed = clock.advance(0.5).expect("advance");
        assert_eq!(crossed.len(), 2, "hour + day fire once passed");
        assert_eq!(crossed[0].at, 24.0);
        assert_eq!(crossed[0].kind, BoundaryKind::Hour);
        assert_eq!(crossed[1].kind, BoundaryKind::Day);
    }

    #[test]
    fn integer_steps_deliver_every_boundary_exactly_once() {
        let mut clock = GameClock::new();
        let mut delivered = Vec::new();
        for _ in 0..30 {
            for boundary in clock.advance(1.0).expect("advance") {
                if boundary.kind == BoundaryKind::Hour {
                    delivered.push(boundary.at);
                }
            }
        }
        // Marks 1..=29 have been strictly passed by the time now=30.
        assert_eq!(delivered, (1..30).map(f64::from).collect::<Vec<_>>());
    }

    #[test]
    fn large_delta_reports_every_intermediate_hour() {
        let mut clock = GameClock::new();
        let crossed = clock.advance(10.5).expect("advance");
        let hours: Vec<f64> = crossed
            .iter()
            .filter(|b| b.kind == BoundaryKind::Hour)
            .map(|b| b.at)
            .collect();
        assert_eq!(hours, (1..=10).map(f64::from).collect::<Vec<_>>());
    }

    #[test]
    fn hour_of_day_wraps() {
        let clock = GameClock::starting_at(38.5);
        assert_eq!(clock.hour_of_day(), 14.5);
        assert_eq!(clock.day_index(), 1);
    }
}
