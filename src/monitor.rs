use crate::models::Position;
use crate::system::Pointer;
use std::time::{Duration, Instant};

/// How often the pointer is sampled for user activity.
pub const MONITOR_TICK: Duration = Duration::from_millis(500);

/// Last seen pointer position and when it last changed because of the user.
#[derive(Debug, Clone)]
pub struct ActivityState {
    position: Option<Position>,
    last_change: Instant,
    /// Most recent jitter move, not yet seen by a sample.
    injected: Option<Injected>,
}

/// Where a jitter move started and how far it may have landed from there.
/// The OS can clamp the target (screen edges), so any sample within
/// `radius` of `from` is the move, not the user.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Injected {
    from: Position,
    radius: i32,
}

impl Injected {
    fn explains(&self, pos: Position) -> bool {
        pos.is_near(self.from, self.radius)
    }
}

impl ActivityState {
    pub fn new(now: Instant) -> Self {
        Self {
            position: None,
            last_change: now,
            injected: None,
        }
    }

    /// Records a sample. Returns true if it counts as user activity.
    ///
    /// The first sample only sets the baseline. A sample the last jitter move
    /// can account for is adopted without resetting the idle clock, so
    /// jitter moves never look like the user coming back.
    pub fn observe(&mut self, pos: Position, now: Instant) -> bool {
        match self.position {
            None => {
                self.position = Some(pos);
                false
            }
            Some(prev) if prev == pos => false,
            Some(_) if self.injected.is_some_and(|i| i.explains(pos)) => {
                self.position = Some(pos);
                self.injected = None;
                false
            }
            Some(_) => {
                self.position = Some(pos);
                self.last_change = now;
                self.injected = None;
                true
            }
        }
    }

    /// True when `pos` would count as activity but has not been sampled yet.
    pub fn is_unobserved_change(&self, pos: Position) -> bool {
        match self.position {
            Some(prev) => prev != pos && !self.injected.is_some_and(|i| i.explains(pos)),
            None => false,
        }
    }

    /// Notes a jitter move from `from` by at most `radius` pixels per axis.
    pub fn record_injected(&mut self, from: Position, radius: i32) {
        self.injected = Some(Injected {
            from,
            radius: radius.max(0),
        });
    }

    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_change)
    }

    pub fn is_idle(&self, now: Instant, threshold: Duration) -> bool {
        self.idle_for(now) >= threshold
    }

    pub fn last_position(&self) -> Option<Position> {
        self.position
    }
}

/// One monitor tick. A failed query is logged and treated as "no change".
pub fn sample(activity: &mut ActivityState, pointer: &dyn Pointer, now: Instant) {
    match pointer.position() {
        Ok(pos) => {
            if activity.observe(pos, now) {
                tracing::trace!(%pos, "pointer moved");
            }
        }
        Err(e) => tracing::warn!("skipping activity sample: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::mock::MockPointer;
    use std::sync::atomic::Ordering;

    fn secs(t0: Instant, s: f64) -> Instant {
        t0 + Duration::from_secs_f64(s)
    }

    #[test]
    fn test_not_idle_at_startup() {
        let t0 = Instant::now();
        let state = ActivityState::new(t0);
        assert_eq!(state.idle_for(t0), Duration::ZERO);
        assert!(!state.is_idle(t0, Duration::from_secs(1)));
    }

    #[test]
    fn test_first_sample_is_baseline() {
        let t0 = Instant::now();
        let mut state = ActivityState::new(t0);
        assert!(!state.observe(Position::new(10, 10), secs(t0, 2.0)));
        assert_eq!(state.idle_for(secs(t0, 2.0)), Duration::from_secs(2));
    }

    #[test]
    fn test_movement_resets_idle() {
        let t0 = Instant::now();
        let mut state = ActivityState::new(t0);
        state.observe(Position::new(10, 10), t0);

        assert!(state.observe(Position::new(11, 10), secs(t0, 2.5)));
        assert_eq!(state.idle_for(secs(t0, 3.0)), Duration::from_millis(500));
        assert!(!state.is_idle(secs(t0, 3.0), Duration::from_secs(3)));
        assert!(state.is_idle(secs(t0, 5.5), Duration::from_secs(3)));
    }

    #[test]
    fn test_same_position_keeps_idle() {
        let t0 = Instant::now();
        let mut state = ActivityState::new(t0);
        state.observe(Position::new(10, 10), t0);
        assert!(!state.observe(Position::new(10, 10), secs(t0, 4.0)));
        assert!(state.is_idle(secs(t0, 4.0), Duration::from_secs(3)));
    }

    #[test]
    fn test_injected_move_does_not_reset_idle() {
        let t0 = Instant::now();
        let mut state = ActivityState::new(t0);
        state.observe(Position::new(100, 100), t0);

        state.record_injected(Position::new(100, 100), 2);
        assert!(!state.is_unobserved_change(Position::new(102, 99)));
        assert!(!state.observe(Position::new(102, 99), secs(t0, 3.5)));
        assert_eq!(state.last_position(), Some(Position::new(102, 99)));
        assert!(state.is_idle(secs(t0, 3.5), Duration::from_secs(3)));

        // Anything else after that is the user.
        assert!(state.observe(Position::new(50, 50), secs(t0, 4.0)));
        assert!(!state.is_idle(secs(t0, 4.0), Duration::from_secs(3)));
    }

    #[test]
    fn test_clamped_injected_move_does_not_reset_idle() {
        let t0 = Instant::now();
        let mut state = ActivityState::new(t0);
        state.observe(Position::new(0, 500), t0);

        // Aimed at (-2, 501), the OS kept x at the edge.
        state.record_injected(Position::new(0, 500), 2);
        assert!(!state.is_unobserved_change(Position::new(0, 501)));
        assert!(!state.observe(Position::new(0, 501), secs(t0, 3.5)));
        assert!(state.is_idle(secs(t0, 3.5), Duration::from_secs(3)));
    }

    #[test]
    fn test_move_beyond_injected_radius_is_user() {
        let t0 = Instant::now();
        let mut state = ActivityState::new(t0);
        state.observe(Position::new(100, 100), t0);

        state.record_injected(Position::new(100, 100), 2);
        assert!(state.is_unobserved_change(Position::new(103, 100)));
        assert!(state.observe(Position::new(103, 100), secs(t0, 3.5)));
        assert!(!state.is_idle(secs(t0, 3.5), Duration::from_secs(3)));
    }

    #[test]
    fn test_unobserved_change() {
        let t0 = Instant::now();
        let mut state = ActivityState::new(t0);
        assert!(!state.is_unobserved_change(Position::new(1, 1)));
        state.observe(Position::new(1, 1), t0);
        assert!(!state.is_unobserved_change(Position::new(1, 1)));
        assert!(state.is_unobserved_change(Position::new(2, 1)));
    }

    #[test]
    fn test_sample_failure_is_no_change() {
        let t0 = Instant::now();
        let pointer = MockPointer::at(5, 5);
        let mut state = ActivityState::new(t0);
        sample(&mut state, &pointer, t0);

        pointer.set_position(6, 6);
        pointer.fail_queries.store(true, Ordering::SeqCst);
        sample(&mut state, &pointer, secs(t0, 1.0));
        assert_eq!(state.last_position(), Some(Position::new(5, 5)));
        assert_eq!(state.idle_for(secs(t0, 1.0)), Duration::from_secs(1));

        pointer.fail_queries.store(false, Ordering::SeqCst);
        sample(&mut state, &pointer, secs(t0, 1.5));
        assert_eq!(state.last_position(), Some(Position::new(6, 6)));
        assert_eq!(state.idle_for(secs(t0, 1.5)), Duration::ZERO);
    }
}
