use std::time::{Duration, Instant};

/// Pure debouncer: admits at most one event per interval.
///
/// Suppressed events are dropped, not deferred. `now` is passed in so the
/// timing rule can be exercised with synthetic instants.
#[derive(Debug)]
pub struct Debouncer {
    interval: Duration,
    last_run: Option<Instant>,
}

impl Debouncer {
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_run: None,
        }
    }

    /// Admit the event at `now`, recording it as the last run.
    pub fn admit(&mut self, now: Instant) -> bool {
        if let Some(last_run) = self.last_run
            && now.saturating_duration_since(last_run) < self.interval
        {
            return false;
        }

        self.last_run = Some(now);
        true
    }

    /// Time left before the next event would be admitted.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.last_run
            .map(|t| self.interval.saturating_sub(now.saturating_duration_since(t)))
            .unwrap_or(Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(base: Instant, secs: f64) -> Instant {
        base + Duration::from_secs_f64(secs)
    }

    #[test]
    fn test_first_event_admitted() {
        let mut debouncer = Debouncer::new(Duration::from_secs(1));
        assert!(debouncer.admit(Instant::now()));
    }

    #[test]
    fn test_burst_sequence() {
        let base = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_secs(1));

        let admitted: Vec<f64> = [0.0, 0.3, 0.5, 1.2, 2.5]
            .into_iter()
            .filter(|&t| debouncer.admit(at(base, t)))
            .collect();

        assert_eq!(admitted, vec![0.0, 1.2, 2.5]);
    }

    #[test]
    fn test_suppressed_event_does_not_extend_window() {
        let base = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_secs(1));

        assert!(debouncer.admit(at(base, 0.0)));
        assert!(!debouncer.admit(at(base, 0.9)));
        // measured from the admitted event, not the suppressed one
        assert!(debouncer.admit(at(base, 1.0)));
    }

    #[test]
    fn test_remaining() {
        let base = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_secs(1));
        assert_eq!(debouncer.remaining(base), Duration::ZERO);

        debouncer.admit(base);
        assert_eq!(
            debouncer.remaining(at(base, 0.25)),
            Duration::from_millis(750)
        );
        assert_eq!(debouncer.remaining(at(base, 3.0)), Duration::ZERO);
    }
}
