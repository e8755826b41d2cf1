//! Playback position model for decode-on-demand clips.
//!
//! Extraction is pull-based, so there is no pipeline clock to query; the
//! position is derived from a base offset plus scaled wall-clock time.

use std::time::Instant;

#[derive(Debug)]
pub(crate) struct PlaybackClock {
    duration_ms: u64,
    base_ms: u64,
    running_since: Option<Instant>,
    speed: f64,
    looping: bool,
}

impl PlaybackClock {
    pub fn new(duration_ms: u64, looping: bool) -> Self {
        Self {
            duration_ms,
            base_ms: 0,
            running_since: None,
            speed: 1.0,
            looping,
        }
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn is_running(&self) -> bool {
        self.running_since.is_some()
    }

    pub fn position_ms(&self) -> u64 {
        self.position_at(Instant::now())
    }

    pub fn position_at(&self, now: Instant) -> u64 {
        let raw = match self.running_since {
            Some(since) => {
                let elapsed = now.saturating_duration_since(since).as_millis() as f64;
                self.base_ms + (elapsed * self.speed).max(0.0) as u64
            }
            None => self.base_ms,
        };
        if self.duration_ms == 0 {
            return 0;
        }
        if self.looping {
            raw % self.duration_ms
        } else {
            raw.min(self.duration_ms)
        }
    }

    pub fn start(&mut self, now: Instant) {
        if self.running_since.is_none() {
            self.running_since = Some(now);
        }
    }

    pub fn pause(&mut self, now: Instant) {
        self.base_ms = self.position_at(now);
        self.running_since = None;
    }

    pub fn stop(&mut self) {
        self.base_ms = 0;
        self.running_since = None;
    }

    /// Seek to an absolute position, clamped to `[0, duration]`.
    pub fn seek(&mut self, position_ms: u64, now: Instant) -> u64 {
        let clamped = position_ms.min(self.duration_ms);
        self.base_ms = clamped;
        if self.running_since.is_some() {
            self.running_since = Some(now);
        }
        clamped
    }

    pub fn set_speed(&mut self, factor: f64, now: Instant) {
        self.base_ms = self.position_at(now);
        if self.running_since.is_some() {
            self.running_since = Some(now);
        }
        self.speed = factor.max(0.0);
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn paused_clock_holds_position() {
        let now = Instant::now();
        let mut clock = PlaybackClock::new(10_000, false);
        clock.seek(3000, now);
        assert_eq!(clock.position_at(now + Duration::from_secs(5)), 3000);
    }

    #[test]
    fn running_clock_advances_and_clamps() {
        let now = Instant::now();
        let mut clock = PlaybackClock::new(10_000, false);
        clock.start(now);
        assert_eq!(clock.position_at(now + Duration::from_millis(2500)), 2500);
        assert_eq!(clock.position_at(now + Duration::from_secs(60)), 10_000);
    }

    #[test]
    fn looping_clock_wraps() {
        let now = Instant::now();
        let mut clock = PlaybackClock::new(4000, true);
        clock.start(now);
        assert_eq!(clock.position_at(now + Duration::from_millis(9000)), 1000);
    }

    #[test]
    fn seek_clamps_to_duration() {
        let now = Instant::now();
        let mut clock = PlaybackClock::new(8000, false);
        assert_eq!(clock.seek(20_000, now), 8000);
        assert_eq!(clock.seek(0, now), 0);
    }

    #[test]
    fn speed_scales_elapsed_time() {
        let now = Instant::now();
        let mut clock = PlaybackClock::new(100_000, false);
        clock.start(now);
        clock.set_speed(2.0, now);
        assert_eq!(clock.position_at(now + Duration::from_millis(1000)), 2000);
    }

    #[test]
    fn pause_then_resume_keeps_base() {
        let now = Instant::now();
        let mut clock = PlaybackClock::new(10_000, false);
        clock.start(now);
        clock.pause(now + Duration::from_millis(1500));
        assert_eq!(clock.position_at(now + Duration::from_secs(9)), 1500);
        clock.start(now + Duration::from_secs(10));
        assert_eq!(
            clock.position_at(now + Duration::from_millis(10_500)),
            2000
        );
    }
}
