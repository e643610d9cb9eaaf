use std::time::{Duration, Instant};

use crate::system::Tick;

/// Wall clock producing [`Tick`]s and a frames-per-second estimate.
#[derive(Debug, Clone)]
pub struct FrameClock {
    start: Instant,
    last: Instant,
    index: u64,
    window_start: Instant,
    window_frames: u32,
    fps: u32,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::starting_at(Instant::now())
    }
}

impl FrameClock {
    pub fn starting_at(now: Instant) -> Self {
        Self {
            start: now,
            last: now,
            index: 0,
            window_start: now,
            window_frames: 0,
            fps: 0,
        }
    }

    pub fn tick(&mut self) -> Tick {
        self.tick_at(Instant::now())
    }

    /// Advance to `now`. The fps estimate refreshes once a full second of
    /// frames has accumulated.
    pub fn tick_at(&mut self, now: Instant) -> Tick {
        self.index += 1;
        let delta = now.saturating_duration_since(self.last);
        self.last = now;

        self.window_frames += 1;
        if now.saturating_duration_since(self.window_start) >= Duration::from_secs(1) {
            self.fps = self.window_frames;
            self.window_frames = 0;
            self.window_start = now;
            tracing::debug!(fps = self.fps, frame = self.index, "frame rate");
        }

        Tick {
            index: self.index,
            delta,
            elapsed: now.saturating_duration_since(self.start),
        }
    }

    pub fn frames(&self) -> u64 {
        self.index
    }

    /// Frames counted over the last complete second.
    pub fn fps(&self) -> u32 {
        self.fps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_count_up_with_deltas() {
        let t0 = Instant::now();
        let mut c = FrameClock::starting_at(t0);
        let a = c.tick_at(t0 + Duration::from_millis(10));
        let b = c.tick_at(t0 + Duration::from_millis(25));
        assert_eq!(a.index, 1);
        assert_eq!(b.index, 2);
        assert_eq!(b.delta, Duration::from_millis(15));
        assert_eq!(b.elapsed, Duration::from_millis(25));
    }

    #[test]
    fn fps_updates_after_a_second() {
        let t0 = Instant::now();
        let mut c = FrameClock::starting_at(t0);
        for i in 1..=30 {
            c.tick_at(t0 + Duration::from_millis(i * 20));
        }
        assert_eq!(c.fps(), 0);
        for i in 31..=50 {
            c.tick_at(t0 + Duration::from_millis(i * 20));
        }
        assert_eq!(c.fps(), 50);
    }

    #[test]
    fn backwards_time_saturates() {
        let t0 = Instant::now();
        let mut c = FrameClock::starting_at(t0 + Duration::from_secs(1));
        let t = c.tick_at(t0);
        assert_eq!(t.delta, Duration::ZERO);
    }
}
