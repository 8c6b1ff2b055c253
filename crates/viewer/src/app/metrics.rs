use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct ViewerMetricsSnapshot {
    pub(crate) fps: f32,
    pub(crate) frame_time_ms: f32,
    pub(crate) draw_commands: usize,
    pub(crate) cache_rebuilds: u64,
}

/// Per-interval frame statistics logged by the loop.
#[derive(Debug)]
pub(crate) struct MetricsAccumulator {
    interval_start: Instant,
    interval: Duration,
    frames: u32,
    frame_time_sum: Duration,
    last_draw_commands: usize,
    rebuilds_at_interval_start: u64,
    last_rebuild_count: u64,
}

impl MetricsAccumulator {
    pub(crate) fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval_start: now,
            interval,
            frames: 0,
            frame_time_sum: Duration::ZERO,
            last_draw_commands: 0,
            rebuilds_at_interval_start: 0,
            last_rebuild_count: 0,
        }
    }

    /// `rebuild_count` is the view's running total of visible-tile rebuilds.
    pub(crate) fn record_frame(&mut self, frame_dt: Duration, draw_commands: usize, rebuild_count: u64) {
        self.frames = self.frames.saturating_add(1);
        self.frame_time_sum = self.frame_time_sum.saturating_add(frame_dt);
        self.last_draw_commands = draw_commands;
        self.last_rebuild_count = rebuild_count;
    }

    pub(crate) fn maybe_snapshot(&mut self, now: Instant) -> Option<ViewerMetricsSnapshot> {
        let elapsed = now.saturating_duration_since(self.interval_start);
        if elapsed < self.interval {
            return None;
        }

        let elapsed_seconds = elapsed.as_secs_f32().max(f32::EPSILON);
        let frame_time_ms = if self.frames == 0 {
            0.0
        } else {
            (self.frame_time_sum.as_secs_f32() / self.frames as f32) * 1000.0
        };
        let snapshot = ViewerMetricsSnapshot {
            fps: self.frames as f32 / elapsed_seconds,
            frame_time_ms,
            draw_commands: self.last_draw_commands,
            cache_rebuilds: self
                .last_rebuild_count
                .saturating_sub(self.rebuilds_at_interval_start),
        };

        self.interval_start = now;
        self.frames = 0;
        self.frame_time_sum = Duration::ZERO;
        self.rebuilds_at_interval_start = self.last_rebuild_count;

        Some(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_snapshot_before_interval_elapses() {
        let start = Instant::now();
        let mut metrics = MetricsAccumulator::new(Duration::from_secs(1), start);
        metrics.record_frame(Duration::from_millis(16), 10, 1);
        assert!(metrics
            .maybe_snapshot(start + Duration::from_millis(500))
            .is_none());
    }

    #[test]
    fn snapshot_reports_rates_and_resets() {
        let start = Instant::now();
        let mut metrics = MetricsAccumulator::new(Duration::from_secs(1), start);
        for rebuilds in 1..=4 {
            metrics.record_frame(Duration::from_millis(20), 120, rebuilds);
        }

        let snapshot = metrics
            .maybe_snapshot(start + Duration::from_secs(2))
            .expect("interval elapsed");
        assert!((snapshot.fps - 2.0).abs() < 1e-4);
        assert!((snapshot.frame_time_ms - 20.0).abs() < 1e-3);
        assert_eq!(snapshot.draw_commands, 120);
        assert_eq!(snapshot.cache_rebuilds, 4);

        metrics.record_frame(Duration::from_millis(20), 80, 4);
        let next = metrics
            .maybe_snapshot(start + Duration::from_secs(3))
            .expect("interval elapsed");
        assert_eq!(next.cache_rebuilds, 0);
        assert_eq!(next.draw_commands, 80);
    }
}
