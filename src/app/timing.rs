use std::time::{Duration, Instant};
use winit::window::Window;

const TITLE_REFRESH: Duration = Duration::from_millis(500);

/// Frame clock: elapsed time for animation plus an fps readout in the title.
pub struct FrameTiming {
    started: Instant,
    last_frame_time: Option<Instant>,
    last_fps_time: Instant,
    frame_count: u32,
    pub frame_dt: f32,
    base_title: String,
}

impl FrameTiming {
    pub fn new(base_title: impl Into<String>) -> Self {
        let now = Instant::now();
        Self {
            started: now,
            last_frame_time: None,
            last_fps_time: now,
            frame_count: 0,
            frame_dt: 1.0 / 60.0,
            base_title: base_title.into(),
        }
    }

    pub fn base_title(&self) -> &str {
        &self.base_title
    }

    /// Seconds since the clock started, as seen by the last [`update`](Self::update).
    pub fn elapsed(&self) -> f32 {
        self.last_frame_time
            .map(|at| at.saturating_duration_since(self.started).as_secs_f32())
            .unwrap_or(0.0)
    }

    pub fn update(&mut self, window: Option<&Window>, now: Instant) {
        let dt = match self.last_frame_time {
            Some(last) => now.saturating_duration_since(last),
            None => Duration::from_millis(16),
        };
        self.last_frame_time = Some(now);
        self.frame_dt = dt.as_secs_f32();

        self.frame_count = self.frame_count.saturating_add(1);
        let since = now.saturating_duration_since(self.last_fps_time);
        if since >= TITLE_REFRESH {
            let fps = self.frame_count as f32 / since.as_secs_f32();
            if let Some(window) = window {
                window.set_title(&format!("{} - {:.1} fps", self.base_title, fps));
            }
            self.frame_count = 0;
            self.last_fps_time = now;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_follows_updates() {
        let mut timing = FrameTiming::new("Dollhouse");
        assert_eq!(timing.elapsed(), 0.0);
        let start = timing.started;
        timing.update(None, start + Duration::from_millis(250));
        assert!((timing.elapsed() - 0.25).abs() < 1e-4);
        timing.update(None, start + Duration::from_millis(750));
        assert!((timing.elapsed() - 0.75).abs() < 1e-4);
        assert!((timing.frame_dt - 0.5).abs() < 1e-4);
    }

    #[test]
    fn clock_never_runs_backwards() {
        let mut timing = FrameTiming::new("Dollhouse");
        let start = timing.started;
        timing.update(None, start + Duration::from_secs(1));
        timing.update(None, start);
        assert_eq!(timing.frame_dt, 0.0);
        assert_eq!(timing.elapsed(), 0.0);
    }
}
