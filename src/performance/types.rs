use serde::{Deserialize, Serialize};

/// Current page-load and runtime metrics.
///
/// Page-load fields are one-shot (last value wins). Runtime fields are
/// resampled continuously; the `*_time_ms` fields are running totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    pub first_paint: Option<f64>,
    pub first_contentful_paint: Option<f64>,
    pub largest_contentful_paint: Option<f64>,
    pub first_input_delay: Option<f64>,
    pub cumulative_layout_shift: Option<f64>,
    pub time_to_first_byte: Option<f64>,

    pub memory_usage_percent: Option<f64>,
    pub fps: Option<f64>,
    pub script_time_ms: f64,
    pub layout_time_ms: f64,
    pub paint_time_ms: f64,
}

/// Rolling one-second frame counter.
#[derive(Debug, Default)]
pub(crate) struct FrameWindow {
    window_start: Option<f64>,
    frames: u32,
}

impl FrameWindow {
    /// Counts a frame at `timestamp_ms`. Returns the frame rate whenever a
    /// full second has elapsed since the window opened.
    pub(crate) fn frame(&mut self, timestamp_ms: f64) -> Option<f64> {
        let Some(start) = self.window_start else {
            self.window_start = Some(timestamp_ms);
            return None;
        };
        self.frames += 1;

        let elapsed = timestamp_ms - start;
        if elapsed < 1000.0 {
            return None;
        }
        let fps = self.frames as f64 * 1000.0 / elapsed;
        self.window_start = Some(timestamp_ms);
        self.frames = 0;
        Some(fps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_window_reports_once_per_second() {
        let mut window = FrameWindow::default();
        let mut reported = Vec::new();
        // An opening frame, then 60 frames spaced 1000/60 ms apart.
        for i in 0..=60 {
            if let Some(fps) = window.frame(i as f64 * 1000.0 / 60.0) {
                reported.push(fps);
            }
        }
        assert_eq!(reported.len(), 1);
        assert!((reported[0] - 60.0).abs() < 0.01, "got {}", reported[0]);
    }
}
