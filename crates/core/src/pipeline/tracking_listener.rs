use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;

use crate::gaze::domain::gaze_judgment::GazeStatus;
use crate::pipeline::analyze_frame_use_case::GazeReport;

/// Something the sampling controller wants the presentation layer to know.
#[derive(Clone, Debug, PartialEq)]
pub enum TrackingEvent {
    Started { interval: Duration },
    Stopped,
    IntervalChanged(Duration),
    ThresholdChanged(f64),
    RecordingChanged(bool),
    Judged(GazeReport),
    NoFace,
    CaptureUnavailable,
    CycleFailed(String),
    /// A sample was appended; `total` is the store size afterwards.
    SampleRecorded { total: usize },
    /// A cycle finished after tracking was stopped; its result was dropped.
    StaleDiscarded,
}

/// Receives tracking events, possibly from several cycle threads at once.
pub trait TrackingListener: Send + Sync {
    fn on_event(&self, event: &TrackingEvent);
}

/// Discards all events.
pub struct NullTrackingListener;

impl TrackingListener for NullTrackingListener {
    fn on_event(&self, _event: &TrackingEvent) {}
}

/// Forwards events to a channel, for consumers running their own loop.
pub struct ChannelTrackingListener {
    tx: Sender<TrackingEvent>,
}

impl ChannelTrackingListener {
    pub fn new(tx: Sender<TrackingEvent>) -> Self {
        Self { tx }
    }
}

impl TrackingListener for ChannelTrackingListener {
    fn on_event(&self, event: &TrackingEvent) {
        // A dropped receiver just means nobody is watching anymore.
        let _ = self.tx.send(event.clone());
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TrackingStats {
    pub looking: usize,
    pub not_looking: usize,
    pub low_confidence: usize,
    pub no_face: usize,
    pub capture_unavailable: usize,
    pub failed: usize,
    pub stale: usize,
}

impl TrackingStats {
    pub fn judged(&self) -> usize {
        self.looking + self.not_looking + self.low_confidence
    }
}

/// Reports events through the `log` crate and tallies them for an
/// end-of-session summary.
///
/// "Saved N data points" messages are throttled to every
/// `recorded_every` samples.
pub struct LogTrackingListener {
    recorded_every: usize,
    stats: Mutex<TrackingStats>,
    start_time: Instant,
}

impl LogTrackingListener {
    pub fn new(recorded_every: usize) -> Self {
        Self {
            recorded_every: recorded_every.max(1),
            stats: Mutex::new(TrackingStats::default()),
            start_time: Instant::now(),
        }
    }

    pub fn stats(&self) -> TrackingStats {
        *self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the formatted summary, or `None` if no cycle completed.
    pub fn summary_string(&self) -> Option<String> {
        let stats = self.stats();
        let cycles = stats.judged()
            + stats.no_face
            + stats.capture_unavailable
            + stats.failed
            + stats.stale;
        if cycles == 0 {
            return None;
        }

        let elapsed = self.start_time.elapsed().as_secs_f64();
        let mut lines = vec![format!(
            "Tracking summary ({cycles} cycles, {elapsed:.1}s total):"
        )];
        lines.push(format!("  Looking at screen: {}", stats.looking));
        lines.push(format!("  Not looking:       {}", stats.not_looking));
        lines.push(format!("  Low confidence:    {}", stats.low_confidence));
        lines.push(format!("  No face:           {}", stats.no_face));
        if stats.capture_unavailable > 0 {
            lines.push(format!("  Capture skipped:   {}", stats.capture_unavailable));
        }
        if stats.failed > 0 {
            lines.push(format!("  Failed:            {}", stats.failed));
        }
        if stats.stale > 0 {
            lines.push(format!("  Discarded (stale): {}", stats.stale));
        }

        let judged = stats.judged();
        if judged > 0 {
            let pct = stats.looking as f64 / judged as f64 * 100.0;
            lines.push(format!("  Attention: {pct:.1}% of judged samples"));
        }

        Some(lines.join("\n"))
    }

    pub fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }

    fn tally(&self, update: impl FnOnce(&mut TrackingStats)) {
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        update(&mut *stats);
    }
}

impl Default for LogTrackingListener {
    fn default() -> Self {
        Self::new(10)
    }
}

impl TrackingListener for LogTrackingListener {
    fn on_event(&self, event: &TrackingEvent) {
        match event {
            TrackingEvent::Started { interval } => {
                log::info!(
                    "Continuous tracking started (every {:.1}s)",
                    interval.as_secs_f64()
                );
            }
            TrackingEvent::Stopped => log::warn!("Continuous tracking stopped"),
            TrackingEvent::IntervalChanged(interval) => {
                log::info!(
                    "Tracking interval updated to {:.1}s",
                    interval.as_secs_f64()
                );
            }
            TrackingEvent::ThresholdChanged(pct) => {
                log::info!("Confidence threshold updated to {pct}%");
            }
            TrackingEvent::RecordingChanged(on) => {
                log::info!("Sample recording {}", if *on { "enabled" } else { "disabled" });
            }
            TrackingEvent::Judged(report) => {
                let line = report.judgment.status_line();
                match report.judgment.status() {
                    GazeStatus::LowConfidence => {
                        self.tally(|s| s.low_confidence += 1);
                        log::warn!("{line}");
                    }
                    GazeStatus::NotLooking => {
                        self.tally(|s| s.not_looking += 1);
                        log::warn!("{line}");
                    }
                    GazeStatus::Looking => {
                        self.tally(|s| s.looking += 1);
                        log::info!("{line}");
                    }
                }
            }
            TrackingEvent::NoFace => {
                self.tally(|s| s.no_face += 1);
                log::warn!("No face detected");
            }
            TrackingEvent::CaptureUnavailable => {
                self.tally(|s| s.capture_unavailable += 1);
                log::warn!("Failed to capture image");
            }
            TrackingEvent::CycleFailed(message) => {
                self.tally(|s| s.failed += 1);
                log::error!("Error analyzing image: {message}");
            }
            TrackingEvent::SampleRecorded { total } => {
                if total % self.recorded_every == 0 {
                    log::info!("Saved {total} data points for analysis");
                }
            }
            TrackingEvent::StaleDiscarded => {
                self.tally(|s| s.stale += 1);
                log::debug!("Discarded result of a cycle that finished after stop");
            }
        }
    }
}
