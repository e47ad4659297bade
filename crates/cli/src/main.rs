mod settings;

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use crossbeam_channel::RecvTimeoutError;

use gazewatch_core::capture::domain::frame_source::FrameSource;
use gazewatch_core::capture::infrastructure::command_frame_source::CommandFrameSource;
use gazewatch_core::capture::infrastructure::file_frame_source::FileFrameSource;
use gazewatch_core::detection::infrastructure::http_gaze_detector::HttpGazeDetector;
use gazewatch_core::pipeline::analyze_frame_use_case::{CycleOutcome, GazeReport};
use gazewatch_core::pipeline::sampling_controller::{ControllerConfig, SamplingController};
use gazewatch_core::pipeline::tracking_listener::{
    ChannelTrackingListener, LogTrackingListener, TrackingEvent, TrackingListener,
};
use gazewatch_core::shared::constants::{MAX_INTERVAL_MS, MIN_INTERVAL_MS, SAMPLE_STORE_CAPACITY};
use gazewatch_core::tracking::domain::tracking_sample::TrackingSample;
use gazewatch_core::tracking::infrastructure::json_session_store::JsonSessionStore;

use settings::Settings;

/// Checks whether the user is looking at the screen, using a remote
/// face-analysis service.
#[derive(Parser)]
#[command(name = "gazewatch", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Face-analysis endpoint (overrides the settings file).
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Image file to analyze on every capture.
    #[arg(long, global = true, conflicts_with = "capture_command")]
    frame_file: Option<PathBuf>,

    /// Command that writes one encoded frame to stdout, e.g. "fswebcam -".
    #[arg(long, global = true)]
    capture_command: Option<String>,

    /// Minimum eye-direction confidence (0-100) for eye angles to count.
    #[arg(long, global = true)]
    confidence_threshold: Option<u32>,
}

#[derive(Subcommand)]
enum Command {
    /// Capture and judge a single frame.
    Capture {
        /// Print the measurement and judgment as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Sample continuously until the sample or time limit is reached.
    Track {
        /// Milliseconds between captures (1000-10000).
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Stop after this many judged captures.
        #[arg(long)]
        samples: Option<usize>,

        /// Stop after this many seconds.
        #[arg(long)]
        duration_secs: Option<u64>,

        /// Do not keep samples for export.
        #[arg(long)]
        no_record: bool,

        /// Write the recorded samples to this file instead of the data directory.
        #[arg(long)]
        export: Option<PathBuf>,

        /// Session id for the saved data (defaults to the current time).
        #[arg(long)]
        session_id: Option<String>,
    },
    /// Summarize a saved session.
    Show { session_id: String },
    /// Check that the analysis service is reachable.
    Health,
    /// Print the effective settings.
    Settings {
        /// Persist them to the settings file.
        #[arg(long)]
        save: bool,
    },
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let settings = apply_overrides(&cli, Settings::load());

    match cli.command {
        Command::Capture { json } => run_capture(&settings, json),
        Command::Track {
            interval_ms,
            samples,
            duration_secs,
            no_record,
            export,
            session_id,
        } => {
            let mut settings = settings;
            if let Some(ms) = interval_ms {
                settings.interval_ms = ms;
            }
            if no_record {
                settings.record_samples = false;
            }
            let limits = TrackLimits {
                samples,
                duration: duration_secs.map(Duration::from_secs),
            };
            run_track(&settings, limits, export, session_id.as_deref())
        }
        Command::Show { session_id } => run_show(&settings, &session_id),
        Command::Health => run_health(&settings),
        Command::Settings { save } => {
            validate(&settings)?;
            println!("{}", serde_json::to_string_pretty(&settings)?);
            if save {
                let path = settings.save()?;
                log::info!("Settings written to {}", path.display());
            }
            Ok(())
        }
    }
}

fn run_capture(settings: &Settings, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    validate(settings)?;
    let controller = build_controller(settings, Arc::new(LogTrackingListener::default()))?;

    match controller.capture_once()? {
        CycleOutcome::Judged(report) if json => {
            println!("{}", serde_json::to_string_pretty(&report_json(&report))?);
        }
        CycleOutcome::Judged(report) => print_report(&report),
        CycleOutcome::NoFace => println!("No face detected"),
        CycleOutcome::CaptureUnavailable => return Err("Failed to capture image".into()),
    }
    controller.dispose();
    Ok(())
}

struct TrackLimits {
    samples: Option<usize>,
    duration: Option<Duration>,
}

fn run_track(
    settings: &Settings,
    limits: TrackLimits,
    export: Option<PathBuf>,
    session_id: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    validate(settings)?;
    if limits.samples.is_none() && limits.duration.is_none() {
        log::warn!("No --samples or --duration-secs given; tracking until interrupted");
    }

    let (tx, events) = crossbeam_channel::unbounded();
    let mut controller = build_controller(settings, Arc::new(ChannelTrackingListener::new(tx)))?;
    let log_listener = LogTrackingListener::default();
    let deadline = limits.duration.map(|d| Instant::now() + d);
    let mut limit = SampleLimit::new(limits.samples, settings.record_samples);

    controller.start();
    loop {
        let wait = match deadline {
            Some(deadline) => deadline.saturating_duration_since(Instant::now()),
            None => Duration::from_secs(3600),
        };
        let event = match events.recv_timeout(wait) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) if deadline.is_some() => break,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        log_listener.on_event(&event);

        if let TrackingEvent::Judged(report) = &event {
            if !limit.reached() {
                println!(
                    "[{}] {}",
                    report.timestamp.format("%H:%M:%S"),
                    report.judgment.status_line()
                );
            }
        }
        if limit.observe(&event) {
            break;
        }
    }
    // A cycle already past its generation check when `stop` runs may still
    // append after the export below; that sample is not exported.
    controller.stop();

    if let Some(summary) = log_listener.summary_string() {
        eprintln!("\n{summary}");
    }

    let saved = save_samples(&controller, settings, export, session_id);
    controller.dispose();
    if let Some((count, path)) = saved? {
        println!("Saved {count} samples to {}", path.display());
    }
    Ok(())
}

/// Writes the recorded samples to `export`, or to the session store when no
/// path is given. Returns `None` when nothing was recorded.
fn save_samples(
    controller: &SamplingController,
    settings: &Settings,
    export: Option<PathBuf>,
    session_id: Option<&str>,
) -> Result<Option<(usize, PathBuf)>, Box<dyn std::error::Error>> {
    let samples = controller.export_samples();
    if samples.is_empty() {
        log::warn!("No tracking data to export");
        return Ok(None);
    }

    let path = match export {
        Some(path) => {
            std::fs::write(&path, serde_json::to_string_pretty(&samples)?)?;
            path
        }
        None => session_store(settings)?.save(session_id, &samples)?,
    };
    Ok(Some((samples.len(), path)))
}

/// Counts judged captures toward `--samples` and decides when the tracking
/// loop may end.
struct SampleLimit {
    max: Option<usize>,
    recording: bool,
    judged: usize,
}

impl SampleLimit {
    fn new(max: Option<usize>, recording: bool) -> Self {
        Self {
            max,
            recording,
            judged: 0,
        }
    }

    fn reached(&self) -> bool {
        self.max.is_some_and(|n| self.judged >= n)
    }

    /// Returns `true` once the loop should stop.
    ///
    /// When recording, a sample is appended after its `Judged` event, so
    /// the loop waits until the store holds every counted capture. The
    /// `SampleRecorded` events of overlapping cycles can arrive out of
    /// order, hence the comparison on `total` rather than the first event.
    fn observe(&mut self, event: &TrackingEvent) -> bool {
        match event {
            TrackingEvent::Judged(_) if !self.reached() => {
                self.judged += 1;
                self.reached() && !self.recording
            }
            TrackingEvent::SampleRecorded { total } if self.reached() => {
                *total >= self.judged.min(SAMPLE_STORE_CAPACITY)
            }
            _ => false,
        }
    }
}

fn run_show(settings: &Settings, session_id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let samples = session_store(settings)?.load(session_id)?;
    println!("{}", session_summary(&samples));
    Ok(())
}

fn run_health(settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    let detector = HttpGazeDetector::new(&settings.endpoint)?;
    let health = detector.check_health()?;
    println!("{}", serde_json::to_string_pretty(&health)?);
    Ok(())
}

fn apply_overrides(cli: &Cli, mut settings: Settings) -> Settings {
    if let Some(endpoint) = &cli.endpoint {
        settings.endpoint = endpoint.clone();
    }
    if let Some(pct) = cli.confidence_threshold {
        settings.confidence_threshold = pct;
    }
    if let Some(path) = &cli.frame_file {
        settings.frame_file = Some(path.clone());
        settings.capture_command = None;
    }
    if let Some(command) = &cli.capture_command {
        settings.capture_command = Some(command.clone());
        settings.frame_file = None;
    }
    settings
}

fn build_frame_source(
    settings: &Settings,
) -> Result<Box<dyn FrameSource>, Box<dyn std::error::Error>> {
    if let Some(path) = &settings.frame_file {
        return Ok(Box::new(FileFrameSource::new(path)));
    }
    if let Some(command) = &settings.capture_command {
        return Ok(Box::new(CommandFrameSource::parse(command)?));
    }
    Err("No frame source configured: pass --frame-file or --capture-command".into())
}

fn build_controller(
    settings: &Settings,
    listener: Arc<dyn TrackingListener>,
) -> Result<SamplingController, Box<dyn std::error::Error>> {
    let frame_source = build_frame_source(settings)?;
    let detector = HttpGazeDetector::new(&settings.endpoint)?;
    log::info!("Analyzing frames with {}", detector.endpoint());

    let config = ControllerConfig {
        interval: Duration::from_millis(settings.interval_ms),
        confidence_threshold: f64::from(settings.confidence_threshold),
        record_samples: settings.record_samples,
    };
    Ok(SamplingController::new(
        frame_source,
        Box::new(detector),
        listener,
        config,
    )?)
}

fn session_store(settings: &Settings) -> Result<JsonSessionStore, Box<dyn std::error::Error>> {
    match &settings.data_dir {
        Some(dir) => Ok(JsonSessionStore::new(dir)),
        None => Ok(JsonSessionStore::in_default_location()?),
    }
}

fn print_report(report: &GazeReport) {
    println!("{}", report.judgment.status_line());
    println!("  Faces detected:   {}", report.faces_detected);
    println!("  Face confidence:  {:.2}%", report.face.confidence);
    println!("  Confidence level: {}", report.judgment.confidence_level());
    if let Some(pose) = report.face.head_pose {
        println!(
            "  Head pose:        yaw {:.2}°, pitch {:.2}°, roll {:.2}°",
            pose.yaw, pose.pitch, pose.roll
        );
    }
    if let Some(eyes) = report.face.eye_direction {
        println!(
            "  Eye direction:    yaw {:.2}°, pitch {:.2}° ({:.2}% confident)",
            eyes.yaw, eyes.pitch, eyes.confidence
        );
    }
}

fn report_json(report: &GazeReport) -> serde_json::Value {
    serde_json::json!({
        "timestamp": report.timestamp,
        "facesDetected": report.faces_detected,
        "face": report.face,
        "judgment": report.judgment,
    })
}

fn session_summary(samples: &[TrackingSample]) -> String {
    let (Some(first), Some(last)) = (samples.first(), samples.last()) else {
        return "Session is empty".to_string();
    };

    let judged = samples
        .iter()
        .filter(|s| s.is_looking_at_screen.is_some())
        .count();
    let looking = samples
        .iter()
        .filter(|s| s.is_looking_at_screen == Some(true))
        .count();

    let mut lines = vec![
        format!("Samples: {}", samples.len()),
        format!("From:    {}", first.timestamp.to_rfc3339()),
        format!("To:      {}", last.timestamp.to_rfc3339()),
    ];
    if judged > 0 {
        let pct = looking as f64 / judged as f64 * 100.0;
        lines.push(format!("Looking at screen: {looking}/{judged} ({pct:.1}%)"));
    }
    lines.join("\n")
}

fn validate(settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    if !(MIN_INTERVAL_MS..=MAX_INTERVAL_MS).contains(&settings.interval_ms) {
        return Err(format!(
            "Interval must be between {MIN_INTERVAL_MS} and {MAX_INTERVAL_MS} ms, got {}",
            settings.interval_ms
        )
        .into());
    }
    if settings.confidence_threshold > 100 {
        return Err(format!(
            "Confidence threshold must be between 0 and 100, got {}",
            settings.confidence_threshold
        )
        .into());
    }
    Ok(())
}
