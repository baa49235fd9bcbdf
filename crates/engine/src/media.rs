use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;

use tracing::{debug, warn};

use crate::error::Result;
use crate::time::TimePosition;

/// Display aspect of the first video stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AspectRatio {
    pub width: u32,
    pub height: u32,
}

impl AspectRatio {
    pub fn ratio(&self) -> f64 {
        f64::from(self.width) / f64::from(self.height.max(1))
    }
}

/// Caller-owned reference to a decodable asset.
///
/// The controller only reads it; duration may stay unknown until an
/// asynchronous load completes.
pub trait MediaHandle: Send + Sync {
    fn duration(&self) -> Option<TimePosition>;

    fn natural_aspect(&self) -> Option<AspectRatio>;

    /// Starts resolving the duration in the background.
    fn request_duration(&self) {}
}

/// Media handle whose metadata is already known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticMedia {
    pub duration: Option<TimePosition>,
    pub aspect: Option<AspectRatio>,
}

impl MediaHandle for StaticMedia {
    fn duration(&self) -> Option<TimePosition> {
        self.duration
    }

    fn natural_aspect(&self) -> Option<AspectRatio> {
        self.aspect
    }
}

/// Metadata resolved from one `ffprobe` run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbedMetadata {
    pub duration: TimePosition,
    pub aspect: Option<AspectRatio>,
}

#[derive(Debug, Clone)]
enum ProbeOutcome {
    Ready(ProbedMetadata),
    Failed(String),
}

/// File-backed media handle that probes on a background thread.
///
/// A duration that never resolves is the caller's concern: poll
/// [`ProbedMedia::load_error`] and apply a timeout.
#[derive(Debug, Clone)]
pub struct ProbedMedia {
    path: PathBuf,
    requested: Arc<AtomicBool>,
    outcome: Arc<OnceLock<ProbeOutcome>>,
}

impl ProbedMedia {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            requested: Arc::new(AtomicBool::new(false)),
            outcome: Arc::new(OnceLock::new()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Probe failure message, once the background probe has failed.
    pub fn load_error(&self) -> Option<String> {
        match self.outcome.get()? {
            ProbeOutcome::Failed(message) => Some(message.clone()),
            ProbeOutcome::Ready(_) => None,
        }
    }

    fn metadata(&self) -> Option<ProbedMetadata> {
        match self.outcome.get()? {
            ProbeOutcome::Ready(metadata) => Some(*metadata),
            ProbeOutcome::Failed(_) => None,
        }
    }
}

impl MediaHandle for ProbedMedia {
    fn duration(&self) -> Option<TimePosition> {
        self.metadata().map(|metadata| metadata.duration)
    }

    fn natural_aspect(&self) -> Option<AspectRatio> {
        self.metadata().and_then(|metadata| metadata.aspect)
    }

    fn request_duration(&self) {
        if self.requested.swap(true, Ordering::AcqRel) {
            return;
        }

        let path = self.path.clone();
        let outcome = Arc::clone(&self.outcome);
        thread::spawn(move || {
            let resolved = match probe_metadata(&path) {
                Ok(metadata) => {
                    debug!(
                        path = %path.display(),
                        duration_tl = metadata.duration.ticks(),
                        "media duration resolved"
                    );
                    ProbeOutcome::Ready(metadata)
                }
                Err(error) => {
                    warn!(path = %path.display(), %error, "media probe failed");
                    ProbeOutcome::Failed(error.to_string())
                }
            };
            let _ = outcome.set(resolved);
        });
    }
}

/// Probes `path` synchronously.
pub fn probe_metadata(path: &Path) -> Result<ProbedMetadata> {
    let info = media_ffmpeg::probe_media(path)?;
    let duration = duration_from_probe(&info)
        .ok_or_else(|| media_ffmpeg::MediaFfmpegError::MissingDuration(path.to_path_buf()))?;
    Ok(ProbedMetadata {
        duration,
        aspect: aspect_from_probe(&info),
    })
}

/// Container duration when reported, otherwise the longest stream.
fn duration_from_probe(info: &media_ffmpeg::MediaInfo) -> Option<TimePosition> {
    if let Some(seconds) = info.duration_seconds {
        return Some(TimePosition::from_seconds(seconds));
    }

    info.streams
        .iter()
        .filter_map(|stream| {
            let duration_ts = stream.duration_ts?;
            let time_base = stream.time_base?;
            Some(TimePosition::from_timestamp(duration_ts, time_base.into()))
        })
        .max()
}

/// Storage dimensions corrected by the sample aspect ratio.
fn aspect_from_probe(info: &media_ffmpeg::MediaInfo) -> Option<AspectRatio> {
    let video = info.first_video()?;
    let (width, height) = (video.width?, video.height?);
    let Some(sar) = video.sample_aspect_ratio else {
        return Some(AspectRatio { width, height });
    };

    let display_width = u64::from(width) * u64::from(sar.num.unsigned_abs());
    let display_height = u64::from(height) * u64::from(sar.den.unsigned_abs());
    let divisor = gcd(display_width, display_height).max(1);
    Some(AspectRatio {
        width: u32::try_from(display_width / divisor).unwrap_or(width),
        height: u32::try_from(display_height / divisor).unwrap_or(height),
    })
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}
