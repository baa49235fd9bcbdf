use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Deserialize;

use crate::error::{MediaFfmpegError, Result};
use crate::time::Rational;

/// Stream kind discovered by probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Video,
    Audio,
    Other,
}

/// Stream metadata read from `ffprobe`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    pub index: u32,
    pub kind: StreamKind,
    pub time_base: Option<Rational>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub sample_aspect_ratio: Option<Rational>,
    pub start_pts: Option<i64>,
    pub duration_ts: Option<i64>,
}

/// Media probe result.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaInfo {
    pub path: PathBuf,
    pub streams: Vec<StreamInfo>,
    pub duration_seconds: Option<f64>,
}

impl MediaInfo {
    /// Returns the first video stream.
    ///
    /// # Example
    /// ```no_run
    /// use media_ffmpeg::probe_media;
    ///
    /// let info = probe_media("sample.mp4").expect("probe should succeed");
    /// let _video = info.first_video().expect("video stream exists");
    /// ```
    pub fn first_video(&self) -> Option<&StreamInfo> {
        self.streams
            .iter()
            .find(|stream| stream.kind == StreamKind::Video)
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<RawStream>,
    format: Option<RawFormat>,
}

#[derive(Debug, Deserialize)]
struct RawStream {
    index: u32,
    codec_type: Option<String>,
    time_base: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    sample_aspect_ratio: Option<String>,
    start_pts: Option<i64>,
    duration_ts: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawFormat {
    duration: Option<String>,
}

/// Probes stream layout and container duration via `ffprobe`.
///
/// # Example
/// ```no_run
/// use media_ffmpeg::probe_media;
///
/// let info = probe_media("sample.mp4").expect("probe should succeed");
/// assert!(!info.streams.is_empty());
/// ```
pub fn probe_media(path: impl AsRef<Path>) -> Result<MediaInfo> {
    let path = path.as_ref();

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration:stream=index,codec_type,time_base,width,height,sample_aspect_ratio,start_pts,duration_ts",
            "-of",
            "json",
        ])
        .arg(path)
        .output()
        .map_err(|source| MediaFfmpegError::Io {
            context: "run ffprobe",
            source,
        })?;

    if !output.status.success() {
        return Err(MediaFfmpegError::CommandFailed {
            command: format!("ffprobe {}", path.display()),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    parse_probe_json(path, &String::from_utf8_lossy(&output.stdout))
}

/// Parses `ffprobe -of json` output captured for `path`.
///
/// # Example
/// ```
/// use media_ffmpeg::parse_probe_json;
///
/// let json = r#"{
///     "streams": [{ "index": 0, "codec_type": "video", "width": 160, "height": 90 }],
///     "format": { "duration": "1.200000" }
/// }"#;
/// let info = parse_probe_json("clip.mp4", json).expect("valid");
/// assert_eq!(info.duration_seconds, Some(1.2));
/// ```
pub fn parse_probe_json(path: impl AsRef<Path>, json: &str) -> Result<MediaInfo> {
    let path = path.as_ref();
    let raw: ProbeOutput = serde_json::from_str(json)?;
    if raw.streams.is_empty() {
        return Err(MediaFfmpegError::NoStreams(path.to_path_buf()));
    }

    let streams = raw
        .streams
        .into_iter()
        .map(StreamInfo::try_from)
        .collect::<Result<Vec<_>>>()?;
    let duration_seconds = raw
        .format
        .and_then(|format| format.duration)
        .map(|value| parse_duration_seconds(&value))
        .transpose()?
        .flatten();

    Ok(MediaInfo {
        path: path.to_path_buf(),
        streams,
        duration_seconds,
    })
}

impl TryFrom<RawStream> for StreamInfo {
    type Error = MediaFfmpegError;

    fn try_from(raw: RawStream) -> Result<Self> {
        let kind = match raw.codec_type.as_deref() {
            Some("video") => StreamKind::Video,
            Some("audio") => StreamKind::Audio,
            _ => StreamKind::Other,
        };
        let time_base = raw
            .time_base
            .as_deref()
            .map(Rational::parse)
            .transpose()?
            .flatten();
        let sample_aspect_ratio = raw
            .sample_aspect_ratio
            .as_deref()
            .map(Rational::parse)
            .transpose()?
            .flatten();

        Ok(Self {
            index: raw.index,
            kind,
            time_base,
            width: raw.width.filter(|width| *width > 0),
            height: raw.height.filter(|height| *height > 0),
            sample_aspect_ratio,
            start_pts: raw.start_pts,
            duration_ts: raw.duration_ts,
        })
    }
}

fn parse_duration_seconds(value: &str) -> Result<Option<f64>> {
    let value = value.trim();
    if value.is_empty() || value == "N/A" {
        return Ok(None);
    }

    let seconds = value.parse::<f64>().map_err(|_| MediaFfmpegError::Parse {
        context: "format duration seconds",
        value: value.to_string(),
    })?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(MediaFfmpegError::Parse {
            context: "format duration seconds",
            value: value.to_string(),
        });
    }
    Ok(Some(seconds))
}
