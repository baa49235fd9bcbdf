//! `ffprobe`-backed metadata probing for media handles.

mod error;
mod probe;
mod time;

pub use error::{MediaFfmpegError, Result};
pub use probe::{MediaInfo, StreamInfo, StreamKind, parse_probe_json, probe_media};
pub use time::Rational;
