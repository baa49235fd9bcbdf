use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Result type used by this crate.
pub type Result<T> = std::result::Result<T, MediaFfmpegError>;

/// Error type for metadata probing backed by the `ffprobe` CLI.
#[derive(Debug)]
pub enum MediaFfmpegError {
    InvalidRational {
        num: i32,
        den: i32,
    },
    NoStreams(PathBuf),
    /// Neither the container nor any stream reports a duration.
    MissingDuration(PathBuf),
    Io {
        context: &'static str,
        source: std::io::Error,
    },
    CommandFailed {
        command: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
    Json(serde_json::Error),
    Parse {
        context: &'static str,
        value: String,
    },
}

impl Display for MediaFfmpegError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidRational { num, den } => {
                write!(f, "invalid rational {num}/{den}")
            }
            Self::NoStreams(path) => {
                write!(f, "no streams found: {}", path.display())
            }
            Self::MissingDuration(path) => {
                write!(f, "no duration reported: {}", path.display())
            }
            Self::Io { context, source } => {
                write!(f, "{context}: {source}")
            }
            Self::CommandFailed {
                command,
                status,
                stderr,
            } => {
                write!(
                    f,
                    "command failed ({status}): {command}; stderr: {}",
                    stderr.trim()
                )
            }
            Self::Json(err) => write!(f, "ffprobe output is not valid json: {err}"),
            Self::Parse { context, value } => {
                write!(f, "parse error ({context}): {value}")
            }
        }
    }
}

impl std::error::Error for MediaFfmpegError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for MediaFfmpegError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}
