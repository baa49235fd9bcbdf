use std::fmt::{Display, Formatter};
use std::path::PathBuf;

use crate::controller::LoopMode;
use crate::time::TimePosition;

/// Result type used by the loop engine crate.
pub type Result<T> = std::result::Result<T, LoopError>;

/// Errors produced by controller operations and configuration loading.
#[derive(Debug)]
pub enum LoopError {
    /// Operation called in a mode that does not accept it. `mode` is `None`
    /// while no media is attached.
    InvalidState {
        operation: &'static str,
        mode: Option<LoopMode>,
    },
    InvalidRange {
        duration: TimePosition,
        max: TimePosition,
    },
    NoSelection,
    InvalidDuration {
        duration: TimePosition,
    },
    InvalidConfig {
        reason: String,
    },
    ConfigIo {
        path: PathBuf,
        source: std::io::Error,
    },
    ConfigParse {
        path: PathBuf,
        source: serde_json::Error,
    },
    Media(media_ffmpeg::MediaFfmpegError),
}

impl Display for LoopError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidState { operation, mode } => match mode {
                Some(mode) => write!(f, "{operation} is not valid in mode {mode}"),
                None => write!(f, "{operation} requires attached media"),
            },
            Self::InvalidRange { duration, max } => {
                write!(f, "selection of {duration} is outside (0, {max}]")
            }
            Self::NoSelection => write!(f, "no selection yet: media duration is unresolved"),
            Self::InvalidDuration { duration } => {
                write!(f, "media duration must be positive, got {duration}")
            }
            Self::InvalidConfig { reason } => write!(f, "invalid loop config: {reason}"),
            Self::ConfigIo { path, source } => {
                write!(f, "failed to read config {} ({source})", path.display())
            }
            Self::ConfigParse { path, source } => {
                write!(f, "failed to parse config {} ({source})", path.display())
            }
            Self::Media(err) => write!(f, "media backend error: {err}"),
        }
    }
}

impl std::error::Error for LoopError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ConfigIo { source, .. } => Some(source),
            Self::ConfigParse { source, .. } => Some(source),
            Self::Media(err) => Some(err),
            _ => None,
        }
    }
}

impl From<media_ffmpeg::MediaFfmpegError> for LoopError {
    fn from(value: media_ffmpeg::MediaFfmpegError) -> Self {
        Self::Media(value)
    }
}

/// Caller-facing classification of a [`LoopError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopErrorKind {
    InvalidState,
    InvalidRange,
    NoSelection,
    Other,
}

impl LoopErrorKind {
    /// Both range errors keep the confirm action disabled until the user
    /// adjusts the selection or the media finishes loading.
    pub fn is_user_correctable(self) -> bool {
        matches!(self, Self::InvalidRange | Self::NoSelection)
    }
}

impl From<&LoopError> for LoopErrorKind {
    fn from(value: &LoopError) -> Self {
        match value {
            LoopError::InvalidState { .. } => Self::InvalidState,
            LoopError::InvalidRange { .. } => Self::InvalidRange,
            LoopError::NoSelection => Self::NoSelection,
            _ => Self::Other,
        }
    }
}
