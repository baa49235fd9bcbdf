//! UI-agnostic loop controller for previewing a trimmed clip.

pub mod clock;
pub mod config;
pub mod controller;
pub mod error;
pub mod media;
pub mod playback;
pub mod scheduler;
pub mod scrub;
pub mod selection;
pub mod sim;
pub mod time;
pub mod validity;

pub use clock::{ClockSource, ClockTick, IntervalClock, ManualClock};
pub use config::LoopConfig;
pub use controller::{Command, LoopController, LoopEvent, LoopMode, LoopSnapshot};
pub use error::{LoopError, LoopErrorKind, Result};
pub use media::{AspectRatio, MediaHandle, ProbedMedia, StaticMedia};
pub use playback::{Generation, PlaybackEngine, RegistrationHandle};
pub use scheduler::{BoundaryRearmScheduler, BoundaryRegistration, FireDecision};
pub use scrub::ScrubState;
pub use selection::{HandlePositions, RangeHandles, RangeSelection};
pub use time::{Rational, TIMELINE_TIME_BASE, TimePosition, rescale};
pub use validity::{Validity, evaluate};
