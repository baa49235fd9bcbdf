use std::fmt::{Display, Formatter};

use crate::time::TimePosition;

/// Tag identifying one boundary registration. Issued in increasing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(pub u64);

impl Display for Generation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Engine-side identifier of a boundary registration, used to cancel it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationHandle(pub u64);

/// Playback operations the loop controller drives.
///
/// Seek and play are fire-and-forget: the controller updates its own state
/// optimistically and reconciles on the next clock tick.
pub trait PlaybackEngine {
    fn play(&mut self);

    fn pause(&mut self);

    fn seek(&mut self, to: TimePosition);

    fn current_time(&self) -> TimePosition;

    fn is_playing(&self) -> bool;

    /// Asks to be notified when playback reaches `at`.
    ///
    /// The engine reports a firing back to the host together with
    /// `generation`; the host forwards it to
    /// [`LoopController::on_engine_fired`](crate::LoopController::on_engine_fired).
    fn register_boundary(&mut self, at: TimePosition, generation: Generation)
    -> RegistrationHandle;

    fn cancel(&mut self, handle: RegistrationHandle);

    /// Asset duration, `None` until the engine has loaded it.
    fn asset_duration(&self) -> Option<TimePosition>;
}
