/// Tracks a manual drag of the position indicator.
///
/// While scrubbing, tick-driven and boundary-driven loop restarts are
/// suppressed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrubState {
    is_scrubbing: bool,
}

impl ScrubState {
    pub fn is_scrubbing(&self) -> bool {
        self.is_scrubbing
    }

    /// Returns true when this call started the scrub.
    pub(crate) fn begin(&mut self) -> bool {
        !std::mem::replace(&mut self.is_scrubbing, true)
    }

    /// Returns true when a scrub was in progress.
    pub(crate) fn end(&mut self) -> bool {
        std::mem::replace(&mut self.is_scrubbing, false)
    }
}
