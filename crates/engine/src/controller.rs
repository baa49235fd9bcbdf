use std::fmt::{Display, Formatter};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::clock::ClockSource;
use crate::config::LoopConfig;
use crate::error::{LoopError, Result};
use crate::media::{AspectRatio, MediaHandle};
use crate::playback::{Generation, PlaybackEngine};
use crate::scheduler::{BoundaryRearmScheduler, BoundaryRegistration, FireDecision};
use crate::scrub::ScrubState;
use crate::selection::{HandlePositions, RangeHandles, RangeSelection};
use crate::time::TimePosition;
use crate::validity::{Validity, evaluate};

/// Playback strategy of an attached session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LoopMode {
    /// Media attached, duration unknown, no selection yet.
    AwaitingDuration,
    /// Whole asset loops; the selection is still the untouched default.
    FreeRunFullAsset,
    /// The user has edited the selection; playback loops inside it until detach.
    LoopingSelection,
}

impl Display for LoopMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::AwaitingDuration => "awaiting-duration",
            Self::FreeRunFullAsset => "free-run-full-asset",
            Self::LoopingSelection => "looping-selection",
        };
        f.write_str(name)
    }
}

/// Inputs a host can funnel through one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    DurationResolved { duration: TimePosition },
    /// Clock tick carrying an engine position the host already sampled.
    Tick { position: TimePosition },
    /// Clock tick; the controller samples the engine itself.
    SampleTick,
    UpdateSelection { start: TimePosition, end: TimePosition },
    BeginScrub,
    EndScrub { seek_to: TimePosition },
    BoundaryFired { generation: Generation },
    Detach,
}

/// Events emitted by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopEvent {
    PositionChanged { position: TimePosition },
    ModeChanged { from: LoopMode, to: LoopMode },
    SelectionChanged(RangeSelection),
    ValidityChanged(Validity),
    BoundaryArmed(BoundaryRegistration),
    LoopRestarted { to: TimePosition },
    PlaybackResumed,
    ScrubChanged { is_scrubbing: bool },
}

/// Read-only view for UI refreshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoopSnapshot {
    pub mode: Option<LoopMode>,
    pub selection: Option<RangeSelection>,
    pub validity: Validity,
    pub is_scrubbing: bool,
    pub position: TimePosition,
}

#[derive(Debug, Clone, Copy)]
struct Trim {
    duration: TimePosition,
    initial: RangeSelection,
    current: RangeSelection,
}

#[derive(Debug, Clone, Copy)]
enum Session {
    Unattached,
    AwaitingDuration,
    FreeRunFullAsset(Trim),
    LoopingSelection(Trim),
}

impl Session {
    fn mode(&self) -> Option<LoopMode> {
        match self {
            Self::Unattached => None,
            Self::AwaitingDuration => Some(LoopMode::AwaitingDuration),
            Self::FreeRunFullAsset(_) => Some(LoopMode::FreeRunFullAsset),
            Self::LoopingSelection(_) => Some(LoopMode::LoopingSelection),
        }
    }

    fn trim(&self) -> Option<&Trim> {
        match self {
            Self::FreeRunFullAsset(trim) | Self::LoopingSelection(trim) => Some(trim),
            Self::Unattached | Self::AwaitingDuration => None,
        }
    }
}

/// Keeps a looping preview consistent while the selection is edited live.
///
/// Three event sources interleave on the owner thread in no fixed order:
/// clock ticks ([`on_tick`](Self::on_tick)), handle drags
/// ([`update_selection`](Self::update_selection)) and boundary firings
/// ([`on_engine_fired`](Self::on_engine_fired)). Each returns the events it
/// produced.
///
/// # Example
/// ```
/// use std::sync::Arc;
///
/// use loop_engine::sim::SimulatedPlayer;
/// use loop_engine::{LoopConfig, LoopController, LoopMode, ManualClock, StaticMedia, TimePosition};
///
/// let duration = TimePosition::from_seconds(12.0);
/// let mut controller = LoopController::new(
///     SimulatedPlayer::with_duration(duration),
///     ManualClock::default(),
///     LoopConfig::default(),
/// );
/// controller.attach(Arc::new(StaticMedia { duration: Some(duration), aspect: None }));
/// controller.poll_duration().expect("duration is known");
/// assert_eq!(controller.mode(), Some(LoopMode::FreeRunFullAsset));
///
/// controller
///     .update_selection(TimePosition::ZERO, TimePosition::from_seconds(9.5))
///     .expect("selection exists");
/// assert_eq!(controller.mode(), Some(LoopMode::LoopingSelection));
/// assert!(controller.current_validity().is_valid);
/// ```
pub struct LoopController<P, C>
where
    P: PlaybackEngine,
    C: ClockSource,
{
    engine: P,
    clock: C,
    config: LoopConfig,
    media: Option<Arc<dyn MediaHandle>>,
    session: Session,
    scheduler: BoundaryRearmScheduler,
    scrub: ScrubState,
    handles: RangeHandles,
    last_observed_handles: Option<HandlePositions>,
}

impl<P, C> LoopController<P, C>
where
    P: PlaybackEngine,
    C: ClockSource,
{
    pub fn new(engine: P, clock: C, config: LoopConfig) -> Self {
        Self {
            engine,
            clock,
            scheduler: BoundaryRearmScheduler::new(config.tick_interval()),
            config,
            media: None,
            session: Session::Unattached,
            scrub: ScrubState::default(),
            handles: RangeHandles::default(),
            last_observed_handles: None,
        }
    }

    /// Applies one command and returns emitted events.
    pub fn handle_command(&mut self, command: Command) -> Result<Vec<LoopEvent>> {
        match command {
            Command::DurationResolved { duration } => self.on_duration_resolved(duration),
            Command::Tick { position } => self.on_tick(position),
            Command::SampleTick => self.sample_tick(),
            Command::UpdateSelection { start, end } => self.update_selection(start, end),
            Command::BeginScrub => Ok(self.begin_scrub()),
            Command::EndScrub { seek_to } => Ok(self.end_scrub(seek_to)),
            Command::BoundaryFired { generation } => Ok(self.on_engine_fired(generation)),
            Command::Detach => {
                self.detach();
                Ok(Vec::new())
            }
        }
    }

    /// Stores the handle and asks it to resolve its duration.
    ///
    /// Attaching over an existing session tears that session down first.
    pub fn attach(&mut self, media: Arc<dyn MediaHandle>) {
        if !matches!(self.session, Session::Unattached) {
            info!(mode = ?self.session.mode(), "replacing attached media");
            self.detach();
        }

        media.request_duration();
        self.media = Some(media);
        self.session = Session::AwaitingDuration;
        info!("media attached, awaiting duration");
    }

    /// Completes attachment once the media handle, or failing that the
    /// engine, reports a duration.
    pub fn poll_duration(&mut self) -> Result<Vec<LoopEvent>> {
        if !matches!(self.session, Session::AwaitingDuration) {
            return Ok(Vec::new());
        }
        let duration = self
            .media
            .as_ref()
            .and_then(|media| media.duration())
            .or_else(|| self.engine.asset_duration());
        match duration {
            Some(duration) => self.on_duration_resolved(duration),
            None => Ok(Vec::new()),
        }
    }

    /// Builds the default selection, starts playback and the clock.
    pub fn on_duration_resolved(&mut self, duration: TimePosition) -> Result<Vec<LoopEvent>> {
        if !matches!(self.session, Session::AwaitingDuration) {
            return Err(self.invalid_state("on_duration_resolved"));
        }
        let initial =
            RangeSelection::full_span(duration).ok_or(LoopError::InvalidDuration { duration })?;

        self.session = Session::FreeRunFullAsset(Trim {
            duration,
            initial,
            current: initial,
        });
        self.engine.play();
        self.clock.start(self.config.tick_interval());
        info!(duration_tl = duration.ticks(), "duration resolved, free-running");

        Ok(vec![
            LoopEvent::ModeChanged {
                from: LoopMode::AwaitingDuration,
                to: LoopMode::FreeRunFullAsset,
            },
            LoopEvent::SelectionChanged(initial),
            LoopEvent::ValidityChanged(self.current_validity()),
        ])
    }

    /// Reads the engine position and runs [`on_tick`](Self::on_tick).
    pub fn sample_tick(&mut self) -> Result<Vec<LoopEvent>> {
        let position = self.engine.current_time();
        self.on_tick(position)
    }

    /// Fixed-cadence tick carrying the engine position.
    ///
    /// Reports the position, forwards live handle motion to
    /// [`update_selection`](Self::update_selection), and restarts the whole
    /// asset when free-running reaches its end. Ticks never perform
    /// selection-boundary loops.
    pub fn on_tick(&mut self, position: TimePosition) -> Result<Vec<LoopEvent>> {
        if matches!(self.session, Session::Unattached) {
            return Ok(Vec::new());
        }

        let mut events = vec![LoopEvent::PositionChanged { position }];
        if self.session.trim().is_none() {
            return Ok(events);
        }

        if let Some(latest) = self.handles.latest() {
            let moved = self
                .last_observed_handles
                .is_none_or(|previous| latest.differs_from(&previous, self.config.epsilon()));
            if moved {
                self.last_observed_handles = Some(latest);
                events.extend(self.update_selection(latest.start, latest.end)?);
            }
        }

        if self.scrub.is_scrubbing() {
            return Ok(events);
        }
        if let Session::FreeRunFullAsset(trim) = self.session {
            let window_start = trim.duration - self.config.tick_interval();
            if position >= window_start {
                debug!(position_tl = position.ticks(), "asset end reached, looping");
                events.extend(self.restart_at(TimePosition::ZERO));
            }
        }

        Ok(events)
    }

    /// Replaces the selection after a handle drag.
    ///
    /// Inverted or empty ranges are dropped silently: drag gestures produce
    /// them routinely.
    pub fn update_selection(
        &mut self,
        start: TimePosition,
        end: TimePosition,
    ) -> Result<Vec<LoopEvent>> {
        let Some(trim) = self.session.trim().copied() else {
            return Err(self.invalid_state("update_selection"));
        };
        let start = start.clamp_to(trim.duration);
        let end = end.clamp_to(trim.duration);
        let previous = trim.current;
        let Some(next) = previous.replaced(start, end, &trim.initial) else {
            debug!(
                start_tl = start.ticks(),
                end_tl = end.ticks(),
                "selection rejected: start must precede end"
            );
            return Ok(Vec::new());
        };

        let mut events = Vec::new();
        let updated = Trim {
            current: next,
            ..trim
        };
        self.session = match self.session {
            Session::FreeRunFullAsset(_) if !next.is_default_full_span() => {
                info!(
                    start_tl = next.start().ticks(),
                    end_tl = next.end().ticks(),
                    "first selection edit, looping selection"
                );
                events.push(LoopEvent::ModeChanged {
                    from: LoopMode::FreeRunFullAsset,
                    to: LoopMode::LoopingSelection,
                });
                Session::LoopingSelection(updated)
            }
            Session::FreeRunFullAsset(_) => Session::FreeRunFullAsset(updated),
            _ => Session::LoopingSelection(updated),
        };

        let registration = self.scheduler.rearm(&mut self.engine, next.end());
        events.push(LoopEvent::SelectionChanged(next));
        events.push(LoopEvent::BoundaryArmed(registration));
        events.push(LoopEvent::ValidityChanged(self.current_validity()));

        if self.scrub.is_scrubbing() {
            return Ok(events);
        }

        let end_moved_outward = next.end() > previous.end() && next.start() == previous.start();
        if end_moved_outward
            && !self.engine.is_playing()
            && self.engine.current_time() == TimePosition::ZERO
        {
            debug!(end_tl = next.end().ticks(), "end handle widened while parked, resuming");
            self.engine.play();
            events.push(LoopEvent::PlaybackResumed);
        } else if matches!(self.session, Session::LoopingSelection(_))
            && self.engine.is_playing()
            && self
                .engine
                .current_time()
                .is_at_or_past(next.end(), self.config.epsilon())
        {
            debug!(
                position_tl = self.engine.current_time().ticks(),
                end_tl = next.end().ticks(),
                "end handle moved behind playhead, looping"
            );
            events.extend(self.restart_at(next.start()));
        }

        Ok(events)
    }

    /// Pauses playback for a manual position drag.
    ///
    /// Ignored until a selection exists.
    pub fn begin_scrub(&mut self) -> Vec<LoopEvent> {
        if self.session.trim().is_none() {
            debug!(mode = ?self.session.mode(), "scrub ignored without a selection");
            return Vec::new();
        }
        self.engine.pause();
        if self.scrub.begin() {
            debug!("scrub started");
            vec![LoopEvent::ScrubChanged { is_scrubbing: true }]
        } else {
            Vec::new()
        }
    }

    /// Seeks to `seek_to`, ends the scrub and resumes playback.
    ///
    /// While looping a selection, a release at or past the selection end
    /// seeks to the selection start instead: the armed boundary would lie
    /// behind the playhead.
    pub fn end_scrub(&mut self, seek_to: TimePosition) -> Vec<LoopEvent> {
        let Some(trim) = self.session.trim().copied() else {
            debug!(mode = ?self.session.mode(), "scrub ignored without a selection");
            return Vec::new();
        };
        let seek_to = seek_to.clamp_to(trim.duration);
        let was_scrubbing = self.scrub.end();

        let mut events = Vec::with_capacity(3);
        if was_scrubbing {
            events.push(LoopEvent::ScrubChanged {
                is_scrubbing: false,
            });
        }

        let selection = trim.current;
        if matches!(self.session, Session::LoopingSelection(_))
            && seek_to.is_at_or_past(selection.end(), self.config.epsilon())
        {
            debug!(
                seek_to_tl = seek_to.ticks(),
                end_tl = selection.end().ticks(),
                "scrub released past selection end, looping"
            );
            events.push(LoopEvent::PositionChanged {
                position: selection.start(),
            });
            events.extend(self.restart_at(selection.start()));
            return events;
        }

        self.engine.seek(seek_to);
        self.engine.play();
        debug!(seek_to_tl = seek_to.ticks(), was_scrubbing, "scrub ended");
        events.push(LoopEvent::PositionChanged { position: seek_to });
        events.push(LoopEvent::PlaybackResumed);
        events
    }

    /// Boundary callback from the engine.
    ///
    /// Ignored while scrubbing or when `generation` was superseded by a later
    /// rearm; otherwise restarts the loop at the selection start.
    pub fn on_engine_fired(&mut self, generation: Generation) -> Vec<LoopEvent> {
        if self.scrub.is_scrubbing() {
            debug!(generation = generation.0, "boundary ignored while scrubbing");
            return Vec::new();
        }
        if let FireDecision::Stale = self.scheduler.check(generation) {
            debug!(generation = generation.0, "stale boundary dropped");
            return Vec::new();
        }
        let Some(trim) = self.session.trim() else {
            return Vec::new();
        };

        let start = trim.current.start();
        debug!(generation = generation.0, start_tl = start.ticks(), "boundary reached, looping");
        self.restart_at(start)
    }

    /// Validity of the current selection; `(false, 0)` before one exists.
    pub fn current_validity(&self) -> Validity {
        self.session
            .trim()
            .map(|trim| evaluate(&trim.current, self.config.max_selection()))
            .unwrap_or(Validity::UNAVAILABLE)
    }

    /// Returns the selection if it can be confirmed. Pure read.
    pub fn confirm_selection(&self) -> Result<RangeSelection> {
        let trim = self.session.trim().ok_or(LoopError::NoSelection)?;
        let validity = evaluate(&trim.current, self.config.max_selection());
        if !validity.is_valid {
            debug!(
                duration_tl = validity.duration.ticks(),
                max_tl = self.config.max_selection_tl,
                "confirm rejected"
            );
            return Err(LoopError::InvalidRange {
                duration: validity.duration,
                max: self.config.max_selection(),
            });
        }

        info!(
            start_tl = trim.current.start().ticks(),
            end_tl = trim.current.end().ticks(),
            "selection confirmed"
        );
        Ok(trim.current)
    }

    /// Cancels the engine registration and stops the clock. Idempotent.
    pub fn detach(&mut self) {
        if matches!(self.session, Session::Unattached) {
            return;
        }

        self.scheduler.cancel(&mut self.engine);
        self.clock.stop();
        self.media = None;
        self.session = Session::Unattached;
        self.scrub.end();
        self.handles.clear();
        self.last_observed_handles = None;
        info!("controller detached");
    }

    pub fn mode(&self) -> Option<LoopMode> {
        self.session.mode()
    }

    pub fn selection(&self) -> Option<RangeSelection> {
        self.session.trim().map(|trim| trim.current)
    }

    pub fn is_scrubbing(&self) -> bool {
        self.scrub.is_scrubbing()
    }

    /// Shared cell for the range-handle UI to publish live positions into.
    pub fn handles(&self) -> RangeHandles {
        self.handles.clone()
    }

    pub fn natural_aspect(&self) -> Option<AspectRatio> {
        self.media.as_ref().and_then(|media| media.natural_aspect())
    }

    pub fn active_registration(&self) -> Option<BoundaryRegistration> {
        self.scheduler.active()
    }

    pub fn snapshot(&self) -> LoopSnapshot {
        LoopSnapshot {
            mode: self.mode(),
            selection: self.selection(),
            validity: self.current_validity(),
            is_scrubbing: self.is_scrubbing(),
            position: self.engine.current_time(),
        }
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    pub fn engine(&self) -> &P {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut P {
        &mut self.engine
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    fn restart_at(&mut self, start: TimePosition) -> Vec<LoopEvent> {
        self.engine.seek(start);
        self.engine.play();
        vec![LoopEvent::LoopRestarted { to: start }]
    }

    fn invalid_state(&self, operation: &'static str) -> LoopError {
        let mode = self.session.mode();
        warn!(operation, ?mode, "operation rejected in current mode");
        LoopError::InvalidState { operation, mode }
    }
}

impl<P, C> Drop for LoopController<P, C>
where
    P: PlaybackEngine,
    C: ClockSource,
{
    fn drop(&mut self) {
        self.detach();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::{Command, LoopController, LoopEvent, LoopMode};
    use crate::clock::{ClockSource, ManualClock};
    use crate::config::LoopConfig;
    use crate::error::LoopError;
    use crate::media::{AspectRatio, StaticMedia};
    use crate::playback::{Generation, PlaybackEngine, RegistrationHandle};
    use crate::time::TimePosition;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Call {
        Play,
        Pause,
        Seek(TimePosition),
        Register(TimePosition, Generation),
        Cancel(RegistrationHandle),
    }

    #[derive(Debug, Default)]
    struct MockEngine {
        calls: Arc<Mutex<Vec<Call>>>,
        position: TimePosition,
        playing: bool,
        next_handle: u64,
        loaded_duration: Option<TimePosition>,
    }

    impl MockEngine {
        fn record(&self, call: Call) {
            self.calls.lock().expect("lock engine calls").push(call);
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().expect("lock engine calls").clone()
        }

        fn seeks(&self) -> Vec<TimePosition> {
            self.calls()
                .into_iter()
                .filter_map(|call| match call {
                    Call::Seek(to) => Some(to),
                    _ => None,
                })
                .collect()
        }

        fn clear_calls(&self) {
            self.calls.lock().expect("lock engine calls").clear();
        }
    }

    impl PlaybackEngine for MockEngine {
        fn play(&mut self) {
            self.playing = true;
            self.record(Call::Play);
        }

        fn pause(&mut self) {
            self.playing = false;
            self.record(Call::Pause);
        }

        fn seek(&mut self, to: TimePosition) {
            self.position = to;
            self.record(Call::Seek(to));
        }

        fn current_time(&self) -> TimePosition {
            self.position
        }

        fn is_playing(&self) -> bool {
            self.playing
        }

        fn register_boundary(
            &mut self,
            at: TimePosition,
            generation: Generation,
        ) -> RegistrationHandle {
            self.record(Call::Register(at, generation));
            self.next_handle += 1;
            RegistrationHandle(self.next_handle)
        }

        fn cancel(&mut self, handle: RegistrationHandle) {
            self.record(Call::Cancel(handle));
        }

        fn asset_duration(&self) -> Option<TimePosition> {
            self.loaded_duration
        }
    }

    fn secs(value: f64) -> TimePosition {
        TimePosition::from_seconds(value)
    }

    fn controller() -> LoopController<MockEngine, ManualClock> {
        LoopController::new(
            MockEngine::default(),
            ManualClock::default(),
            LoopConfig::default(),
        )
    }

    fn attached(duration: f64) -> LoopController<MockEngine, ManualClock> {
        let mut controller = controller();
        controller.attach(Arc::new(StaticMedia {
            duration: None,
            aspect: Some(AspectRatio {
                width: 16,
                height: 9,
            }),
        }));
        controller
            .on_duration_resolved(secs(duration))
            .expect("duration should resolve");
        controller.engine().clear_calls();
        controller
    }

    #[test]
    fn duration_resolution_builds_default_selection_and_starts_playback() {
        let mut controller = controller();
        controller.attach(Arc::new(StaticMedia {
            duration: None,
            aspect: None,
        }));
        assert_eq!(controller.mode(), Some(LoopMode::AwaitingDuration));
        assert!(controller.engine().calls().is_empty());

        let events = controller
            .on_duration_resolved(secs(12.0))
            .expect("duration should resolve");

        assert_eq!(
            events[0],
            LoopEvent::ModeChanged {
                from: LoopMode::AwaitingDuration,
                to: LoopMode::FreeRunFullAsset,
            }
        );
        let selection = controller.selection().expect("selection exists");
        assert_eq!(selection.start(), TimePosition::ZERO);
        assert_eq!(selection.end(), secs(12.0));
        assert!(selection.is_default_full_span());
        assert_eq!(controller.engine().calls(), vec![Call::Play]);
        assert!(controller.clock().is_running());
        assert_eq!(
            controller.clock().interval(),
            Some(TimePosition::from_ticks(16_667))
        );
    }

    #[test]
    fn resolving_duration_twice_is_invalid_state() {
        let mut controller = attached(12.0);

        let result = controller.on_duration_resolved(secs(10.0));
        assert!(matches!(
            result,
            Err(LoopError::InvalidState {
                mode: Some(LoopMode::FreeRunFullAsset),
                ..
            })
        ));
        assert_eq!(controller.selection().expect("selection").end(), secs(12.0));
    }

    #[test]
    fn resolving_duration_before_attach_is_invalid_state() {
        let mut controller = controller();

        let result = controller.on_duration_resolved(secs(12.0));
        assert!(matches!(
            result,
            Err(LoopError::InvalidState { mode: None, .. })
        ));
    }

    #[test]
    fn zero_duration_is_rejected() {
        let mut controller = controller();
        controller.attach(Arc::new(StaticMedia {
            duration: None,
            aspect: None,
        }));

        let result = controller.on_duration_resolved(TimePosition::ZERO);
        assert!(matches!(result, Err(LoopError::InvalidDuration { .. })));
        assert_eq!(controller.mode(), Some(LoopMode::AwaitingDuration));
    }

    #[test]
    fn poll_duration_waits_for_media_handle() {
        let mut controller = controller();
        controller.attach(Arc::new(StaticMedia {
            duration: None,
            aspect: None,
        }));
        assert!(controller.poll_duration().expect("poll").is_empty());

        controller.attach(Arc::new(StaticMedia {
            duration: Some(secs(4.0)),
            aspect: None,
        }));
        let events = controller.poll_duration().expect("poll");
        assert!(!events.is_empty());
        assert_eq!(controller.mode(), Some(LoopMode::FreeRunFullAsset));
    }

    #[test]
    fn confirm_before_duration_is_no_selection() {
        let mut controller = controller();
        controller.attach(Arc::new(StaticMedia {
            duration: None,
            aspect: None,
        }));

        assert!(matches!(
            controller.confirm_selection(),
            Err(LoopError::NoSelection)
        ));
        assert!(!controller.current_validity().is_valid);
    }

    #[test]
    fn confirm_rejects_default_selection_longer_than_max() {
        let mut controller = attached(20.0);

        assert!(matches!(
            controller.confirm_selection(),
            Err(LoopError::InvalidRange { .. })
        ));

        controller
            .update_selection(secs(2.0), secs(17.0))
            .expect("selection exists");
        let confirmed = controller.confirm_selection().expect("15 s is confirmable");
        assert_eq!(confirmed.start(), secs(2.0));
        assert!(controller.engine().seeks().is_empty());
    }

    #[test]
    fn inverted_drag_is_silently_rejected() {
        let mut controller = attached(12.0);
        controller
            .update_selection(TimePosition::ZERO, secs(9.5))
            .expect("selection exists");
        assert_eq!(controller.mode(), Some(LoopMode::LoopingSelection));
        let validity = controller.current_validity();
        assert!(validity.is_valid);
        assert_eq!(validity.duration, secs(9.5));

        let events = controller
            .update_selection(secs(9.6), secs(9.5))
            .expect("rejection is not an error");

        assert!(events.is_empty());
        let selection = controller.selection().expect("selection exists");
        assert_eq!(selection.start(), TimePosition::ZERO);
        assert_eq!(selection.end(), secs(9.5));
    }

    #[test]
    fn drag_handles_are_clamped_to_asset_bounds() {
        let mut controller = attached(12.0);

        controller
            .update_selection(secs(3.0), secs(40.0))
            .expect("selection exists");

        assert_eq!(controller.selection().expect("selection").end(), secs(12.0));
    }

    #[test]
    fn update_selection_without_duration_is_invalid_state() {
        let mut controller = controller();
        controller.attach(Arc::new(StaticMedia {
            duration: None,
            aspect: None,
        }));

        let result = controller.update_selection(secs(1.0), secs(2.0));
        assert!(matches!(
            result,
            Err(LoopError::InvalidState {
                mode: Some(LoopMode::AwaitingDuration),
                ..
            })
        ));
    }

    #[test]
    fn free_run_tick_near_asset_end_loops_to_zero() {
        let mut controller = attached(12.0);

        let events = controller.on_tick(secs(11.9)).expect("tick");
        assert_eq!(
            events,
            vec![LoopEvent::PositionChanged {
                position: secs(11.9)
            }]
        );

        let events = controller.on_tick(secs(11.99)).expect("tick");
        assert!(events.contains(&LoopEvent::LoopRestarted {
            to: TimePosition::ZERO
        }));
        assert_eq!(
            controller.engine().calls(),
            vec![Call::Seek(TimePosition::ZERO), Call::Play]
        );
    }

    #[test]
    fn looping_ticks_do_not_seek_at_selection_end() {
        let mut controller = attached(12.0);
        controller
            .update_selection(TimePosition::ZERO, secs(9.5))
            .expect("selection exists");
        controller.engine_mut().position = secs(5.0);

        for position in [9.49, 9.5, 11.99] {
            controller.on_tick(secs(position)).expect("tick");
        }

        assert!(controller.engine().seeks().is_empty());
    }

    #[test]
    fn live_handle_motion_is_applied_once_per_change() {
        let mut controller = attached(12.0);
        let handles = controller.handles();

        handles.publish(TimePosition::ZERO, secs(9.5));
        let events = controller.on_tick(secs(1.0)).expect("tick");
        assert!(events.contains(&LoopEvent::ModeChanged {
            from: LoopMode::FreeRunFullAsset,
            to: LoopMode::LoopingSelection,
        }));

        let events = controller.on_tick(secs(1.1)).expect("tick");
        assert_eq!(events.len(), 1);

        handles.publish(TimePosition::ZERO, secs(9.5) + TimePosition::from_ticks(500));
        let events = controller.on_tick(secs(1.2)).expect("tick");
        assert_eq!(events.len(), 1);

        handles.publish(TimePosition::ZERO, secs(9.0));
        controller.on_tick(secs(1.3)).expect("tick");
        assert_eq!(controller.selection().expect("selection").end(), secs(9.0));
    }

    #[test]
    fn stale_generation_after_double_drag_does_not_seek() {
        let mut controller = attached(12.0);
        controller
            .update_selection(TimePosition::ZERO, secs(9.5))
            .expect("selection exists");
        let first = controller.active_registration().expect("armed");
        controller
            .update_selection(TimePosition::ZERO, secs(9.0))
            .expect("selection exists");
        let second = controller.active_registration().expect("armed");
        assert!(second.generation > first.generation);

        let events = controller.on_engine_fired(first.generation);

        assert!(events.is_empty());
        assert!(controller.engine().seeks().is_empty());
        let lead = TimePosition::from_ticks(16_667);
        assert!(
            controller
                .engine()
                .calls()
                .contains(&Call::Register(secs(9.0) - lead, second.generation))
        );
    }

    #[test]
    fn current_generation_restarts_at_selection_start() {
        let mut controller = attached(12.0);
        controller
            .update_selection(secs(2.0), secs(9.0))
            .expect("selection exists");
        let registration = controller.active_registration().expect("armed");

        let events = controller.on_engine_fired(registration.generation);

        assert_eq!(events, vec![LoopEvent::LoopRestarted { to: secs(2.0) }]);
        assert_eq!(controller.engine().seeks(), vec![secs(2.0)]);
        assert!(controller.engine().is_playing());
    }

    #[test]
    fn scrub_suppresses_loop_restarts_until_end_scrub() {
        let mut controller = attached(12.0);
        controller
            .update_selection(secs(1.0), secs(6.0))
            .expect("selection exists");
        let registration = controller.active_registration().expect("armed");

        controller.begin_scrub();
        assert!(controller.is_scrubbing());
        assert!(!controller.engine().is_playing());
        for _ in 0..10 {
            controller.on_tick(secs(6.0)).expect("tick");
            controller.on_engine_fired(registration.generation);
        }
        assert!(controller.engine().seeks().is_empty());

        let events = controller.end_scrub(secs(3.0));

        assert_eq!(controller.engine().seeks(), vec![secs(3.0)]);
        assert!(events.contains(&LoopEvent::ScrubChanged {
            is_scrubbing: false
        }));
        assert!(controller.engine().is_playing());
        assert!(!controller.is_scrubbing());
    }

    #[test]
    fn scrub_suppresses_free_run_loop() {
        let mut controller = attached(12.0);
        controller.begin_scrub();

        for _ in 0..5 {
            controller.on_tick(secs(12.0)).expect("tick");
        }
        controller.end_scrub(secs(4.0));

        assert_eq!(controller.engine().seeks(), vec![secs(4.0)]);
    }

    #[test]
    fn widening_end_while_parked_at_zero_resumes_playback() {
        let mut controller = attached(12.0);
        controller.engine_mut().pause();
        controller.engine().clear_calls();

        let events = controller
            .update_selection(TimePosition::ZERO, secs(6.0))
            .expect("selection exists");
        assert!(!events.contains(&LoopEvent::PlaybackResumed));

        let events = controller
            .update_selection(TimePosition::ZERO, secs(8.0))
            .expect("selection exists");
        assert!(events.contains(&LoopEvent::PlaybackResumed));
        assert!(controller.engine().is_playing());
    }

    #[test]
    fn dragging_start_while_parked_does_not_resume() {
        let mut controller = attached(12.0);
        controller
            .update_selection(TimePosition::ZERO, secs(8.0))
            .expect("selection exists");
        controller.engine_mut().pause();

        let events = controller
            .update_selection(secs(1.0), secs(8.0))
            .expect("selection exists");

        assert!(!events.contains(&LoopEvent::PlaybackResumed));
        assert!(!controller.engine().is_playing());
    }

    #[test]
    fn end_dragged_behind_playhead_restarts_loop() {
        let mut controller = attached(12.0);
        controller
            .update_selection(secs(1.0), secs(9.5))
            .expect("selection exists");
        controller.engine_mut().position = secs(9.0);

        let events = controller
            .update_selection(secs(1.0), secs(8.0))
            .expect("selection exists");

        assert!(events.contains(&LoopEvent::LoopRestarted { to: secs(1.0) }));
        assert_eq!(controller.engine().seeks(), vec![secs(1.0)]);
    }

    #[test]
    fn detach_cancels_registration_and_is_idempotent() {
        let mut controller = attached(12.0);
        controller
            .update_selection(TimePosition::ZERO, secs(9.5))
            .expect("selection exists");
        controller.engine().clear_calls();

        controller.detach();
        controller.detach();

        assert_eq!(
            controller.engine().calls(),
            vec![Call::Cancel(RegistrationHandle(1))]
        );
        assert_eq!(controller.clock().stops(), 1);
        assert_eq!(controller.mode(), None);
        assert!(controller.on_tick(secs(1.0)).expect("tick").is_empty());
        assert!(controller.natural_aspect().is_none());
    }

    #[test]
    fn dropping_controller_cancels_outstanding_registration() {
        let mut controller = attached(12.0);
        controller
            .update_selection(TimePosition::ZERO, secs(9.5))
            .expect("selection exists");
        let calls = Arc::clone(&controller.engine().calls);

        drop(controller);

        assert_eq!(
            calls.lock().expect("lock engine calls").last(),
            Some(&Call::Cancel(RegistrationHandle(1)))
        );
    }

    #[test]
    fn handle_command_dispatches_and_snapshot_reflects_state() {
        let mut controller = attached(12.0);
        controller.engine_mut().position = secs(2.0);

        controller
            .handle_command(Command::UpdateSelection {
                start: secs(1.0),
                end: secs(5.0),
            })
            .expect("update");
        let events = controller.handle_command(Command::SampleTick).expect("tick");
        assert_eq!(
            events,
            vec![LoopEvent::PositionChanged {
                position: secs(2.0)
            }]
        );
        controller
            .handle_command(Command::BeginScrub)
            .expect("begin scrub");

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.mode, Some(LoopMode::LoopingSelection));
        assert!(snapshot.is_scrubbing);
        assert_eq!(snapshot.validity.duration, secs(4.0));
        assert_eq!(
            controller.natural_aspect(),
            Some(AspectRatio {
                width: 16,
                height: 9
            })
        );

        controller.handle_command(Command::Detach).expect("detach");
        assert_eq!(controller.mode(), None);
    }

    #[test]
    fn poll_duration_falls_back_to_engine_duration() {
        let mut controller = controller();
        controller.attach(Arc::new(StaticMedia {
            duration: None,
            aspect: None,
        }));
        assert!(controller.poll_duration().expect("poll").is_empty());

        controller.engine_mut().loaded_duration = Some(secs(7.0));
        controller.poll_duration().expect("poll");

        assert_eq!(controller.mode(), Some(LoopMode::FreeRunFullAsset));
        assert_eq!(controller.selection().expect("selection").end(), secs(7.0));
    }

    #[test]
    fn reattach_starts_from_default_span_despite_old_handles() {
        let mut controller = attached(12.0);
        let handles = controller.handles();
        handles.publish(secs(2.0), secs(5.0));
        controller.on_tick(secs(1.0)).expect("tick");
        assert_eq!(controller.mode(), Some(LoopMode::LoopingSelection));

        controller.attach(Arc::new(StaticMedia {
            duration: Some(secs(30.0)),
            aspect: None,
        }));
        controller.poll_duration().expect("poll");
        controller.on_tick(secs(0.1)).expect("tick");

        assert_eq!(controller.mode(), Some(LoopMode::FreeRunFullAsset));
        let selection = controller.selection().expect("selection exists");
        assert!(selection.is_default_full_span());
        assert_eq!(selection.end(), secs(30.0));
        assert!(handles.latest().is_none());
    }

    #[test]
    fn default_span_update_keeps_free_run_but_rearms() {
        let mut controller = attached(12.0);

        let events = controller
            .update_selection(TimePosition::ZERO, secs(12.0))
            .expect("selection exists");

        assert_eq!(controller.mode(), Some(LoopMode::FreeRunFullAsset));
        assert!(
            !events
                .iter()
                .any(|event| matches!(event, LoopEvent::ModeChanged { .. }))
        );
        let registration = controller.active_registration().expect("armed");
        assert!(events.contains(&LoopEvent::BoundaryArmed(registration)));
        assert_eq!(
            controller.engine().calls(),
            vec![Call::Register(
                secs(12.0) - TimePosition::from_ticks(16_667),
                registration.generation
            )]
        );
        assert!(controller.selection().expect("selection").is_default_full_span());
    }

    #[test]
    fn scrub_released_past_selection_end_restarts_at_start() {
        let mut controller = attached(12.0);
        controller
            .update_selection(secs(1.0), secs(3.0))
            .expect("selection exists");
        controller.begin_scrub();
        controller.engine().clear_calls();

        let events = controller.end_scrub(secs(6.0));

        assert_eq!(
            controller.engine().calls(),
            vec![Call::Seek(secs(1.0)), Call::Play]
        );
        assert!(events.contains(&LoopEvent::LoopRestarted { to: secs(1.0) }));
        assert!(!controller.is_scrubbing());
    }

    #[test]
    fn scrub_past_end_in_free_run_seeks_where_released() {
        let mut controller = attached(12.0);
        controller.begin_scrub();

        controller.end_scrub(secs(11.0));

        assert_eq!(controller.engine().seeks(), vec![secs(11.0)]);
    }

    #[test]
    fn scrub_without_selection_leaves_engine_untouched() {
        let mut controller = controller();
        assert!(controller.begin_scrub().is_empty());
        assert!(controller.end_scrub(secs(1.0)).is_empty());

        controller.attach(Arc::new(StaticMedia {
            duration: None,
            aspect: None,
        }));
        assert!(controller.begin_scrub().is_empty());
        assert!(controller.end_scrub(secs(1.0)).is_empty());

        assert!(controller.engine().calls().is_empty());
        assert!(!controller.is_scrubbing());
    }

    #[test]
    fn detach_mid_scrub_clears_scrub_state() {
        let mut controller = attached(12.0);
        controller.begin_scrub();

        controller.detach();

        assert!(!controller.is_scrubbing());
    }
}
