use tracing::debug;

use crate::playback::{Generation, PlaybackEngine, RegistrationHandle};
use crate::time::TimePosition;

/// One boundary registration as issued to the playback engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundaryRegistration {
    pub target: TimePosition,
    pub generation: Generation,
}

/// Outcome of matching an engine firing against the active registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireDecision {
    Current(BoundaryRegistration),
    Stale,
}

#[derive(Debug, Clone, Copy)]
struct ActiveRegistration {
    registration: BoundaryRegistration,
    handle: RegistrationHandle,
}

/// Keeps exactly one "notify me near the selection end" registration alive.
///
/// Every rearm issues a fresh generation, so firings from superseded
/// registrations that are still in flight during a fast drag can be told
/// apart and dropped.
///
/// # Example
/// ```
/// use loop_engine::sim::SimulatedPlayer;
/// use loop_engine::{BoundaryRearmScheduler, FireDecision, TimePosition};
///
/// let mut engine = SimulatedPlayer::default();
/// let mut scheduler = BoundaryRearmScheduler::new(TimePosition::from_ticks(16_667));
///
/// let first = scheduler.rearm(&mut engine, TimePosition::from_seconds(9.5));
/// let second = scheduler.rearm(&mut engine, TimePosition::from_seconds(9.0));
///
/// assert_eq!(scheduler.check(first.generation), FireDecision::Stale);
/// assert_eq!(scheduler.check(second.generation), FireDecision::Current(second));
/// ```
#[derive(Debug)]
pub struct BoundaryRearmScheduler {
    lead: TimePosition,
    next_generation: u64,
    active: Option<ActiveRegistration>,
}

impl BoundaryRearmScheduler {
    /// Creates a scheduler that fires `lead` ahead of the selection end to
    /// absorb engine overshoot.
    pub fn new(lead: TimePosition) -> Self {
        Self {
            lead,
            next_generation: 1,
            active: None,
        }
    }

    /// Cancels the current registration and registers a new one for `end`.
    ///
    /// Runs even when `end` is unchanged.
    pub fn rearm<P>(&mut self, engine: &mut P, end: TimePosition) -> BoundaryRegistration
    where
        P: PlaybackEngine + ?Sized,
    {
        self.cancel(engine);

        let registration = BoundaryRegistration {
            target: end - self.lead,
            generation: Generation(self.next_generation),
        };
        self.next_generation += 1;

        let handle = engine.register_boundary(registration.target, registration.generation);
        debug!(
            generation = registration.generation.0,
            target_tl = registration.target.ticks(),
            end_tl = end.ticks(),
            "boundary armed"
        );
        self.active = Some(ActiveRegistration {
            registration,
            handle,
        });
        registration
    }

    /// Matches a fired generation against the active registration.
    pub fn check(&self, generation: Generation) -> FireDecision {
        match self.active {
            Some(active) if active.registration.generation == generation => {
                FireDecision::Current(active.registration)
            }
            _ => FireDecision::Stale,
        }
    }

    /// Cancels the active registration, if any.
    pub fn cancel<P>(&mut self, engine: &mut P)
    where
        P: PlaybackEngine + ?Sized,
    {
        if let Some(active) = self.active.take() {
            engine.cancel(active.handle);
            debug!(
                generation = active.registration.generation.0,
                "boundary cancelled"
            );
        }
    }

    pub fn active(&self) -> Option<BoundaryRegistration> {
        self.active.map(|active| active.registration)
    }
}
