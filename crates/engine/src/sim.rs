//! Deterministic in-memory playback engine.
//!
//! Stands in for a real decoder/player in headless hosts and tests: time only
//! moves when [`SimulatedPlayer::advance`] is called.

use crate::playback::{Generation, PlaybackEngine, RegistrationHandle};
use crate::time::TimePosition;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Boundary {
    handle: RegistrationHandle,
    at: TimePosition,
    generation: Generation,
}

/// Simulated player with boundary observers.
#[derive(Debug, Clone, Default)]
pub struct SimulatedPlayer {
    position: TimePosition,
    playing: bool,
    duration: Option<TimePosition>,
    boundaries: Vec<Boundary>,
    next_handle: u64,
    seeks: Vec<TimePosition>,
}

impl SimulatedPlayer {
    pub fn with_duration(duration: TimePosition) -> Self {
        Self {
            duration: Some(duration),
            ..Self::default()
        }
    }

    /// Marks the asset as loaded.
    pub fn set_duration(&mut self, duration: TimePosition) {
        self.duration = Some(duration);
        self.position = self.position.clamp_to(duration);
    }

    /// Moves the playhead by `dt` while playing.
    ///
    /// Returns the generations of all boundaries crossed in `(old, new]`.
    /// Playback stops when the asset end is reached.
    ///
    /// # Example
    /// ```
    /// use loop_engine::sim::SimulatedPlayer;
    /// use loop_engine::{Generation, PlaybackEngine, TimePosition};
    ///
    /// let mut player = SimulatedPlayer::with_duration(TimePosition::from_seconds(2.0));
    /// player.register_boundary(TimePosition::from_seconds(1.0), Generation(7));
    /// player.play();
    ///
    /// assert!(player.advance(TimePosition::from_seconds(0.5)).is_empty());
    /// assert_eq!(player.advance(TimePosition::from_seconds(0.5)), vec![Generation(7)]);
    /// ```
    pub fn advance(&mut self, dt: TimePosition) -> Vec<Generation> {
        if !self.playing {
            return Vec::new();
        }

        let old = self.position;
        let mut new = old + dt;
        if let Some(duration) = self.duration {
            if new >= duration {
                new = duration;
                self.playing = false;
            }
        }
        self.position = new;

        self.boundaries
            .iter()
            .filter(|boundary| old < boundary.at && boundary.at <= new)
            .map(|boundary| boundary.generation)
            .collect()
    }

    /// Every seek target in call order.
    pub fn seeks(&self) -> &[TimePosition] {
        &self.seeks
    }

    /// Number of live boundary registrations.
    pub fn boundary_count(&self) -> usize {
        self.boundaries.len()
    }
}

impl PlaybackEngine for SimulatedPlayer {
    fn play(&mut self) {
        self.playing = true;
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn seek(&mut self, to: TimePosition) {
        self.position = match self.duration {
            Some(duration) => to.clamp_to(duration),
            None => to,
        };
        self.seeks.push(self.position);
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
        self.next_handle += 1;
        let handle = RegistrationHandle(self.next_handle);
        self.boundaries.push(Boundary {
            handle,
            at,
            generation,
        });
        handle
    }

    fn cancel(&mut self, handle: RegistrationHandle) {
        self.boundaries.retain(|boundary| boundary.handle != handle);
    }

    fn asset_duration(&self) -> Option<TimePosition> {
        self.duration
    }
}
