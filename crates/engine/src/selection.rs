use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

use crate::time::TimePosition;

/// Start/end sub-interval of the asset chosen for looping and confirmation.
///
/// Values are never mutated in place: every accepted handle move produces a
/// new selection through [`RangeSelection::replaced`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RangeSelection {
    start: TimePosition,
    end: TimePosition,
    is_default_full_span: bool,
}

impl RangeSelection {
    /// Default selection covering the whole asset.
    ///
    /// Returns `None` for a zero duration, which cannot satisfy `start < end`.
    ///
    /// # Example
    /// ```
    /// use loop_engine::{RangeSelection, TimePosition};
    ///
    /// let full = RangeSelection::full_span(TimePosition::from_seconds(12.0)).expect("non-empty");
    /// assert!(full.is_default_full_span());
    /// assert_eq!(full.start(), TimePosition::ZERO);
    /// ```
    pub fn full_span(duration: TimePosition) -> Option<Self> {
        duration.is_positive().then_some(Self {
            start: TimePosition::ZERO,
            end: duration,
            is_default_full_span: true,
        })
    }

    /// Builds the replacement for a handle move.
    ///
    /// Returns `None` when `start >= end`. The default flag is a one-way
    /// latch: it stays true only while this selection is still default and
    /// the new bounds equal `initial`.
    pub fn replaced(
        &self,
        start: TimePosition,
        end: TimePosition,
        initial: &RangeSelection,
    ) -> Option<Self> {
        if start >= end {
            return None;
        }
        Some(Self {
            start,
            end,
            is_default_full_span: self.is_default_full_span
                && start == initial.start
                && end == initial.end,
        })
    }

    pub fn start(&self) -> TimePosition {
        self.start
    }

    pub fn end(&self) -> TimePosition {
        self.end
    }

    pub fn is_default_full_span(&self) -> bool {
        self.is_default_full_span
    }

    /// Selected length, always positive.
    pub fn duration(&self) -> TimePosition {
        self.end - self.start
    }
}

/// Live handle positions as last published by the range-handle UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlePositions {
    pub start: TimePosition,
    pub end: TimePosition,
}

impl HandlePositions {
    /// True when either handle moved by more than `epsilon`.
    pub fn differs_from(&self, other: &HandlePositions, epsilon: TimePosition) -> bool {
        let epsilon = epsilon.ticks().unsigned_abs();
        self.start.abs_diff(other.start) > epsilon || self.end.abs_diff(other.end) > epsilon
    }
}

/// Shared cell the range-handle UI writes on every drag update and the
/// controller samples on every clock tick.
///
/// # Example
/// ```
/// use loop_engine::{RangeHandles, TimePosition};
///
/// let handles = RangeHandles::default();
/// let ui_side = handles.clone();
/// ui_side.publish(TimePosition::ZERO, TimePosition::from_seconds(9.5));
///
/// let latest = handles.latest().expect("published");
/// assert_eq!(latest.end, TimePosition::from_seconds(9.5));
/// ```
#[derive(Debug, Clone, Default)]
pub struct RangeHandles {
    inner: Arc<Mutex<Option<HandlePositions>>>,
}

impl RangeHandles {
    pub fn publish(&self, start: TimePosition, end: TimePosition) {
        let mut slot = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(HandlePositions { start, end });
    }

    pub fn latest(&self) -> Option<HandlePositions> {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn clear(&self) {
        let mut slot = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = None;
    }
}
