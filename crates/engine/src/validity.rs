use serde::Serialize;

use crate::selection::RangeSelection;
use crate::time::TimePosition;

/// Whether a selection can be confirmed, plus its length for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Validity {
    pub is_valid: bool,
    pub duration: TimePosition,
}

impl Validity {
    /// Validity reported before any selection exists.
    pub const UNAVAILABLE: Self = Self {
        is_valid: false,
        duration: TimePosition::ZERO,
    };

    /// Formats the "selected / max" label shown next to the trimmer.
    ///
    /// # Example
    /// ```
    /// use loop_engine::{TimePosition, Validity};
    ///
    /// let validity = Validity { is_valid: true, duration: TimePosition::from_seconds(9.5) };
    /// assert_eq!(validity.label(TimePosition::from_seconds(15.0)), "9.5s / 15.0s");
    /// ```
    pub fn label(&self, max: TimePosition) -> String {
        format!("{:.1}s / {:.1}s", self.duration.as_seconds(), max.as_seconds())
    }
}

/// Evaluates `selection` against the maximum confirmable length.
///
/// Valid iff `0 < end - start <= max`.
pub fn evaluate(selection: &RangeSelection, max: TimePosition) -> Validity {
    let duration = selection.end() - selection.start();
    Validity {
        is_valid: duration.is_positive() && duration <= max,
        duration,
    }
}
