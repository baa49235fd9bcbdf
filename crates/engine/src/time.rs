use std::fmt::{Display, Formatter};
use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

/// Rational number used as a time base. Both parts are positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rational {
    pub num: i32,
    pub den: i32,
}

impl Rational {
    /// Timeline time base used by the controller: microseconds.
    pub const MICROS: Self = Self {
        num: 1,
        den: 1_000_000,
    };
}

/// Timeline base `(1, 1_000_000)`.
pub const TIMELINE_TIME_BASE: Rational = Rational::MICROS;

/// Rescales `ts` from one time base to another with nearest rounding.
///
/// # Example
/// ```
/// use loop_engine::{Rational, TIMELINE_TIME_BASE, rescale};
///
/// let src = Rational { num: 1, den: 90_000 };
/// assert_eq!(rescale(90_000, src, TIMELINE_TIME_BASE), 1_000_000);
/// ```
pub fn rescale(ts: i64, from: Rational, to: Rational) -> i64 {
    let numerator = i128::from(ts) * i128::from(from.num) * i128::from(to.den);
    let denominator = i128::from(from.den) * i128::from(to.num);
    let rounded = div_round_nearest(numerator, denominator);
    rounded.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
}

fn div_round_nearest(num: i128, den: i128) -> i128 {
    debug_assert!(den > 0);

    let abs_num = num.abs();
    let mut out = abs_num / den;
    let remainder = abs_num % den;
    if remainder.saturating_mul(2) >= den {
        out += 1;
    }

    if num < 0 { -out } else { out }
}

impl From<media_ffmpeg::Rational> for Rational {
    fn from(value: media_ffmpeg::Rational) -> Self {
        Self {
            num: value.num,
            den: value.den,
        }
    }
}

/// Non-negative media time in timeline ticks ([`TIMELINE_TIME_BASE`]).
///
/// Integer ticks keep handle comparisons exact; floating seconds only appear
/// at the edges (`from_seconds`, `as_seconds`, `Display`).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TimePosition(i64);

impl TimePosition {
    pub const ZERO: Self = Self(0);

    /// Builds a position from timeline ticks, clamping negatives to zero.
    pub const fn from_ticks(t_tl: i64) -> Self {
        if t_tl < 0 { Self(0) } else { Self(t_tl) }
    }

    /// Builds a position from seconds with nearest rounding.
    ///
    /// Non-finite and negative inputs map to zero.
    ///
    /// # Example
    /// ```
    /// use loop_engine::TimePosition;
    ///
    /// assert_eq!(TimePosition::from_seconds(9.5).ticks(), 9_500_000);
    /// assert_eq!(TimePosition::from_seconds(-1.0), TimePosition::ZERO);
    /// ```
    pub fn from_seconds(seconds: f64) -> Self {
        if !seconds.is_finite() || seconds <= 0.0 {
            return Self::ZERO;
        }
        let ticks = (seconds * f64::from(TIMELINE_TIME_BASE.den)).round();
        Self::from_ticks(ticks.min(i64::MAX as f64) as i64)
    }

    /// Builds a position from a stream timestamp expressed in `time_base`.
    pub fn from_timestamp(ts: i64, time_base: Rational) -> Self {
        Self::from_ticks(rescale(ts, time_base, TIMELINE_TIME_BASE))
    }

    pub const fn ticks(self) -> i64 {
        self.0
    }

    pub fn as_seconds(self) -> f64 {
        self.0 as f64 / f64::from(TIMELINE_TIME_BASE.den)
    }

    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Difference that never goes below zero.
    pub const fn saturating_sub(self, other: Self) -> Self {
        Self::from_ticks(self.0.saturating_sub(other.0))
    }

    /// Absolute distance between two positions in ticks.
    pub const fn abs_diff(self, other: Self) -> u64 {
        self.0.abs_diff(other.0)
    }

    /// Returns true when `self` is at `target`, past it, or short of it by at
    /// most `epsilon`.
    ///
    /// # Example
    /// ```
    /// use loop_engine::TimePosition;
    ///
    /// let target = TimePosition::from_ticks(1_000);
    /// assert!(TimePosition::from_ticks(999).is_at_or_past(target, TimePosition::from_ticks(1)));
    /// assert!(!TimePosition::from_ticks(998).is_at_or_past(target, TimePosition::from_ticks(1)));
    /// ```
    pub const fn is_at_or_past(self, target: Self, epsilon: Self) -> bool {
        self.0.saturating_add(epsilon.0) >= target.0
    }

    /// Clamps into `[0, duration]`.
    pub fn clamp_to(self, duration: Self) -> Self {
        self.min(duration)
    }
}

impl Add for TimePosition {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl Sub for TimePosition {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        self.saturating_sub(rhs)
    }
}

impl Display for TimePosition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.3}s", self.as_seconds())
    }
}
