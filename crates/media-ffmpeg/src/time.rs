use crate::error::{MediaFfmpegError, Result};

/// Rational value as reported by `ffprobe` (`time_base`, `sample_aspect_ratio`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rational {
    pub num: i32,
    pub den: i32,
}

impl Rational {
    /// Creates a rational with a positive numerator and denominator.
    ///
    /// # Example
    /// ```
    /// use media_ffmpeg::Rational;
    ///
    /// let tb = Rational::new(1, 48_000).expect("valid");
    /// assert_eq!(tb.den, 48_000);
    /// ```
    pub fn new(num: i32, den: i32) -> Result<Self> {
        if num <= 0 || den <= 0 {
            return Err(MediaFfmpegError::InvalidRational { num, den });
        }

        Ok(Self { num, den })
    }

    /// Parses `num/den` or `num:den` text.
    ///
    /// `ffprobe` reports unknown values as `0/1`, `0:1`, `0/0` or `N/A`; those
    /// map to `Ok(None)`.
    ///
    /// # Example
    /// ```
    /// use media_ffmpeg::Rational;
    ///
    /// let tb = Rational::parse("1/15360").expect("valid").expect("known");
    /// assert_eq!(tb.den, 15360);
    /// assert!(Rational::parse("0:1").expect("valid").is_none());
    /// ```
    pub fn parse(input: &str) -> Result<Option<Self>> {
        let input = input.trim();
        if input.is_empty() || input == "N/A" {
            return Ok(None);
        }

        let (num, den) = input
            .split_once(['/', ':'])
            .ok_or_else(|| MediaFfmpegError::Parse {
                context: "rational",
                value: input.to_string(),
            })?;
        let num = parse_i32(num, "rational num")?;
        let den = parse_i32(den, "rational den")?;
        if num == 0 || den == 0 {
            return Ok(None);
        }
        Self::new(num, den).map(Some)
    }
}

fn parse_i32(value: &str, context: &'static str) -> Result<i32> {
    value
        .trim()
        .parse::<i32>()
        .map_err(|_| MediaFfmpegError::Parse {
            context,
            value: value.to_string(),
        })
}
