use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq)]
#[non_exhaustive]
pub enum IntervalError {
    #[error("interval bounds must be finite (start={start}, end={end})")]
    NonFinite { start: f64, end: f64 },

    #[error("interval bounds must be non-negative (start={start}, end={end})")]
    Negative { start: f64, end: f64 },

    #[error("interval start {start} is after end {end}")]
    Reversed { start: f64, end: f64 },
}

/// A watched segment of a video timeline, in seconds.
///
/// Zero-length intervals (`start == end`) are valid and survive merging.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "IntervalParts")]
pub struct Interval {
    start: f64,
    end: f64,
}

#[derive(Deserialize)]
struct IntervalParts {
    start: f64,
    end: f64,
}

impl TryFrom<IntervalParts> for Interval {
    type Error = IntervalError;

    fn try_from(parts: IntervalParts) -> Result<Self, Self::Error> {
        Interval::new(parts.start, parts.end)
    }
}

impl Interval {
    /// Creates a validated interval.
    ///
    /// # Errors
    ///
    /// Returns `IntervalError` if either bound is non-finite or negative, or if
    /// `start > end`.
    pub fn new(start: f64, end: f64) -> Result<Self, IntervalError> {
        if !start.is_finite() || !end.is_finite() {
            return Err(IntervalError::NonFinite { start, end });
        }
        if start < 0.0 || end < 0.0 {
            return Err(IntervalError::Negative { start, end });
        }
        if start > end {
            return Err(IntervalError::Reversed { start, end });
        }
        Ok(Self { start, end })
    }

    #[must_use]
    pub fn start(&self) -> f64 {
        self.start
    }

    #[must_use]
    pub fn end(&self) -> f64 {
        self.end
    }

    /// Length of the interval in seconds.
    #[must_use]
    pub fn len(&self) -> f64 {
        self.end - self.start
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Returns a copy whose end is extended to `end` if that is further out.
    #[must_use]
    pub(crate) fn extended_to(self, end: f64) -> Self {
        Self {
            start: self.start,
            end: self.end.max(end),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_zero_length() {
        let iv = Interval::new(4.0, 4.0).unwrap();
        assert!(iv.is_empty());
        assert_eq!(iv.len(), 0.0);
    }

    #[test]
    fn rejects_reversed_bounds() {
        assert_eq!(
            Interval::new(5.0, 1.0),
            Err(IntervalError::Reversed {
                start: 5.0,
                end: 1.0
            })
        );
    }

    #[test]
    fn rejects_negative_and_non_finite() {
        assert!(matches!(
            Interval::new(-1.0, 2.0),
            Err(IntervalError::Negative { .. })
        ));
        assert!(matches!(
            Interval::new(0.0, f64::INFINITY),
            Err(IntervalError::NonFinite { .. })
        ));
        assert!(matches!(
            Interval::new(f64::NAN, 1.0),
            Err(IntervalError::NonFinite { .. })
        ));
    }

    #[test]
    fn serializes_as_start_end_object() {
        let iv = Interval::new(1.5, 3.0).unwrap();
        let json = serde_json::to_string(&iv).unwrap();
        assert_eq!(json, r#"{"start":1.5,"end":3.0}"#);
    }

    #[test]
    fn deserialize_validates_bounds() {
        let ok: Interval = serde_json::from_str(r#"{"start":0,"end":10}"#).unwrap();
        assert_eq!(ok, Interval::new(0.0, 10.0).unwrap());

        let err = serde_json::from_str::<Interval>(r#"{"start":10,"end":0}"#);
        assert!(err.is_err());
    }
}
