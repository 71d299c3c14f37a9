//! Remote display geometry in the `WxH` form the broker and the display
//! launcher both expect (e.g. `1024x768`).
//!
//! Geometry is validated when it is set, not when it is sent: a malformed
//! value never reaches the broker.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Largest accepted width or height in pixels.
pub const MAX_DIMENSION: u32 = 16384;

/// Error returned when a geometry string cannot be parsed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GeometryError {
    #[error("geometry {0:?} is not of the form WxH (e.g. 1024x768)")]
    Malformed(String),

    #[error("geometry dimension {value} is out of range 1..={max}")]
    OutOfRange { value: u32, max: u32 },
}

/// A validated display size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    width: u32,
    height: u32,
}

impl Geometry {
    /// # Errors
    ///
    /// Returns [`GeometryError::OutOfRange`] when either dimension is zero or
    /// larger than [`MAX_DIMENSION`].
    pub fn new(width: u32, height: u32) -> Result<Self, GeometryError> {
        for value in [width, height] {
            if value == 0 || value > MAX_DIMENSION {
                return Err(GeometryError::OutOfRange {
                    value,
                    max: MAX_DIMENSION,
                });
            }
        }
        Ok(Self { width, height })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

impl FromStr for Geometry {
    type Err = GeometryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || GeometryError::Malformed(s.to_string());

        let (w, h) = s.split_once(['x', 'X']).ok_or_else(malformed)?;
        // `u32::from_str` accepts a leading '+', which is not valid here.
        let all_digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(w) || !all_digits(h) {
            return Err(malformed());
        }
        let width = w.parse::<u32>().map_err(|_| malformed())?;
        let height = h.parse::<u32>().map_err(|_| malformed())?;
        Self::new(width, height)
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_geometry() {
        let g: Geometry = "1024x768".parse().unwrap();
        assert_eq!((g.width(), g.height()), (1024, 768));
    }

    #[test]
    fn test_parse_accepts_uppercase_separator_and_normalises_display() {
        let g: Geometry = "800X600".parse().unwrap();
        assert_eq!(g.to_string(), "800x600");
    }

    #[test]
    fn test_parse_rejects_missing_separator() {
        assert_eq!(
            "1024768".parse::<Geometry>(),
            Err(GeometryError::Malformed("1024768".to_string()))
        );
    }

    #[test]
    fn test_parse_rejects_signs_spaces_and_trailing_garbage() {
        for bad in ["+1024x768", "1024x-768", " 1024x768", "1024x768px", "x768", "1024x"] {
            assert!(
                matches!(bad.parse::<Geometry>(), Err(GeometryError::Malformed(_))),
                "{bad:?} must be rejected as malformed"
            );
        }
    }

    #[test]
    fn test_parse_rejects_zero_dimension() {
        assert_eq!(
            "0x768".parse::<Geometry>(),
            Err(GeometryError::OutOfRange { value: 0, max: MAX_DIMENSION })
        );
    }

    #[test]
    fn test_parse_rejects_oversized_dimension() {
        assert!(matches!(
            "1024x99999".parse::<Geometry>(),
            Err(GeometryError::OutOfRange { value: 99999, .. })
        ));
    }
}
