use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Frame rate as reported by the container, e.g. `30000/1001`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rational {
    pub num: u32,
    pub den: u32,
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("invalid frame rate {0:?}: expected \"num/den\"")]
pub struct RationalParseError(pub String);

impl Rational {
    pub fn new(num: u32, den: u32) -> Self {
        Self { num, den }
    }

    pub fn as_f64(&self) -> f64 {
        if self.den == 0 {
            0.0
        } else {
            self.num as f64 / self.den as f64
        }
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

impl FromStr for Rational {
    type Err = RationalParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || RationalParseError(s.to_string());
        let (num, den) = s.trim().split_once('/').ok_or_else(err)?;
        Ok(Self {
            num: num.trim().parse().map_err(|_| err())?,
            den: den.trim().parse().map_err(|_| err())?,
        })
    }
}

/// Probed properties of one video sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceMeta {
    pub fps: Rational,
    pub width: u32,
    pub height: u32,
    pub frame_count: usize,
}
