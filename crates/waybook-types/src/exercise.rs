//! Exercise references: the `part.module.exercise` coordinate of a block.
//!
//! Parsing is strict so that a malformed token is a structural validation
//! error, distinct from "valid format, but no such exercise exists".

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structural validation failure for an exercise token.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExerciseRefError {
    /// Wrong number of dot-separated segments (must be exactly three).
    #[error("exercise reference must be part.module.exercise, got {0} segment(s)")]
    SegmentCount(usize),
    /// A segment was not a positive integer.
    #[error("exercise reference segment {0:?} is not a positive integer")]
    BadSegment(String),
}

/// A `part.module.exercise` coordinate, e.g. `1.2.3`.
///
/// Orders by `(part, module, exercise)`, matching curriculum order at the
/// exercise granularity. Serializes as the dotted token.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct ExerciseRef {
    pub part: u32,
    pub module: u32,
    pub exercise: u32,
}

impl ExerciseRef {
    pub fn new(part: u32, module: u32, exercise: u32) -> Self {
        Self { part, module, exercise }
    }
}

impl FromStr for ExerciseRef {
    type Err = ExerciseRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let segments: Vec<&str> = s.split('.').collect();
        if segments.len() != 3 {
            return Err(ExerciseRefError::SegmentCount(segments.len()));
        }
        let mut parsed = [0u32; 3];
        for (i, seg) in segments.iter().enumerate() {
            parsed[i] = seg
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| ExerciseRefError::BadSegment(seg.to_string()))?;
        }
        Ok(Self { part: parsed[0], module: parsed[1], exercise: parsed[2] })
    }
}

impl fmt::Display for ExerciseRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.part, self.module, self.exercise)
    }
}

impl Serialize for ExerciseRef {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ExerciseRef {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
