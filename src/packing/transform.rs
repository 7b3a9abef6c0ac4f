//! Value transforms applied before packing and after unpacking
//!
//! All arithmetic is lane-wise wrapping `u32`, matching what the emitted
//! kernels do with 32-bit vector add/sub.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GenError;

/// Lanes in one packing register
pub const PACK_LANES: usize = 8;

/// One 256-bit register of packing lanes
pub type LaneWord = [u32; PACK_LANES];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transform {
    /// Values are packed as they are
    Identity,
    /// Each value is stored as the difference to its predecessor
    Delta,
    /// Each value is stored as the difference to a fixed reference
    FrameOfReference,
}

impl Transform {
    pub const ALL: [Transform; 3] = [
        Transform::Identity,
        Transform::Delta,
        Transform::FrameOfReference,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Transform::Identity => "identity",
            Transform::Delta => "delta",
            Transform::FrameOfReference => "frame_of_reference",
        }
    }

    pub fn encode(self, value: LaneWord, reference: &mut LaneWord) -> LaneWord {
        match self {
            Transform::Identity => value,
            Transform::Delta => {
                let delta = lanewise(value, *reference, u32::wrapping_sub);
                *reference = value;
                delta
            }
            Transform::FrameOfReference => lanewise(value, *reference, u32::wrapping_sub),
        }
    }

    pub fn decode(self, value: LaneWord, reference: &mut LaneWord) -> LaneWord {
        match self {
            Transform::Identity => value,
            Transform::Delta => {
                let restored = lanewise(value, *reference, u32::wrapping_add);
                *reference = restored;
                restored
            }
            Transform::FrameOfReference => lanewise(value, *reference, u32::wrapping_add),
        }
    }
}

fn lanewise(a: LaneWord, b: LaneWord, op: fn(u32, u32) -> u32) -> LaneWord {
    std::array::from_fn(|lane| op(a[lane], b[lane]))
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Transform {
    type Err = GenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "identity" | "none" => Ok(Transform::Identity),
            "delta" => Ok(Transform::Delta),
            "frame_of_reference" | "for" => Ok(Transform::FrameOfReference),
            other => Err(GenError::Config(format!("unknown transform `{}`", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_threads_reference() {
        let mut reference = [10; PACK_LANES];
        let first = Transform::Delta.encode([15; PACK_LANES], &mut reference);
        assert_eq!(first, [5; PACK_LANES]);
        assert_eq!(reference, [15; PACK_LANES]);

        let mut reference = [10; PACK_LANES];
        let restored = Transform::Delta.decode(first, &mut reference);
        assert_eq!(restored, [15; PACK_LANES]);
        assert_eq!(reference, [15; PACK_LANES]);
    }

    #[test]
    fn test_delta_wraps() {
        let mut reference = [5; PACK_LANES];
        let delta = Transform::Delta.encode([3; PACK_LANES], &mut reference);
        assert_eq!(delta, [u32::MAX - 1; PACK_LANES]);
    }

    #[test]
    fn test_frame_of_reference_keeps_reference() {
        let mut reference = [100; PACK_LANES];
        let encoded = Transform::FrameOfReference.encode([107; PACK_LANES], &mut reference);
        assert_eq!(encoded, [7; PACK_LANES]);
        assert_eq!(reference, [100; PACK_LANES]);
        assert_eq!(
            Transform::FrameOfReference.decode(encoded, &mut reference),
            [107; PACK_LANES]
        );
    }

    #[test]
    fn test_parse_transform() {
        assert_eq!("for".parse::<Transform>().unwrap(), Transform::FrameOfReference);
        assert!("zigzag".parse::<Transform>().is_err());
    }
}
