//! Scalar element types and lane geometry
//!
//! Every behavioral difference between element types (compare synthesis,
//! fill values, load/store forms) is an exhaustive match on [`ElementType`],
//! so adding a type forces every site to handle it.

use std::fmt;
use std::str::FromStr;

use num_traits::{Bounded, Float};
use serde::{Deserialize, Serialize};

use crate::error::{GenError, Result};
use crate::network::Direction;

/// Sign bit of a 64-bit lane
pub const SIGN_BIT_64: u64 = 1 << 63;

/// The scalar types kernels are specialized for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    I32,
    U32,
    F32,
    I64,
    U64,
    F64,
}

impl ElementType {
    /// All supported element types, in emission order
    pub const ALL: [ElementType; 6] = [
        ElementType::I32,
        ElementType::U32,
        ElementType::F32,
        ElementType::I64,
        ElementType::U64,
        ElementType::F64,
    ];

    /// Size of one element in bytes
    pub fn size_bytes(self) -> usize {
        match self {
            ElementType::I32 | ElementType::U32 | ElementType::F32 => 4,
            ElementType::I64 | ElementType::U64 | ElementType::F64 => 8,
        }
    }

    /// The Rust spelling of the type
    pub fn name(self) -> &'static str {
        match self {
            ElementType::I32 => "i32",
            ElementType::U32 => "u32",
            ElementType::F32 => "f32",
            ElementType::I64 => "i64",
            ElementType::U64 => "u64",
            ElementType::F64 => "f64",
        }
    }

    /// Lanes per register for a vector width in bytes
    pub fn lanes(self, vector_width_bytes: usize) -> Result<Lanes> {
        let lanes = vector_width_bytes / self.size_bytes();
        Lanes::from_count(lanes).ok_or(GenError::UnsupportedLaneCount {
            element: self,
            vector_width_bytes,
            lanes,
        })
    }

    pub fn is_float(self) -> bool {
        matches!(self, ElementType::F32 | ElementType::F64)
    }

    /// Whether lane-wise min/max exist natively.
    ///
    /// 64-bit integer lanes have no ordered min/max; they are built from a
    /// signed greater-than compare and a variable blend instead.
    pub fn has_native_min_max(self) -> bool {
        !matches!(self, ElementType::I64 | ElementType::U64)
    }

    /// Whether the synthesized compare needs the sign-bit flip
    pub fn needs_sign_flip(self) -> bool {
        matches!(self, ElementType::U64)
    }

    /// Operand of the synthesized signed compare.
    ///
    /// XOR with the sign bit maps unsigned order onto signed order exactly.
    pub fn compare_key(self, bits: u64) -> i64 {
        if self.needs_sign_flip() {
            (bits ^ SIGN_BIT_64) as i64
        } else {
            bits as i64
        }
    }

    /// Lane-wise `a > b` in element order, on raw lane bits
    pub fn greater_than(self, a: u64, b: u64) -> bool {
        match self {
            ElementType::I32 => (a as u32 as i32) > (b as u32 as i32),
            ElementType::U32 => (a as u32) > (b as u32),
            ElementType::F32 => f32::from_bits(a as u32) > f32::from_bits(b as u32),
            ElementType::I64 => (a as i64) > (b as i64),
            ElementType::U64 => a > b,
            ElementType::F64 => f64::from_bits(a) > f64::from_bits(b),
        }
    }

    /// Raw bits of the value that pads invalid lanes of a partial vector
    pub fn fill_bits(self, direction: Direction) -> u64 {
        match self {
            ElementType::I32 => i32::fill(direction).to_lane_bits(),
            ElementType::U32 => u32::fill(direction).to_lane_bits(),
            ElementType::F32 => f32::fill(direction).to_lane_bits(),
            ElementType::I64 => i64::fill(direction).to_lane_bits(),
            ElementType::U64 => u64::fill(direction).to_lane_bits(),
            ElementType::F64 => f64::fill(direction).to_lane_bits(),
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ElementType {
    type Err = GenError;

    fn from_str(s: &str) -> Result<Self> {
        ElementType::ALL
            .into_iter()
            .find(|t| t.name() == s.trim())
            .ok_or_else(|| GenError::Config(format!("unsupported element type `{}`", s)))
    }
}

/// Number of lanes per SIMD register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Lanes {
    Four,
    Eight,
}

impl Lanes {
    pub fn from_count(count: usize) -> Option<Self> {
        match count {
            4 => Some(Lanes::Four),
            8 => Some(Lanes::Eight),
            _ => None,
        }
    }

    pub fn count(self) -> usize {
        match self {
            Lanes::Four => 4,
            Lanes::Eight => 8,
        }
    }

    /// Lanes in one half of the register
    pub fn half(self) -> usize {
        self.count() / 2
    }
}

impl fmt::Display for Lanes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.count())
    }
}

/// A Rust scalar that can live in a lane.
///
/// Lanes are handled as raw bits so one interpreter serves every type;
/// 32-bit types use the low half of the `u64`.
pub trait Lane: Copy + PartialOrd + fmt::Debug + Send + Sync + 'static {
    const ELEMENT: ElementType;

    fn to_lane_bits(self) -> u64;

    fn from_lane_bits(bits: u64) -> Self;

    /// Largest value in element order
    fn greatest() -> Self;

    /// Smallest value in element order
    fn least() -> Self;

    /// Padding that sorts to the far end for `direction`
    fn fill(direction: Direction) -> Self {
        match direction {
            Direction::Ascending => Self::greatest(),
            Direction::Descending => Self::least(),
        }
    }
}

macro_rules! impl_int_lane {
    ($t:ty, $bits:ty, $element:expr) => {
        impl Lane for $t {
            const ELEMENT: ElementType = $element;

            fn to_lane_bits(self) -> u64 {
                self as $bits as u64
            }

            fn from_lane_bits(bits: u64) -> Self {
                bits as $bits as $t
            }

            fn greatest() -> Self {
                <$t as Bounded>::max_value()
            }

            fn least() -> Self {
                <$t as Bounded>::min_value()
            }
        }
    };
}

// Float padding is infinite rather than MAX so that real infinities still
// sort inside the valid lanes.
macro_rules! impl_float_lane {
    ($t:ty, $bits:ty, $element:expr) => {
        impl Lane for $t {
            const ELEMENT: ElementType = $element;

            fn to_lane_bits(self) -> u64 {
                <$t>::to_bits(self) as u64
            }

            fn from_lane_bits(bits: u64) -> Self {
                <$t>::from_bits(bits as $bits)
            }

            fn greatest() -> Self {
                <$t as Float>::infinity()
            }

            fn least() -> Self {
                <$t as Float>::neg_infinity()
            }
        }
    };
}

impl_int_lane!(i32, u32, ElementType::I32);
impl_int_lane!(u32, u32, ElementType::U32);
impl_int_lane!(i64, u64, ElementType::I64);
impl_int_lane!(u64, u64, ElementType::U64);
impl_float_lane!(f32, u32, ElementType::F32);
impl_float_lane!(f64, u64, ElementType::F64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lanes_for_avx2_width() {
        assert_eq!(ElementType::I32.lanes(32).unwrap(), Lanes::Eight);
        assert_eq!(ElementType::F32.lanes(32).unwrap(), Lanes::Eight);
        assert_eq!(ElementType::U64.lanes(32).unwrap(), Lanes::Four);
        assert_eq!(ElementType::F64.lanes(32).unwrap(), Lanes::Four);
        assert_eq!(ElementType::I32.lanes(16).unwrap(), Lanes::Four);
        assert!(matches!(
            ElementType::I64.lanes(16),
            Err(GenError::UnsupportedLaneCount { lanes: 2, .. })
        ));
    }

    #[test]
    fn test_sign_flip_preserves_unsigned_order() {
        let samples = [0u64, 1, 42, SIGN_BIT_64 - 1, SIGN_BIT_64, SIGN_BIT_64 + 1, u64::MAX];
        for &a in &samples {
            for &b in &samples {
                let by_key = ElementType::U64.compare_key(a) > ElementType::U64.compare_key(b);
                assert_eq!(by_key, a > b, "{} vs {}", a, b);
            }
        }
    }

    #[test]
    fn test_lane_bits_round_trip() {
        assert_eq!(i32::from_lane_bits((-5i32).to_lane_bits()), -5);
        assert_eq!((-1i32).to_lane_bits(), u32::MAX as u64);
        assert_eq!(f64::from_lane_bits((-2.5f64).to_lane_bits()), -2.5);
        assert!(ElementType::I32.greater_than(3i32.to_lane_bits(), (-7i32).to_lane_bits()));
        assert!(ElementType::F32.greater_than(1.5f32.to_lane_bits(), (-0.5f32).to_lane_bits()));
    }

    #[test]
    fn test_fill_sorts_to_far_end() {
        let fill = ElementType::F32.fill_bits(Direction::Ascending);
        assert_eq!(f32::from_lane_bits(fill), f32::INFINITY);
        let fill = ElementType::U32.fill_bits(Direction::Descending);
        assert_eq!(u32::from_lane_bits(fill), 0);
        let fill = ElementType::I64.fill_bits(Direction::Ascending);
        assert_eq!(i64::from_lane_bits(fill), i64::MAX);
    }

    #[test]
    fn test_parse_element_type() {
        assert_eq!("u64".parse::<ElementType>().unwrap(), ElementType::U64);
        assert!("i16".parse::<ElementType>().is_err());
    }
}
