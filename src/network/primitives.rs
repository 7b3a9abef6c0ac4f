//! Intra-register building blocks of a bitonic network
//!
//! One stage of an in-register network permutes the register, takes the
//! lane-wise min and max of the permuted and original register, and blends
//! the two so that one set of lanes keeps the minimum and the other the
//! maximum. Every permutation here is `lane ^ k` and every blend selects the
//! lanes with one index bit set, so each primitive is defined for both
//! 4-lane and 8-lane registers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::element::Lanes;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    pub fn is_ascending(self) -> bool {
        matches!(self, Direction::Ascending)
    }

    pub fn reversed(self) -> Self {
        match self {
            Direction::Ascending => Direction::Descending,
            Direction::Descending => Direction::Ascending,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Direction::Ascending => "ascending",
            Direction::Descending => "descending",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordering of a multi-register block.
///
/// `vectors` decides which register of an exchanged pair keeps the minimum,
/// `lanes` decides the order inside each register. A block whose lane order
/// is reversed relative to its register order is what the second half of a
/// split is sorted into: it turns the cross exchange into a plain
/// register-mirrored pairing with no permutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Orientation {
    pub vectors: Direction,
    pub lanes: Direction,
}

impl Orientation {
    /// Fully monotonic ordering in `direction`
    pub fn uniform(direction: Direction) -> Self {
        Orientation {
            vectors: direction,
            lanes: direction,
        }
    }

    pub fn with_reversed_lanes(self) -> Self {
        Orientation {
            vectors: self.vectors,
            lanes: self.lanes.reversed(),
        }
    }

    pub fn is_uniform(self) -> bool {
        self.vectors == self.lanes
    }

    /// Suffix used in emitted function names
    pub fn suffix(self) -> String {
        if self.is_uniform() {
            self.vectors.name().to_string()
        } else {
            format!("{}_rev", self.vectors.name())
        }
    }
}

/// Lane permutation: lane `i` of the result reads lane `i ^ k` of the input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permutation {
    /// Swap neighbouring lanes (`k = 1`)
    SwapAdjacent,
    /// Swap neighbouring lane pairs (`k = 2`)
    SwapPairs,
    /// Reverse each group of four lanes (`k = 3`)
    ReverseQuads,
    /// Swap the two register halves (`k = lanes / 2`)
    CrossHalves,
    /// Reverse the whole register (`k = lanes - 1`)
    Reverse,
}

impl Permutation {
    pub fn xor_mask(self, lanes: Lanes) -> usize {
        match self {
            Permutation::SwapAdjacent => 1,
            Permutation::SwapPairs => 2,
            Permutation::ReverseQuads => 3,
            Permutation::CrossHalves => lanes.half(),
            Permutation::Reverse => lanes.count() - 1,
        }
    }

    /// Input lane read by output lane `lane`
    pub fn source_lane(self, lanes: Lanes, lane: usize) -> usize {
        lane ^ self.xor_mask(lanes)
    }
}

/// Set of lanes that receive the maximum in an ascending stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendMask {
    /// Odd lanes
    Alternate,
    /// Lanes with index bit 1 set
    Pairs,
    /// Upper half of the register
    Halves,
}

impl BlendMask {
    fn index_bit(self, lanes: Lanes) -> usize {
        match self {
            BlendMask::Alternate => 1,
            BlendMask::Pairs => 2,
            BlendMask::Halves => lanes.half(),
        }
    }

    pub fn selects(self, lanes: Lanes, lane: usize) -> bool {
        lane & self.index_bit(lanes) != 0
    }

    /// Immediate with bit `i` set for every selected lane
    pub fn bits(self, lanes: Lanes) -> u32 {
        (0..lanes.count())
            .filter(|&lane| self.selects(lanes, lane))
            .fold(0, |acc, lane| acc | (1 << lane))
    }
}

/// One operation of a network stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageOp {
    /// `s = permute(v)`
    Permute(Permutation),
    /// `cmp = s > v`, lane-wise; only materialized for types without native min/max
    Compare,
    /// `lo = min(s, v)`
    Min,
    /// `hi = max(s, v)`
    Max,
    /// `v = blend(lo, hi)`: selected lanes take `hi` when ascending, `lo` otherwise
    Blend { mask: BlendMask, ascending: bool },
}

/// The named stages in-register networks are built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    PairSwap,
    QuadReverse,
    PairOfPairsSwap,
    FullReverse,
    CrossHalves,
}

impl StageKind {
    pub fn permutation(self) -> Permutation {
        match self {
            StageKind::PairSwap => Permutation::SwapAdjacent,
            StageKind::QuadReverse => Permutation::ReverseQuads,
            StageKind::PairOfPairsSwap => Permutation::SwapPairs,
            StageKind::FullReverse => Permutation::Reverse,
            StageKind::CrossHalves => Permutation::CrossHalves,
        }
    }

    pub fn blend(self) -> BlendMask {
        match self {
            StageKind::PairSwap => BlendMask::Alternate,
            StageKind::QuadReverse | StageKind::PairOfPairsSwap => BlendMask::Pairs,
            StageKind::FullReverse | StageKind::CrossHalves => BlendMask::Halves,
        }
    }
}

/// A fixed op sequence realizing one stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkStage {
    pub kind: StageKind,
    pub ops: Vec<StageOp>,
}

const SORT_STAGES_4: [StageKind; 3] = [
    StageKind::PairSwap,
    StageKind::QuadReverse,
    StageKind::PairSwap,
];

const SORT_STAGES_8: [StageKind; 6] = [
    StageKind::PairSwap,
    StageKind::QuadReverse,
    StageKind::PairSwap,
    StageKind::FullReverse,
    StageKind::PairOfPairsSwap,
    StageKind::PairSwap,
];

const MERGE_STAGES_4: [StageKind; 2] = [StageKind::PairOfPairsSwap, StageKind::PairSwap];

const MERGE_STAGES_8: [StageKind; 3] = [
    StageKind::CrossHalves,
    StageKind::PairOfPairsSwap,
    StageKind::PairSwap,
];

/// Per-lane-count catalogue of stages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkPrimitives {
    lanes: Lanes,
}

impl NetworkPrimitives {
    pub fn new(lanes: Lanes) -> Self {
        Self { lanes }
    }

    pub fn lanes(&self) -> Lanes {
        self.lanes
    }

    /// The op sequence of `kind`, with min/max roles swapped for descending
    pub fn stage(&self, kind: StageKind, direction: Direction) -> NetworkStage {
        NetworkStage {
            kind,
            ops: vec![
                StageOp::Permute(kind.permutation()),
                StageOp::Compare,
                StageOp::Min,
                StageOp::Max,
                StageOp::Blend {
                    mask: kind.blend(),
                    ascending: direction.is_ascending(),
                },
            ],
        }
    }

    /// Stages of a full single-register sort.
    ///
    /// Four lanes need only the three build stages: the quad reversal already
    /// spans the whole register. Eight lanes add the whole-register merge.
    pub fn sort_stage_kinds(&self) -> &'static [StageKind] {
        match self.lanes {
            Lanes::Four => &SORT_STAGES_4,
            Lanes::Eight => &SORT_STAGES_8,
        }
    }

    /// Stages of a single-register merge of a bitonic register
    pub fn merge_stage_kinds(&self) -> &'static [StageKind] {
        match self.lanes {
            Lanes::Four => &MERGE_STAGES_4,
            Lanes::Eight => &MERGE_STAGES_8,
        }
    }
}
