//! Recursive bitonic sort-network planning
//!
//! A network over `width` registers is split into a power-of-two first half
//! and a smaller second half. The halves are sorted in opposite lane orders so
//! that together they form one bitonic sequence, a cross exchange moves every
//! element into the correct half, and each half is then merged on its own.
//!
//! Plans use register indices relative to the start of the node; a child of a
//! split starts at `0` (first half) or `first_width` (second half).

use std::fmt;

use crate::element::Lanes;
use crate::network::primitives::{Direction, NetworkPrimitives, NetworkStage, Orientation};
use crate::network::widths::SplitWidths;

/// What a network does to its registers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NetworkKind {
    /// Sort arbitrary input
    Sort,
    /// Sort input that is already bitonic across the block
    Merge,
}

/// A network that is emitted once as a named function and called by reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Specialization {
    pub kind: NetworkKind,
    pub width: usize,
    pub orientation: Orientation,
}

impl Specialization {
    pub fn function_name(&self) -> String {
        match self.kind {
            NetworkKind::Sort => format!("sort_{:02}v_{}", self.width, self.orientation.suffix()),
            NetworkKind::Merge => {
                format!("sort_{:02}v_merge_{}", self.width, self.orientation.suffix())
            }
        }
    }
}

impl fmt::Display for Specialization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.function_name())
    }
}

/// In-register network on a single vector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseCaseStage {
    pub kind: NetworkKind,
    pub direction: Direction,
    pub stages: Vec<NetworkStage>,
}

/// Two registers exchanged lane-wise
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangePair {
    pub first: usize,
    pub second: usize,
}

/// The lane-wise min/max exchanges of one split
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrossExchange {
    pub pairs: Vec<ExchangePair>,
    /// Whether the minimum lands in `first` of each pair
    pub min_to_first: bool,
}

/// Internal node of a plan.
///
/// Sort nodes carry plans for both halves. Merge nodes start from bitonic
/// input, so `first_plan` and `second_plan` are absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitNode {
    pub kind: NetworkKind,
    pub first_width: usize,
    pub second_width: usize,
    pub first_plan: Option<Box<SortPlan>>,
    pub second_plan: Option<Box<SortPlan>>,
    pub cross_exchange: CrossExchange,
    pub merge_first: Box<SortPlan>,
    pub merge_second: Box<SortPlan>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortPlan {
    Base(BaseCaseStage),
    Split(SplitNode),
    Call(Specialization),
}

/// Counts over one plan tree; `Call` nodes are not followed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanStats {
    pub base_cases: usize,
    pub stages: usize,
    pub exchanges: usize,
    pub calls: usize,
    pub depth: usize,
}

impl SortPlan {
    /// Number of registers the plan operates on
    pub fn width(&self) -> usize {
        match self {
            SortPlan::Base(_) => 1,
            SortPlan::Split(node) => node.first_width + node.second_width,
            SortPlan::Call(spec) => spec.width,
        }
    }

    pub fn stats(&self) -> PlanStats {
        let mut stats = PlanStats::default();
        self.collect_stats(1, &mut stats);
        stats
    }

    fn collect_stats(&self, depth: usize, stats: &mut PlanStats) {
        stats.depth = stats.depth.max(depth);
        match self {
            SortPlan::Base(base) => {
                stats.base_cases += 1;
                stats.stages += base.stages.len();
            }
            SortPlan::Call(_) => stats.calls += 1,
            SortPlan::Split(node) => {
                stats.exchanges += node.cross_exchange.pairs.len();
                for child in node.children() {
                    child.collect_stats(depth + 1, stats);
                }
            }
        }
    }

    /// Every specialization this plan calls directly
    pub fn direct_calls(&self) -> Vec<Specialization> {
        let mut calls = Vec::new();
        self.visit_calls(&mut calls);
        calls
    }

    fn visit_calls(&self, calls: &mut Vec<Specialization>) {
        match self {
            SortPlan::Base(_) => {}
            SortPlan::Call(spec) => calls.push(*spec),
            SortPlan::Split(node) => {
                for child in node.children() {
                    child.visit_calls(calls);
                }
            }
        }
    }
}

impl SplitNode {
    /// Child plans in execution order
    pub fn children(&self) -> impl Iterator<Item = &SortPlan> {
        self.first_plan
            .iter()
            .chain(self.second_plan.iter())
            .chain([&self.merge_first, &self.merge_second])
            .map(|plan| plan.as_ref())
    }
}

/// Plans sort and merge networks for one lane count
#[derive(Debug, Clone)]
pub struct SortNetworkPlanner {
    primitives: NetworkPrimitives,
    unroll_threshold: usize,
}

impl SortNetworkPlanner {
    pub fn new(lanes: Lanes, unroll_threshold: usize) -> Self {
        Self {
            primitives: NetworkPrimitives::new(lanes),
            unroll_threshold,
        }
    }

    pub fn lanes(&self) -> Lanes {
        self.primitives.lanes()
    }

    pub fn unroll_threshold(&self) -> usize {
        self.unroll_threshold
    }

    /// Full plan sorting `width` registers monotonically in `direction`.
    ///
    /// Panics if `width == 0`.
    pub fn plan_sort(&self, width: usize, direction: Direction) -> SortPlan {
        self.expand(Specialization {
            kind: NetworkKind::Sort,
            width,
            orientation: Orientation::uniform(direction),
        })
    }

    /// The plan for a call site, following the unroll policy.
    ///
    /// Single registers are always base cases, narrow networks are inlined
    /// and the rest become calls to named specializations.
    pub fn plan_site(&self, kind: NetworkKind, width: usize, orientation: Orientation) -> SortPlan {
        assert!(width > 0, "cannot plan a network over 0 registers");
        let spec = Specialization {
            kind,
            width,
            orientation,
        };
        if width == 1 || width < self.unroll_threshold {
            self.expand(spec)
        } else {
            SortPlan::Call(spec)
        }
    }

    /// The body of `spec`, expanded one level regardless of the threshold
    pub fn expand(&self, spec: Specialization) -> SortPlan {
        let Specialization {
            kind,
            width,
            orientation,
        } = spec;
        assert!(width > 0, "cannot plan a network over 0 registers");

        if width == 1 {
            return SortPlan::Base(match kind {
                NetworkKind::Sort => self.base_sort(orientation.lanes),
                NetworkKind::Merge => self.base_merge(orientation.lanes),
            });
        }

        let split = SplitWidths::of(width);
        let (first_width, second_width) = (split.first(), split.second());
        let min_to_first = orientation.vectors.is_ascending();

        let (first_plan, second_plan, pairs) = match kind {
            NetworkKind::Sort => {
                let first = self.plan_site(NetworkKind::Sort, first_width, orientation);
                let second = self.plan_site(
                    NetworkKind::Sort,
                    second_width,
                    orientation.with_reversed_lanes(),
                );
                // Mirror pairs around the split point
                let pairs = (0..second_width)
                    .map(|k| ExchangePair {
                        first: first_width - 1 - k,
                        second: first_width + k,
                    })
                    .collect();
                (Some(Box::new(first)), Some(Box::new(second)), pairs)
            }
            NetworkKind::Merge => {
                let pairs = (0..second_width)
                    .map(|k| ExchangePair {
                        first: k,
                        second: first_width + k,
                    })
                    .collect();
                (None, None, pairs)
            }
        };

        SortPlan::Split(SplitNode {
            kind,
            first_width,
            second_width,
            first_plan,
            second_plan,
            cross_exchange: CrossExchange {
                pairs,
                min_to_first,
            },
            merge_first: Box::new(self.plan_site(NetworkKind::Merge, first_width, orientation)),
            merge_second: Box::new(self.plan_site(NetworkKind::Merge, second_width, orientation)),
        })
    }

    /// Complete single-register sort
    pub fn base_sort(&self, direction: Direction) -> BaseCaseStage {
        BaseCaseStage {
            kind: NetworkKind::Sort,
            direction,
            stages: self
                .primitives
                .sort_stage_kinds()
                .iter()
                .map(|&kind| self.primitives.stage(kind, direction))
                .collect(),
        }
    }

    /// Single-register merge of a bitonic register
    pub fn base_merge(&self, direction: Direction) -> BaseCaseStage {
        BaseCaseStage {
            kind: NetworkKind::Merge,
            direction,
            stages: self
                .primitives
                .merge_stage_kinds()
                .iter()
                .map(|&kind| self.primitives.stage(kind, direction))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ascending() -> Orientation {
        Orientation::uniform(Direction::Ascending)
    }

    #[test]
    fn test_single_register_plan_is_base_case() {
        let planner = SortNetworkPlanner::new(Lanes::Eight, 4);
        match planner.plan_sort(1, Direction::Ascending) {
            SortPlan::Base(base) => {
                assert_eq!(base.kind, NetworkKind::Sort);
                assert_eq!(base.stages.len(), 6);
            }
            other => panic!("expected base case, got {:?}", other),
        }
    }

    #[test]
    fn test_split_of_three_registers() {
        let planner = SortNetworkPlanner::new(Lanes::Eight, 16);
        let plan = planner.plan_sort(3, Direction::Ascending);
        let SortPlan::Split(node) = plan else {
            panic!("expected split");
        };
        assert_eq!((node.first_width, node.second_width), (2, 1));
        assert_eq!(
            node.cross_exchange.pairs,
            vec![ExchangePair { first: 1, second: 2 }]
        );
        assert!(node.cross_exchange.min_to_first);

        // second half sorted with its lanes reversed
        match node.second_plan.as_deref() {
            Some(SortPlan::Base(base)) => assert_eq!(base.direction, Direction::Descending),
            other => panic!("unexpected second plan {:?}", other),
        }
    }

    #[test]
    fn test_merge_node_pairs_are_half_cleaner() {
        let planner = SortNetworkPlanner::new(Lanes::Four, 16);
        let plan = planner.expand(Specialization {
            kind: NetworkKind::Merge,
            width: 6,
            orientation: ascending(),
        });
        let SortPlan::Split(node) = plan else {
            panic!("expected split");
        };
        assert!(node.first_plan.is_none() && node.second_plan.is_none());
        let pairs: Vec<_> = node
            .cross_exchange
            .pairs
            .iter()
            .map(|p| (p.first, p.second))
            .collect();
        assert_eq!(pairs, vec![(0, 4), (1, 5)]);
    }

    #[test]
    fn test_unroll_threshold_controls_calls() {
        let inline = SortNetworkPlanner::new(Lanes::Eight, 64).plan_sort(16, Direction::Ascending);
        assert_eq!(inline.stats().calls, 0);

        let called = SortNetworkPlanner::new(Lanes::Eight, 4).plan_sort(16, Direction::Ascending);
        let calls = called.direct_calls();
        assert!(!calls.is_empty());
        assert!(calls.iter().all(|spec| spec.width >= 4));
    }

    #[test]
    fn test_descending_plan_moves_maxima_first() {
        let planner = SortNetworkPlanner::new(Lanes::Eight, 4);
        let SortPlan::Split(node) = planner.plan_sort(2, Direction::Descending) else {
            panic!("expected split");
        };
        assert!(!node.cross_exchange.min_to_first);
    }

    #[test]
    fn test_function_names() {
        let spec = Specialization {
            kind: NetworkKind::Merge,
            width: 4,
            orientation: ascending(),
        };
        assert_eq!(spec.function_name(), "sort_04v_merge_ascending");
        let spec = Specialization {
            kind: NetworkKind::Sort,
            width: 12,
            orientation: Orientation::uniform(Direction::Descending).with_reversed_lanes(),
        };
        assert_eq!(spec.function_name(), "sort_12v_descending_rev");
    }

    #[test]
    #[should_panic(expected = "0 registers")]
    fn test_zero_width_panics() {
        SortNetworkPlanner::new(Lanes::Eight, 4).plan_sort(0, Direction::Ascending);
    }
}
