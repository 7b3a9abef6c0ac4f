//! Sort entry points and the per-type kernel set
//!
//! An entry point handles `1..=max_vectors` registers of input. It loads the
//! full vectors, loads the last vector through the remainder mask with the
//! invalid lanes padded, runs the network and stores back through the same
//! mask. Lengths map to entry points at runtime through [`dispatch_vectors`].

use std::collections::{BTreeMap, BTreeSet};

use rayon::prelude::*;
use tracing::debug;

use crate::element::{ElementType, Lanes};
use crate::error::{GenError, Result};
use crate::network::mask::MaskTable;
use crate::network::planner::{NetworkKind, SortNetworkPlanner, SortPlan, Specialization};
use crate::network::primitives::{Direction, Orientation};

/// Parameters of one sorting-kernel generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationRequest {
    pub element_type: ElementType,
    pub lanes: Lanes,
    pub max_vectors: usize,
    pub unroll_threshold: usize,
    pub direction: Direction,
}

impl GenerationRequest {
    pub fn new(
        element_type: ElementType,
        vector_width_bytes: usize,
        max_vectors: usize,
        unroll_threshold: usize,
        direction: Direction,
    ) -> Result<Self> {
        if max_vectors == 0 {
            return Err(GenError::InvalidVectorCount(max_vectors));
        }
        Ok(Self {
            element_type,
            lanes: element_type.lanes(vector_width_bytes)?,
            max_vectors,
            unroll_threshold,
            direction,
        })
    }

    /// Longest input the generated kernels accept
    pub fn max_bitonic_length(&self) -> usize {
        max_bitonic_length(self.lanes, self.max_vectors)
    }
}

pub fn max_bitonic_length(lanes: Lanes, max_vectors: usize) -> usize {
    lanes.count() * max_vectors
}

/// `(full, remainder)` split of `length` elements into registers
pub fn split_length(length: usize, lanes: Lanes) -> (usize, usize) {
    let full = length / lanes.count();
    (full, length - full * lanes.count())
}

/// Registers needed to hold `length` elements
pub fn vector_count_for(length: usize, lanes: Lanes) -> usize {
    let (full, remainder) = split_length(length, lanes);
    full + usize::from(remainder > 0)
}

/// Entry point index for `length` elements; `None` for empty input.
///
/// Panics if the input needs more than `max_vectors` registers.
pub fn dispatch_vectors(length: usize, lanes: Lanes, max_vectors: usize) -> Option<usize> {
    let vectors = vector_count_for(length, lanes);
    assert!(
        vectors <= max_vectors,
        "{} elements need {} vectors, more than the supported {}",
        length,
        vectors,
        max_vectors
    );
    (vectors > 0).then_some(vectors)
}

/// Load, sort and store for exactly `vectors` registers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    pub vectors: usize,
    pub direction: Direction,
    pub body: SortPlan,
}

impl EntryPoint {
    pub fn function_name(&self) -> String {
        format!("sort_{:02}v_alt", self.vectors)
    }

    /// Registers loaded and stored without a mask
    pub fn unmasked_vectors(&self) -> usize {
        self.vectors - 1
    }
}

/// Everything emitted for one element type: entry points plus every named
/// specialization they reach, each planned once
#[derive(Debug, Clone)]
pub struct SortKernelSet {
    pub request: GenerationRequest,
    pub mask_table: MaskTable,
    pub entry_points: Vec<EntryPoint>,
    pub specializations: BTreeMap<Specialization, SortPlan>,
}

impl SortKernelSet {
    pub fn plan(request: &GenerationRequest) -> Self {
        let planner = SortNetworkPlanner::new(request.lanes, request.unroll_threshold);
        let orientation = Orientation::uniform(request.direction);

        let entry_points: Vec<EntryPoint> = (1..=request.max_vectors)
            .into_par_iter()
            .map(|vectors| EntryPoint {
                vectors,
                direction: request.direction,
                body: planner.plan_site(NetworkKind::Sort, vectors, orientation),
            })
            .collect();

        let mut frontier: BTreeSet<Specialization> = entry_points
            .iter()
            .flat_map(|entry| entry.body.direct_calls())
            .collect();
        let mut specializations = BTreeMap::new();

        // Expand level by level until no new call targets appear
        while !frontier.is_empty() {
            let expanded: Vec<(Specialization, SortPlan)> = frontier
                .par_iter()
                .map(|&spec| (spec, planner.expand(spec)))
                .collect();

            let mut next = BTreeSet::new();
            for (spec, plan) in expanded {
                debug!(element = %request.element_type, specialization = %spec, "planned specialization");
                next.extend(
                    plan.direct_calls()
                        .into_iter()
                        .filter(|callee| !specializations.contains_key(callee) && *callee != spec),
                );
                specializations.insert(spec, plan);
            }
            next.retain(|spec| !specializations.contains_key(spec));
            frontier = next;
        }

        Self {
            request: *request,
            mask_table: MaskTable::for_lanes(request.lanes),
            entry_points,
            specializations,
        }
    }

    /// Entry point for `vectors` registers
    pub fn entry_point(&self, vectors: usize) -> Option<&EntryPoint> {
        vectors
            .checked_sub(1)
            .and_then(|index| self.entry_points.get(index))
    }

    pub fn specialization(&self, spec: &Specialization) -> Option<&SortPlan> {
        self.specializations.get(spec)
    }
}
