//! Lane-level interpreter for sort plans
//!
//! Registers hold raw lane bits; every [`StageOp`] is evaluated with the same
//! semantics the emitted intrinsics have, including the sign-flipped compare
//! used for 64-bit integer lanes.

use crate::element::{ElementType, Lane, Lanes};
use crate::error::{GenError, Result};
use crate::network::{
    dispatch_vectors, split_length, BaseCaseStage, CrossExchange, Direction, EntryPoint, MaskTable,
    NetworkStage, SortKernelSet, SortPlan, StageOp,
};

/// One register of raw lane bits
pub type Register = Vec<u64>;

/// The registers of one entry point, loaded from and stored to memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterFile {
    lanes: Lanes,
    registers: Vec<Register>,
}

impl RegisterFile {
    /// Load `length` elements; lanes past the end are padded with `fill`.
    ///
    /// Only the first `length` elements of `data` are read.
    pub fn load<T: Lane>(data: &[T], length: usize, table: &MaskTable, fill: u64) -> Self {
        let lanes = table.lanes();
        let n = lanes.count();
        let (full, remainder) = split_length(length, lanes);
        let vectors = full + usize::from(remainder > 0);

        let registers = (0..vectors)
            .map(|r| {
                let is_last = r + 1 == vectors;
                (0..n)
                    .map(|lane| {
                        let valid = !is_last || table.is_valid(remainder, lane);
                        if valid {
                            data[r * n + lane].to_lane_bits()
                        } else {
                            fill
                        }
                    })
                    .collect()
            })
            .collect();

        Self { lanes, registers }
    }

    /// Store back through the remainder mask; nothing past `length` is written
    pub fn store<T: Lane>(&self, data: &mut [T], length: usize, table: &MaskTable) {
        let n = self.lanes.count();
        let (_, remainder) = split_length(length, self.lanes);
        let vectors = self.registers.len();

        for (r, register) in self.registers.iter().enumerate() {
            let is_last = r + 1 == vectors;
            for (lane, &bits) in register.iter().enumerate() {
                if !is_last || table.is_valid(remainder, lane) {
                    data[r * n + lane] = T::from_lane_bits(bits);
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.registers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }

    pub fn registers(&self) -> &[Register] {
        &self.registers
    }

    pub fn registers_mut(&mut self) -> &mut [Register] {
        &mut self.registers
    }
}

/// Executes the plans of one [`SortKernelSet`]
pub struct SortSimulator<'a> {
    kernels: &'a SortKernelSet,
}

impl<'a> SortSimulator<'a> {
    pub fn new(kernels: &'a SortKernelSet) -> Self {
        Self { kernels }
    }

    fn element(&self) -> ElementType {
        self.kernels.request.element_type
    }

    fn lanes(&self) -> Lanes {
        self.kernels.request.lanes
    }

    /// Sort `data[..length]` the way the runtime dispatcher does.
    ///
    /// Panics if `T` is not the kernel set's element type, if `length`
    /// exceeds `data`, or if `length` needs more registers than the kernels
    /// support.
    pub fn sort<T: Lane>(&self, data: &mut [T], length: usize) -> Result<()> {
        assert_eq!(
            T::ELEMENT,
            self.element(),
            "kernels were planned for {}",
            self.element()
        );
        assert!(length <= data.len(), "length {} exceeds buffer of {}", length, data.len());

        match dispatch_vectors(length, self.lanes(), self.kernels.request.max_vectors) {
            None => Ok(()),
            Some(vectors) => {
                let entry = self.kernels.entry_point(vectors).ok_or_else(|| {
                    GenError::PlanInvariant(format!("no entry point for {} vectors", vectors))
                })?;
                self.run_entry(entry, data, length)
            }
        }
    }

    /// Load, run and store one entry point
    pub fn run_entry<T: Lane>(&self, entry: &EntryPoint, data: &mut [T], length: usize) -> Result<()> {
        let table = &self.kernels.mask_table;
        let fill = self.element().fill_bits(entry.direction);
        let mut file = RegisterFile::load(data, length, table, fill);
        if file.len() != entry.vectors {
            return Err(GenError::PlanInvariant(format!(
                "{} elements loaded into {} registers, entry point expects {}",
                length,
                file.len(),
                entry.vectors
            )));
        }
        self.execute(&entry.body, file.registers_mut())?;
        file.store(data, length, table);
        Ok(())
    }

    /// Run `plan` over `registers`, following calls into the specialization table
    pub fn execute(&self, plan: &SortPlan, registers: &mut [Register]) -> Result<()> {
        if registers.len() != plan.width() {
            return Err(GenError::PlanInvariant(format!(
                "plan over {} registers run on {}",
                plan.width(),
                registers.len()
            )));
        }

        match plan {
            SortPlan::Base(base) => {
                self.run_base_case(base, &mut registers[0]);
                Ok(())
            }
            SortPlan::Call(spec) => {
                let body = self.kernels.specialization(spec).ok_or_else(|| {
                    GenError::PlanInvariant(format!("call to unplanned specialization {}", spec))
                })?;
                self.execute(body, registers)
            }
            SortPlan::Split(node) => {
                let (first, second) = registers.split_at_mut(node.first_width);
                if let Some(plan) = &node.first_plan {
                    self.execute(plan, first)?;
                }
                if let Some(plan) = &node.second_plan {
                    self.execute(plan, second)?;
                }
                self.exchange(&node.cross_exchange, registers);
                let (first, second) = registers.split_at_mut(node.first_width);
                self.execute(&node.merge_first, first)?;
                self.execute(&node.merge_second, second)
            }
        }
    }

    fn exchange(&self, exchange: &CrossExchange, registers: &mut [Register]) {
        let element = self.element();
        for pair in &exchange.pairs {
            for lane in 0..self.lanes().count() {
                let a = registers[pair.first][lane];
                let b = registers[pair.second][lane];
                let (lo, hi) = if greater(element, a, b) { (b, a) } else { (a, b) };
                let (first, second) = if exchange.min_to_first { (lo, hi) } else { (hi, lo) };
                registers[pair.first][lane] = first;
                registers[pair.second][lane] = second;
            }
        }
    }

    /// Apply every stage of a single-register network
    pub fn run_base_case(&self, base: &BaseCaseStage, register: &mut [u64]) {
        for stage in &base.stages {
            run_stage(self.element(), self.lanes(), stage, register);
        }
    }
}

/// Evaluate one stage in place
pub fn run_stage(element: ElementType, lanes: Lanes, stage: &NetworkStage, register: &mut [u64]) {
    let n = lanes.count();
    let mut permuted = register.to_vec();
    let mut cmp = vec![false; n];
    let mut lo = vec![0u64; n];
    let mut hi = vec![0u64; n];

    for op in &stage.ops {
        match *op {
            StageOp::Permute(permutation) => {
                for (lane, slot) in permuted.iter_mut().enumerate() {
                    *slot = register[permutation.source_lane(lanes, lane)];
                }
            }
            StageOp::Compare => {
                for lane in 0..n {
                    cmp[lane] = greater(element, permuted[lane], register[lane]);
                }
            }
            StageOp::Min => {
                for lane in 0..n {
                    lo[lane] = if cmp[lane] { register[lane] } else { permuted[lane] };
                }
            }
            StageOp::Max => {
                for lane in 0..n {
                    hi[lane] = if cmp[lane] { permuted[lane] } else { register[lane] };
                }
            }
            StageOp::Blend { mask, ascending } => {
                for lane in 0..n {
                    let take_hi = mask.selects(lanes, lane) == ascending;
                    register[lane] = if take_hi { hi[lane] } else { lo[lane] };
                }
            }
        }
    }
}

// 64-bit integer lanes go through the signed compare on flipped keys, the
// way the emitted kernels synthesize it.
fn greater(element: ElementType, a: u64, b: u64) -> bool {
    if element.has_native_min_max() {
        element.greater_than(a, b)
    } else {
        element.compare_key(a) > element.compare_key(b)
    }
}

/// Sort `data` with a freshly planned kernel set; convenience for callers
/// that only need the result
pub fn simulate_sort<T: Lane>(
    data: &mut [T],
    vector_width_bytes: usize,
    max_vectors: usize,
    unroll_threshold: usize,
    direction: Direction,
) -> Result<()> {
    let request = crate::network::GenerationRequest::new(
        T::ELEMENT,
        vector_width_bytes,
        max_vectors,
        unroll_threshold,
        direction,
    )?;
    let kernels = SortKernelSet::plan(&request);
    let length = data.len();
    SortSimulator::new(&kernels).sort(data, length)
}
