//! Bitonic sorting networks over SIMD registers
//!
//! Leaf first: [`mask`] and [`primitives`] describe what one register can do,
//! [`planner`] builds multi-register networks out of them and [`entry`] wraps
//! the networks into length-dispatched kernels.

pub mod entry;
pub mod mask;
pub mod planner;
pub mod primitives;
pub mod widths;

pub use entry::{
    dispatch_vectors, max_bitonic_length, split_length, vector_count_for, EntryPoint,
    GenerationRequest, SortKernelSet,
};
pub use mask::MaskTable;
pub use planner::{
    BaseCaseStage, CrossExchange, ExchangePair, NetworkKind, PlanStats, SortNetworkPlanner,
    SortPlan, Specialization, SplitNode,
};
pub use primitives::{
    BlendMask, Direction, NetworkPrimitives, NetworkStage, Orientation, Permutation, StageKind,
    StageOp,
};
pub use widths::{split_widths, PowerOfTwo, SplitWidths};
