//! Fixed-width bit packing of lane-parallel `u32` batches

pub mod plan;
pub mod transform;

pub use plan::{
    BitPackPlanner, CursorStepGenerator, PackDirection, PackPlan, PackStep, StepGenerator,
    DEFAULT_BATCH_LENGTH, MAX_BIT_WIDTH, WORD_BITS,
};
pub use transform::{LaneWord, Transform, PACK_LANES};
