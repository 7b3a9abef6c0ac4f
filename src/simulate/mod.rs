//! Interpreters that execute plans on plain memory
//!
//! Emitted kernels are never compiled by this crate. Running the plans they
//! are rendered from is how sort correctness and pack round trips are checked.

pub mod pack;
pub mod sort;

pub use pack::{pack_batch, unpack_batch};
pub use sort::{run_stage, simulate_sort, Register, RegisterFile, SortSimulator};
