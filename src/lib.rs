//! # simdgen: SIMD kernel synthesis
//!
//! simdgen writes the Rust source of two families of AVX2 kernels:
//!
//! - **Bitonic sorting networks** that sort up to `lanes * max_vectors`
//!   elements entirely in registers, specialized per element type, vector
//!   count and direction, with a masked final vector.
//! - **Bit-packing codecs** that pack batches of 32 registers of `u32` lanes
//!   at any bit width from 0 to 32, with an optional delta or
//!   frame-of-reference transform.
//!
//! ## Components
//!
//! 1. **Planning**: [`network`] and [`packing`] turn parameters into plain
//!    plan trees and step lists. Planning is pure and checks its own
//!    invariants.
//!
//! 2. **Simulation**: [`simulate`] executes plans lane by lane, which is how
//!    sort correctness and pack round trips are verified without compiling
//!    the generated text.
//!
//! 3. **Emission**: [`emit`] renders plans into source text and writes all
//!    artifacts atomically.
//!
//! ## Usage
//!
//! ```
//! use simdgen::{Direction, ElementType, GenerationRequest, SortKernelSet, SortSimulator};
//!
//! let request = GenerationRequest::new(ElementType::I32, 32, 4, 4, Direction::Ascending)?;
//! let kernels = SortKernelSet::plan(&request);
//!
//! let mut data = [9, -2, 7, 3, 0, 11, -5, 4, 8, 1];
//! SortSimulator::new(&kernels).sort(&mut data, 10)?;
//! assert_eq!(data, [-5, -2, 0, 1, 3, 4, 7, 8, 9, 11]);
//! # Ok::<(), simdgen::GenError>(())
//! ```
//!
//! Writing the artifacts for a configuration:
//!
//! ```no_run
//! use simdgen::{generate, GeneratorConfig, KernelFamily};
//!
//! let report = generate(GeneratorConfig::default(), KernelFamily::All)?;
//! println!("wrote {} files", report.written.len());
//! # Ok::<(), simdgen::GenError>(())
//! ```

pub mod config;
pub mod element;
pub mod emit;
pub mod error;
pub mod network;
pub mod packing;
pub mod simulate;
pub mod test_tiers;

// Re-export primary components
pub use config::{GeneratorConfig, PackingConfig, SystemParameters};
pub use element::{ElementType, Lane, Lanes};
pub use emit::{Artifact, ArtifactKey, EmissionDriver, GenerationReport, KernelFamily};
pub use error::{GenError, Result};
pub use network::{
    Direction, GenerationRequest, MaskTable, NetworkKind, Orientation, PlanStats,
    SortKernelSet, SortNetworkPlanner, SortPlan, Specialization,
};
pub use packing::{BitPackPlanner, PackDirection, PackPlan, PackStep, StepGenerator, Transform};
pub use simulate::{pack_batch, unpack_batch, SortSimulator};

/// Validates `config`, then plans, renders and writes `family`.
///
/// This is the main entry point for the library.
pub fn generate(config: GeneratorConfig, family: KernelFamily) -> Result<GenerationReport> {
    EmissionDriver::new(config)?.generate(family)
}

/// Version information for the simdgen library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
