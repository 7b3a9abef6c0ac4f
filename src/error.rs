//! Error types for the kernel generator.

use std::path::PathBuf;

use thiserror::Error;

use crate::element::ElementType;

/// Main error type for planning and emission
#[derive(Error, Debug)]
pub enum GenError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error(
        "Unsupported lane count for {element}: {vector_width_bytes}-byte vectors give {lanes} lanes (expected 4 or 8)"
    )]
    UnsupportedLaneCount {
        element: ElementType,
        vector_width_bytes: usize,
        lanes: usize,
    },

    #[error("Vector count must be positive, got {0}")]
    InvalidVectorCount(usize),

    #[error("Bit width {0} is outside [0, 32]")]
    InvalidBitWidth(u32),

    #[error("Planner invariant violated: {0}")]
    PlanInvariant(String),

    #[error("Failed to persist artifact {path}: {source}")]
    Persist {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, GenError>;

