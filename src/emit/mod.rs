//! Emission driver: plan, render and write kernel artifacts
//!
//! A run renders every artifact in memory first. Nothing touches the file
//! system until every plan has passed its checks, and the write itself is
//! all-or-nothing (see [`writer`]).

pub mod code;
pub mod intrinsics;
pub mod pack_render;
pub mod sort_render;
pub mod writer;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use rayon::prelude::*;
use tracing::info;

use crate::config::GeneratorConfig;
use crate::element::{ElementType, Lanes};
use crate::error::{GenError, Result};
use crate::network::SortKernelSet;
use crate::packing::BitPackPlanner;

pub use pack_render::render_packing;
pub use sort_render::{render_dispatcher, SortRenderer};
pub use writer::write_artifacts;

/// Which kernels a run generates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelFamily {
    Sort,
    Pack,
    All,
}

impl KernelFamily {
    pub fn includes_sort(self) -> bool {
        matches!(self, KernelFamily::Sort | KernelFamily::All)
    }

    pub fn includes_pack(self) -> bool {
        matches!(self, KernelFamily::Pack | KernelFamily::All)
    }
}

impl FromStr for KernelFamily {
    type Err = GenError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "sort" => Ok(KernelFamily::Sort),
            "pack" => Ok(KernelFamily::Pack),
            "all" => Ok(KernelFamily::All),
            other => Err(GenError::Config(format!("unknown kernel family `{}`", other))),
        }
    }
}

/// Identity of one emitted file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArtifactKey {
    SortDispatcher,
    Sort { element_type: ElementType, lanes: Lanes },
    Packing,
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKey::SortDispatcher => f.write_str("sort dispatcher"),
            ArtifactKey::Sort {
                element_type,
                lanes,
            } => write!(f, "sort {} x{}", element_type, lanes),
            ArtifactKey::Packing => f.write_str("packing"),
        }
    }
}

/// Rendered source text and where it goes, relative to the namespace directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub key: ArtifactKey,
    pub relative_path: PathBuf,
    pub contents: String,
}

/// Summary of a completed run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationReport {
    pub written: Vec<PathBuf>,
    pub sort_entry_points: usize,
    pub sort_specializations: usize,
    pub pack_widths: usize,
}

/// Plans, renders and writes artifacts for one configuration
pub struct EmissionDriver {
    config: GeneratorConfig,
    pool: rayon::ThreadPool,
}

impl EmissionDriver {
    /// Validates `config` before anything is planned
    pub fn new(config: GeneratorConfig) -> Result<Self> {
        config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.system_params.n_threads)
            .build()?;
        Ok(Self { config, pool })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Plan every requested element type
    pub fn plan_sort(&self) -> Result<Vec<SortKernelSet>> {
        let requests = self
            .config
            .supported_element_types
            .iter()
            .map(|&element| self.config.sort_request(element))
            .collect::<Result<Vec<_>>>()?;
        Ok(self.pool.install(|| {
            requests
                .par_iter()
                .map(SortKernelSet::plan)
                .collect()
        }))
    }

    fn render_sort(&self, report: &mut GenerationReport) -> Result<Vec<Artifact>> {
        let kernel_sets = self.plan_sort()?;
        report.sort_entry_points = kernel_sets.iter().map(|set| set.entry_points.len()).sum();
        report.sort_specializations = kernel_sets.iter().map(|set| set.specializations.len()).sum();

        let mut artifacts = vec![Artifact {
            key: ArtifactKey::SortDispatcher,
            relative_path: PathBuf::from("bitonic_sort.rs"),
            contents: render_dispatcher(&self.config.supported_element_types, self.config.direction),
        }];
        let rendered: Vec<Artifact> = self.pool.install(|| {
            kernel_sets
                .par_iter()
                .map(|set| Artifact {
                    key: ArtifactKey::Sort {
                        element_type: set.request.element_type,
                        lanes: set.request.lanes,
                    },
                    relative_path: PathBuf::from("bitonic_sort")
                        .join(format!("sort_{}.rs", set.request.element_type)),
                    contents: SortRenderer::new(set).render(),
                })
                .collect()
        });
        artifacts.extend(rendered);
        Ok(artifacts)
    }

    fn render_pack(&self, report: &mut GenerationReport) -> Result<Artifact> {
        let batch_length = self.config.packing.batch_length;
        let planner = BitPackPlanner::new(batch_length);
        let plans = self.pool.install(|| planner.plan_all())?;
        report.pack_widths = plans.len();
        Ok(Artifact {
            key: ArtifactKey::Packing,
            relative_path: PathBuf::from("simd_packing.rs"),
            contents: render_packing(batch_length, &plans),
        })
    }

    /// Render every artifact of `family` in memory
    pub fn render(&self, family: KernelFamily) -> Result<(Vec<Artifact>, GenerationReport)> {
        let mut report = GenerationReport::default();
        let mut artifacts = Vec::new();
        if family.includes_sort() {
            artifacts.extend(self.render_sort(&mut report)?);
        }
        if family.includes_pack() {
            artifacts.push(self.render_pack(&mut report)?);
        }
        artifacts.sort_by(|a, b| a.key.cmp(&b.key));
        Ok((artifacts, report))
    }

    /// Render and write; nothing is written unless every artifact rendered
    pub fn generate(&self, family: KernelFamily) -> Result<GenerationReport> {
        let (artifacts, mut report) = self.render(family)?;
        let root = self.config.artifact_root();
        info!(
            root = %root.display(),
            artifacts = artifacts.len(),
            specializations = report.sort_specializations,
            pack_widths = report.pack_widths,
            "writing artifacts"
        );
        report.written = write_artifacts(&root, &artifacts)?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> GeneratorConfig {
        GeneratorConfig {
            supported_element_types: vec![ElementType::I32, ElementType::U64],
            max_bitonic_sort_vectors: 4,
            system_params: crate::config::SystemParameters { n_threads: 2 },
            ..GeneratorConfig::default()
        }
    }

    #[test]
    fn test_render_all_paths() {
        let driver = EmissionDriver::new(small_config()).unwrap();
        let (artifacts, report) = driver.render(KernelFamily::All).unwrap();
        let paths: Vec<_> = artifacts
            .iter()
            .map(|a| a.relative_path.to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(
            paths,
            vec![
                "bitonic_sort.rs",
                "bitonic_sort/sort_i32.rs",
                "bitonic_sort/sort_u64.rs",
                "simd_packing.rs"
            ]
        );
        assert_eq!(report.sort_entry_points, 8);
        assert_eq!(report.pack_widths, 33);
    }

    #[test]
    fn test_invalid_config_rejected_up_front() {
        let mut config = small_config();
        config.unroll_threshold = 0;
        assert!(matches!(EmissionDriver::new(config), Err(GenError::Config(_))));
    }

    #[test]
    fn test_family_parsing() {
        assert_eq!("pack".parse::<KernelFamily>().unwrap(), KernelFamily::Pack);
        assert!("fft".parse::<KernelFamily>().is_err());
        assert!(KernelFamily::All.includes_sort() && KernelFamily::All.includes_pack());
    }
}
