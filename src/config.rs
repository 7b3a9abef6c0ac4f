//! Configuration and system parameters for kernel generation

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::element::ElementType;
use crate::error::{GenError, Result};
use crate::network::{Direction, GenerationRequest};
use crate::packing::DEFAULT_BATCH_LENGTH;

/// Register width of the emitted AVX2 kernels
pub const AVX2_VECTOR_WIDTH_BYTES: usize = 32;

/// System parameters for generation runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemParameters {
    /// Number of threads to plan and render with
    #[serde(default = "default_threads")]
    pub n_threads: usize,
}

impl Default for SystemParameters {
    fn default() -> Self {
        Self {
            n_threads: default_threads(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackingConfig {
    /// Values per packed batch
    #[serde(default = "default_batch_length")]
    pub batch_length: usize,
}

impl Default for PackingConfig {
    fn default() -> Self {
        Self {
            batch_length: default_batch_length(),
        }
    }
}

/// Configuration for one generation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    #[serde(default = "default_element_types")]
    pub supported_element_types: Vec<ElementType>,

    #[serde(default = "default_vector_width")]
    pub vector_width_bytes: usize,

    /// Largest number of registers one bitonic kernel sorts
    #[serde(default = "default_max_vectors")]
    pub max_bitonic_sort_vectors: usize,

    /// Networks at least this wide are emitted as named functions
    #[serde(default = "default_unroll_threshold")]
    pub unroll_threshold: usize,

    #[serde(default = "default_direction")]
    pub direction: Direction,

    /// Directory (and Rust module) name the artifacts are written under
    #[serde(default = "default_namespace")]
    pub output_namespace: String,

    #[serde(default = "default_output_directory")]
    pub output_directory: PathBuf,

    #[serde(default)]
    pub packing: PackingConfig,

    #[serde(default)]
    pub system_params: SystemParameters,
}

// Default value functions
fn default_threads() -> usize {
    num_cpus::get()
}

fn default_batch_length() -> usize {
    DEFAULT_BATCH_LENGTH
}

fn default_element_types() -> Vec<ElementType> {
    ElementType::ALL.to_vec()
}

fn default_vector_width() -> usize {
    AVX2_VECTOR_WIDTH_BYTES
}

fn default_max_vectors() -> usize {
    16
}

fn default_unroll_threshold() -> usize {
    4
}

fn default_direction() -> Direction {
    Direction::Ascending
}

fn default_namespace() -> String {
    "vxsort".to_string()
}

fn default_output_directory() -> PathBuf {
    PathBuf::from("generated")
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            supported_element_types: default_element_types(),
            vector_width_bytes: default_vector_width(),
            max_bitonic_sort_vectors: default_max_vectors(),
            unroll_threshold: default_unroll_threshold(),
            direction: default_direction(),
            output_namespace: default_namespace(),
            output_directory: default_output_directory(),
            packing: PackingConfig::default(),
            system_params: SystemParameters::default(),
        }
    }
}

impl GeneratorConfig {
    /// Load a TOML configuration file; missing keys take their defaults
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Check every parameter before any planning starts
    pub fn validate(&self) -> Result<()> {
        if self.supported_element_types.is_empty() {
            return Err(GenError::Config(
                "supported_element_types must name at least one type".to_string(),
            ));
        }
        let unique: BTreeSet<_> = self.supported_element_types.iter().collect();
        if unique.len() != self.supported_element_types.len() {
            return Err(GenError::Config(format!(
                "supported_element_types lists a type twice: {:?}",
                self.supported_element_types
            )));
        }

        if self.vector_width_bytes != AVX2_VECTOR_WIDTH_BYTES {
            return Err(GenError::Config(format!(
                "vector_width_bytes = {}: kernels can only be emitted for {}-byte registers",
                self.vector_width_bytes, AVX2_VECTOR_WIDTH_BYTES
            )));
        }
        for &element in &self.supported_element_types {
            element.lanes(self.vector_width_bytes)?;
        }

        if self.max_bitonic_sort_vectors == 0 {
            return Err(GenError::InvalidVectorCount(self.max_bitonic_sort_vectors));
        }
        if self.unroll_threshold == 0 {
            return Err(GenError::Config("unroll_threshold must be at least 1".to_string()));
        }

        if !is_identifier(&self.output_namespace) {
            return Err(GenError::Config(format!(
                "output_namespace `{}` is not a valid module name",
                self.output_namespace
            )));
        }

        if self.packing.batch_length == 0 {
            return Err(GenError::Config(
                "packing.batch_length must be at least 1".to_string(),
            ));
        }
        if self.system_params.n_threads == 0 {
            return Err(GenError::Config(
                "system_params.n_threads must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// The sorting request for one element type
    pub fn sort_request(&self, element_type: ElementType) -> Result<GenerationRequest> {
        GenerationRequest::new(
            element_type,
            self.vector_width_bytes,
            self.max_bitonic_sort_vectors,
            self.unroll_threshold,
            self.direction,
        )
    }

    /// Root directory of this run's artifacts
    pub fn artifact_root(&self) -> PathBuf {
        self.output_directory.join(&self.output_namespace)
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = GeneratorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_bitonic_sort_vectors, 16);
        assert_eq!(config.packing.batch_length, 32);
        assert!(config.system_params.n_threads >= 1);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = GeneratorConfig::from_toml(
            r#"
            supported_element_types = ["i32", "f64"]
            unroll_threshold = 8
            direction = "descending"

            [packing]
            batch_length = 16
            "#,
        )
        .unwrap();
        assert_eq!(
            config.supported_element_types,
            vec![ElementType::I32, ElementType::F64]
        );
        assert_eq!(config.unroll_threshold, 8);
        assert_eq!(config.direction, Direction::Descending);
        assert_eq!(config.packing.batch_length, 16);
        assert_eq!(config.output_namespace, "vxsort");
    }

    #[test]
    fn test_rejects_bad_parameters() {
        let mut config = GeneratorConfig::default();
        config.max_bitonic_sort_vectors = 0;
        assert!(matches!(config.validate(), Err(GenError::InvalidVectorCount(0))));

        let mut config = GeneratorConfig::default();
        config.vector_width_bytes = 64;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("vector_width_bytes = 64"));

        let mut config = GeneratorConfig::default();
        config.output_namespace = "9lives".to_string();
        assert!(matches!(config.validate(), Err(GenError::Config(_))));

        let mut config = GeneratorConfig::default();
        config.supported_element_types = vec![ElementType::U32, ElementType::U32];
        assert!(matches!(config.validate(), Err(GenError::Config(_))));
    }

    #[test]
    fn test_unknown_element_type_fails_to_parse() {
        let result = GeneratorConfig::from_toml(r#"supported_element_types = ["i16"]"#);
        assert!(matches!(result, Err(GenError::ConfigParse(_))));
    }
}
