//! Loading generator configuration from TOML files

use std::io::Write;

use simdgen::{Direction, ElementType, GenError, GeneratorConfig};

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
supported_element_types = ["u32", "f64"]
max_bitonic_sort_vectors = 8
direction = "descending"
output_namespace = "fastsort"
output_directory = "out"

[packing]
batch_length = 64

[system_params]
n_threads = 3
"#
    )
    .unwrap();

    let config = GeneratorConfig::load_from(file.path()).unwrap();
    assert_eq!(config.supported_element_types, vec![ElementType::U32, ElementType::F64]);
    assert_eq!(config.max_bitonic_sort_vectors, 8);
    assert_eq!(config.unroll_threshold, 4);
    assert_eq!(config.direction, Direction::Descending);
    assert_eq!(config.packing.batch_length, 64);
    assert_eq!(config.system_params.n_threads, 3);
    assert_eq!(config.artifact_root(), std::path::Path::new("out").join("fastsort"));
    config.validate().unwrap();

    let request = config.sort_request(ElementType::F64).unwrap();
    assert_eq!(request.lanes.count(), 4);
    assert_eq!(request.max_bitonic_length(), 32);
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = GeneratorConfig::load_from(dir.path().join("absent.toml"));
    assert!(matches!(result, Err(GenError::Io(_))));
}

#[test]
fn test_malformed_file_is_parse_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "max_bitonic_sort_vectors = \"many\"").unwrap();
    assert!(matches!(
        GeneratorConfig::load_from(file.path()),
        Err(GenError::ConfigParse(_))
    ));
}

#[test]
fn test_toml_round_trip_of_defaults() {
    let config = GeneratorConfig::default();
    let text = toml::to_string(&config).unwrap();
    assert_eq!(GeneratorConfig::from_toml(&text).unwrap(), config);
}
