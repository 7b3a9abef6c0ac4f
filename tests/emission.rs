//! Full generation runs into temporary directories

use std::fs;
use std::path::Path;

use simdgen::{generate, ElementType, EmissionDriver, GenError, GeneratorConfig, KernelFamily, SystemParameters};

fn config_in(dir: &Path) -> GeneratorConfig {
    GeneratorConfig {
        supported_element_types: vec![ElementType::I32, ElementType::U64, ElementType::F32],
        max_bitonic_sort_vectors: 6,
        output_directory: dir.to_path_buf(),
        output_namespace: "kernels".to_string(),
        system_params: SystemParameters { n_threads: 2 },
        ..GeneratorConfig::default()
    }
}

/// Body of the generated function `name`, without its signature
fn function_body<'a>(text: &'a str, name: &str) -> &'a str {
    let start = text
        .find(&format!("fn {}<", name))
        .unwrap_or_else(|| panic!("{} not generated", name));
    let rest = &text[start..];
    let end = rest.find("\n}\n").expect("function is closed");
    let body_start = rest.find('\n').unwrap_or(end).min(end);
    &rest[body_start..end]
}

#[test]
fn test_generate_all_writes_every_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let report = generate(config_in(dir.path()), KernelFamily::All).unwrap();

    let root = dir.path().join("kernels");
    for file in [
        "bitonic_sort.rs",
        "bitonic_sort/sort_i32.rs",
        "bitonic_sort/sort_u64.rs",
        "bitonic_sort/sort_f32.rs",
        "simd_packing.rs",
    ] {
        assert!(root.join(file).is_file(), "{} missing", file);
    }
    assert_eq!(report.written.len(), 5);
    assert_eq!(report.sort_entry_points, 18);
    assert_eq!(report.pack_widths, 33);

    let i32_kernels = fs::read_to_string(root.join("bitonic_sort/sort_i32.rs")).unwrap();
    assert!(i32_kernels.starts_with("// Generated by simdgen. Do not edit."));
    assert!(i32_kernels.contains("unsafe fn sort_06v_alt(ptr: *mut i32, remainder: usize)"));
    assert!(i32_kernels.contains("pub const MAX_BITONIC_LENGTH: usize = 48;"));
    assert!(!i32_kernels.contains("sort_07v_alt"));

    let dispatcher = fs::read_to_string(root.join("bitonic_sort.rs")).unwrap();
    assert!(dispatcher.contains("pub mod sort_u64;"));
    assert!(!dispatcher.contains("pub mod sort_f64;"));
}

#[test]
fn test_single_family_runs() {
    let dir = tempfile::tempdir().unwrap();
    let report = generate(config_in(dir.path()), KernelFamily::Pack).unwrap();
    assert_eq!(report.written.len(), 1);
    assert_eq!(report.sort_entry_points, 0);
    assert!(!dir.path().join("kernels/bitonic_sort.rs").exists());

    let text = fs::read_to_string(dir.path().join("kernels/simd_packing.rs")).unwrap();
    for name in ["pack_for32", "unpack_for32"] {
        let body = function_body(&text, name);
        assert!(!body.contains("slli") && !body.contains("srli"), "{}", body);
        assert!(!body.contains("and_si256"), "{}", body);
    }
    assert!(function_body(&text, "pack_for0").contains("T::encode"));
}

#[test]
fn test_invalid_config_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(dir.path());
    config.packing.batch_length = 0;

    let result = generate(config, KernelFamily::All);
    assert!(matches!(result, Err(GenError::Config(_))));
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);

    let mut config = config_in(dir.path());
    config.vector_width_bytes = 16;
    assert!(EmissionDriver::new(config).is_err());
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_output_is_deterministic() {
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    generate(config_in(first.path()), KernelFamily::All).unwrap();

    let mut single_threaded = config_in(second.path());
    single_threaded.system_params.n_threads = 1;
    generate(single_threaded, KernelFamily::All).unwrap();

    for file in ["bitonic_sort.rs", "bitonic_sort/sort_u64.rs", "simd_packing.rs"] {
        let a = fs::read(first.path().join("kernels").join(file)).unwrap();
        let b = fs::read(second.path().join("kernels").join(file)).unwrap();
        assert_eq!(a, b, "{} differs between runs", file);
    }
}

#[test]
fn test_regeneration_overwrites_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let driver = EmissionDriver::new(config_in(dir.path())).unwrap();
    let first = driver.generate(KernelFamily::Sort).unwrap();
    let second = driver.generate(KernelFamily::Sort).unwrap();
    assert_eq!(first.written, second.written);

    let leftovers = fs::read_dir(dir.path().join("kernels/bitonic_sort"))
        .unwrap()
        .count();
    assert_eq!(leftovers, 3);
}

#[test]
fn test_descending_kernels_pad_with_minimum() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(dir.path());
    config.direction = simdgen::Direction::Descending;
    config.supported_element_types = vec![ElementType::F32];
    generate(config, KernelFamily::Sort).unwrap();

    let text = fs::read_to_string(dir.path().join("kernels/bitonic_sort/sort_f32.rs")).unwrap();
    assert!(text.contains("f32::NEG_INFINITY"));
    assert!(text.contains("_descending"));
}
