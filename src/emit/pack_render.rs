//! Rendering of pack plans into the `simd_packing.rs` artifact

use crate::emit::code::CodeWriter;
use crate::emit::sort_render::BANNER;
use crate::packing::{PackDirection, PackPlan, Transform};

const TARGET_FEATURE: &str = "#[target_feature(enable = \"avx2\")]";

/// Name of the generated transform type
pub fn transform_type(transform: Transform) -> &'static str {
    match transform {
        Transform::Identity => "NoTransform",
        Transform::Delta => "DeltaTransform",
        Transform::FrameOfReference => "FrameOfReferenceTransform",
    }
}

/// Renders every width's pack and unpack kernel into one module.
///
/// `plans` holds `(pack, unpack)` for each width, in width order.
pub fn render_packing(batch_length: usize, plans: &[(PackPlan, PackPlan)]) -> String {
    let mut code = CodeWriter::new();
    code.line(BANNER);
    code.line(format!(
        "//! Lane-parallel bit packing of {}-register batches of `u32` lanes.",
        batch_length
    ));
    code.blank();
    code.line(
        "#![allow(clippy::all, unused_unsafe, unused_variables, unused_mut, unused_assignments)]",
    );
    code.blank();
    code.line("use core::arch::x86_64::*;");
    code.blank();
    code.line(format!("pub const BATCH_LENGTH: usize = {};", batch_length));

    code.blank();
    render_transforms(&mut code);

    for (pack, unpack) in plans {
        code.blank();
        render_pack(&mut code, pack);
        code.blank();
        render_unpack(&mut code, unpack);
    }

    code.blank();
    render_width_dispatch(&mut code, plans, PackDirection::Pack);
    code.blank();
    render_width_dispatch(&mut code, plans, PackDirection::Unpack);
    code.finish()
}

fn render_transforms(code: &mut CodeWriter) {
    code.line("/// Lane-wise value transform applied before packing and after unpacking");
    code.open("pub trait SimdTransform");
    code.line("/// # Safety");
    code.line("///");
    code.line("/// The CPU must support AVX2.");
    code.line("unsafe fn encode(value: __m256i, reference: &mut __m256i) -> __m256i;");
    code.blank();
    code.line("/// # Safety");
    code.line("///");
    code.line("/// The CPU must support AVX2.");
    code.line("unsafe fn decode(value: __m256i, reference: &mut __m256i) -> __m256i;");
    code.close();

    for transform in Transform::ALL {
        code.blank();
        code.line(format!("pub struct {};", transform_type(transform)));
        code.blank();
        code.open(format!("impl SimdTransform for {}", transform_type(transform)));
        let (encode, decode) = transform_bodies(transform);
        for (name, body) in [("encode", encode), ("decode", decode)] {
            code.line("#[inline(always)]");
            code.open(format!(
                "unsafe fn {}(value: __m256i, reference: &mut __m256i) -> __m256i",
                name
            ));
            for line in body {
                code.line(line);
            }
            code.close();
        }
        code.close();
    }
}

fn transform_bodies(transform: Transform) -> (Vec<&'static str>, Vec<&'static str>) {
    match transform {
        Transform::Identity => (vec!["value"], vec!["value"]),
        Transform::Delta => (
            vec![
                "let delta = _mm256_sub_epi32(value, *reference);",
                "*reference = value;",
                "delta",
            ],
            vec![
                "let restored = _mm256_add_epi32(value, *reference);",
                "*reference = restored;",
                "restored",
            ],
        ),
        Transform::FrameOfReference => (
            vec!["_mm256_sub_epi32(value, *reference)"],
            vec!["_mm256_add_epi32(value, *reference)"],
        ),
    }
}

fn signature(code: &mut CodeWriter, name: &str, bit_width: u32) {
    code.line(TARGET_FEATURE);
    code.open(format!(
        "pub unsafe fn {}{}<T: SimdTransform>(mut reference: __m256i, input: *const __m256i, output: *mut __m256i) -> __m256i",
        name, bit_width
    ));
}

fn render_copy(code: &mut CodeWriter) {
    code.open("for i in 0..BATCH_LENGTH");
    code.line("_mm256_storeu_si256(output.add(i), _mm256_loadu_si256(input.add(i)));");
    code.close();
}

fn render_pack(code: &mut CodeWriter, plan: &PackPlan) {
    let bit_width = plan.bit_width();
    code.line(format!(
        "/// Packs {} values into {} words of {}-bit fields",
        plan.batch_length(),
        plan.words(),
        bit_width
    ));
    signature(code, "pack_for", bit_width);

    if plan.is_verbatim() {
        render_copy(code);
    } else if plan.is_transform_only() {
        for step in plan.steps() {
            code.line(format!(
                "T::encode(_mm256_loadu_si256(input.add({})), &mut reference);",
                step.input_index
            ));
        }
    } else {
        code.line("let mut acc = _mm256_setzero_si256();");
        for step in plan.steps() {
            code.line(format!(
                "let value = T::encode(_mm256_loadu_si256(input.add({})), &mut reference);",
                step.input_index
            ));
            if step.shift_amount == 0 {
                code.line("acc = value;");
            } else {
                code.line(format!(
                    "acc = _mm256_or_si256(acc, _mm256_slli_epi32::<{}>(value));",
                    step.shift_amount
                ));
            }
            if step.flushes_word {
                code.line(format!(
                    "_mm256_storeu_si256(output.add({}), acc);",
                    step.output_index
                ));
                if step.carry_bits > 0 {
                    code.line(format!(
                        "acc = _mm256_srli_epi32::<{}>(value);",
                        bit_width - step.carry_bits
                    ));
                }
                if step.flushes_carry {
                    code.line(format!(
                        "_mm256_storeu_si256(output.add({}), acc);",
                        step.output_index + 1
                    ));
                }
            }
        }
    }
    code.line("reference");
    code.close();
}

fn render_unpack(code: &mut CodeWriter, plan: &PackPlan) {
    let bit_width = plan.bit_width();
    code.line(format!(
        "/// Unpacks {} values from {} words of {}-bit fields",
        plan.batch_length(),
        plan.words(),
        bit_width
    ));
    signature(code, "unpack_for", bit_width);

    if plan.is_verbatim() {
        render_copy(code);
    } else if plan.is_transform_only() {
        for step in plan.steps() {
            code.line(format!(
                "_mm256_storeu_si256(output.add({}), reference);",
                step.output_index
            ));
        }
    } else {
        code.line(format!(
            "let mask = _mm256_set1_epi32(0x{:X}u32 as i32);",
            plan.field_mask()
        ));
        code.line("let mut word = _mm256_loadu_si256(input);");
        let last = plan.steps().len().saturating_sub(1);
        for (index, step) in plan.steps().iter().enumerate() {
            let shifted = if step.shift_amount == 0 {
                "word".to_string()
            } else {
                format!("_mm256_srli_epi32::<{}>(word)", step.shift_amount)
            };
            if step.shift_amount + bit_width < 32 {
                code.line(format!("let mut field = _mm256_and_si256({}, mask);", shifted));
            } else {
                code.line(format!("let mut field = {};", shifted));
            }

            let advances = step.carry_bits > 0 || (step.flushes_word && index < last);
            if advances {
                code.line(format!(
                    "word = _mm256_loadu_si256(input.add({}));",
                    step.input_index + 1
                ));
            }
            if step.carry_bits > 0 {
                code.line(format!(
                    "field = _mm256_or_si256(field, _mm256_and_si256(_mm256_slli_epi32::<{}>(word), mask));",
                    bit_width - step.carry_bits
                ));
            }
            code.line(format!(
                "_mm256_storeu_si256(output.add({}), T::decode(field, &mut reference));",
                step.output_index
            ));
        }
    }
    code.line("reference");
    code.close();
}

fn render_width_dispatch(code: &mut CodeWriter, plans: &[(PackPlan, PackPlan)], direction: PackDirection) {
    let name = match direction {
        PackDirection::Pack => "pack",
        PackDirection::Unpack => "unpack",
    };
    code.line(format!(
        "/// {} one batch at `bit_width` bits per value; returns the updated reference.",
        match direction {
            PackDirection::Pack => "Packs",
            PackDirection::Unpack => "Unpacks",
        }
    ));
    code.line("///");
    code.line("/// # Safety");
    code.line("///");
    code.line("/// `input` and `output` must be valid for the batch and its packed words,");
    code.line("/// and the CPU must support AVX2.");
    code.line(TARGET_FEATURE);
    code.open(format!(
        "pub unsafe fn {}<T: SimdTransform>(bit_width: u32, reference: __m256i, input: *const __m256i, output: *mut __m256i) -> __m256i",
        name
    ));
    code.open("match bit_width");
    for (pack, _) in plans {
        code.line(format!(
            "{b} => {name}_for{b}::<T>(reference, input, output),",
            b = pack.bit_width(),
            name = name
        ));
    }
    code.line("_ => panic!(\"bit width {} is outside [0, 32]\", bit_width),");
    code.close();
    code.close();
}
