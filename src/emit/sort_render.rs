//! Rendering of sort kernel sets into Rust source
//!
//! Rendering walks the plan tree and never decides anything about the
//! network itself; every register index, stage and exchange comes from the
//! plan.

use crate::element::ElementType;
use crate::emit::code::CodeWriter;
use crate::emit::intrinsics::Avx2Isa;
use crate::network::{
    BaseCaseStage, CrossExchange, Direction, EntryPoint, NetworkStage, SortKernelSet, SortPlan,
    Specialization, StageOp,
};

pub const BANNER: &str = "// Generated by simdgen. Do not edit.";

const TARGET_FEATURE: &str = "#[target_feature(enable = \"avx2\")]";

/// Renders the `sort_{type}.rs` artifact of one kernel set
pub struct SortRenderer<'a> {
    kernels: &'a SortKernelSet,
    isa: Avx2Isa,
}

impl<'a> SortRenderer<'a> {
    pub fn new(kernels: &'a SortKernelSet) -> Self {
        Self {
            kernels,
            isa: Avx2Isa::new(kernels.request.element_type),
        }
    }

    pub fn render(&self) -> String {
        let mut code = CodeWriter::new();
        self.render_header(&mut code);
        self.render_mask_table(&mut code);

        for (spec, plan) in &self.kernels.specializations {
            code.blank();
            self.render_specialization(&mut code, spec, plan);
        }
        for entry in &self.kernels.entry_points {
            code.blank();
            self.render_entry(&mut code, entry);
        }
        code.blank();
        self.render_dispatch(&mut code);
        code.finish()
    }

    fn element(&self) -> ElementType {
        self.kernels.request.element_type
    }

    fn render_header(&self, code: &mut CodeWriter) {
        let request = &self.kernels.request;
        code.line(BANNER);
        code.line(format!(
            "//! Bitonic sorting kernels for `{}`: {} lanes per register, up to {} registers, {}.",
            self.element(),
            request.lanes,
            request.max_vectors,
            request.direction
        ));
        code.blank();
        code.line("#![allow(clippy::all, unused_unsafe, unused_variables, unused_mut)]");
        code.blank();
        code.line("use core::arch::x86_64::*;");
        code.blank();
        code.line(format!("pub const LANES: usize = {};", request.lanes.count()));
        code.line(format!("pub const MAX_VECTORS: usize = {};", request.max_vectors));
        code.line(format!(
            "pub const MAX_BITONIC_LENGTH: usize = {};",
            request.max_bitonic_length()
        ));
    }

    fn render_mask_table(&self, code: &mut CodeWriter) {
        let lanes = self.kernels.request.lanes.count();
        let scalar = self.isa.mask_scalar();
        code.blank();
        code.line("/// Row `r` enables the first `r` lanes; row 0 enables all of them");
        code.line(format!(
            "static MASK_TABLE: [[{}; {}]; {}] = [",
            scalar, lanes, lanes
        ));
        for row in self.kernels.mask_table.rows() {
            let cells: Vec<&str> = row.iter().map(|&valid| if valid { "-1" } else { "0" }).collect();
            code.line(format!("    [{}],", cells.join(", ")));
        }
        code.line("];");

        code.blank();
        code.line(TARGET_FEATURE);
        code.open("unsafe fn remainder_mask(remainder: usize) -> __m256i");
        code.line("_mm256_loadu_si256(MASK_TABLE[remainder].as_ptr() as *const __m256i)");
        code.close();
    }

    fn render_specialization(&self, code: &mut CodeWriter, spec: &Specialization, plan: &SortPlan) {
        code.line(format!(
            "/// {:?} network over {} registers, {} vectors / {} lanes",
            spec.kind, spec.width, spec.orientation.vectors, spec.orientation.lanes
        ));
        code.line(TARGET_FEATURE);
        code.line("#[inline(never)]");
        code.open(format!(
            "unsafe fn {}(d: &mut [{}])",
            spec.function_name(),
            self.isa.vector_type()
        ));
        code.line(format!("debug_assert_eq!(d.len(), {});", spec.width));
        if self.isa.needs_top_bit() {
            code.line(self.isa.top_bit_setup());
        }
        self.render_plan(code, plan, 0);
        code.close();
    }

    fn render_entry(&self, code: &mut CodeWriter, entry: &EntryPoint) {
        let lanes = self.kernels.request.lanes.count();
        let last = entry.vectors - 1;

        code.line(format!(
            "/// Sorts {} to {} elements; `remainder` is the element count modulo {}",
            last * lanes + 1,
            entry.vectors * lanes,
            lanes
        ));
        code.line(TARGET_FEATURE);
        code.line("#[inline(never)]");
        code.open(format!(
            "unsafe fn {}(ptr: *mut {}, remainder: usize)",
            entry.function_name(),
            self.element()
        ));
        if self.isa.needs_top_bit() {
            code.line(self.isa.top_bit_setup());
        }
        code.line("let mask = remainder_mask(remainder);");
        code.line(format!(
            "let mut d = [{}; {}];",
            self.isa.zero(),
            entry.vectors
        ));
        for r in 0..entry.unmasked_vectors() {
            code.line(format!(
                "d[{}] = {};",
                r,
                self.isa.load(&format!("ptr.add({})", r * lanes))
            ));
        }
        code.line(format!(
            "d[{}] = {};",
            last,
            self.isa
                .padded_load(&format!("ptr.add({})", last * lanes), "mask", entry.direction)
        ));

        self.render_plan(code, &entry.body, 0);

        for r in 0..entry.unmasked_vectors() {
            code.line(format!(
                "{};",
                self.isa
                    .store(&format!("ptr.add({})", r * lanes), &format!("d[{}]", r))
            ));
        }
        code.line(format!(
            "{};",
            self.isa.mask_store(
                &format!("ptr.add({})", last * lanes),
                "mask",
                &format!("d[{}]", last)
            )
        ));
        code.close();
    }

    fn render_dispatch(&self, code: &mut CodeWriter) {
        let request = &self.kernels.request;
        code.line(format!(
            "/// Sorts `length` elements at `ptr` {}.",
            request.direction
        ));
        code.line("///");
        code.line("/// # Safety");
        code.line("///");
        code.line("/// `ptr` must be valid for reads and writes of `length` elements and the");
        code.line("/// CPU must support AVX2.");
        code.line("///");
        code.line("/// # Panics");
        code.line("///");
        code.line("/// Panics if `length` exceeds `MAX_BITONIC_LENGTH`.");
        code.line(TARGET_FEATURE);
        code.open(format!(
            "pub unsafe fn sort(ptr: *mut {}, length: usize)",
            self.element()
        ));
        code.line("let full = length / LANES;");
        code.line("let remainder = length - full * LANES;");
        code.line("let vectors = full + (remainder > 0) as usize;");
        code.open("match vectors");
        code.line("0 => {}");
        for entry in &self.kernels.entry_points {
            code.line(format!(
                "{} => {}(ptr, remainder),",
                entry.vectors,
                entry.function_name()
            ));
        }
        code.line(
            "_ => panic!(\"{} elements exceed the bitonic limit of {}\", length, MAX_BITONIC_LENGTH),",
        );
        code.close();
        code.close();
    }

    /// Render `plan` with its registers starting at `d[offset]`
    fn render_plan(&self, code: &mut CodeWriter, plan: &SortPlan, offset: usize) {
        match plan {
            SortPlan::Base(base) => self.render_base(code, base, offset),
            SortPlan::Call(spec) => code.line(format!(
                "{}(&mut d[{}..{}]);",
                spec.function_name(),
                offset,
                offset + spec.width
            )),
            SortPlan::Split(node) => {
                if let Some(first) = &node.first_plan {
                    self.render_plan(code, first, offset);
                }
                if let Some(second) = &node.second_plan {
                    self.render_plan(code, second, offset + node.first_width);
                }
                self.render_exchange(code, &node.cross_exchange, offset);
                self.render_plan(code, &node.merge_first, offset);
                self.render_plan(code, &node.merge_second, offset + node.first_width);
            }
        }
    }

    fn render_base(&self, code: &mut CodeWriter, base: &BaseCaseStage, register: usize) {
        for stage in &base.stages {
            self.render_stage(code, stage, register);
        }
    }

    fn render_stage(&self, code: &mut CodeWriter, stage: &NetworkStage, register: usize) {
        code.open("");
        code.line(format!("let v = d[{}];", register));
        for op in &stage.ops {
            match *op {
                StageOp::Permute(permutation) => {
                    code.line(format!("let s = {};", self.isa.permute(permutation, "v")))
                }
                StageOp::Compare => {
                    if !self.element().has_native_min_max() {
                        code.line(format!("let cmp = {};", self.isa.compare("s", "v")));
                    }
                }
                StageOp::Min => code.line(format!("let lo = {};", self.isa.min("s", "v"))),
                StageOp::Max => code.line(format!("let hi = {};", self.isa.max("s", "v"))),
                StageOp::Blend { mask, ascending } => code.line(format!(
                    "d[{}] = {};",
                    register,
                    self.isa.blend(mask, ascending, "lo", "hi")
                )),
            }
        }
        code.close();
    }

    fn render_exchange(&self, code: &mut CodeWriter, exchange: &CrossExchange, offset: usize) {
        for pair in &exchange.pairs {
            let (a, b) = (offset + pair.first, offset + pair.second);
            code.open("");
            code.line(format!("let a = d[{}];", a));
            code.line(format!("let b = d[{}];", b));
            for line in self.isa.min_max("a", "b") {
                code.line(line);
            }
            let (first, second) = if exchange.min_to_first {
                ("lo", "hi")
            } else {
                ("hi", "lo")
            };
            code.line(format!("d[{}] = {};", a, first));
            code.line(format!("d[{}] = {};", b, second));
            code.close();
        }
    }
}

/// Renders the shared `bitonic_sort.rs` module tying the per-type files together
pub fn render_dispatcher(element_types: &[ElementType], direction: Direction) -> String {
    let mut code = CodeWriter::new();
    code.line(BANNER);
    code.line("//! AVX2 bitonic sorting kernels for short inputs.");
    code.blank();
    for element in element_types {
        code.line(format!("pub mod sort_{};", element));
    }
    code.blank();
    code.line("/// Element types with a generated bitonic kernel");
    code.open("pub trait BitonicSort: Copy");
    code.line("/// Longest input the kernel accepts");
    code.line("const MAX_BITONIC_LENGTH: usize;");
    code.blank();
    code.line("/// # Safety");
    code.line("///");
    code.line("/// `ptr` must be valid for reads and writes of `length` elements, the CPU");
    code.line("/// must support AVX2 and `length` must not exceed `MAX_BITONIC_LENGTH`.");
    code.line("unsafe fn bitonic_sort(ptr: *mut Self, length: usize);");
    code.close();

    for element in element_types {
        code.blank();
        code.open(format!("impl BitonicSort for {}", element));
        code.line(format!(
            "const MAX_BITONIC_LENGTH: usize = sort_{}::MAX_BITONIC_LENGTH;",
            element
        ));
        code.blank();
        code.open("unsafe fn bitonic_sort(ptr: *mut Self, length: usize)");
        code.line(format!("sort_{}::sort(ptr, length)", element));
        code.close();
        code.close();
    }

    code.blank();
    code.line(format!("/// Sorts `data` {} in place.", direction));
    code.line("///");
    code.line("/// Returns `false` without touching `data` when AVX2 is unavailable or");
    code.line("/// `data` is longer than `T::MAX_BITONIC_LENGTH`.");
    code.open("pub fn sort<T: BitonicSort>(data: &mut [T]) -> bool");
    code.open("if data.len() > T::MAX_BITONIC_LENGTH || !std::is_x86_feature_detected!(\"avx2\")");
    code.line("return false;");
    code.close();
    code.line("// SAFETY: the length and AVX2 support were checked above.");
    code.line("unsafe { T::bitonic_sort(data.as_mut_ptr(), data.len()) };");
    code.line("true");
    code.close();
    code.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::GenerationRequest;

    fn render(element: ElementType, max_vectors: usize, threshold: usize) -> String {
        let request =
            GenerationRequest::new(element, 32, max_vectors, threshold, Direction::Ascending)
                .unwrap();
        SortRenderer::new(&SortKernelSet::plan(&request)).render()
    }

    #[test]
    fn test_every_called_function_is_defined() {
        let text = render(ElementType::I32, 16, 4);
        for line in text.lines() {
            let line = line.trim();
            if let Some(name) = line.strip_suffix(");").and_then(|l| l.split('(').next()) {
                if name.starts_with("sort_") && line.contains("(&mut d[") {
                    assert!(
                        text.contains(&format!("unsafe fn {}(", name)),
                        "{} is called but not defined",
                        name
                    );
                }
            }
        }
    }

    #[test]
    fn test_entry_points_and_dispatch() {
        let text = render(ElementType::F64, 3, 4);
        assert!(text.contains("unsafe fn sort_01v_alt(ptr: *mut f64, remainder: usize)"));
        assert!(text.contains("unsafe fn sort_03v_alt(ptr: *mut f64, remainder: usize)"));
        assert!(text.contains("3 => sort_03v_alt(ptr, remainder),"));
        assert!(text.contains("pub const MAX_BITONIC_LENGTH: usize = 12;"));
        assert!(text.contains("_mm256_maskstore_pd(ptr.add(8), mask, d[2])"));
        assert!(text.contains("f64::INFINITY"));
    }

    #[test]
    fn test_unsigned_64_kernels_set_up_top_bit() {
        let text = render(ElementType::U64, 2, 4);
        assert!(text.contains("let top_bit = _mm256_set1_epi64x(i64::MIN);"));
        assert!(text.contains("_mm256_cmpgt_epi64(_mm256_xor_si256("));
        let signed = render(ElementType::I64, 2, 4);
        assert!(!signed.contains("top_bit"));
    }

    #[test]
    fn test_mask_table_rows() {
        let text = render(ElementType::I32, 1, 4);
        assert!(text.contains("static MASK_TABLE: [[i32; 8]; 8] = ["));
        assert!(text.contains("    [-1, -1, -1, 0, 0, 0, 0, 0],"));
        assert!(text.contains("    [-1, -1, -1, -1, -1, -1, -1, -1],"));
    }

    #[test]
    fn test_rendering_is_deterministic() {
        assert_eq!(render(ElementType::U32, 16, 4), render(ElementType::U32, 16, 4));
    }

    #[test]
    fn test_dispatcher_declares_modules() {
        let text = render_dispatcher(&[ElementType::I32, ElementType::F32], Direction::Ascending);
        assert!(text.contains("pub mod sort_i32;"));
        assert!(text.contains("impl BitonicSort for f32"));
        assert!(text.contains("is_x86_feature_detected!(\"avx2\")"));
    }
}
