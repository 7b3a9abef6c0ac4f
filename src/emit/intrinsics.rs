//! AVX2 spellings of the network primitives, per element type

use crate::element::{ElementType, Lanes};
use crate::network::{BlendMask, Direction, Permutation};

/// Name of the broadcast sign bit used by the synthesized 64-bit compare
pub const TOP_BIT: &str = "top_bit";

/// Renders register-level operations for one element type
#[derive(Debug, Clone, Copy)]
pub struct Avx2Isa {
    element: ElementType,
    lanes: Lanes,
}

impl Avx2Isa {
    pub fn new(element: ElementType) -> Self {
        let lanes = match element.size_bytes() {
            4 => Lanes::Eight,
            _ => Lanes::Four,
        };
        Self { element, lanes }
    }

    pub fn element(&self) -> ElementType {
        self.element
    }

    pub fn lanes(&self) -> Lanes {
        self.lanes
    }

    pub fn vector_type(&self) -> &'static str {
        match self.element {
            ElementType::I32 | ElementType::U32 | ElementType::I64 | ElementType::U64 => "__m256i",
            ElementType::F32 => "__m256",
            ElementType::F64 => "__m256d",
        }
    }

    pub fn zero(&self) -> &'static str {
        match self.element {
            ElementType::I32 | ElementType::U32 | ElementType::I64 | ElementType::U64 => {
                "_mm256_setzero_si256()"
            }
            ElementType::F32 => "_mm256_setzero_ps()",
            ElementType::F64 => "_mm256_setzero_pd()",
        }
    }

    /// Integer type of one mask-table entry
    pub fn mask_scalar(&self) -> &'static str {
        match self.element.size_bytes() {
            4 => "i32",
            _ => "i64",
        }
    }

    /// Whether function bodies need the broadcast sign bit in scope
    pub fn needs_top_bit(&self) -> bool {
        self.element.needs_sign_flip()
    }

    pub fn top_bit_setup(&self) -> String {
        format!("let {} = _mm256_set1_epi64x(i64::MIN);", TOP_BIT)
    }

    pub fn permute(&self, permutation: Permutation, v: &str) -> String {
        let k = permutation.xor_mask(self.lanes);
        match self.element {
            ElementType::I32 | ElementType::U32 => match k {
                1 => format!("_mm256_shuffle_epi32::<0xB1>({})", v),
                2 => format!("_mm256_shuffle_epi32::<0x4E>({})", v),
                3 => format!("_mm256_shuffle_epi32::<0x1B>({})", v),
                4 => format!("_mm256_permute4x64_epi64::<0x4E>({})", v),
                _ => format!(
                    "_mm256_permute4x64_epi64::<0x4E>(_mm256_shuffle_epi32::<0x1B>({}))",
                    v
                ),
            },
            ElementType::F32 => match k {
                1 => format!("_mm256_permute_ps::<0xB1>({})", v),
                2 => format!("_mm256_permute_ps::<0x4E>({})", v),
                3 => format!("_mm256_permute_ps::<0x1B>({})", v),
                4 => format!(
                    "_mm256_castpd_ps(_mm256_permute4x64_pd::<0x4E>(_mm256_castps_pd({})))",
                    v
                ),
                _ => format!(
                    "_mm256_castpd_ps(_mm256_permute4x64_pd::<0x4E>(_mm256_castps_pd(_mm256_permute_ps::<0x1B>({}))))",
                    v
                ),
            },
            ElementType::I64 | ElementType::U64 => match k {
                1 => format!("_mm256_shuffle_epi32::<0x4E>({})", v),
                2 => format!("_mm256_permute4x64_epi64::<0x4E>({})", v),
                _ => format!("_mm256_permute4x64_epi64::<0x1B>({})", v),
            },
            ElementType::F64 => match k {
                1 => format!("_mm256_shuffle_pd::<0x5>({v}, {v})", v = v),
                2 => format!("_mm256_permute4x64_pd::<0x4E>({})", v),
                _ => format!("_mm256_permute4x64_pd::<0x1B>({})", v),
            },
        }
    }

    /// Lane-wise `a > b` mask; only used where min/max are synthesized
    pub fn compare(&self, a: &str, b: &str) -> String {
        if self.element.needs_sign_flip() {
            format!(
                "_mm256_cmpgt_epi64(_mm256_xor_si256({a}, {t}), _mm256_xor_si256({b}, {t}))",
                a = a,
                b = b,
                t = TOP_BIT
            )
        } else {
            format!("_mm256_cmpgt_epi64({}, {})", a, b)
        }
    }

    fn native_suffix(&self) -> Option<&'static str> {
        match self.element {
            ElementType::I32 => Some("epi32"),
            ElementType::U32 => Some("epu32"),
            ElementType::F32 => Some("ps"),
            ElementType::F64 => Some("pd"),
            ElementType::I64 | ElementType::U64 => None,
        }
    }

    /// Lane-wise minimum; synthesized forms read `cmp = a > b`
    pub fn min(&self, a: &str, b: &str) -> String {
        match self.native_suffix() {
            Some(suffix) => format!("_mm256_min_{}({}, {})", suffix, a, b),
            None => format!("_mm256_blendv_epi8({}, {}, cmp)", a, b),
        }
    }

    /// Lane-wise maximum; synthesized forms read `cmp = a > b`
    pub fn max(&self, a: &str, b: &str) -> String {
        match self.native_suffix() {
            Some(suffix) => format!("_mm256_max_{}({}, {})", suffix, a, b),
            None => format!("_mm256_blendv_epi8({}, {}, cmp)", b, a),
        }
    }

    /// `let` statements binding `lo` and `hi` to the lane-wise min and max
    /// of `a` and `b`
    pub fn min_max(&self, a: &str, b: &str) -> Vec<String> {
        let mut lines = Vec::with_capacity(3);
        if !self.element.has_native_min_max() {
            lines.push(format!("let cmp = {};", self.compare(a, b)));
        }
        lines.push(format!("let lo = {};", self.min(a, b)));
        lines.push(format!("let hi = {};", self.max(a, b)));
        lines
    }

    /// Blend immediate; 64-bit integer lanes blend as pairs of 32-bit lanes
    pub fn blend_immediate(&self, mask: BlendMask) -> u32 {
        let bits = mask.bits(self.lanes);
        match self.element {
            ElementType::I64 | ElementType::U64 => {
                (0..4).fold(0, |acc, lane| {
                    if bits & (1 << lane) != 0 {
                        acc | (0b11 << (2 * lane))
                    } else {
                        acc
                    }
                })
            }
            _ => bits,
        }
    }

    /// Selected lanes take `hi` when ascending and `lo` otherwise
    pub fn blend(&self, mask: BlendMask, ascending: bool, lo: &str, hi: &str) -> String {
        let function = match self.element {
            ElementType::I32 | ElementType::U32 | ElementType::I64 | ElementType::U64 => {
                "_mm256_blend_epi32"
            }
            ElementType::F32 => "_mm256_blend_ps",
            ElementType::F64 => "_mm256_blend_pd",
        };
        let (unselected, selected) = if ascending { (lo, hi) } else { (hi, lo) };
        format!(
            "{}::<0x{:02X}>({}, {})",
            function,
            self.blend_immediate(mask),
            unselected,
            selected
        )
    }

    pub fn load(&self, ptr: &str) -> String {
        match self.element {
            ElementType::F32 => format!("_mm256_loadu_ps({})", ptr),
            ElementType::F64 => format!("_mm256_loadu_pd({})", ptr),
            _ => format!("_mm256_loadu_si256({} as *const __m256i)", ptr),
        }
    }

    pub fn store(&self, ptr: &str, v: &str) -> String {
        match self.element {
            ElementType::F32 => format!("_mm256_storeu_ps({}, {})", ptr, v),
            ElementType::F64 => format!("_mm256_storeu_pd({}, {})", ptr, v),
            _ => format!("_mm256_storeu_si256({} as *mut __m256i, {})", ptr, v),
        }
    }

    pub fn mask_load(&self, ptr: &str, mask: &str) -> String {
        match self.element {
            ElementType::I32 | ElementType::U32 => {
                format!("_mm256_maskload_epi32({} as *const i32, {})", ptr, mask)
            }
            ElementType::I64 | ElementType::U64 => {
                format!("_mm256_maskload_epi64({} as *const i64, {})", ptr, mask)
            }
            ElementType::F32 => format!("_mm256_maskload_ps({}, {})", ptr, mask),
            ElementType::F64 => format!("_mm256_maskload_pd({}, {})", ptr, mask),
        }
    }

    pub fn mask_store(&self, ptr: &str, mask: &str, v: &str) -> String {
        match self.element {
            ElementType::I32 | ElementType::U32 => {
                format!("_mm256_maskstore_epi32({} as *mut i32, {}, {})", ptr, mask, v)
            }
            ElementType::I64 | ElementType::U64 => {
                format!("_mm256_maskstore_epi64({} as *mut i64, {}, {})", ptr, mask, v)
            }
            ElementType::F32 => format!("_mm256_maskstore_ps({}, {}, {})", ptr, mask, v),
            ElementType::F64 => format!("_mm256_maskstore_pd({}, {}, {})", ptr, mask, v),
        }
    }

    /// Rust constant for the padding value
    pub fn fill_literal(&self, direction: Direction) -> String {
        let bound = match (self.element.is_float(), direction) {
            (true, Direction::Ascending) => "INFINITY",
            (true, Direction::Descending) => "NEG_INFINITY",
            (false, Direction::Ascending) => "MAX",
            (false, Direction::Descending) => "MIN",
        };
        format!("{}::{}", self.element.name(), bound)
    }

    /// Masked load with invalid lanes replaced by the padding value.
    ///
    /// Masked loads zero the invalid lanes, so integers OR the padding into
    /// exactly those lanes; floats blend on the mask's sign bits.
    pub fn padded_load(&self, ptr: &str, mask: &str, direction: Direction) -> String {
        let fill = self.fill_literal(direction);
        let loaded = self.mask_load(ptr, mask);
        match self.element {
            ElementType::I32 | ElementType::U32 => format!(
                "_mm256_or_si256({}, _mm256_andnot_si256({}, _mm256_set1_epi32({} as i32)))",
                loaded, mask, fill
            ),
            ElementType::I64 | ElementType::U64 => format!(
                "_mm256_or_si256({}, _mm256_andnot_si256({}, _mm256_set1_epi64x({} as i64)))",
                loaded, mask, fill
            ),
            ElementType::F32 => format!(
                "_mm256_blendv_ps(_mm256_set1_ps({}), {}, _mm256_castsi256_ps({}))",
                fill, loaded, mask
            ),
            ElementType::F64 => format!(
                "_mm256_blendv_pd(_mm256_set1_pd({}), {}, _mm256_castsi256_pd({}))",
                fill, loaded, mask
            ),
        }
    }
}
