//! Step plans for fixed-width bit packing
//!
//! A batch of values is packed into 32-bit words lane by lane. Each step
//! places one value at the current bit cursor; a step that fills the word
//! flushes it, and a value that straddles the boundary carries its high bits
//! into the next word.

use rayon::prelude::*;
use tracing::debug;

use crate::error::{GenError, Result};

/// Bits per packed word
pub const WORD_BITS: u32 = 32;

/// Values per packed batch
pub const DEFAULT_BATCH_LENGTH: usize = 32;

/// Widest packable field
pub const MAX_BIT_WIDTH: u32 = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackDirection {
    Pack,
    Unpack,
}

/// One value placed into (or read out of) the bitstream.
///
/// For packing `input_index` is the value and `output_index` the word; for
/// unpacking the roles swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackStep {
    pub input_index: usize,
    pub output_index: usize,
    /// Bit cursor at which the field starts
    pub shift_amount: u32,
    /// Whether this step completes the current word
    pub flushes_word: bool,
    /// High bits of the field that land in the next word
    pub carry_bits: u32,
    /// The carried bits complete one more word on their own; only set on the
    /// last step of a batch whose final field straddles a word boundary
    pub flushes_carry: bool,
}

impl PackStep {
    /// Index of the value this step handles
    pub fn value_index(&self, direction: PackDirection) -> usize {
        match direction {
            PackDirection::Pack => self.input_index,
            PackDirection::Unpack => self.output_index,
        }
    }

    /// Index of the word this step starts in
    pub fn word_index(&self, direction: PackDirection) -> usize {
        match direction {
            PackDirection::Pack => self.output_index,
            PackDirection::Unpack => self.input_index,
        }
    }
}

/// Produces the raw step sequence a [`PackPlan`] is validated from
pub trait StepGenerator: Send + Sync {
    fn steps(&self, bit_width: u32, batch_length: usize, direction: PackDirection) -> Vec<PackStep>;
}

/// The bit-cursor walk used for every real plan
#[derive(Debug, Clone, Copy, Default)]
pub struct CursorStepGenerator;

impl StepGenerator for CursorStepGenerator {
    fn steps(&self, bit_width: u32, batch_length: usize, direction: PackDirection) -> Vec<PackStep> {
        let mut cursor = Cursor::default();
        (0..batch_length)
            .map(|value| {
                let is_last = value + 1 == batch_length;
                let (word, shift, flushes_word, carry_bits, flushes_carry) =
                    cursor.advance(bit_width, is_last);
                match direction {
                    PackDirection::Pack => PackStep {
                        input_index: value,
                        output_index: word,
                        shift_amount: shift,
                        flushes_word,
                        carry_bits,
                        flushes_carry,
                    },
                    PackDirection::Unpack => PackStep {
                        input_index: word,
                        output_index: value,
                        shift_amount: shift,
                        flushes_word,
                        carry_bits,
                        flushes_carry,
                    },
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Cursor {
    word: usize,
    bit: u32,
}

impl Cursor {
    /// Place one field; returns `(word, shift, flushes, carry, flushes_carry)`
    /// before moving
    fn advance(&mut self, bit_width: u32, is_last: bool) -> (usize, u32, bool, u32, bool) {
        let end = self.bit + bit_width;
        let flushes = bit_width > 0 && (end >= WORD_BITS || is_last);
        let carry = end.saturating_sub(WORD_BITS);
        let flushes_carry = is_last && carry > 0;
        let placed = (self.word, self.bit, flushes, carry, flushes_carry);

        if flushes {
            self.word += 1;
        }
        if flushes_carry {
            self.word += 1;
        }
        self.bit = end % WORD_BITS;
        placed
    }
}

/// A validated step sequence for one bit width and direction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackPlan {
    bit_width: u32,
    batch_length: usize,
    direction: PackDirection,
    steps: Vec<PackStep>,
    words: usize,
}

impl PackPlan {
    /// Generate and check a plan.
    ///
    /// Fails with [`GenError::PlanInvariant`] when the generated steps do not
    /// consume exactly `batch_length` values, touch exactly
    /// `ceil(batch_length * bit_width / 32)` words, or disagree with the bit
    /// cursor at any step.
    pub fn new(
        bit_width: u32,
        batch_length: usize,
        direction: PackDirection,
        generator: &dyn StepGenerator,
    ) -> Result<Self> {
        if bit_width > MAX_BIT_WIDTH {
            return Err(GenError::InvalidBitWidth(bit_width));
        }
        let steps = generator.steps(bit_width, batch_length, direction);
        let plan = PackPlan {
            bit_width,
            batch_length,
            direction,
            steps,
            words: Self::word_count(bit_width, batch_length),
        };
        plan.verify()?;
        Ok(plan)
    }

    /// Words needed for `batch_length` fields of `bit_width` bits
    pub fn word_count(bit_width: u32, batch_length: usize) -> usize {
        (batch_length * bit_width as usize).div_ceil(WORD_BITS as usize)
    }

    fn verify(&self) -> Result<()> {
        let violation = |what: String| {
            Err(GenError::PlanInvariant(format!(
                "{:?} plan for bit width {}: {}",
                self.direction, self.bit_width, what
            )))
        };

        if self.steps.len() != self.batch_length {
            return violation(format!(
                "consumed {} values, expected {}",
                self.steps.len(),
                self.batch_length
            ));
        }

        let flushed: usize = self
            .steps
            .iter()
            .map(|step| usize::from(step.flushes_word) + usize::from(step.flushes_carry))
            .sum();
        if flushed != self.words {
            return violation(format!("produced {} words, expected {}", flushed, self.words));
        }

        let mut cursor = Cursor::default();
        for (value, step) in self.steps.iter().enumerate() {
            let is_last = value + 1 == self.batch_length;
            let expected = {
                let (word, shift, flushes, carry, flushes_carry) =
                    cursor.advance(self.bit_width, is_last);
                (value, word, shift, flushes, carry, flushes_carry)
            };
            let actual = (
                step.value_index(self.direction),
                step.word_index(self.direction),
                step.shift_amount,
                step.flushes_word,
                step.carry_bits,
                step.flushes_carry,
            );
            if actual != expected {
                return violation(format!(
                    "step {} is {:?}, cursor expects {:?}",
                    value, actual, expected
                ));
            }
        }
        Ok(())
    }

    pub fn bit_width(&self) -> u32 {
        self.bit_width
    }

    pub fn batch_length(&self) -> usize {
        self.batch_length
    }

    pub fn direction(&self) -> PackDirection {
        self.direction
    }

    pub fn steps(&self) -> &[PackStep] {
        &self.steps
    }

    /// Words produced (pack) or consumed (unpack)
    pub fn words(&self) -> usize {
        self.words
    }

    /// Every field fills a whole word: a plain copy, no shifts, masks or transform
    pub fn is_verbatim(&self) -> bool {
        self.bit_width == WORD_BITS
    }

    /// Zero-width fields: only the transform runs
    pub fn is_transform_only(&self) -> bool {
        self.bit_width == 0
    }

    /// Mask selecting the low `bit_width` bits
    pub fn field_mask(&self) -> u32 {
        match self.bit_width {
            0 => 0,
            WORD_BITS => u32::MAX,
            b => (1u32 << b) - 1,
        }
    }
}

/// Plans every bit width for one batch length
pub struct BitPackPlanner<G: StepGenerator = CursorStepGenerator> {
    batch_length: usize,
    generator: G,
}

impl BitPackPlanner<CursorStepGenerator> {
    pub fn new(batch_length: usize) -> Self {
        Self::with_generator(batch_length, CursorStepGenerator)
    }
}

impl Default for BitPackPlanner<CursorStepGenerator> {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_LENGTH)
    }
}

impl<G: StepGenerator> BitPackPlanner<G> {
    pub fn with_generator(batch_length: usize, generator: G) -> Self {
        Self {
            batch_length,
            generator,
        }
    }

    pub fn batch_length(&self) -> usize {
        self.batch_length
    }

    pub fn plan(&self, bit_width: u32, direction: PackDirection) -> Result<PackPlan> {
        let plan = PackPlan::new(bit_width, self.batch_length, direction, &self.generator)?;
        debug!(bit_width, ?direction, words = plan.words(), "planned packing");
        Ok(plan)
    }

    /// `(pack, unpack)` plans for every width in `0..=32`, in width order
    pub fn plan_all(&self) -> Result<Vec<(PackPlan, PackPlan)>> {
        (0..=MAX_BIT_WIDTH)
            .into_par_iter()
            .map(|bit_width| {
                Ok((
                    self.plan(bit_width, PackDirection::Pack)?,
                    self.plan(bit_width, PackDirection::Unpack)?,
                ))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_counts() {
        assert_eq!(PackPlan::word_count(0, 32), 0);
        assert_eq!(PackPlan::word_count(5, 32), 5);
        assert_eq!(PackPlan::word_count(32, 32), 32);
        assert_eq!(PackPlan::word_count(3, 10), 1);
    }

    #[test]
    fn test_width_five_layout() {
        let plan = BitPackPlanner::default().plan(5, PackDirection::Pack).unwrap();
        assert_eq!(plan.words(), 5);

        // value 6 starts at bit 30 and spills 3 bits into word 1
        let step = plan.steps()[6];
        assert_eq!(step.output_index, 0);
        assert_eq!(step.shift_amount, 30);
        assert!(step.flushes_word);
        assert_eq!(step.carry_bits, 3);

        let next = plan.steps()[7];
        assert_eq!((next.output_index, next.shift_amount), (1, 3));
    }

    #[test]
    fn test_unpack_swaps_indices() {
        let plan = BitPackPlanner::default().plan(7, PackDirection::Unpack).unwrap();
        for (value, step) in plan.steps().iter().enumerate() {
            assert_eq!(step.output_index, value);
        }
        assert_eq!(plan.steps().last().map(|s| s.input_index), Some(6));
    }

    #[test]
    fn test_degenerate_widths() {
        let planner = BitPackPlanner::default();
        let zero = planner.plan(0, PackDirection::Unpack).unwrap();
        assert!(zero.is_transform_only());
        assert_eq!(zero.words(), 0);
        assert!(zero.steps().iter().all(|s| !s.flushes_word && s.shift_amount == 0));

        let full = planner.plan(32, PackDirection::Pack).unwrap();
        assert!(full.is_verbatim());
        assert_eq!(full.field_mask(), u32::MAX);
        assert!(full.steps().iter().all(|s| s.shift_amount == 0 && s.carry_bits == 0));
    }

    #[test]
    fn test_partial_batch_flushes_last_word() {
        let plan = BitPackPlanner::new(10).plan(3, PackDirection::Pack).unwrap();
        assert_eq!(plan.words(), 1);
        assert!(plan.steps()[9].flushes_word);
        assert!(!plan.steps()[9].flushes_carry);
    }

    #[test]
    fn test_last_field_carry_gets_its_own_word() {
        // value 9 starts at bit 31 of word 1 and carries 6 bits into word 2
        let plan = BitPackPlanner::new(10).plan(7, PackDirection::Pack).unwrap();
        assert_eq!(plan.words(), 3);
        let last = plan.steps()[9];
        assert_eq!((last.output_index, last.shift_amount), (1, 31));
        assert!(last.flushes_word);
        assert_eq!(last.carry_bits, 6);
        assert!(last.flushes_carry);
        assert!(plan.steps()[..9].iter().all(|step| !step.flushes_carry));

        for batch_length in 1..=64 {
            let planner = BitPackPlanner::new(batch_length);
            assert!(planner.plan_all().is_ok(), "batch length {}", batch_length);
        }
    }

    #[test]
    fn test_every_width_plans() {
        let plans = BitPackPlanner::default().plan_all().unwrap();
        assert_eq!(plans.len(), 33);
        for (bit_width, (pack, unpack)) in plans.iter().enumerate() {
            assert_eq!(pack.bit_width() as usize, bit_width);
            assert_eq!(pack.words(), unpack.words());
        }
    }

    #[test]
    fn test_width_above_word_rejected() {
        let result = BitPackPlanner::default().plan(33, PackDirection::Pack);
        assert!(matches!(result, Err(GenError::InvalidBitWidth(33))));
    }
}
