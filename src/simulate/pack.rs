//! Lane-level interpreter for pack plans

use crate::packing::{LaneWord, PackDirection, PackPlan, Transform, PACK_LANES};

fn shl(word: LaneWord, amount: u32) -> LaneWord {
    word.map(|lane| lane << amount)
}

fn shr(word: LaneWord, amount: u32) -> LaneWord {
    word.map(|lane| lane >> amount)
}

fn or(a: LaneWord, b: LaneWord) -> LaneWord {
    std::array::from_fn(|lane| a[lane] | b[lane])
}

fn and(word: LaneWord, mask: u32) -> LaneWord {
    word.map(|lane| lane & mask)
}

/// Encode and pack one batch; returns the reference after the batch.
///
/// Panics if `plan` is not a pack plan or the buffers are too short.
pub fn pack_batch(
    plan: &PackPlan,
    transform: Transform,
    input: &[LaneWord],
    mut reference: LaneWord,
    output: &mut [LaneWord],
) -> LaneWord {
    assert_eq!(plan.direction(), PackDirection::Pack, "not a pack plan");
    assert!(input.len() >= plan.batch_length(), "input shorter than batch");
    assert!(output.len() >= plan.words(), "output shorter than {} words", plan.words());

    if plan.is_verbatim() {
        output[..plan.batch_length()].copy_from_slice(&input[..plan.batch_length()]);
        return reference;
    }

    let bit_width = plan.bit_width();
    let mut accumulator: LaneWord = [0; PACK_LANES];
    for step in plan.steps() {
        let value = transform.encode(input[step.input_index], &mut reference);
        if plan.is_transform_only() {
            continue;
        }

        accumulator = if step.shift_amount == 0 {
            value
        } else {
            or(accumulator, shl(value, step.shift_amount))
        };

        if step.flushes_word {
            output[step.output_index] = accumulator;
            if step.carry_bits > 0 {
                accumulator = shr(value, bit_width - step.carry_bits);
            }
            if step.flushes_carry {
                output[step.output_index + 1] = accumulator;
            }
        }
    }
    reference
}

/// Unpack and decode one batch; returns the reference after the batch.
///
/// Panics if `plan` is not an unpack plan or the buffers are too short.
pub fn unpack_batch(
    plan: &PackPlan,
    transform: Transform,
    input: &[LaneWord],
    mut reference: LaneWord,
    output: &mut [LaneWord],
) -> LaneWord {
    assert_eq!(plan.direction(), PackDirection::Unpack, "not an unpack plan");
    assert!(input.len() >= plan.words(), "input shorter than {} words", plan.words());
    assert!(output.len() >= plan.batch_length(), "output shorter than batch");

    if plan.is_verbatim() {
        output[..plan.batch_length()].copy_from_slice(&input[..plan.batch_length()]);
        return reference;
    }

    // Zero-width fields carry no information: every value is the reference
    if plan.is_transform_only() {
        output[..plan.batch_length()].fill(reference);
        return reference;
    }

    let bit_width = plan.bit_width();
    let mask = plan.field_mask();
    for step in plan.steps() {
        let shifted = shr(input[step.input_index], step.shift_amount);
        let mut field = if step.shift_amount + bit_width < 32 {
            and(shifted, mask)
        } else {
            shifted
        };
        if step.carry_bits > 0 {
            let next = input[step.input_index + 1];
            field = or(field, and(shl(next, bit_width - step.carry_bits), mask));
        }
        output[step.output_index] = transform.decode(field, &mut reference);
    }
    reference
}
