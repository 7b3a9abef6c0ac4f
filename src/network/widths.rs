//! Type-safe widths for the recursive network split
//!
//! The bitonic merge argument needs the first half of every split to be a
//! power of two. These types make that invariant explicit instead of leaving
//! it to bit tricks at each call site.

/// A power of two, guaranteed at the type level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PowerOfTwo {
    value: usize,
    log2_value: u32,
}

impl PowerOfTwo {
    /// Returns None if the value is not a power of two
    pub fn new(value: usize) -> Option<Self> {
        if value.is_power_of_two() {
            Some(PowerOfTwo {
                value,
                log2_value: value.trailing_zeros(),
            })
        } else {
            None
        }
    }

    /// Create from a log2 value (e.g., 3 creates 8)
    pub fn from_log2(log2_value: u32) -> Self {
        PowerOfTwo {
            value: 1 << log2_value,
            log2_value,
        }
    }

    pub fn value(&self) -> usize {
        self.value
    }

    pub fn log2(&self) -> u32 {
        self.log2_value
    }

    /// The smallest power of two >= n
    pub fn next_power_of_two(n: usize) -> Self {
        PowerOfTwo::from_log2(n.next_power_of_two().trailing_zeros())
    }

    /// Half of this power of two; `None` for 1
    pub fn half(&self) -> Option<Self> {
        self.log2_value.checked_sub(1).map(PowerOfTwo::from_log2)
    }
}

/// The two halves a network of `width` registers is split into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitWidths {
    first: PowerOfTwo,
    second: usize,
}

impl SplitWidths {
    /// Split `width` into `next_power_of_two(width) / 2` and the remainder.
    ///
    /// Panics for `width < 2`: a single register is a base case, and zero
    /// registers is a caller contract violation.
    pub fn of(width: usize) -> Self {
        assert!(width >= 2, "cannot split a network of {} registers", width);

        let first = PowerOfTwo::next_power_of_two(width)
            .half()
            .expect("next power of two of width >= 2 is at least 2");
        let second = width - first.value();

        let split = SplitWidths { first, second };
        split.check(width);
        split
    }

    fn check(&self, width: usize) {
        assert_eq!(
            self.first.value() + self.second,
            width,
            "split widths {} + {} do not sum to {}",
            self.first.value(),
            self.second,
            width
        );
        assert!(
            self.first.value() >= self.second && self.second >= 1,
            "unbalanced split {} / {} of width {}",
            self.first.value(),
            self.second,
            width
        );
    }

    pub fn first(&self) -> usize {
        self.first.value()
    }

    pub fn first_power(&self) -> PowerOfTwo {
        self.first
    }

    pub fn second(&self) -> usize {
        self.second
    }
}

/// `(first_width, second_width)` for a split of `width` registers
pub fn split_widths(width: usize) -> (usize, usize) {
    let split = SplitWidths::of(width);
    (split.first(), split.second())
}
