//! Test and benchmark tiers
//!
//! The exhaustive sort and pack checks scale with the number of random
//! inputs per configuration. Tiers pick that number from the `TEST_TIER`
//! environment variable so quick runs stay quick.

use std::time::Duration;

/// Test tier levels with time budgets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestTier {
    /// Quick validation - under 30 seconds
    /// Used for: TDD, pre-commit hooks
    Quick,

    /// Commit validation - under 10 minutes
    /// Used for: Before commits, CI on every push
    Commit,

    /// Pull request validation - under 30 minutes
    PullRequest,

    /// Release validation - under 2 hours
    Release,
}

impl TestTier {
    /// Get the time budget for this tier
    pub fn time_budget(&self) -> Duration {
        match self {
            TestTier::Quick => Duration::from_secs(30),
            TestTier::Commit => Duration::from_secs(600), // 10 minutes
            TestTier::PullRequest => Duration::from_secs(1800), // 30 minutes
            TestTier::Release => Duration::from_secs(7200), // 2 hours
        }
    }

    /// Get tier from environment variable or default
    pub fn from_env() -> Self {
        match std::env::var("TEST_TIER").as_deref() {
            Ok("quick") => TestTier::Quick,
            Ok("commit") => TestTier::Commit,
            Ok("pr") | Ok("pull_request") => TestTier::PullRequest,
            Ok("release") => TestTier::Release,
            _ => TestTier::Quick, // Default to quick for safety
        }
    }
}

/// Sample counts for each test tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierConfig {
    /// Random inputs per (element type, length, direction)
    pub samples_per_length: usize,

    /// Random batches per (bit width, transform)
    pub batches_per_width: usize,

    /// Unroll thresholds the threshold-invariance check sweeps
    pub unroll_thresholds: &'static [usize],

    /// Cases per proptest property
    pub proptest_cases: u32,
}

impl TierConfig {
    pub fn for_tier(tier: TestTier) -> Self {
        match tier {
            TestTier::Quick => Self {
                samples_per_length: 2,
                batches_per_width: 4,
                unroll_thresholds: &[2, 4],
                proptest_cases: 32,
            },
            TestTier::Commit => Self {
                samples_per_length: 8,
                batches_per_width: 16,
                unroll_thresholds: &[1, 2, 4, 8],
                proptest_cases: 128,
            },
            TestTier::PullRequest => Self {
                samples_per_length: 32,
                batches_per_width: 64,
                unroll_thresholds: &[1, 2, 3, 4, 8, 16],
                proptest_cases: 512,
            },
            TestTier::Release => Self {
                samples_per_length: 128,
                batches_per_width: 256,
                unroll_thresholds: &[1, 2, 3, 4, 5, 8, 16, 17],
                proptest_cases: 2048,
            },
        }
    }

    pub fn from_env() -> Self {
        Self::for_tier(TestTier::from_env())
    }

    /// Get a descriptive summary of this configuration
    pub fn summary(&self) -> String {
        format!(
            "Tier Configuration:\n\
             - Samples per length: {}\n\
             - Batches per width: {}\n\
             - Unroll thresholds: {:?}\n\
             - Proptest cases: {}",
            self.samples_per_length,
            self.batches_per_width,
            self.unroll_thresholds,
            self.proptest_cases
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tiers_grow() {
        let tiers = [
            TestTier::Quick,
            TestTier::Commit,
            TestTier::PullRequest,
            TestTier::Release,
        ];
        for pair in tiers.windows(2) {
            let smaller = TierConfig::for_tier(pair[0]);
            let larger = TierConfig::for_tier(pair[1]);
            assert!(smaller.samples_per_length <= larger.samples_per_length);
            assert!(smaller.proptest_cases <= larger.proptest_cases);
            assert!(pair[0].time_budget() < pair[1].time_budget());
        }
        println!("Quick tier: {}", TierConfig::for_tier(TestTier::Quick).summary());
    }
}
