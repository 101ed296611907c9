//! Deterministic random number generation.
//!
//! RULE: Nothing in the library may call any platform RNG.
//! All randomness flows through StageRng instances derived
//! from the single master seed stored on the pipeline run record.
//!
//! Each pipeline stage gets its own RNG stream, seeded deterministically
//! from (master_seed XOR stage_index). This means:
//!   - Adding a new stage never changes existing stages' streams.
//!   - Each stage's stream is fully reproducible in isolation.

use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;

/// A named, deterministic RNG for a single pipeline stage.
pub struct StageRng {
    pub name: &'static str,
    seed: u64,
    inner: Pcg64Mcg,
}

impl StageRng {
    /// Create a stage RNG from the master seed and a stable stage
    /// index. The index must never change once assigned.
    pub fn new(master_seed: u64, stage_index: u64) -> Self {
        let derived_seed = master_seed ^ (stage_index.wrapping_mul(0x9e37_79b9_7f4a_7c15));
        Self {
            name: "unnamed",
            seed: derived_seed,
            inner: Pcg64Mcg::seed_from_u64(derived_seed),
        }
    }

    /// The derived seed this stage was created with. Used by consumers
    /// that need keyed sub-draws independent of stream position.
    pub fn stage_seed(&self) -> u64 {
        self.seed
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Roll a float in [0.0, 1.0).
    pub fn next_f64(&mut self) -> f64 {
        use rand::RngCore;
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Roll a u64 in [0, n).
    pub fn next_u64_below(&mut self, n: u64) -> u64 {
        use rand::RngCore;
        assert!(n > 0, "n must be > 0");
        self.inner.next_u64() % n
    }

    /// Roll an i64 in the inclusive range [lo, hi].
    pub fn range_i64(&mut self, lo: i64, hi: i64) -> i64 {
        assert!(lo <= hi, "lo must be <= hi");
        lo + self.next_u64_below((hi - lo + 1) as u64) as i64
    }

    /// Roll a float uniformly in [lo, hi).
    pub fn range_f64(&mut self, lo: f64, hi: f64) -> f64 {
        lo + self.next_f64() * (hi - lo)
    }

    /// Bernoulli trial: returns true with probability p.
    pub fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Standard-normal draw via Box-Muller. Two uniforms per call;
    /// no spare is cached, so the stream stays position-independent.
    pub fn normal(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-12);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos();
        mean + std_dev * z
    }

    /// Log-normal draw parameterized by the mean of the underlying
    /// distribution (not the log-mean) and sigma in log space.
    pub fn log_normal(&mut self, mean: f64, sigma: f64) -> f64 {
        assert!(mean > 0.0, "log_normal mean must be > 0");
        self.normal(mean.ln(), sigma).exp()
    }

    /// Categorical draw: returns the index selected by the given
    /// weights. Weights need not sum to 1. Falls back to the last
    /// index if rounding leaves the cumulative sum short.
    pub fn weighted_index(&mut self, weights: &[f64]) -> usize {
        assert!(!weights.is_empty(), "weights must be non-empty");
        let total: f64 = weights.iter().sum();
        let roll = self.next_f64() * total;
        let mut cumulative = 0.0;
        for (i, w) in weights.iter().enumerate() {
            cumulative += w;
            if roll < cumulative {
                return i;
            }
        }
        weights.len() - 1
    }
}

/// All stage RNGs for a single run, indexed by stable slot.
pub struct RngBank {
    master_seed: u64,
}

impl RngBank {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn for_stage(&self, slot: StageSlot) -> StageRng {
        StageRng::new(self.master_seed, slot as u64).with_name(slot.name())
    }
}

/// Stable stage slot assignments.
/// NEVER reorder or remove entries — only append.
/// Reordering changes every stage's seed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum StageSlot {
    Taxpayer = 0,
    FraudSelection = 1,
    Returns = 2,
    Payments = 3,
    Registry = 4,
    Training = 5,
}

impl StageSlot {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Taxpayer => "taxpayer",
            Self::FraudSelection => "fraud_selection",
            Self::Returns => "returns",
            Self::Payments => "payments",
            Self::Registry => "registry",
            Self::Training => "training",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let mut a = StageRng::new(42, 3);
        let mut b = StageRng::new(42, 3);
        for _ in 0..100 {
            assert_eq!(a.next_f64().to_bits(), b.next_f64().to_bits());
        }
    }

    #[test]
    fn stages_get_distinct_streams() {
        let bank = RngBank::new(42);
        let mut a = bank.for_stage(StageSlot::Taxpayer);
        let mut b = bank.for_stage(StageSlot::Returns);
        let diverged = (0..16).any(|_| a.next_f64() != b.next_f64());
        assert!(diverged, "distinct slots produced identical streams");
    }

    #[test]
    fn weighted_index_respects_extremes() {
        let mut rng = StageRng::new(7, 0);
        for _ in 0..50 {
            assert_eq!(rng.weighted_index(&[0.0, 1.0, 0.0]), 1);
        }
    }

    #[test]
    fn normal_draw_centers_on_mean() {
        let mut rng = StageRng::new(11, 0);
        let n = 5000;
        let sum: f64 = (0..n).map(|_| rng.normal(10.0, 2.0)).sum();
        let mean = sum / n as f64;
        assert!((mean - 10.0).abs() < 0.2, "sample mean {mean} too far from 10");
    }
}
