use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Source of uniform samples in `[0, 1)` used by every mock scoring path.
pub trait RandomSource: Send + Sync {
    fn next_f64(&self) -> f64;

    fn range(&self, low: f64, high: f64) -> f64 {
        low + self.next_f64() * (high - low)
    }

    fn index(&self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        ((self.next_f64() * len as f64) as usize).min(len - 1)
    }

    fn chance(&self, probability: f64) -> bool {
        self.next_f64() < probability
    }
}

/// Randomized source backed by a seedable `StdRng`.
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandom {
    fn next_f64(&self) -> f64 {
        let mut rng = self
            .rng
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        rng.r#gen::<f64>()
    }
}

/// Deterministic source: replays `values` in order, then repeats the last one.
pub struct FixedRandom {
    values: Mutex<VecDeque<f64>>,
    fallback: f64,
}

impl FixedRandom {
    pub fn constant(value: f64) -> Self {
        Self::sequence(Vec::new(), value)
    }

    pub fn sequence(values: Vec<f64>, fallback: f64) -> Self {
        Self {
            values: Mutex::new(values.into_iter().collect()),
            fallback: fallback.clamp(0.0, 0.999_999),
        }
    }
}

impl RandomSource for FixedRandom {
    fn next_f64(&self) -> f64 {
        let mut values = self
            .values
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        values
            .pop_front()
            .map(|value| value.clamp(0.0, 0.999_999))
            .unwrap_or(self.fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_source_replays_then_falls_back() {
        let source = FixedRandom::sequence(vec![0.1, 0.9], 0.5);
        assert_eq!(source.next_f64(), 0.1);
        assert_eq!(source.next_f64(), 0.9);
        assert_eq!(source.next_f64(), 0.5);
        assert_eq!(source.next_f64(), 0.5);
    }

    #[test]
    fn range_and_index_stay_in_bounds() {
        let source = SeededRandom::seeded(7);
        for _ in 0..500 {
            let value = source.range(0.6, 0.9);
            assert!((0.6..0.9).contains(&value));
            assert!(source.index(5) < 5);
        }
        assert_eq!(FixedRandom::constant(0.99).index(3), 2);
    }
}
