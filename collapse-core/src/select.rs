use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Chooses which candidate a branch tries next.
///
/// `pick` returns a uniform-ish index in `[0, max)`. Selectors are the only
/// source of nondeterminism in a solve: a deterministic selector makes the
/// whole run reproducible.
pub trait ValueSelector {
    fn pick(&mut self, max: usize) -> usize;
}

/// Linear congruential selector. Cheap, stateful and fully reproducible.
#[derive(Debug, Clone)]
pub struct LcgSelector {
    state: u32,
}

impl LcgSelector {
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }
}

impl Default for LcgSelector {
    fn default() -> Self {
        Self::new(0x1234_5678)
    }
}

impl ValueSelector for LcgSelector {
    fn pick(&mut self, max: usize) -> usize {
        debug_assert!(max > 0, "pick from an empty candidate set");
        self.state = self.state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        self.state as usize % max
    }
}

/// Selector backed by a real RNG for higher-quality value ordering.
///
/// Defaults to [`StdRng`]; any [`Rng`] works.
#[derive(Debug, Clone)]
pub struct RngSelector<R: Rng = StdRng> {
    rng: R,
}

impl RngSelector<StdRng> {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl<R: Rng> RngSelector<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: Rng> ValueSelector for RngSelector<R> {
    fn pick(&mut self, max: usize) -> usize {
        debug_assert!(max > 0, "pick from an empty candidate set");
        self.rng.gen_range(0..max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lcg_is_reproducible() {
        let mut a = LcgSelector::new(7);
        let mut b = LcgSelector::new(7);
        for max in [2usize, 3, 9, 5, 2, 100] {
            assert_eq!(a.pick(max), b.pick(max));
        }
    }

    #[test]
    fn lcg_stays_in_range() {
        let mut selector = LcgSelector::default();
        for _ in 0..1000 {
            assert!(selector.pick(7) < 7);
        }
    }

    #[test]
    fn lcg_matches_the_recurrence() {
        let mut selector = LcgSelector::new(1);
        let expected = 1u32.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        assert_eq!(selector.pick(1 << 16), expected as usize % (1 << 16));
    }

    #[test]
    fn rng_selector_is_reproducible_per_seed() {
        let mut a = RngSelector::seeded(99);
        let mut b = RngSelector::seeded(99);
        for max in [2usize, 4, 9, 81] {
            assert_eq!(a.pick(max), b.pick(max));
        }
    }

    #[test]
    fn rng_selector_stays_in_range() {
        let mut selector = RngSelector::seeded(3);
        for _ in 0..1000 {
            assert!(selector.pick(9) < 9);
        }
    }
}
