use crate::config::DurationRange;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;
use std::time::Duration;

/// Run-wide random source. Seeded runs replay the same waits, samples and
/// search terms, which the scenario tests rely on.
pub struct Dice {
    rng: Mutex<StdRng>,
}

impl Dice {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng: Mutex::new(rng),
        }
    }

    fn with<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        // A poisoned lock only means another caller panicked mid-draw; the RNG is still usable
        let mut guard = self.rng.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut guard)
    }

    pub fn duration(&self, range: DurationRange) -> Duration {
        let (lo, hi) = (range.lower(), range.upper());
        if lo == hi {
            return lo;
        }
        let ms = self.with(|rng| rng.gen_range(lo.as_millis() as u64..=hi.as_millis() as u64));
        Duration::from_millis(ms)
    }

    pub fn int(&self, lo: u32, hi: u32) -> u32 {
        self.with(|rng| rng.gen_range(lo..=hi))
    }

    /// Up to `amount` distinct items, in random order
    pub fn sample<T: Clone>(&self, items: &[T], amount: usize) -> Vec<T> {
        self.with(|rng| items.choose_multiple(rng, amount).cloned().collect())
    }

    pub fn shuffle<T>(&self, items: &mut [T]) {
        self.with(|rng| items.shuffle(rng));
    }
}
