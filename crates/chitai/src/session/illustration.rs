//! Illustration choice at display time.

use rand::Rng;
use rand::seq::IndexedRandom;

/// Pick one illustration uniformly at random, or `None` if there are none.
pub fn choose_illustration<R: Rng + ?Sized>(candidates: &[String], rng: &mut R) -> Option<String> {
    candidates.choose(rng).cloned()
}
