//! Injectable randomness for the step engine.
//!
//! The randomized release/request phases draw through the [`RandomSource`]
//! trait so that tests can script an exact sequence of decisions while
//! production code uses real entropy.

use rand::rngs::ThreadRng;
use rand::Rng;

/// Source of random draws for the randomized simulation phases.
pub trait RandomSource {
    /// Returns true with probability `p` (clamped to `[0.0, 1.0]`).
    fn chance(&mut self, p: f64) -> bool;

    /// Picks a uniformly random index in `0..len`.
    ///
    /// `len` is always ≥ 1 at call sites.
    fn pick_index(&mut self, len: usize) -> usize;
}

/// Production random source backed by the thread-local generator.
#[derive(Debug, Default)]
pub struct EntropyRandom {
    rng: ThreadRng,
}

impl EntropyRandom {
    /// Creates a new entropy-backed source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl RandomSource for EntropyRandom {
    fn chance(&mut self, p: f64) -> bool {
        self.rng.gen::<f64>() < p.clamp(0.0, 1.0)
    }

    fn pick_index(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }
}

/// Deterministic random source replaying a scripted sequence of draws.
///
/// Each [`RandomSource::chance`] call consumes one boolean; each
/// [`RandomSource::pick_index`] call consumes one index (taken modulo the
/// collection length). When a script runs out, `chance` answers `false` and
/// `pick_index` answers `0`, so an exhausted script means "no further random
/// behavior" rather than a panic.
#[derive(Debug, Default)]
pub struct ScriptedRandom {
    chances: Vec<bool>,
    indices: Vec<usize>,
    chance_pos: usize,
    index_pos: usize,
}

impl ScriptedRandom {
    /// Creates a source that never takes a random action.
    #[must_use]
    pub fn quiet() -> Self {
        Self::default()
    }

    /// Creates a source from scripted chance outcomes and index picks.
    #[must_use]
    pub fn new(chances: Vec<bool>, indices: Vec<usize>) -> Self {
        Self {
            chances,
            indices,
            chance_pos: 0,
            index_pos: 0,
        }
    }
}

impl RandomSource for ScriptedRandom {
    fn chance(&mut self, _p: f64) -> bool {
        let out = self.chances.get(self.chance_pos).copied().unwrap_or(false);
        self.chance_pos += 1;
        out
    }

    fn pick_index(&mut self, len: usize) -> usize {
        let raw = self.indices.get(self.index_pos).copied().unwrap_or(0);
        self.index_pos += 1;
        raw % len.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_replays_in_order() {
        let mut rng = ScriptedRandom::new(vec![true, false, true], vec![2, 0]);
        assert!(rng.chance(0.5));
        assert!(!rng.chance(0.5));
        assert!(rng.chance(0.5));
        assert_eq!(rng.pick_index(5), 2);
        assert_eq!(rng.pick_index(5), 0);
    }

    #[test]
    fn test_scripted_exhaustion_is_quiet() {
        let mut rng = ScriptedRandom::quiet();
        assert!(!rng.chance(1.0));
        assert_eq!(rng.pick_index(3), 0);
    }

    #[test]
    fn test_scripted_index_wraps_modulo_len() {
        let mut rng = ScriptedRandom::new(vec![], vec![7]);
        assert_eq!(rng.pick_index(3), 1);
    }

    #[test]
    fn test_entropy_chance_extremes() {
        let mut rng = EntropyRandom::new();
        assert!(rng.chance(1.0));
        assert!(!rng.chance(0.0));
        let idx = rng.pick_index(4);
        assert!(idx < 4);
    }
}
