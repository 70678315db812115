// src/quiz/shuffle.rs

//! Seeded and unseeded permutations.
//!
//! Option order inside an attempt must survive page refreshes and process
//! restarts, so it is derived from a string seed (`attemptId:questionId`)
//! with a small, fully specified PRNG instead of `rand`: FNV-1a over the
//! UTF-16 code units of the seed, mulberry32 for the stream, Fisher-Yates
//! for the permutation. Only the one-off question selection at attempt
//! creation uses real randomness.

use rand::Rng;
use rand::seq::SliceRandom;

/// FNV-1a, 32-bit, over UTF-16 code units.
pub fn hash32(seed: &str) -> u32 {
    let mut h: u32 = 0x811c_9dc5;
    for unit in seed.encode_utf16() {
        h ^= u32::from(unit);
        h = h.wrapping_mul(0x0100_0193);
    }
    h
}

/// mulberry32: tiny 32-bit PRNG yielding floats in `[0, 1)`.
#[derive(Debug, Clone)]
pub struct Mulberry32 {
    state: u32,
}

impl Mulberry32 {
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    pub fn next_f64(&mut self) -> f64 {
        self.state = self.state.wrapping_add(0x6d2b_79f5);
        let mut t = self.state;
        t = (t ^ (t >> 15)).wrapping_mul(t | 1);
        t ^= t.wrapping_add((t ^ (t >> 7)).wrapping_mul(t | 61));
        f64::from(t ^ (t >> 14)) / 4_294_967_296.0
    }
}

/// Seed for the option shuffle of one question inside one attempt.
pub fn option_seed(attempt_id: &str, question_id: &str) -> String {
    format!("{}:{}", attempt_id, question_id)
}

/// Deterministic permutation of `0..len` for `seed`.
///
/// Never the identity for `len > 1`: an identity draw is rotated by one.
pub fn seeded_permutation(len: usize, seed: &str) -> Vec<usize> {
    let mut order: Vec<usize> = (0..len).collect();
    let mut rng = Mulberry32::new(hash32(seed));
    for i in (1..len).rev() {
        let j = (rng.next_f64() * (i + 1) as f64).floor() as usize;
        order.swap(i, j);
    }
    rotate_if_identity(&mut order);
    order
}

/// Deterministic shuffle: same `(items, seed)` always gives the same output.
pub fn shuffle_seeded<T: Clone>(items: &[T], seed: &str) -> Vec<T> {
    seeded_permutation(items.len(), seed)
        .into_iter()
        .map(|i| items[i].clone())
        .collect()
}

/// Picks `count` items of `pool` uniformly at random.
///
/// The picked order is the presentation order; if it happens to equal the
/// pool's own leading order it is rotated by one.
pub fn select_random<T: Clone, R: Rng + ?Sized>(pool: &[T], count: usize, rng: &mut R) -> Vec<T> {
    let mut order: Vec<usize> = (0..pool.len()).collect();
    order.shuffle(rng);
    order.truncate(count.min(pool.len()));
    rotate_if_identity(&mut order);
    order.into_iter().map(|i| pool[i].clone()).collect()
}

fn rotate_if_identity(order: &mut [usize]) {
    if order.len() > 1 && order.iter().enumerate().all(|(pos, &i)| pos == i) {
        order.rotate_left(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn fnv_matches_reference_values() {
        assert_eq!(hash32(""), 0x811c_9dc5);
        assert_eq!(hash32("a"), 0xe40c_292c);
    }

    #[test]
    fn prng_is_reproducible_and_bounded() {
        let mut a = Mulberry32::new(42);
        let mut b = Mulberry32::new(42);
        for _ in 0..100 {
            let x = a.next_f64();
            assert_eq!(x, b.next_f64());
            assert!((0.0..1.0).contains(&x));
        }
    }

    #[test]
    fn same_seed_same_order() {
        let items: Vec<u32> = (0..8).collect();
        let first = shuffle_seeded(&items, "attempt-1:q1");
        let second = shuffle_seeded(&items, "attempt-1:q1");
        assert_eq!(first, second);
    }

    #[test]
    fn different_attempts_usually_differ() {
        let items: Vec<u32> = (0..6).collect();
        let base = shuffle_seeded(&items, "attempt-1:q1");
        let differing = (2..20)
            .filter(|n| shuffle_seeded(&items, &format!("attempt-{}:q1", n)) != base)
            .count();
        assert!(differing >= 15, "only {} seeds differed", differing);
    }

    #[test]
    fn never_identity_for_more_than_one_item() {
        for len in 2..7 {
            let items: Vec<usize> = (0..len).collect();
            for n in 0..200 {
                let out = shuffle_seeded(&items, &format!("seed-{}", n));
                assert_ne!(out, items, "identity for len {} seed {}", len, n);
            }
        }
    }

    #[test]
    fn permutation_keeps_every_item() {
        let mut order = seeded_permutation(10, "x:y");
        order.sort_unstable();
        assert_eq!(order, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn trivial_inputs() {
        assert!(shuffle_seeded::<u8>(&[], "s").is_empty());
        assert_eq!(shuffle_seeded(&[7], "s"), vec![7]);
    }

    #[test]
    fn selection_is_bounded_by_pool() {
        let mut rng = StdRng::seed_from_u64(7);
        let pool: Vec<u32> = (0..3).collect();
        let picked = select_random(&pool, 10, &mut rng);
        assert_eq!(picked.len(), 3);

        let picked = select_random(&pool, 2, &mut rng);
        assert_eq!(picked.len(), 2);
        assert_ne!(picked, vec![0, 1]);
    }
}
