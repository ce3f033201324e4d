//! 7-bag randomizer for piece generation
//!
//! All 7 kinds are shuffled and dealt out before reshuffling, which prevents
//! long droughts. Seeded so a board can be replayed in tests.

use crate::tetromino::ShapeKind;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::VecDeque;

/// The 7-bag piece randomizer
#[derive(Debug, Clone)]
pub struct Bag {
    queue: VecDeque<ShapeKind>,
    rng: ChaCha8Rng,
}

impl Bag {
    /// Create a bag from a seed
    pub fn with_seed(seed: u64) -> Self {
        let mut bag = Self {
            queue: VecDeque::with_capacity(14),
            rng: ChaCha8Rng::seed_from_u64(seed),
        };
        bag.refill();
        bag
    }

    /// Deal the next kind
    pub fn next(&mut self) -> ShapeKind {
        if self.queue.len() <= 1 {
            self.refill();
        }
        self.queue.pop_front().unwrap_or(ShapeKind::T)
    }

    /// Refill the queue with a new shuffled bag
    fn refill(&mut self) {
        let mut new_bag = ShapeKind::all();
        new_bag.shuffle(&mut self.rng);
        self.queue.extend(new_bag);
    }
}
