//! Winner and prize sampling. Both functions insist on a cryptographically secure
//! generator so a seeded or predictable source cannot be passed in.

use rand::seq::index;
use rand::{CryptoRng, Rng};

/// Draws `count` distinct positions out of `population`, clamped to the population.
/// Every subset of the clamped size is equally likely.
pub fn pick_winner_indices<R>(population: usize, count: usize, rng: &mut R) -> Vec<usize>
where
    R: Rng + CryptoRng + ?Sized,
{
    let amount = count.min(population);
    if amount == 0 {
        return Vec::new();
    }
    index::sample(rng, population, amount).into_vec()
}

/// Removes and returns one uniformly chosen prize, or `None` when none are left.
pub fn take_prize<R>(prizes: &mut Vec<String>, rng: &mut R) -> Option<String>
where
    R: Rng + CryptoRng + ?Sized,
{
    if prizes.is_empty() {
        return None;
    }
    let i = rng.gen_range(0..prizes.len());
    Some(prizes.swap_remove(i))
}
