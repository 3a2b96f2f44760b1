//! Swap mutation.

use rand::Rng;

/// Swaps the values at two uniformly chosen genome positions. The driver
/// applies this repeatedly, rolling the mutation likelihood again after
/// each swap.
pub(crate) fn mutate(genome: &mut [u32], rng: &mut impl Rng) {
    let a = rng.gen_range(0..genome.len());
    let b = rng.gen_range(0..genome.len());
    genome.swap(a, b);
}
