//! Tournament selection of parent genomes with ancestor-based incest
//! avoidance.

use super::ancestry::{self, AncestryLayout};
use rand::Rng;

/// Selects two parents from the population and writes the child's ancestor
/// record. Returns the population slots of (mom, dad).
///
/// A tournament of `tournament_size` genomes is sampled uniformly (with
/// replacement) and sorted best-first. Each parent's rank is found by
/// walking down from rank 0, stopping at each rank with
/// `top_genome_likelihood` percent probability; dad may not land on mom's
/// rank. If the pair shares an ancestor within any tracked generation,
/// dad's rank is advanced (wrapping) and retested, giving up after one
/// full lap so tiny or deeply inbred tournaments cannot loop forever.
pub(crate) fn tournament_select_parents(
    scores: &[f32],
    ancestors: &[u32],
    layout: &AncestryLayout,
    tournament_size: usize,
    top_genome_likelihood: u32,
    child_ancestry: &mut [u32],
    rng: &mut impl Rng,
) -> (usize, usize) {
    let population_size = scores.len();

    // sample the tournament: (population slot, score)
    let mut players: Vec<(u32, f32)> = (0..tournament_size)
        .map(|_| {
            let pick = rng.gen_range(0..population_size);
            (pick as u32, scores[pick])
        })
        .collect();
    players.sort_unstable_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let mom_rank = pick_rank(tournament_size, top_genome_likelihood, None, rng);
    let mut dad_rank = pick_rank(tournament_size, top_genome_likelihood, Some(mom_rank), rng);

    let ancestry_of =
        |slot: u32| &ancestors[slot as usize * layout.len..(slot as usize + 1) * layout.len];

    let mom_slot = players[mom_rank].0;
    let mut attempts = 0;
    while attempts < tournament_size
        && ancestry::related(layout, ancestry_of(mom_slot), ancestry_of(players[dad_rank].0))
    {
        dad_rank = (dad_rank + 1) % tournament_size;
        attempts += 1;
    }
    let dad_slot = players[dad_rank].0;

    ancestry::fill_child(
        layout,
        mom_slot,
        dad_slot,
        ancestry_of(mom_slot),
        ancestry_of(dad_slot),
        child_ancestry,
    );

    (mom_slot as usize, dad_slot as usize)
}

/// Walks down the tournament ranking, stopping at each rank with
/// `top_likelihood` percent probability; the walk wraps modulo the
/// tournament size. `exclude` forbids one rank (used to keep dad off mom's
/// rank). A likelihood of 0 never stops, so it is treated as its limiting
/// distribution: a uniform pick over the tournament.
pub(crate) fn pick_rank(
    tournament_size: usize,
    top_likelihood: u32,
    exclude: Option<usize>,
    rng: &mut impl Rng,
) -> usize {
    if top_likelihood == 0 {
        loop {
            let rank = rng.gen_range(0..tournament_size);
            if exclude != Some(rank) {
                return rank;
            }
        }
    }
    let mut rank = 0usize;
    while rng.gen_range(1..=100u32) > top_likelihood || exclude == Some(rank % tournament_size) {
        rank += 1;
    }
    rank % tournament_size
}
