//! Ordered crossover aligned to team boundaries.

use rand::Rng;

/// Produces a child genome from two parents by ordered crossover (OX),
/// cutting at team boundaries so the transplanted allele is a run of whole
/// teams.
///
/// The child starts as a copy of dad with mom's segment values deleted
/// (preserving order); the remainder is shifted to open a hole at the
/// segment position, and mom's segment is pasted in. Every value still
/// appears exactly once, so crossover of two permutations yields a
/// permutation.
///
/// `in_segment` is caller-owned scratch of length `genome_size`.
pub(crate) fn mate(
    mom: &[u32],
    dad: &[u32],
    team_sizes: &[usize],
    child: &mut [u32],
    in_segment: &mut [bool],
    rng: &mut impl Rng,
) {
    let genome_size = mom.len();
    let num_teams = team_sizes.len();

    // two distinct team boundaries delimit the allele
    let start_team = rng.gen_range(0..=num_teams);
    let mut end_team = rng.gen_range(0..=num_teams);
    while end_team == start_team {
        end_team = rng.gen_range(0..=num_teams);
    }

    // walk the team layout to the positions of those boundaries; when
    // start_team comes after end_team the segment runs from position 0
    let mut start = 0;
    let mut end = 0;
    let mut position = 0;
    for (team, &size) in team_sizes.iter().enumerate().take(end_team) {
        if team == start_team {
            start = position;
        }
        position += size;
        end = position;
    }

    in_segment.fill(false);
    for &value in &mom[start..end] {
        in_segment[value as usize] = true;
    }

    // dad minus mom's segment values, order preserved
    let mut write = 0;
    for &value in dad {
        if !in_segment[value as usize] {
            child[write] = value;
            write += 1;
        }
    }
    debug_assert_eq!(write, genome_size - (end - start));

    // open the hole and paste mom's allele
    child.copy_within(start..start + (genome_size - end), end);
    child[start..end].copy_from_slice(&mom[start..end]);
}
