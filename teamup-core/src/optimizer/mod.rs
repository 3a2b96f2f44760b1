//! Genetic-algorithm optimizer state and driver.
//!
//! This module contains the `GaState` struct owning all mutable state of a
//! run: the double-buffered gene pool and ancestry records, the score
//! vector, and the master RNG. The read-only problem data is compiled once
//! into a `Problem` (compact integer indices, normalized weights,
//! preprocessed peer sets) so that per-genome scoring touches no strings,
//! maps, or locks.
//!
//! Within a generation, scoring fans out across a rayon pool with one
//! scratch buffer per worker; selection, mating, and mutation run on the
//! driver thread where their data dependencies keep sequential code
//! simpler.

mod ancestry;
mod construction;
mod crossover;
mod mutation;
mod scoring;
mod selection;

use crate::models::{
    ApiInput, AttributeDef, CancelHandle, GaParams, Gender, ProgressCallback, ProgressUpdate,
    Team, TeamSet,
};
use ancestry::AncestryLayout;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use scoring::ScoreScratch;
use serde::Serialize;
use std::cmp::Ordering;
use thiserror::Error;

/// Errors raised while validating an optimization request.
///
/// The core has a closed input domain, so every variant is a contract
/// violation by the caller; nothing here occurs once a run has started.
#[derive(Error, Debug, Serialize)]
pub enum GaError {
    #[error("at least 4 students are required to form teams, got {0}")]
    InsufficientStudents(usize),
    #[error("team sizes sum to {sum} but the active roster has {num_students} students")]
    TeamSizeMismatch { sum: usize, num_students: usize },
    #[error("team {0} has size 0")]
    EmptyTeam(usize),
    #[error("attribute {0} has a negative weight")]
    NegativeWeight(usize),
    #[error("the schedule weight is negative")]
    NegativeScheduleWeight,
    #[error("minimum schedule overlap {min} exceeds desired overlap {desired}")]
    OverlapBoundsInverted { min: u32, desired: u32 },
    #[error("attribute {0} has max < min")]
    AttributeRangeInverted(usize),
    #[error("meeting block size must be 1 or 2, got {0}")]
    InvalidMeetingBlockSize(u32),
    #[error("desired schedule overlap must be positive when schedule scoring is enabled")]
    ZeroDesiredOverlap,
    #[error("student at roster index {index} has id {id}; ids must match roster order")]
    RosterIdMismatch { index: usize, id: usize },
    #[error("active id {0} is not in the roster")]
    UnknownActiveId(usize),
    #[error("active roster contains duplicate id {0}")]
    DuplicateActiveId(usize),
    #[error("student {id} has {got} attribute values, expected {expected}")]
    AttributeCountMismatch {
        id: usize,
        got: usize,
        expected: usize,
    },
    #[error("student {id} has {got} schedule slots, expected {expected}")]
    ScheduleSizeMismatch {
        id: usize,
        got: usize,
        expected: usize,
    },
    #[error("teaming options cover {got} attributes, expected {expected}")]
    OptionArityMismatch { got: usize, expected: usize },
    #[error("population size must be at least 2, got {0}")]
    PopulationTooSmall(usize),
    #[error("assignment is not a permutation of the active roster")]
    InvalidAssignment,
}

/// Read-only problem data, compiled from [`ApiInput`] into compact
/// integer-indexed form.
///
/// Students are renumbered 0..N in active-roster order; genomes hold these
/// compact indices and `active_ids` maps them back to roster ids. Peer
/// sets are filtered to the active roster, translated, and sorted for
/// binary-search membership tests.
#[derive(Debug, Clone)]
pub(crate) struct Problem {
    pub(crate) num_students: usize,
    pub(crate) num_attributes: usize,
    pub(crate) num_days: usize,
    pub(crate) num_times: usize,
    pub(crate) team_sizes: Vec<usize>,
    /// Compact index -> roster id
    pub(crate) active_ids: Vec<usize>,

    // per-student data, compact-indexed
    pub(crate) gender: Vec<Gender>,
    pub(crate) urm: Vec<bool>,
    /// Flat `num_students x num_attributes`
    pub(crate) attributes: Vec<i32>,
    /// Flat `num_students x num_time_slots` busy bitmap
    pub(crate) unavailable: Vec<bool>,
    pub(crate) ambiguous_schedule: Vec<bool>,
    /// Sorted compact ids; directional (i requires j)
    pub(crate) required_with: Vec<Vec<u32>>,
    /// Sorted compact ids; symmetrized so either direction of input is caught
    pub(crate) prevented_with: Vec<Vec<u32>>,
    /// Sorted compact ids; directional (i requested j)
    pub(crate) requested_with: Vec<Vec<u32>>,
    pub(crate) have_any_required: bool,
    pub(crate) have_any_prevented: bool,
    pub(crate) have_any_requested: bool,

    // scoring configuration
    pub(crate) attribute_defs: Vec<AttributeDef>,
    /// Attribute participates in scoring: weight > 0 or has incompatible pairs
    pub(crate) attribute_active: Vec<bool>,
    /// Normalized weights: raw weight x (factors / total weight)
    pub(crate) real_attribute_weights: Vec<f32>,
    pub(crate) real_schedule_weight: f32,
    /// Number of scoring factors F (attributes + schedule), floored at 1
    pub(crate) num_scoring_factors: f32,
    pub(crate) desire_homogeneous: Vec<bool>,
    pub(crate) incompatible_values: Vec<Vec<(i32, i32)>>,
    pub(crate) gender_included: bool,
    pub(crate) urm_included: bool,
    pub(crate) isolated_women_prevented: bool,
    pub(crate) isolated_men_prevented: bool,
    pub(crate) single_gender_prevented: bool,
    pub(crate) isolated_urm_prevented: bool,
    pub(crate) min_time_blocks_overlap: u32,
    pub(crate) desired_time_blocks_overlap: u32,
    pub(crate) meeting_block_size: u32,
    pub(crate) num_requested_teammates_given: u32,
}

impl Problem {
    /// Builds a [`TeamSet`] from a genome, mapping compact indices back to
    /// roster ids and slicing by the team layout.
    pub(crate) fn team_set(
        &self,
        genome: &[u32],
        total: f32,
        per_team: &[f32],
        generations: u64,
    ) -> TeamSet {
        let mut teams = Vec::with_capacity(self.team_sizes.len());
        let mut pos = 0;
        for (team, &size) in self.team_sizes.iter().enumerate() {
            let student_ids = genome[pos..pos + size]
                .iter()
                .map(|&idx| self.active_ids[idx as usize])
                .collect();
            teams.push(Team {
                student_ids,
                score: per_team[team],
            });
            pos += size;
        }
        TeamSet {
            teams,
            final_score: total,
            generations,
        }
    }
}

/// The complete mutable state of one optimization run.
///
/// All buffers are preallocated; generations swap the two pool/ancestry
/// buffers instead of reallocating. The state is created by
/// [`GaState::new`] and discarded when the run returns.
pub struct GaState {
    pub(crate) problem: Problem,
    pub(crate) ga: GaParams,
    pub(crate) ancestry: AncestryLayout,

    /// Flat `population_size x num_students` genome buffer
    pub(crate) gene_pool: Vec<u32>,
    pub(crate) next_pool: Vec<u32>,
    /// Flat `population_size x ancestry.len` ancestor records
    pub(crate) ancestors: Vec<u32>,
    pub(crate) next_ancestors: Vec<u32>,
    pub(crate) scores: Vec<f32>,
    /// Population indices sorted best-first after each scoring pass
    pub(crate) ordered_index: Vec<u32>,
    /// Ring buffer of the best score over the last
    /// `generations_of_stability` generations
    pub(crate) best_history: Vec<f32>,
    pub(crate) generation: u64,
    pub(crate) rng: StdRng,

    // driver-thread scratch for mating
    child: Vec<u32>,
    in_segment: Vec<bool>,
}

impl GaState {
    /// Validates the input and builds the initial population.
    /// See `construction.rs`.
    pub fn new(input: &ApiInput) -> Result<Self, GaError> {
        construction::build(input)
    }

    /// Runs the optimization loop to completion and returns the best team
    /// assignment found.
    ///
    /// The loop structure allows the caller to extend a run: when the
    /// termination conditions are met, a final progress event is emitted,
    /// and a callback returning `true` for it starts another round. With no
    /// callback the run ends at the first natural termination.
    pub fn run(
        &mut self,
        progress: Option<&ProgressCallback>,
        cancel: Option<&CancelHandle>,
    ) -> TeamSet {
        let num_teams = self.problem.team_sizes.len();
        info!(
            "starting optimization: {} students, {} teams, population {}",
            self.problem.num_students,
            num_teams,
            self.ga.population_size
        );

        self.score_population();
        self.sort_by_score();

        let mut halted = false;
        if let Some(cb) = progress {
            if !cb(&self.progress_update(0.0, false)) {
                halted = true;
            }
        }

        let externally_cancelled =
            |cancel: Option<&CancelHandle>| cancel.map_or(false, |c| c.is_cancelled());

        loop {
            // one round: keep stepping until stability, the generation
            // bounds, or a stop request
            loop {
                self.step();
                let stability = self.score_stability();
                debug!(
                    "generation {}: best {:.2}, stability {:.1}",
                    self.generation,
                    self.best_score(),
                    stability
                );
                if let Some(cb) = progress {
                    if !cb(&self.progress_update(stability, false)) {
                        halted = true;
                    }
                }
                if halted || externally_cancelled(cancel) {
                    break;
                }
                if self.generation >= self.ga.min_generations
                    && (self.generation >= self.ga.max_generations
                        || stability >= self.ga.min_score_stability)
                {
                    break;
                }
            }

            let stability = self.score_stability();
            let another_round = progress
                .map(|cb| cb(&self.progress_update(stability, true)))
                .unwrap_or(false);
            if halted || externally_cancelled(cancel) || !another_round {
                break;
            }
        }

        let result = self.best_team_set();
        info!(
            "optimization finished after {} generations (score {:.2})",
            result.generations, result.final_score
        );
        result
    }

    /// Advances the population by one generation: elitism, selection,
    /// mating, mutation, buffer swap, parallel scoring, and ranking.
    pub(crate) fn step(&mut self) {
        let n = self.problem.num_students;
        let p = self.ga.population_size;
        let al = self.ancestry.len;
        let num_elites = self.ga.num_elites.min(p);
        let tournament_size = self.ga.tournament_size().min(p);

        // clone the elites unchanged, ancestry and all
        for slot in 0..num_elites {
            let src = self.ordered_index[slot] as usize;
            self.next_pool[slot * n..(slot + 1) * n]
                .copy_from_slice(&self.gene_pool[src * n..(src + 1) * n]);
            self.next_ancestors[slot * al..(slot + 1) * al]
                .copy_from_slice(&self.ancestors[src * al..(src + 1) * al]);
        }

        // fill the rest of the next generation by mating
        for slot in num_elites..p {
            let (mom, dad) = selection::tournament_select_parents(
                &self.scores,
                &self.ancestors,
                &self.ancestry,
                tournament_size,
                self.ga.top_genome_likelihood,
                &mut self.next_ancestors[slot * al..(slot + 1) * al],
                &mut self.rng,
            );
            crossover::mate(
                &self.gene_pool[mom * n..(mom + 1) * n],
                &self.gene_pool[dad * n..(dad + 1) * n],
                &self.problem.team_sizes,
                &mut self.child,
                &mut self.in_segment,
                &mut self.rng,
            );
            self.next_pool[slot * n..(slot + 1) * n].copy_from_slice(&self.child);
        }

        // mutate everything except the best elite; each mutation rolls again
        for slot in 1..p {
            while self.rng.gen_range(1..=100u32) < self.ga.mutation_likelihood {
                mutation::mutate(&mut self.next_pool[slot * n..(slot + 1) * n], &mut self.rng);
            }
        }

        std::mem::swap(&mut self.gene_pool, &mut self.next_pool);
        std::mem::swap(&mut self.ancestors, &mut self.next_ancestors);
        self.generation += 1;

        self.score_population();
        self.sort_by_score();

        let window = self.best_history.len();
        self.best_history[self.generation as usize % window] = self.best_score();
    }

    /// Scores every genome in parallel. Writes go to disjoint score
    /// entries; each rayon worker owns one scratch buffer.
    pub(crate) fn score_population(&mut self) {
        let n = self.problem.num_students;
        let problem = &self.problem;
        self.scores
            .par_iter_mut()
            .zip(self.gene_pool.par_chunks(n))
            .for_each_init(
                || ScoreScratch::new(problem),
                |scratch, (score, genome)| {
                    *score = problem.score_genome(genome, scratch);
                },
            );
    }

    pub(crate) fn sort_by_score(&mut self) {
        let scores = &self.scores;
        self.ordered_index.sort_unstable_by(|&i, &j| {
            scores[j as usize]
                .partial_cmp(&scores[i as usize])
                .unwrap_or(Ordering::Equal)
        });
    }

    pub(crate) fn best_score(&self) -> f32 {
        self.scores[self.ordered_index[0] as usize]
    }

    /// Best score divided by the range of best scores over the stability
    /// window; a flat window substitutes a tiny range to keep the value
    /// finite.
    pub(crate) fn score_stability(&self) -> f32 {
        let best = self.best_score();
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        for &score in &self.best_history {
            min = min.min(score);
            max = max.max(score);
        }
        if max == min {
            best / 1e-4
        } else {
            best / (max - min)
        }
    }

    fn progress_update(&self, score_stability: f32, final_event: bool) -> ProgressUpdate {
        let cadence = self.ga.score_vector_cadence;
        let include_vectors = final_event || (cadence > 0 && self.generation % cadence == 0);
        ProgressUpdate {
            generation: self.generation,
            best_score: self.best_score(),
            score_stability,
            scores: include_vectors.then(|| self.scores.clone()),
            ordered_index: include_vectors.then(|| self.ordered_index.clone()),
            final_event,
        }
    }

    /// Rescores the best genome per team and packages the result.
    pub(crate) fn best_team_set(&self) -> TeamSet {
        let n = self.problem.num_students;
        let best = self.ordered_index[0] as usize;
        let genome = &self.gene_pool[best * n..(best + 1) * n];
        let (total, per_team) = self.problem.score_teams(genome);
        self.problem.team_set(genome, total, &per_team, self.generation)
    }
}

/// Seeds the master RNG from the configured seed or from entropy.
pub(crate) fn master_rng(params: &GaParams) -> StdRng {
    match params.rng_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}
