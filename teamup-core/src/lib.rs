//! # teamup-core: team-formation optimization engine
//!
//! This crate partitions a roster of students into teams that satisfy a
//! set of teaming preferences (attribute diversity or homogeneity,
//! schedule overlap, demographic-isolation avoidance, and
//! required/prevented/requested teammate pairings) by optimizing a
//! composite team score with a parallel genetic algorithm.
//!
//! A team assignment is a fixed-length permutation of the active student
//! ids, partitioned positionally by the team layout. Each generation the
//! whole population is scored in parallel, parents are chosen by
//! tournament selection (with ancestor tracking to avoid inbreeding),
//! children are produced by ordered crossover cut at team boundaries, and
//! swap mutation perturbs everything but the best genome.
//!
//! ## Quick Example
//!
//! ```no_run
//! use teamup_core::{run_optimizer, models::*};
//!
//! let students: Vec<Student> = (0..4)
//!     .map(|id| Student {
//!         id,
//!         attributes: vec![if id % 2 == 0 { 1 } else { 5 }],
//!         ..Student::default()
//!     })
//!     .collect();
//!
//! let input = ApiInput {
//!     students,
//!     active_ids: vec![0, 1, 2, 3],
//!     data_options: DataOptions {
//!         attributes: vec![AttributeDef { is_ordered: true, min: 1, max: 5 }],
//!         ..DataOptions::default()
//!     },
//!     teaming_options: TeamingOptions {
//!         attribute_weights: vec![1.0],
//!         desire_homogeneous: vec![false],
//!         incompatible_values: vec![vec![]],
//!         ..TeamingOptions::default()
//!     },
//!     team_sizes: vec![2, 2],
//!     ga: GaParams { population_size: 200, ..GaParams::default() },
//! };
//!
//! match run_optimizer(&input) {
//!     Ok(result) => {
//!         println!("Score: {}", result.final_score);
//!         print!("{}", result.display());
//!     }
//!     Err(e) => eprintln!("Error: {e}"),
//! }
//! ```

use crate::models::{ApiInput, CancelHandle, ProgressCallback, TeamSet};
use crate::optimizer::{GaError, GaState, Problem};

pub mod models;
pub mod optimizer;

/// Runs the optimizer with the given input and returns the best team
/// assignment found.
///
/// This is the main entry point for the library. The run ends when the
/// score has been stable for the configured number of generations (after
/// the minimum generation count) or when the maximum generation count is
/// reached.
///
/// # Errors
///
/// Returns a [`GaError`] when the input violates a contract: too few
/// students, a team layout that does not cover the active roster, negative
/// weights, inverted bounds, or per-student data whose shape disagrees
/// with `DataOptions`. Nothing fails once the run has started.
pub fn run_optimizer(input: &ApiInput) -> Result<TeamSet, GaError> {
    run_optimizer_with_progress(input, None, None)
}

/// Runs the optimizer with progress reporting and cooperative
/// cancellation.
///
/// The callback is invoked once per generation. Returning `false` from a
/// regular event requests cancellation; the optimizer finishes the current
/// generation and returns the best assignment found so far (cancellation
/// is not an error). Returning `true` from a *final* event (one with
/// `final_event` set) asks for another round of optimization beyond the
/// natural termination point.
///
/// The cancel handle does the same job as returning `false`, but from any
/// thread.
pub fn run_optimizer_with_progress(
    input: &ApiInput,
    progress: Option<&ProgressCallback>,
    cancel: Option<&CancelHandle>,
) -> Result<TeamSet, GaError> {
    let mut state = GaState::new(input)?;
    Ok(state.run(progress, cancel))
}

/// Scores an existing team assignment without optimizing.
///
/// `assignment` is a permutation of the active roster ids, partitioned by
/// `input.team_sizes` exactly like an optimizer result. Useful for
/// evaluating hand-edited or previously saved assignments against the
/// current teaming options.
pub fn evaluate_assignment(input: &ApiInput, assignment: &[usize]) -> Result<TeamSet, GaError> {
    let problem = Problem::compile(input)?;
    let genome = problem.compact_assignment(assignment)?;
    let (total, per_team) = problem.score_teams(&genome);
    Ok(problem.team_set(&genome, total, &per_team, 0))
}

#[cfg(test)]
mod callback_tests {
    use super::*;
    use crate::models::*;
    use std::sync::{Arc, Mutex};

    fn small_input() -> ApiInput {
        let students: Vec<Student> = (0..8)
            .map(|id| Student {
                id,
                attributes: vec![(id % 4) as i32 + 1],
                ..Student::default()
            })
            .collect();
        ApiInput {
            students,
            active_ids: (0..8).collect(),
            data_options: DataOptions {
                attributes: vec![AttributeDef {
                    is_ordered: true,
                    min: 1,
                    max: 4,
                }],
                ..DataOptions::default()
            },
            teaming_options: TeamingOptions {
                attribute_weights: vec![1.0],
                desire_homogeneous: vec![false],
                incompatible_values: vec![vec![]],
                ..TeamingOptions::default()
            },
            team_sizes: vec![4, 4],
            ga: GaParams {
                population_size: 100,
                min_generations: 5,
                max_generations: 20,
                generations_of_stability: 5,
                rng_seed: Some(42),
                ..GaParams::default()
            },
        }
    }

    #[test]
    fn final_callback_matches_result() {
        let input = small_input();
        let updates = Arc::new(Mutex::new(Vec::new()));
        let updates_clone = Arc::clone(&updates);
        let callback: ProgressCallback = Box::new(move |update: &ProgressUpdate| {
            updates_clone.lock().unwrap().push(update.clone());
            !update.final_event
        });

        let result = run_optimizer_with_progress(&input, Some(&callback), None).unwrap();
        let updates = updates.lock().unwrap();

        assert!(!updates.is_empty(), "should have received progress updates");
        let last = updates.last().unwrap();
        assert!(last.final_event);
        assert_eq!(last.generation, result.generations);
        assert_eq!(last.best_score, result.final_score);
        // the final event always carries the score vectors
        assert!(last.scores.is_some());
        assert!(last.ordered_index.is_some());
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let input = small_input();
        let first = run_optimizer(&input).unwrap();
        let second = run_optimizer(&input).unwrap();
        assert_eq!(first.final_score, second.final_score);
        assert_eq!(first.generations, second.generations);
        for (a, b) in first.teams.iter().zip(&second.teams) {
            assert_eq!(a.student_ids, b.student_ids);
        }
    }

    #[test]
    fn callback_false_cancels_early() {
        let mut input = small_input();
        input.ga.min_generations = 50;
        input.ga.max_generations = 500;
        let callback: ProgressCallback = Box::new(|update: &ProgressUpdate| update.generation < 3);
        let result = run_optimizer_with_progress(&input, Some(&callback), None).unwrap();
        assert!(result.generations >= 3);
        assert!(result.generations < 50);
    }

    #[test]
    fn cancel_handle_stops_the_run() {
        let mut input = small_input();
        input.ga.min_generations = 500;
        input.ga.max_generations = 1000;
        let cancel = CancelHandle::new();
        cancel.cancel();
        let result = run_optimizer_with_progress(&input, None, Some(&cancel)).unwrap();
        // the flag was set before the run, so one generation completes and
        // the best-so-far comes back
        assert_eq!(result.generations, 1);
    }

    #[test]
    fn final_event_true_extends_the_run() {
        let mut input = small_input();
        input.ga.min_generations = 2;
        input.ga.max_generations = 4;
        let rounds = Arc::new(Mutex::new(0u32));
        let rounds_clone = Arc::clone(&rounds);
        let callback: ProgressCallback = Box::new(move |update: &ProgressUpdate| {
            if update.final_event {
                let mut rounds = rounds_clone.lock().unwrap();
                *rounds += 1;
                *rounds < 3
            } else {
                true
            }
        });
        let result = run_optimizer_with_progress(&input, Some(&callback), None).unwrap();
        assert_eq!(*rounds.lock().unwrap(), 3);
        // each extra round steps at least one generation past max_generations
        assert!(result.generations > 4);
    }
}
