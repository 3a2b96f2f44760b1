//! Data models and types for the teamup-core API.
//!
//! This module contains all the public data structures used to define a
//! team-formation problem, configure the genetic algorithm, and receive
//! results. The API is designed to be serializable (JSON) for easy
//! integration with front ends, services, and test fixtures.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Complete input specification for the team-formation optimizer.
///
/// This is the root structure that contains all information needed to run
/// an optimization: the student roster, which students to actually place
/// (the active roster), the shape of the survey data, the teaming
/// preferences, the team layout, and the genetic algorithm parameters.
///
/// # Example
///
/// ```no_run
/// use teamup_core::models::*;
///
/// let students: Vec<Student> = (0..4)
///     .map(|id| Student {
///         id,
///         attributes: vec![if id % 2 == 0 { 1 } else { 5 }],
///         ..Student::default()
///     })
///     .collect();
///
/// let input = ApiInput {
///     students,
///     active_ids: vec![0, 1, 2, 3],
///     data_options: DataOptions {
///         attributes: vec![AttributeDef { is_ordered: true, min: 1, max: 5 }],
///         ..DataOptions::default()
///     },
///     teaming_options: TeamingOptions {
///         attribute_weights: vec![1.0],
///         desire_homogeneous: vec![false],
///         incompatible_values: vec![vec![]],
///         ..TeamingOptions::default()
///     },
///     team_sizes: vec![2, 2],
///     ga: GaParams::default(),
/// };
/// ```
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ApiInput {
    /// The full roster; `students[i].id` must equal `i`
    pub students: Vec<Student>,
    /// Ids of the students to partition into teams (e.g. one course section)
    pub active_ids: Vec<usize>,
    /// Shape of the survey data shared by every student
    pub data_options: DataOptions,
    /// The teaming preferences to optimize for
    #[serde(default)]
    pub teaming_options: TeamingOptions,
    /// Ordered team sizes; must sum to `active_ids.len()`
    pub team_sizes: Vec<usize>,
    /// Genetic algorithm tuning parameters
    #[serde(default)]
    pub ga: GaParams,
}

/// A student's gender response.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Woman,
    Man,
    Nonbinary,
    Unknown,
}

impl Default for Gender {
    fn default() -> Self {
        Gender::Unknown
    }
}

/// The survey data for one student, immutable during optimization.
///
/// Peer preference sets (`required_with`, `prevented_with`,
/// `requested_with`) hold roster ids. Entries that fall outside the active
/// roster are ignored for the run.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Student {
    /// Stable id; must equal this student's index in `ApiInput::students`
    pub id: usize,
    #[serde(default)]
    pub gender: Gender,
    /// True if this student is from an underrepresented minority group
    #[serde(default)]
    pub urm: bool,
    /// One value per survey attribute: >= 1, or -1 when the response is unknown
    #[serde(default)]
    pub attributes: Vec<i32>,
    /// Row-major day x time-slot busy bitmap; true = busy during that block
    #[serde(default)]
    pub unavailable: Vec<bool>,
    /// True iff the busy bitmap is completely full or completely empty.
    /// Such schedules carry no information and are excluded from the
    /// team-availability intersection.
    #[serde(default)]
    pub ambiguous_schedule: bool,
    /// Ids of students this student must be teamed with
    #[serde(default)]
    pub required_with: Vec<usize>,
    /// Ids of students this student must not be teamed with
    #[serde(default)]
    pub prevented_with: Vec<usize>,
    /// Ids of students this student asked to be teamed with
    #[serde(default)]
    pub requested_with: Vec<usize>,
}

impl Student {
    /// Recomputes `ambiguous_schedule` from the busy bitmap.
    pub fn update_ambiguous_schedule(&mut self) {
        let busy = self.unavailable.iter().filter(|&&b| b).count();
        self.ambiguous_schedule = busy == 0 || busy == self.unavailable.len();
    }
}

/// Describes one survey attribute question.
#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct AttributeDef {
    /// True when responses have a meaningful numeric ordering; false for
    /// categorical responses
    pub is_ordered: bool,
    /// Smallest possible response value
    pub min: i32,
    /// Largest possible response value
    pub max: i32,
}

/// Shape of the ingested survey data: how many attributes exist, the
/// schedule grid dimensions, and which demographic questions were asked.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct DataOptions {
    /// One entry per attribute question
    #[serde(default)]
    pub attributes: Vec<AttributeDef>,
    /// Number of days in the availability grid (0 = no schedule question)
    #[serde(default)]
    pub num_days: usize,
    /// Number of time slots per day
    #[serde(default)]
    pub num_times: usize,
    /// Whether the survey asked for gender
    #[serde(default)]
    pub gender_included: bool,
    /// Whether the survey asked the underrepresented-minority question
    #[serde(default)]
    pub urm_included: bool,
}

impl DataOptions {
    /// True when the survey collected a usable availability grid.
    pub fn schedule_included(&self) -> bool {
        self.num_days > 0 && self.num_times > 0
    }

    /// Total number of availability slots (day count x slots per day).
    pub fn num_time_slots(&self) -> usize {
        self.num_days * self.num_times
    }
}

/// The teaming preferences to optimize for.
///
/// Weights are relative: before scoring they are normalized so that the
/// used weights sum to the number of scoring factors, which puts team
/// scores on a 0..=100 scale (with schedule extra credit above 100).
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct TeamingOptions {
    /// Relative weight of each attribute (>= 0); one entry per attribute
    pub attribute_weights: Vec<f32>,
    /// Per attribute: true = prefer similar responses within a team,
    /// false = prefer diverse responses
    pub desire_homogeneous: Vec<bool>,
    /// Per attribute: unordered response-value pairs that should not appear
    /// together on one team
    pub incompatible_values: Vec<Vec<(i32, i32)>>,
    /// Relative weight of schedule overlap (>= 0)
    pub schedule_weight: f32,
    /// A team with fewer overlapping free blocks than this is penalized
    pub min_time_blocks_overlap: u32,
    /// Overlap count that earns the full schedule score
    pub desired_time_blocks_overlap: u32,
    /// 1 = count single free slots, 2 = count pairs of consecutive free
    /// slots within one day
    pub meeting_block_size: u32,
    /// Penalize teams with exactly one woman
    pub isolated_women_prevented: bool,
    /// Penalize teams with exactly one man
    pub isolated_men_prevented: bool,
    /// Penalize teams with no women or no men
    pub single_gender_prevented: bool,
    /// Penalize teams with exactly one URM student
    pub isolated_urm_prevented: bool,
    /// How many of each student's requested teammates must be granted
    pub num_requested_teammates_given: u32,
}

impl Default for TeamingOptions {
    fn default() -> Self {
        TeamingOptions {
            attribute_weights: Vec::new(),
            desire_homogeneous: Vec::new(),
            incompatible_values: Vec::new(),
            schedule_weight: 0.0,
            min_time_blocks_overlap: 4,
            desired_time_blocks_overlap: 8,
            meeting_block_size: 1,
            isolated_women_prevented: false,
            isolated_men_prevented: false,
            single_gender_prevented: false,
            isolated_urm_prevented: false,
            num_requested_teammates_given: 1,
        }
    }
}

/// Genetic algorithm tuning parameters.
///
/// The defaults are sized for production rosters (up to a few hundred
/// students); tests and demos should shrink `population_size` and the
/// generation bounds.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct GaParams {
    /// Number of genomes per generation
    pub population_size: usize,
    /// Percent likelihood of selecting the best tournament genome as a
    /// parent; on a miss the next-best is considered with the same odds
    pub top_genome_likelihood: u32,
    /// Number of top genomes cloned unchanged into the next generation
    pub num_elites: usize,
    /// How many generations of ancestors to compare when preventing the
    /// mating of related genomes (1 = no siblings, 2 = no first cousins, ...)
    pub num_ancestor_generations: usize,
    /// Percent likelihood of a swap mutation; each mutation rolls again
    /// with the same likelihood
    pub mutation_likelihood: u32,
    /// Always optimize for at least this many generations
    pub min_generations: u64,
    /// Never optimize past this many generations per round
    pub max_generations: u64,
    /// Length of the rolling best-score window used for stability
    pub generations_of_stability: usize,
    /// Stop once best score / best-score range exceeds this
    pub min_score_stability: f32,
    /// Attach the full score vector to every Nth progress event
    /// (0 = only the final event)
    pub score_vector_cadence: u64,
    /// Seed for the algorithm RNG; `None` seeds from entropy
    pub rng_seed: Option<u64>,
}

impl GaParams {
    /// Tournament size derived from the population size.
    pub fn tournament_size(&self) -> usize {
        (self.population_size / 500).max(2)
    }
}

impl Default for GaParams {
    fn default() -> Self {
        GaParams {
            population_size: 30_000,
            top_genome_likelihood: 33,
            num_elites: 3,
            num_ancestor_generations: 3,
            mutation_likelihood: 50,
            min_generations: 40,
            max_generations: 500,
            generations_of_stability: 25,
            min_score_stability: 100.0,
            score_vector_cadence: 10,
            rng_seed: None,
        }
    }
}

/// Progress report emitted once per generation during optimization.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ProgressUpdate {
    /// Completed generation count
    pub generation: u64,
    /// Score of the best genome so far
    pub best_score: f32,
    /// Best score divided by the best-score range over the stability window
    pub score_stability: f32,
    /// Full population score vector; attached per `score_vector_cadence`
    pub scores: Option<Vec<f32>>,
    /// Population indices sorted best-first; attached alongside `scores`
    pub ordered_index: Option<Vec<u32>>,
    /// True when the run has met its termination conditions. Returning
    /// `true` from the callback for a final event requests another
    /// optimization round.
    pub final_event: bool,
}

/// Callback receiving progress updates during optimization.
///
/// For regular events the return value answers "keep going?": returning
/// `false` requests cancellation, like [`CancelHandle::cancel`]. For final
/// events (termination conditions met) returning `true` requests a further
/// round of optimization and `false` accepts the result.
pub type ProgressCallback = Box<dyn Fn(&ProgressUpdate) -> bool + Send>;

/// Cooperative cancellation handle for an optimization run.
///
/// Clone the handle, hand one copy to the optimizer, and call
/// [`cancel`](CancelHandle::cancel) from any thread. The optimizer checks
/// the flag once per generation and returns the best genome found so far.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests that the optimizer stop after the current generation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Clears the flag so the handle can be reused for another run.
    pub fn clear(&self) {
        self.flag.store(false, Ordering::Relaxed);
    }
}

/// One team in a finished assignment.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Team {
    /// Roster ids of the teammates
    pub student_ids: Vec<usize>,
    /// This team's score on the 0..=100 scale (plus schedule extra credit)
    pub score: f32,
}

/// The result returned by the optimizer: the best team assignment found,
/// with per-team and aggregate scores.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TeamSet {
    pub teams: Vec<Team>,
    /// Aggregate score (harmonic mean of team scores, or the punished
    /// arithmetic mean when any team scored <= 0)
    pub final_score: f32,
    /// Number of generations the optimizer ran
    pub generations: u64,
}

impl TeamSet {
    /// Formats the assignment as a human-readable string, one team per line.
    ///
    /// # Example Output
    ///
    /// ```text
    /// Team 1 (score 100.00): 0, 3
    /// Team 2 (score 100.00): 1, 2
    /// Total score: 100.00
    /// ```
    pub fn display(&self) -> String {
        let mut output = String::new();
        for (team_num, team) in self.teams.iter().enumerate() {
            let members = team
                .student_ids
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            output.push_str(&format!(
                "Team {} (score {:.2}): {}\n",
                team_num + 1,
                team.score,
                members
            ));
        }
        output.push_str(&format!("Total score: {:.2}\n", self.final_score));
        output
    }
}
