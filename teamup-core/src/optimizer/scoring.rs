//! Team scoring: the multi-criterion objective of the optimizer.
//!
//! Scoring is a pure function of (genome, problem data); each rayon worker
//! owns one [`ScoreScratch`] so the hot path allocates nothing and takes
//! no locks. Team membership is positional: the first `team_sizes[0]`
//! genome entries form team 0, and so on.

use super::{Gender, Problem};

/// Per-worker scratch buffers for one scoring pass.
pub(crate) struct ScoreScratch {
    pub(crate) team_scores: Vec<f32>,
    /// Flat `num_attributes x num_teams`
    attribute_scores: Vec<f32>,
    sched_scores: Vec<f32>,
    penalty_points: Vec<i32>,
    /// Team availability bitmap, one entry per time slot
    availability: Vec<bool>,
    /// Attribute values seen on one team, sorted and deduplicated
    values: Vec<i32>,
}

impl ScoreScratch {
    pub(crate) fn new(problem: &Problem) -> Self {
        let num_teams = problem.team_sizes.len();
        ScoreScratch {
            team_scores: vec![0.0; num_teams],
            attribute_scores: vec![0.0; problem.num_attributes * num_teams],
            sched_scores: vec![0.0; num_teams],
            penalty_points: vec![0; num_teams],
            availability: vec![true; problem.num_days * problem.num_times],
            values: Vec::new(),
        }
    }

    fn reset(&mut self) {
        self.team_scores.fill(0.0);
        self.attribute_scores.fill(0.0);
        self.sched_scores.fill(0.0);
        self.penalty_points.fill(0);
    }
}

impl Problem {
    /// Scores one genome, returning the aggregate score.
    pub(crate) fn score_genome(&self, genome: &[u32], scratch: &mut ScoreScratch) -> f32 {
        self.fill_team_scores(genome, scratch);
        aggregate_score(&scratch.team_scores)
    }

    /// Scores one genome, returning the aggregate and the per-team scores.
    /// Allocates its own scratch; intended for results and tests, not the
    /// optimization hot path.
    pub(crate) fn score_teams(&self, genome: &[u32]) -> (f32, Vec<f32>) {
        let mut scratch = ScoreScratch::new(self);
        self.fill_team_scores(genome, &mut scratch);
        let total = aggregate_score(&scratch.team_scores);
        (total, scratch.team_scores.clone())
    }

    fn fill_team_scores(&self, genome: &[u32], scratch: &mut ScoreScratch) {
        scratch.reset();
        self.score_attributes(genome, scratch);
        self.score_schedule(genome, scratch);
        self.score_genders(genome, scratch);
        self.score_urm(genome, scratch);
        self.score_required_teammates(genome, scratch);
        self.score_prevented_teammates(genome, scratch);
        self.score_requested_teammates(genome, scratch);
        self.assemble_team_scores(scratch);
    }

    /// Attribute diversity/homogeneity scores plus incompatible-response
    /// penalties, per attribute per team.
    fn score_attributes(&self, genome: &[u32], scratch: &mut ScoreScratch) {
        let num_teams = self.team_sizes.len();
        for attrib in 0..self.num_attributes {
            if !self.attribute_active[attrib] {
                continue;
            }
            let incompatible = &self.incompatible_values[attrib];
            let weight = self.real_attribute_weights[attrib];
            let def = self.attribute_defs[attrib];

            let mut pos = 0;
            for (team, &size) in self.team_sizes.iter().enumerate() {
                // gather the distinct attribute values held by the team
                scratch.values.clear();
                for &member in &genome[pos..pos + size] {
                    scratch
                        .values
                        .push(self.attributes[member as usize * self.num_attributes + attrib]);
                }
                pos += size;
                scratch.values.sort_unstable();
                scratch.values.dedup();

                // one penalty per incompatible pair present on the team
                for &(u, v) in incompatible {
                    if scratch.values.binary_search(&u).is_ok()
                        && scratch.values.binary_search(&v).is_ok()
                    {
                        scratch.penalty_points[team] += 1;
                    }
                }

                if weight > 0.0 {
                    // unknown responses carry no information
                    if scratch.values.first() == Some(&-1) {
                        scratch.values.remove(0);
                    }
                    if !scratch.values.is_empty() {
                        let lo = scratch.values[0];
                        let hi = scratch.values[scratch.values.len() - 1];
                        let range = if def.is_ordered {
                            (hi - lo) as f32
                        } else {
                            (scratch.values.len() - 1) as f32
                        };
                        let mut raw = range / (def.max - def.min) as f32;
                        if self.desire_homogeneous[attrib] {
                            raw = 1.0 - raw;
                        }
                        scratch.attribute_scores[attrib * num_teams + team] = raw * weight;
                    }
                }
            }
        }
    }

    /// Schedule overlap score per team, from the intersection of the
    /// members' availability.
    fn score_schedule(&self, genome: &[u32], scratch: &mut ScoreScratch) {
        if self.real_schedule_weight <= 0.0 {
            return;
        }
        let num_slots = self.num_days * self.num_times;
        let desired = self.desired_time_blocks_overlap as f32;

        let mut pos = 0;
        for (team, &size) in self.team_sizes.iter().enumerate() {
            let members = &genome[pos..pos + size];
            pos += size;

            // intersect availability; ambiguous schedules are treated as
            // all-free so they cannot constrain the team
            scratch.availability.fill(true);
            let mut num_ambiguous = 0;
            for &member in members {
                let member = member as usize;
                if self.ambiguous_schedule[member] {
                    num_ambiguous += 1;
                    continue;
                }
                let busy = &self.unavailable[member * num_slots..(member + 1) * num_slots];
                for (slot, &is_busy) in busy.iter().enumerate() {
                    if is_busy {
                        scratch.availability[slot] = false;
                    }
                }
            }

            // keep the score at 0 when too few members have real
            // schedules, so the optimizer cannot pile ambiguous students
            // together for a free score
            let non_ambiguous = size - num_ambiguous;
            if size > 2 && non_ambiguous < size - 2 {
                continue;
            }

            let overlap = if self.meeting_block_size == 1 {
                scratch.availability.iter().filter(|&&free| free).count()
            } else {
                self.count_meeting_blocks(&scratch.availability)
            } as f32;

            let normalized = if overlap > desired {
                // extra credit: 1/6 value for overlap beyond the desired amount
                1.0 + (overlap - desired) / (6.0 * desired)
            } else if overlap >= self.min_time_blocks_overlap as f32 {
                overlap / desired
            } else {
                scratch.penalty_points[team] += 1;
                0.0
            };
            scratch.sched_scores[team] = normalized * self.real_schedule_weight;
        }
    }

    /// Counts non-overlapping pairs of consecutive free slots, never
    /// crossing a day boundary.
    fn count_meeting_blocks(&self, availability: &[bool]) -> usize {
        let mut count = 0;
        for day in 0..self.num_days {
            let day_slots = &availability[day * self.num_times..(day + 1) * self.num_times];
            let mut slot = 0;
            while slot + 1 < self.num_times {
                if day_slots[slot] && day_slots[slot + 1] {
                    count += 1;
                    slot += 2;
                } else {
                    slot += 1;
                }
            }
        }
        count
    }

    fn score_genders(&self, genome: &[u32], scratch: &mut ScoreScratch) {
        let any_policy = self.isolated_women_prevented
            || self.isolated_men_prevented
            || self.single_gender_prevented;
        if !self.gender_included || !any_policy {
            return;
        }
        let mut pos = 0;
        for (team, &size) in self.team_sizes.iter().enumerate() {
            let mut num_women = 0;
            let mut num_men = 0;
            for &member in &genome[pos..pos + size] {
                match self.gender[member as usize] {
                    Gender::Woman => num_women += 1,
                    Gender::Man => num_men += 1,
                    Gender::Nonbinary | Gender::Unknown => {}
                }
            }
            pos += size;

            if self.isolated_women_prevented && num_women == 1 {
                scratch.penalty_points[team] += 1;
            }
            if self.isolated_men_prevented && num_men == 1 {
                scratch.penalty_points[team] += 1;
            }
            if self.single_gender_prevented && (num_men == 0 || num_women == 0) {
                scratch.penalty_points[team] += 1;
            }
        }
    }

    fn score_urm(&self, genome: &[u32], scratch: &mut ScoreScratch) {
        if !self.urm_included || !self.isolated_urm_prevented {
            return;
        }
        let mut pos = 0;
        for (team, &size) in self.team_sizes.iter().enumerate() {
            let num_urm = genome[pos..pos + size]
                .iter()
                .filter(|&&member| self.urm[member as usize])
                .count();
            pos += size;
            if num_urm == 1 {
                scratch.penalty_points[team] += 1;
            }
        }
    }

    /// One penalty for each required teammate missing from a member's team.
    fn score_required_teammates(&self, genome: &[u32], scratch: &mut ScoreScratch) {
        if !self.have_any_required {
            return;
        }
        let mut pos = 0;
        for (team, &size) in self.team_sizes.iter().enumerate() {
            let members = &genome[pos..pos + size];
            for &member in members {
                for &required in &self.required_with[member as usize] {
                    if !members.contains(&required) {
                        scratch.penalty_points[team] += 1;
                    }
                }
            }
            pos += size;
        }
    }

    /// One penalty per prevented pair sharing a team.
    fn score_prevented_teammates(&self, genome: &[u32], scratch: &mut ScoreScratch) {
        if !self.have_any_prevented {
            return;
        }
        let mut pos = 0;
        for (team, &size) in self.team_sizes.iter().enumerate() {
            let members = &genome[pos..pos + size];
            for i in 0..size {
                let prevented = &self.prevented_with[members[i] as usize];
                if prevented.is_empty() {
                    continue;
                }
                for &other in &members[i + 1..] {
                    if prevented.binary_search(&other).is_ok() {
                        scratch.penalty_points[team] += 1;
                    }
                }
            }
            pos += size;
        }
    }

    /// One penalty per member whose granted requested-teammate count falls
    /// short of min(requested, configured grant count).
    fn score_requested_teammates(&self, genome: &[u32], scratch: &mut ScoreScratch) {
        if !self.have_any_requested {
            return;
        }
        let mut pos = 0;
        for (team, &size) in self.team_sizes.iter().enumerate() {
            let members = &genome[pos..pos + size];
            for &member in members {
                let requested = &self.requested_with[member as usize];
                if requested.is_empty() {
                    continue;
                }
                let granted = members
                    .iter()
                    .filter(|&&other| requested.binary_search(&other).is_ok())
                    .count() as u32;
                let needed = (requested.len() as u32).min(self.num_requested_teammates_given);
                if granted < needed {
                    scratch.penalty_points[team] += 1;
                }
            }
            pos += size;
        }
    }

    /// Combines component scores into final team scores, normalized so
    /// that a penalty-free team with every factor fully satisfied scores
    /// 100.
    fn assemble_team_scores(&self, scratch: &mut ScoreScratch) {
        let num_teams = self.team_sizes.len();
        for team in 0..num_teams {
            let mut sched = scratch.sched_scores[team];
            // a penalized team forfeits schedule extra credit, so a huge
            // overlap cannot cancel out the penalty
            if scratch.penalty_points[team] > 0 && sched > self.real_schedule_weight {
                sched = self.real_schedule_weight;
            }
            let mut total = sched;
            for attrib in 0..self.num_attributes {
                total += scratch.attribute_scores[attrib * num_teams + team];
            }
            scratch.team_scores[team] = 100.0
                * (total / self.num_scoring_factors - scratch.penalty_points[team] as f32);
        }
    }
}

/// Harmonic mean of the team scores, skewed toward the weaker teams so the
/// optimizer lifts the worst team first. A score <= 0 makes the harmonic
/// mean meaningless; the aggregate then falls back to the arithmetic mean
/// pushed half its magnitude toward negative, which still orders
/// improvements monotonically.
pub(crate) fn aggregate_score(team_scores: &[f32]) -> f32 {
    let num_teams = team_scores.len() as f32;
    let mut harmonic_sum = 0.0;
    for &score in team_scores {
        if score <= 0.0 {
            let mean = team_scores.iter().sum::<f32>() / num_teams;
            return mean - mean.abs() / 2.0;
        }
        harmonic_sum += 1.0 / score;
    }
    num_teams / harmonic_sum
}
