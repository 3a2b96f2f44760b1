//! Input validation, problem compilation, and initial population setup.
//!
//! Compilation renumbers the active roster to compact indices 0..N,
//! flattens per-student data for cache-friendly scoring, translates peer
//! preference sets, and normalizes the scoring weights. Everything that
//! can be rejected is rejected here, before the run starts.

use super::ancestry::AncestryLayout;
use super::{master_rng, GaError, GaState, Problem};
use crate::models::ApiInput;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashMap;

impl Problem {
    /// Validates the input and compiles it into compact, score-ready form.
    pub(crate) fn compile(input: &ApiInput) -> Result<Problem, GaError> {
        let data = &input.data_options;
        let teaming = &input.teaming_options;
        let num_attributes = data.attributes.len();
        let num_slots = data.num_time_slots();
        let schedule_included = data.schedule_included();

        // === ROSTER AND ACTIVE IDS ===
        for (index, student) in input.students.iter().enumerate() {
            if student.id != index {
                return Err(GaError::RosterIdMismatch {
                    index,
                    id: student.id,
                });
            }
        }
        let num_students = input.active_ids.len();
        if num_students < 4 {
            return Err(GaError::InsufficientStudents(num_students));
        }
        let mut compact_of: HashMap<usize, u32> = HashMap::with_capacity(num_students);
        for (compact, &id) in input.active_ids.iter().enumerate() {
            if id >= input.students.len() {
                return Err(GaError::UnknownActiveId(id));
            }
            if compact_of.insert(id, compact as u32).is_some() {
                return Err(GaError::DuplicateActiveId(id));
            }
        }

        // === TEAM LAYOUT ===
        for (team, &size) in input.team_sizes.iter().enumerate() {
            if size == 0 {
                return Err(GaError::EmptyTeam(team));
            }
        }
        let sum: usize = input.team_sizes.iter().sum();
        if sum != num_students {
            return Err(GaError::TeamSizeMismatch { sum, num_students });
        }

        // === TEAMING OPTIONS ===
        for got in [
            teaming.attribute_weights.len(),
            teaming.desire_homogeneous.len(),
            teaming.incompatible_values.len(),
        ] {
            if got != num_attributes {
                return Err(GaError::OptionArityMismatch {
                    got,
                    expected: num_attributes,
                });
            }
        }

        let mut weights = teaming.attribute_weights.clone();
        for (attrib, def) in data.attributes.iter().enumerate() {
            if def.max < def.min {
                return Err(GaError::AttributeRangeInverted(attrib));
            }
            if weights[attrib] < 0.0 {
                return Err(GaError::NegativeWeight(attrib));
            }
            if def.max == def.min {
                // a single-valued attribute cannot spread; scoring it
                // would divide by zero
                weights[attrib] = 0.0;
            }
        }
        if teaming.schedule_weight < 0.0 {
            return Err(GaError::NegativeScheduleWeight);
        }
        let schedule_weight = if schedule_included {
            teaming.schedule_weight
        } else {
            0.0
        };
        if schedule_included {
            if teaming.meeting_block_size != 1 && teaming.meeting_block_size != 2 {
                return Err(GaError::InvalidMeetingBlockSize(teaming.meeting_block_size));
            }
            if teaming.min_time_blocks_overlap > teaming.desired_time_blocks_overlap {
                return Err(GaError::OverlapBoundsInverted {
                    min: teaming.min_time_blocks_overlap,
                    desired: teaming.desired_time_blocks_overlap,
                });
            }
            if schedule_weight > 0.0 && teaming.desired_time_blocks_overlap == 0 {
                return Err(GaError::ZeroDesiredOverlap);
            }
        }

        // === PER-STUDENT DATA, COMPACTED ===
        let mut gender = Vec::with_capacity(num_students);
        let mut urm = Vec::with_capacity(num_students);
        let mut attributes = Vec::with_capacity(num_students * num_attributes);
        let mut unavailable = Vec::with_capacity(num_students * num_slots);
        let mut ambiguous_schedule = Vec::with_capacity(num_students);
        let mut required_with = Vec::with_capacity(num_students);
        let mut prevented_with: Vec<Vec<u32>> = Vec::with_capacity(num_students);
        let mut requested_with = Vec::with_capacity(num_students);

        for &id in &input.active_ids {
            let student = &input.students[id];
            if student.attributes.len() != num_attributes {
                return Err(GaError::AttributeCountMismatch {
                    id,
                    got: student.attributes.len(),
                    expected: num_attributes,
                });
            }
            if schedule_included && student.unavailable.len() != num_slots {
                return Err(GaError::ScheduleSizeMismatch {
                    id,
                    got: student.unavailable.len(),
                    expected: num_slots,
                });
            }
            gender.push(student.gender);
            urm.push(student.urm);
            attributes.extend_from_slice(&student.attributes);
            if schedule_included {
                unavailable.extend_from_slice(&student.unavailable);
            }
            ambiguous_schedule.push(student.ambiguous_schedule);

            // peer ids outside the active roster (and self-references)
            // simply do not apply to this run
            let translate = |peers: &[usize]| -> Vec<u32> {
                let mut compact: Vec<u32> = peers
                    .iter()
                    .filter(|&&peer| peer != id)
                    .filter_map(|peer| compact_of.get(peer).copied())
                    .collect();
                compact.sort_unstable();
                compact.dedup();
                compact
            };
            required_with.push(translate(&student.required_with));
            prevented_with.push(translate(&student.prevented_with));
            requested_with.push(translate(&student.requested_with));
        }

        // prevention is mutual: symmetrize so either direction of input
        // catches the pair
        let directional = prevented_with.clone();
        for (compact, peers) in directional.iter().enumerate() {
            for &peer in peers {
                prevented_with[peer as usize].push(compact as u32);
            }
        }
        for set in &mut prevented_with {
            set.sort_unstable();
            set.dedup();
        }

        let have_any_required = required_with.iter().any(|set| !set.is_empty());
        let have_any_prevented = prevented_with.iter().any(|set| !set.is_empty());
        let have_any_requested = requested_with.iter().any(|set| !set.is_empty());

        // === WEIGHT NORMALIZATION ===
        // norm factor = number of scoring factors / total weight, so the
        // used weights sum to the factor count and team scores land on a
        // 0..=100 scale
        let factors = num_attributes + schedule_included as usize;
        let weight_sum: f32 = weights.iter().sum::<f32>() + schedule_weight;
        let norm = if weight_sum > 0.0 {
            factors as f32 / weight_sum
        } else {
            0.0
        };
        let real_attribute_weights: Vec<f32> = weights.iter().map(|w| w * norm).collect();
        let real_schedule_weight = schedule_weight * norm;
        let attribute_active = (0..num_attributes)
            .map(|attrib| {
                real_attribute_weights[attrib] > 0.0
                    || !teaming.incompatible_values[attrib].is_empty()
            })
            .collect();

        Ok(Problem {
            num_students,
            num_attributes,
            num_days: data.num_days,
            num_times: data.num_times,
            team_sizes: input.team_sizes.clone(),
            active_ids: input.active_ids.clone(),
            gender,
            urm,
            attributes,
            unavailable,
            ambiguous_schedule,
            required_with,
            prevented_with,
            requested_with,
            have_any_required,
            have_any_prevented,
            have_any_requested,
            attribute_defs: data.attributes.clone(),
            attribute_active,
            real_attribute_weights,
            real_schedule_weight,
            num_scoring_factors: (factors as f32).max(1.0),
            desire_homogeneous: teaming.desire_homogeneous.clone(),
            incompatible_values: teaming.incompatible_values.clone(),
            gender_included: data.gender_included,
            urm_included: data.urm_included,
            isolated_women_prevented: teaming.isolated_women_prevented,
            isolated_men_prevented: teaming.isolated_men_prevented,
            single_gender_prevented: teaming.single_gender_prevented,
            isolated_urm_prevented: teaming.isolated_urm_prevented,
            min_time_blocks_overlap: teaming.min_time_blocks_overlap,
            desired_time_blocks_overlap: teaming.desired_time_blocks_overlap,
            meeting_block_size: teaming.meeting_block_size,
            num_requested_teammates_given: teaming.num_requested_teammates_given,
        })
    }

    /// Translates a roster-id team assignment into a compact genome,
    /// verifying it is a permutation of the active roster.
    pub(crate) fn compact_assignment(&self, assignment: &[usize]) -> Result<Vec<u32>, GaError> {
        if assignment.len() != self.num_students {
            return Err(GaError::InvalidAssignment);
        }
        let compact_of: HashMap<usize, u32> = self
            .active_ids
            .iter()
            .enumerate()
            .map(|(compact, &id)| (id, compact as u32))
            .collect();
        let mut genome = vec![0u32; self.num_students];
        let mut seen = vec![false; self.num_students];
        for (position, id) in assignment.iter().enumerate() {
            match compact_of.get(id) {
                Some(&compact) if !seen[compact as usize] => {
                    seen[compact as usize] = true;
                    genome[position] = compact;
                }
                _ => return Err(GaError::InvalidAssignment),
            }
        }
        Ok(genome)
    }
}

/// Builds a [`GaState`] with a freshly shuffled initial population.
pub(crate) fn build(input: &ApiInput) -> Result<GaState, GaError> {
    let problem = Problem::compile(input)?;
    let ga = input.ga.clone();
    if ga.population_size < 2 {
        return Err(GaError::PopulationTooSmall(ga.population_size));
    }

    let num_students = problem.num_students;
    let population_size = ga.population_size;
    let ancestry = AncestryLayout::new(ga.num_ancestor_generations);
    let mut rng = master_rng(&ga);

    // initial population: independent shuffles of the compact id array
    let mut permutation: Vec<u32> = (0..num_students as u32).collect();
    let mut gene_pool = vec![0u32; population_size * num_students];
    for genome in gene_pool.chunks_exact_mut(num_students) {
        permutation.shuffle(&mut rng);
        genome.copy_from_slice(&permutation);
    }

    // random initial ancestor slots, so no first-generation mating ever
    // looks related
    let mut ancestors = vec![0u32; population_size * ancestry.len];
    for ancestor in ancestors.iter_mut() {
        *ancestor = rng.gen_range(0..=population_size as u32);
    }

    Ok(GaState {
        next_pool: vec![0u32; gene_pool.len()],
        next_ancestors: vec![0u32; ancestors.len()],
        gene_pool,
        ancestors,
        scores: vec![0.0; population_size],
        ordered_index: (0..population_size as u32).collect(),
        best_history: vec![0.0; ga.generations_of_stability.max(1)],
        generation: 0,
        rng,
        child: vec![0u32; num_students],
        in_segment: vec![false; num_students],
        problem,
        ga,
        ancestry,
    })
}
