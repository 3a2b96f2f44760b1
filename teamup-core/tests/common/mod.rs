//! Shared test utilities for teamup-core integration tests.

use teamup_core::models::{
    ApiInput, AttributeDef, DataOptions, GaParams, Student, TeamingOptions,
};

/// GA parameters scaled down for fast deterministic tests.
#[allow(dead_code)]
pub fn test_ga_params(seed: u64) -> GaParams {
    GaParams {
        population_size: 150,
        min_generations: 5,
        max_generations: 60,
        generations_of_stability: 5,
        rng_seed: Some(seed),
        ..GaParams::default()
    }
}

/// Creates an input with one ordered attribute (range `min..=max`) whose
/// per-student values are given literally.
#[allow(dead_code)]
pub fn attribute_input(
    values: &[i32],
    min: i32,
    max: i32,
    desire_homogeneous: bool,
    team_sizes: Vec<usize>,
) -> ApiInput {
    let students = values
        .iter()
        .enumerate()
        .map(|(id, &value)| Student {
            id,
            attributes: vec![value],
            ..Student::default()
        })
        .collect();
    ApiInput {
        students,
        active_ids: (0..values.len()).collect(),
        data_options: DataOptions {
            attributes: vec![AttributeDef {
                is_ordered: true,
                min,
                max,
            }],
            ..DataOptions::default()
        },
        teaming_options: TeamingOptions {
            attribute_weights: vec![1.0],
            desire_homogeneous: vec![desire_homogeneous],
            incompatible_values: vec![vec![]],
            ..TeamingOptions::default()
        },
        team_sizes,
        ga: test_ga_params(11),
    }
}

/// Creates an input with no attributes and no schedule: scores are driven
/// purely by teammate-pairing penalties.
#[allow(dead_code)]
pub fn pairing_input(num_students: usize, team_sizes: Vec<usize>) -> ApiInput {
    let students = (0..num_students)
        .map(|id| Student {
            id,
            ..Student::default()
        })
        .collect();
    ApiInput {
        students,
        active_ids: (0..num_students).collect(),
        data_options: DataOptions::default(),
        teaming_options: TeamingOptions::default(),
        team_sizes,
        ga: test_ga_params(13),
    }
}

/// Finds the team containing the given roster id.
#[allow(dead_code)]
pub fn team_of(result: &teamup_core::models::TeamSet, id: usize) -> &teamup_core::models::Team {
    result
        .teams
        .iter()
        .find(|team| team.student_ids.contains(&id))
        .unwrap_or_else(|| panic!("student {id} is not on any team"))
}
