//! End-to-end scenarios and scoring laws, exercised through the public API.

mod common;

use approx::assert_relative_eq;
use common::{attribute_input, pairing_input, team_of, test_ga_params};
use teamup_core::models::{AttributeDef, TeamSet};
use teamup_core::optimizer::GaError;
use teamup_core::{evaluate_assignment, run_optimizer};

#[test]
fn two_team_perfect_diversity_reaches_100() {
    let input = attribute_input(&[1, 5, 1, 5], 1, 5, false, vec![2, 2]);
    let result = run_optimizer(&input).unwrap();
    assert_relative_eq!(result.final_score, 100.0);
    // each team pairs a 1 with a 5
    for team in &result.teams {
        assert_relative_eq!(team.score, 100.0);
        assert_eq!(team.student_ids.len(), 2);
        assert_ne!(
            team.student_ids[0] % 2,
            team.student_ids[1] % 2,
            "expected one low and one high responder per team"
        );
    }

    // the opposite split scores zero
    let worst = evaluate_assignment(&input, &[0, 2, 1, 3]).unwrap();
    assert_relative_eq!(worst.final_score, 0.0);
}

#[test]
fn homogeneity_flip_inverts_the_optimum() {
    let input = attribute_input(&[1, 5, 1, 5], 1, 5, true, vec![2, 2]);
    let result = run_optimizer(&input).unwrap();
    assert_relative_eq!(result.final_score, 100.0);
    for team in &result.teams {
        assert_eq!(
            team.student_ids[0] % 2,
            team.student_ids[1] % 2,
            "expected matching responders per team"
        );
    }
    let worst = evaluate_assignment(&input, &[0, 1, 2, 3]).unwrap();
    assert_relative_eq!(worst.final_score, 0.0);
}

#[test]
fn required_teammates_are_honored() {
    let mut input = pairing_input(6, vec![3, 3]);
    input.students[0].required_with = vec![1, 2];
    let result = run_optimizer(&input).unwrap();

    let team = team_of(&result, 0);
    assert!(team.student_ids.contains(&1));
    assert!(team.student_ids.contains(&2));
    assert_relative_eq!(result.final_score, 0.0);

    // splitting the trio up costs at least one penalty
    let split = evaluate_assignment(&input, &[0, 1, 3, 2, 4, 5]).unwrap();
    assert!(split.final_score < 0.0);
}

#[test]
fn prevented_teammates_are_honored() {
    let mut input = pairing_input(4, vec![2, 2]);
    input.students[0].prevented_with = vec![1];
    let result = run_optimizer(&input).unwrap();

    let team = team_of(&result, 0);
    assert!(!team.student_ids.contains(&1));
    assert_relative_eq!(result.final_score, 0.0);

    let together = evaluate_assignment(&input, &[0, 1, 2, 3]).unwrap();
    assert!(together.final_score < 0.0);
}

#[test]
fn schedule_overlap_earns_extra_credit() {
    let mut input = pairing_input(4, vec![2, 2]);
    input.data_options.num_days = 4;
    input.data_options.num_times = 5;
    input.teaming_options.schedule_weight = 1.0;
    input.teaming_options.min_time_blocks_overlap = 4;
    input.teaming_options.desired_time_blocks_overlap = 8;
    for student in &mut input.students {
        student.unavailable = vec![false; 20];
        student.update_ambiguous_schedule();
    }
    let result = evaluate_assignment(&input, &[0, 1, 2, 3]).unwrap();
    // 20 shared free blocks against desired 8: 1 + 12/48 = 1.25 -> 125
    for team in &result.teams {
        assert_relative_eq!(team.score, 125.0);
    }
    assert_relative_eq!(result.final_score, 125.0);
}

#[test]
fn aggregate_is_the_harmonic_mean_of_team_scores() {
    // teams {1,3} and {1,5}: 50 and 100 -> harmonic mean 66.67
    let input = attribute_input(&[1, 3, 1, 5], 1, 5, false, vec![2, 2]);
    let result = evaluate_assignment(&input, &[0, 1, 2, 3]).unwrap();
    assert_relative_eq!(result.teams[0].score, 50.0);
    assert_relative_eq!(result.teams[1].score, 100.0);
    assert_relative_eq!(result.final_score, 200.0 / 3.0, epsilon = 1e-3);
}

// === SCORING LAWS ===

#[test]
fn scoring_ignores_member_order_within_a_team() {
    let input = attribute_input(&[1, 2, 3, 4, 5, 2], 1, 5, false, vec![3, 3]);
    let a = evaluate_assignment(&input, &[0, 1, 2, 3, 4, 5]).unwrap();
    let b = evaluate_assignment(&input, &[2, 0, 1, 5, 3, 4]).unwrap();
    assert_eq!(a.final_score, b.final_score);
    for (team_a, team_b) in a.teams.iter().zip(&b.teams) {
        assert_eq!(team_a.score, team_b.score);
    }
}

#[test]
fn scoring_is_equivariant_under_team_reordering() {
    let input = attribute_input(&[1, 2, 3, 4, 5, 2], 1, 5, false, vec![3, 3]);
    let forward = evaluate_assignment(&input, &[0, 1, 2, 3, 4, 5]).unwrap();
    let swapped = evaluate_assignment(&input, &[3, 4, 5, 0, 1, 2]).unwrap();
    assert_eq!(forward.final_score, swapped.final_score);
    assert_eq!(forward.teams[0].score, swapped.teams[1].score);
    assert_eq!(forward.teams[1].score, swapped.teams[0].score);
}

#[test]
fn all_zero_weights_score_zero() {
    let mut input = attribute_input(&[1, 5, 1, 5], 1, 5, false, vec![2, 2]);
    input.teaming_options.attribute_weights[0] = 0.0;
    let result = evaluate_assignment(&input, &[0, 1, 2, 3]).unwrap();
    for team in &result.teams {
        assert_eq!(team.score, 0.0);
    }
    assert_eq!(result.final_score, 0.0);
}

#[test]
fn result_partitions_the_active_roster() {
    let input = attribute_input(&[1, 4, 2, 5, 3, 1, 2, 4], 1, 5, false, vec![3, 3, 2]);
    let result = run_optimizer(&input).unwrap();
    assert_eq!(result.teams.len(), 3);
    assert_eq!(result.teams[0].student_ids.len(), 3);
    assert_eq!(result.teams[2].student_ids.len(), 2);
    let mut all_ids: Vec<usize> = result
        .teams
        .iter()
        .flat_map(|team| team.student_ids.iter().copied())
        .collect();
    all_ids.sort_unstable();
    assert_eq!(all_ids, (0..8).collect::<Vec<_>>());
}

#[test]
fn inactive_roster_entries_are_ignored() {
    let mut input = pairing_input(8, vec![2, 2]);
    // only the first four students are being teamed; peers outside the
    // active roster carry no penalties
    input.active_ids = vec![0, 1, 2, 3];
    input.students[0].required_with = vec![6];
    input.students[1].prevented_with = vec![7];
    let result = evaluate_assignment(&input, &[0, 1, 2, 3]).unwrap();
    assert_eq!(result.final_score, 0.0);
}

// === VALIDATION ===

#[test]
fn configuration_errors_fail_fast() {
    let base = || attribute_input(&[1, 5, 1, 5], 1, 5, false, vec![2, 2]);

    let mut input = base();
    input.active_ids = vec![0, 1, 2];
    input.team_sizes = vec![2, 1];
    assert!(matches!(
        run_optimizer(&input),
        Err(GaError::InsufficientStudents(3))
    ));

    let mut input = base();
    input.team_sizes = vec![2, 3];
    assert!(matches!(
        run_optimizer(&input),
        Err(GaError::TeamSizeMismatch { sum: 5, .. })
    ));

    let mut input = base();
    input.team_sizes = vec![4, 0];
    assert!(matches!(run_optimizer(&input), Err(GaError::EmptyTeam(1))));

    let mut input = base();
    input.teaming_options.attribute_weights[0] = -1.0;
    assert!(matches!(
        run_optimizer(&input),
        Err(GaError::NegativeWeight(0))
    ));

    let mut input = base();
    input.data_options.attributes[0] = AttributeDef {
        is_ordered: true,
        min: 5,
        max: 1,
    };
    assert!(matches!(
        run_optimizer(&input),
        Err(GaError::AttributeRangeInverted(0))
    ));

    let mut input = base();
    input.students[2].id = 7;
    assert!(matches!(
        run_optimizer(&input),
        Err(GaError::RosterIdMismatch { index: 2, id: 7 })
    ));

    let mut input = base();
    input.active_ids = vec![0, 1, 2, 9];
    assert!(matches!(
        run_optimizer(&input),
        Err(GaError::UnknownActiveId(9))
    ));

    let mut input = base();
    input.active_ids = vec![0, 1, 2, 2];
    assert!(matches!(
        run_optimizer(&input),
        Err(GaError::DuplicateActiveId(2))
    ));

    let mut input = base();
    input.students[1].attributes = vec![];
    assert!(matches!(
        run_optimizer(&input),
        Err(GaError::AttributeCountMismatch { id: 1, .. })
    ));

    let mut input = base();
    input.teaming_options.attribute_weights = vec![1.0, 2.0];
    assert!(matches!(
        run_optimizer(&input),
        Err(GaError::OptionArityMismatch { got: 2, expected: 1 })
    ));

    let mut input = base();
    input.ga.population_size = 1;
    assert!(matches!(
        run_optimizer(&input),
        Err(GaError::PopulationTooSmall(1))
    ));
}

#[test]
fn schedule_configuration_errors_fail_fast() {
    let mut input = pairing_input(4, vec![2, 2]);
    input.data_options.num_days = 2;
    input.data_options.num_times = 3;
    input.teaming_options.schedule_weight = 1.0;
    for student in &mut input.students {
        student.unavailable = vec![false; 6];
    }

    let mut bad = input.clone();
    bad.teaming_options.schedule_weight = -0.5;
    assert!(matches!(
        run_optimizer(&bad),
        Err(GaError::NegativeScheduleWeight)
    ));

    let mut bad = input.clone();
    bad.teaming_options.min_time_blocks_overlap = 9;
    bad.teaming_options.desired_time_blocks_overlap = 3;
    assert!(matches!(
        run_optimizer(&bad),
        Err(GaError::OverlapBoundsInverted { min: 9, desired: 3 })
    ));

    let mut bad = input.clone();
    bad.teaming_options.meeting_block_size = 3;
    assert!(matches!(
        run_optimizer(&bad),
        Err(GaError::InvalidMeetingBlockSize(3))
    ));

    let mut bad = input.clone();
    bad.teaming_options.desired_time_blocks_overlap = 0;
    bad.teaming_options.min_time_blocks_overlap = 0;
    assert!(matches!(
        run_optimizer(&bad),
        Err(GaError::ZeroDesiredOverlap)
    ));

    let mut bad = input;
    bad.students[3].unavailable = vec![false; 4];
    assert!(matches!(
        run_optimizer(&bad),
        Err(GaError::ScheduleSizeMismatch { id: 3, got: 4, expected: 6 })
    ));
}

#[test]
fn evaluate_rejects_non_permutations() {
    let input = attribute_input(&[1, 5, 1, 5], 1, 5, false, vec![2, 2]);
    assert!(matches!(
        evaluate_assignment(&input, &[0, 1, 2]),
        Err(GaError::InvalidAssignment)
    ));
    assert!(matches!(
        evaluate_assignment(&input, &[0, 1, 2, 2]),
        Err(GaError::InvalidAssignment)
    ));
    assert!(matches!(
        evaluate_assignment(&input, &[0, 1, 2, 9]),
        Err(GaError::InvalidAssignment)
    ));
}

// === RESULT SURFACE ===

#[test]
fn api_input_round_trips_through_json() {
    let mut input = attribute_input(&[1, 5, 1, 5], 1, 5, false, vec![2, 2]);
    input.students[0].required_with = vec![2];
    let json = serde_json::to_string(&input).unwrap();
    let parsed: teamup_core::models::ApiInput = serde_json::from_str(&json).unwrap();
    assert_eq!(serde_json::to_string(&parsed).unwrap(), json);

    let result = evaluate_assignment(&parsed, &[0, 2, 1, 3]).unwrap();
    let result_json = serde_json::to_string(&result).unwrap();
    let result_back: TeamSet = serde_json::from_str(&result_json).unwrap();
    assert_eq!(result_back.final_score, result.final_score);
}

#[test]
fn display_lists_one_team_per_line() {
    let input = attribute_input(&[1, 5, 1, 5], 1, 5, false, vec![2, 2]);
    let result = evaluate_assignment(&input, &[0, 1, 2, 3]).unwrap();
    let rendered = result.display();
    assert_eq!(
        rendered,
        "Team 1 (score 100.00): 0, 1\nTeam 2 (score 100.00): 2, 3\nTotal score: 100.00\n"
    );
}

#[test]
fn defaults_allow_minimal_inputs() {
    // a seeded run with nothing but a roster and a team layout works and
    // scores zero everywhere
    let mut input = pairing_input(4, vec![2, 2]);
    input.ga = test_ga_params(99);
    let result = run_optimizer(&input).unwrap();
    assert_eq!(result.final_score, 0.0);
    assert!(result.generations >= input.ga.min_generations);
}
