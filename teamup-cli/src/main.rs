//! teamup-cli: command-line interface for the teamup optimizer
//!
//! Drives the full optimizer from JSON problem files, so every part of
//! the core can be exercised without a GUI.
//!
//! # Commands
//!
//! - `solve`: optimize a problem file into a team assignment
//! - `evaluate`: score an existing assignment without optimizing
//! - `validate`: check a problem file without solving
//! - `schema`: print example JSON for the input/output formats

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use teamup_core::models::{ApiInput, ProgressCallback};
use teamup_core::optimizer::GaState;
use teamup_core::{evaluate_assignment, run_optimizer, run_optimizer_with_progress};

#[derive(Parser)]
#[command(name = "teamup-cli")]
#[command(version = "0.1.0")]
#[command(about = "teamup optimizer CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Optimize a problem file into a team assignment
    Solve {
        /// Input JSON file path (use --stdin to read from stdin)
        #[arg(value_name = "FILE")]
        input: Option<PathBuf>,

        /// Read input from stdin instead of a file
        #[arg(long)]
        stdin: bool,

        /// Output file path (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,

        /// Render a progress bar on stderr while optimizing
        #[arg(long)]
        progress: bool,
    },

    /// Score an existing assignment without optimizing
    Evaluate {
        /// Input JSON file path
        #[arg(value_name = "FILE")]
        input: Option<PathBuf>,

        /// Read input from stdin instead of a file
        #[arg(long)]
        stdin: bool,

        /// JSON file holding the assignment: a flat array of roster ids,
        /// partitioned by the input's team sizes
        #[arg(short, long)]
        assignment: PathBuf,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Validate a problem file without solving
    Validate {
        /// Input JSON file path
        #[arg(value_name = "FILE")]
        input: Option<PathBuf>,

        /// Read input from stdin instead of a file
        #[arg(long)]
        stdin: bool,
    },

    /// Print example JSON for the input and output formats
    Schema,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Solve {
            input,
            stdin,
            output,
            pretty,
            progress,
        } => cmd_solve(input, stdin, output, pretty, progress),

        Commands::Evaluate {
            input,
            stdin,
            assignment,
            pretty,
        } => cmd_evaluate(input, stdin, &assignment, pretty),

        Commands::Validate { input, stdin } => cmd_validate(input, stdin),

        Commands::Schema => cmd_schema(),
    }
}

fn read_input(file: Option<PathBuf>, use_stdin: bool) -> Result<ApiInput> {
    let json = if use_stdin {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read from stdin")?;
        buffer
    } else if let Some(path) = file {
        fs::read_to_string(&path).with_context(|| format!("Failed to read file: {path:?}"))?
    } else {
        anyhow::bail!("Either provide an input file or use --stdin")
    };
    serde_json::from_str(&json).context("Failed to parse input JSON")
}

fn write_output(value: &impl serde::Serialize, output: Option<PathBuf>, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    if let Some(path) = output {
        fs::write(&path, &json).with_context(|| format!("Failed to write output to {path:?}"))?;
        eprintln!("Result written to {path:?}");
    } else {
        println!("{json}");
    }
    Ok(())
}

fn cmd_solve(
    input: Option<PathBuf>,
    stdin: bool,
    output: Option<PathBuf>,
    pretty: bool,
    progress: bool,
) -> Result<()> {
    let api_input = read_input(input, stdin)?;

    let result = if progress {
        let bar = ProgressBar::new(api_input.ga.max_generations);
        bar.set_style(ProgressStyle::with_template(
            "{bar:40.cyan/blue} {pos}/{len} generations {msg}",
        )?);
        let bar_for_callback = bar.clone();
        let callback: ProgressCallback = Box::new(move |update| {
            bar_for_callback.set_position(update.generation);
            bar_for_callback.set_message(format!(
                "best {:.2} (stability {:.0})",
                update.best_score, update.score_stability
            ));
            // accept the result at the first natural termination
            !update.final_event
        });
        let result = run_optimizer_with_progress(&api_input, Some(&callback), None)
            .map_err(|e| anyhow::anyhow!("Optimizer error: {e}"))?;
        bar.finish_with_message(format!("done, score {:.2}", result.final_score));
        result
    } else {
        eprintln!("Running optimizer...");
        run_optimizer(&api_input).map_err(|e| anyhow::anyhow!("Optimizer error: {e}"))?
    };

    eprintln!("{}", result.display());
    write_output(&result, output, pretty)
}

fn cmd_evaluate(
    input: Option<PathBuf>,
    stdin: bool,
    assignment_path: &PathBuf,
    pretty: bool,
) -> Result<()> {
    let api_input = read_input(input, stdin)?;
    let assignment_json = fs::read_to_string(assignment_path)
        .with_context(|| format!("Failed to read assignment file: {assignment_path:?}"))?;
    let assignment: Vec<usize> =
        serde_json::from_str(&assignment_json).context("Failed to parse assignment JSON")?;

    let result = evaluate_assignment(&api_input, &assignment)
        .map_err(|e| anyhow::anyhow!("Evaluation error: {e}"))?;
    eprintln!("{}", result.display());
    write_output(&result, None, pretty)
}

fn cmd_validate(input: Option<PathBuf>, stdin: bool) -> Result<()> {
    let api_input = read_input(input, stdin)?;
    match GaState::new(&api_input) {
        Ok(_) => {
            println!("{}", serde_json::json!({ "valid": true }));
        }
        Err(e) => {
            println!(
                "{}",
                serde_json::json!({ "valid": false, "error": e.to_string() })
            );
        }
    }
    Ok(())
}

fn cmd_schema() -> Result<()> {
    let example = r#"{
  "students": [
    {"id": 0, "gender": "woman", "urm": false, "attributes": [3, 1],
     "unavailable": [false, false, true, true, false, false],
     "ambiguous_schedule": false,
     "required_with": [], "prevented_with": [2], "requested_with": [1]},
    {"id": 1, "gender": "man", "attributes": [1, 2],
     "unavailable": [false, false, false, true, true, false],
     "required_with": [], "prevented_with": [], "requested_with": []}
  ],
  "active_ids": [0, 1, 2, 3],
  "data_options": {
    "attributes": [
      {"is_ordered": true, "min": 1, "max": 5},
      {"is_ordered": false, "min": 1, "max": 3}
    ],
    "num_days": 2,
    "num_times": 3,
    "gender_included": true,
    "urm_included": false
  },
  "teaming_options": {
    "attribute_weights": [1.0, 0.5],
    "desire_homogeneous": [false, true],
    "incompatible_values": [[], [[1, 3]]],
    "schedule_weight": 1.0,
    "min_time_blocks_overlap": 1,
    "desired_time_blocks_overlap": 3,
    "meeting_block_size": 1,
    "isolated_women_prevented": true,
    "isolated_men_prevented": false,
    "single_gender_prevented": false,
    "isolated_urm_prevented": false,
    "num_requested_teammates_given": 1
  },
  "team_sizes": [2, 2],
  "ga": {
    "population_size": 30000,
    "top_genome_likelihood": 33,
    "num_elites": 3,
    "num_ancestor_generations": 3,
    "mutation_likelihood": 50,
    "min_generations": 40,
    "max_generations": 500,
    "generations_of_stability": 25,
    "min_score_stability": 100.0,
    "score_vector_cadence": 10,
    "rng_seed": null
  }
}"#;
    println!("=== INPUT ===\n{example}\n");

    let output = r#"{
  "teams": [
    {"student_ids": [0, 3], "score": 100.0},
    {"student_ids": [1, 2], "score": 87.5}
  ],
  "final_score": 93.3,
  "generations": 64
}"#;
    println!("=== OUTPUT ===\n{output}");
    Ok(())
}
