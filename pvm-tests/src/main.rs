//! paged-vm workload runner.
//!
//! Drives the translation core through workloads a unit test is too small
//! for: long randomized histories checked against a shadow model, sweeps
//! sized to thrash the frame pool, and geometry edge cases. Each workload
//! answers: "does the memory still behave like memory?"

mod workloads;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::time::Instant;

use workloads::{RunConfig, WorkloadResult, all_workloads};

#[derive(Parser)]
#[command(name = "pvm-tests")]
#[command(about = "Workloads for the paged-vm translation core")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run all workloads
    Run {
        /// Seed for the deterministic workload generator
        #[arg(long, default_value_t = 0x5EED)]
        seed: u64,

        /// Operations per randomized workload
        #[arg(long, default_value_t = 20_000)]
        ops: u64,

        /// Run only workloads in a specific category
        #[arg(long)]
        category: Option<String>,

        /// Show detail for passing workloads too
        #[arg(long, short)]
        verbose: bool,
    },

    /// List all available workloads
    List,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { seed, ops, category, verbose } => run(seed, ops, category, verbose),
        Commands::List => list(),
    }
}

fn run(seed: u64, ops: u64, category: Option<String>, verbose: bool) -> Result<()> {
    println!("paged-vm workloads");
    println!("==================\n");
    println!("seed {seed:#x}, {ops} ops per randomized workload\n");

    let config = RunConfig { seed, ops };
    let all = all_workloads();
    let selected: Vec<_> = match &category {
        Some(cat) => all.into_iter().filter(|w| w.category() == cat).collect(),
        None => all,
    };

    if selected.is_empty() {
        println!("No workloads found for category: {category:?}");
        return Ok(());
    }

    let start = Instant::now();
    let mut results: Vec<WorkloadResult> = Vec::new();
    let mut current_category = String::new();

    for workload in &selected {
        if workload.category() != current_category {
            if !current_category.is_empty() {
                println!();
            }
            current_category = workload.category().to_string();
            println!("━━━ {} ━━━", current_category.to_uppercase());
        }

        let result = workload.run(&config);
        print_result(&result, verbose);
        results.push(result);
    }

    println!("\n════════════════════════════════════════\n");

    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.len() - passed;
    let duration = start.elapsed();

    if failed == 0 {
        println!("✓ All {} workloads passed ({:.1}s)", passed, duration.as_secs_f64());
    } else {
        println!("✗ {}/{} workloads failed ({:.1}s)\n", failed, results.len(), duration.as_secs_f64());
        println!("Failed workloads:");
        for result in results.iter().filter(|r| !r.passed) {
            println!("\n  ✗ {}", result.name);
            println!("    ensures: {}", result.ensures);
            println!("    error: {}", result.output);
        }
        std::process::exit(1);
    }

    Ok(())
}

fn print_result(result: &WorkloadResult, verbose: bool) {
    if result.passed {
        println!("  ✓ {}", result.name);
        if verbose {
            println!("      ensures: {}", result.ensures);
            println!("      output: {}", result.output);
        }
    } else {
        println!("  ✗ {} - FAILED", result.name);
        println!("      ensures: {}", result.ensures);
        println!("      error: {}", result.output);
    }
}

fn list() -> Result<()> {
    println!("paged-vm workloads\n");

    let mut current_category = String::new();
    let all = all_workloads();
    for workload in &all {
        if workload.category() != current_category {
            if !current_category.is_empty() {
                println!();
            }
            current_category = workload.category().to_string();
            println!("{}:", current_category.to_uppercase());
        }
        println!("  • {}", workload.name());
        println!("    ensures: {}", workload.ensures());
    }

    println!("\nTotal: {} workloads", all.len());
    Ok(())
}
