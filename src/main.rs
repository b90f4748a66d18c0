//! lvflow entry point — CLI wiring and config-driven study execution.

use std::path::Path;
use std::process;

use lvflow::config::StudyConfig;
use lvflow::io::export::export_csv;
use lvflow::montecarlo::run_study;
use lvflow::network::Network;

/// Parsed CLI arguments.
struct CliArgs {
    scenario_path: Option<String>,
    preset: Option<String>,
    seed_override: Option<u64>,
    runs_override: Option<usize>,
    out_path: String,
}

fn print_help() {
    eprintln!("lvflow — Monte-Carlo AC load-flow studies for LV networks");
    eprintln!();
    eprintln!("Usage: lvflow [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --scenario <path>   Load study from TOML config file");
    eprintln!("  --preset <name>     Use a built-in network (five_bus_ring, two_bus)");
    eprintln!("  --seed <u64>        Override random seed");
    eprintln!("  --runs <n>          Override number of Monte-Carlo runs");
    eprintln!("  --out <path>        Output CSV path (default: line_measurements.csv)");
    eprintln!("  --help              Show this help message");
    eprintln!();
    eprintln!("If no --scenario or --preset is given, the five-bus ring is studied.");
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        scenario_path: None,
        preset: None,
        seed_override: None,
        runs_override: None,
        out_path: "line_measurements.csv".to_string(),
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            "--scenario" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --scenario requires a path argument");
                    process::exit(1);
                }
                cli.scenario_path = Some(args[i].clone());
            }
            "--preset" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --preset requires a name argument");
                    process::exit(1);
                }
                cli.preset = Some(args[i].clone());
            }
            "--seed" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --seed requires a u64 argument");
                    process::exit(1);
                }
                if let Ok(s) = args[i].parse::<u64>() {
                    cli.seed_override = Some(s);
                } else {
                    eprintln!("error: --seed value \"{}\" is not a valid u64", args[i]);
                    process::exit(1);
                }
            }
            "--runs" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --runs requires an integer argument");
                    process::exit(1);
                }
                if let Ok(n) = args[i].parse::<usize>() {
                    cli.runs_override = Some(n);
                } else {
                    eprintln!("error: --runs value \"{}\" is not a valid count", args[i]);
                    process::exit(1);
                }
            }
            "--out" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --out requires a path argument");
                    process::exit(1);
                }
                cli.out_path = args[i].clone();
            }
            other => {
                eprintln!("error: unknown argument \"{other}\"");
                print_help();
                process::exit(1);
            }
        }
        i += 1;
    }

    cli
}

fn main() {
    let cli = parse_args();

    // Load config: --scenario takes priority, otherwise defaults.
    let mut config = if let Some(ref path) = cli.scenario_path {
        match StudyConfig::from_toml_file(Path::new(path)) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("{e}");
                process::exit(1);
            }
        }
    } else {
        StudyConfig::default()
    };

    // Apply overrides
    if let Some(seed) = cli.seed_override {
        config.study.random_seed = Some(seed);
    }
    if let Some(runs) = cli.runs_override {
        config.study.n_runs = runs;
    }

    // Validate scalar options
    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }

    // Resolve the network: inline TOML section beats --preset beats default.
    let network = if config.network.is_some() {
        config.build_network()
    } else if let Some(ref name) = cli.preset {
        match Network::from_preset(name) {
            Some(net) => net,
            None => {
                eprintln!(
                    "error: unknown preset \"{name}\", available: {}",
                    Network::PRESETS.join(", ")
                );
                process::exit(1);
            }
        }
    } else {
        config.build_network()
    };

    // Run the study
    let outcome = match run_study(&network, &config) {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };

    // Print per-line results
    for m in &outcome.measurements {
        println!("{m}");
    }
    for (run, e) in &outcome.skipped_runs {
        eprintln!("warning: run {run} skipped: {e}");
    }
    println!(
        "\n{} measurements over {} runs ({} skipped)",
        outcome.measurements.len(),
        config.study.n_runs,
        outcome.skipped_runs.len()
    );

    // Export CSV; a write failure aborts the batch.
    if let Err(e) = export_csv(&outcome.measurements, Path::new(&cli.out_path)) {
        eprintln!("error: failed to write CSV: {e}");
        process::exit(1);
    }
    eprintln!("Measurements written to {}", cli.out_path);
}
