//! BESS simulator entry point: CLI wiring and config-driven strategy runs.

use std::path::Path;
use std::process;

use tracing::info;
use tracing_subscriber::EnvFilter;

use bess_sim::config::ScenarioConfig;
use bess_sim::io::export::export_csv;
use bess_sim::sim::{StrategyLibrary, StrategyResult};

/// Parsed CLI arguments.
struct CliArgs {
    scenario_path: Option<String>,
    preset: Option<String>,
    strategy: Option<String>,
    seed_override: Option<u64>,
    telemetry_out: Option<String>,
    verbose: bool,
}

fn print_help() {
    eprintln!("bess-sim - Battery energy storage dispatch simulator");
    eprintln!();
    eprintln!("Usage: bess-sim [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --scenario <path>        Load scenario from TOML config file");
    eprintln!(
        "  --preset <name>          Use a built-in preset ({})",
        ScenarioConfig::PRESETS.join(", ")
    );
    eprintln!("  --strategy <tag>         Override the strategy tag");
    eprintln!("  --seed <u64>             Override the synthetic profile seed");
    eprintln!("  --telemetry-out <path>   Export step results to CSV");
    eprintln!("  --verbose                Log at debug level (RUST_LOG takes priority)");
    eprintln!("  --help                   Show this help message");
    eprintln!();
    eprintln!("Strategies:");
    for (tag, stability) in StrategyLibrary::standard().tags() {
        eprintln!("  {tag:<24} {stability}");
    }
    eprintln!();
    eprintln!("If no --scenario or --preset is given, the baseline preset is used.");
}

/// Returns the value following the flag at `i`, or exits with an error.
fn flag_value(args: &[String], i: usize, flag: &str, what: &str) -> String {
    match args.get(i) {
        Some(value) => value.clone(),
        None => {
            eprintln!("error: {flag} requires {what}");
            process::exit(1);
        }
    }
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        scenario_path: None,
        preset: None,
        strategy: None,
        seed_override: None,
        telemetry_out: None,
        verbose: false,
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
                cli.scenario_path = Some(flag_value(&args, i, "--scenario", "a path argument"));
            }
            "--preset" => {
                i += 1;
                cli.preset = Some(flag_value(&args, i, "--preset", "a name argument"));
            }
            "--strategy" => {
                i += 1;
                cli.strategy = Some(flag_value(&args, i, "--strategy", "a tag argument"));
            }
            "--seed" => {
                i += 1;
                let raw = flag_value(&args, i, "--seed", "a u64 argument");
                if let Ok(s) = raw.parse::<u64>() {
                    cli.seed_override = Some(s);
                } else {
                    eprintln!("error: --seed value \"{raw}\" is not a valid u64");
                    process::exit(1);
                }
            }
            "--telemetry-out" => {
                i += 1;
                cli.telemetry_out = Some(flag_value(&args, i, "--telemetry-out", "a path argument"));
            }
            "--verbose" | "-v" => {
                cli.verbose = true;
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

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "bess_sim=debug" } else { "bess_sim=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn print_steps(result: &StrategyResult) {
    for t in 0..result.len() {
        println!(
            "t={:>4} h={:>6.2} gen={:>8.3} grid={:>8.3} bat={:>8.3} soc={:.3} curt={:>7.3} loss={:.4} [{}]",
            t,
            result.time_hr(t),
            result.generation_mw[t],
            result.grid_mw[t],
            result.battery_mw[t],
            result.soc[t],
            result.curtailed_mw[t],
            result.loss_mwh[t],
            result.limited_by[t],
        );
    }
}

fn main() {
    let cli = parse_args();
    init_tracing(cli.verbose);

    // Load config: --scenario takes priority, then --preset, then baseline default
    let mut scenario = if let Some(ref path) = cli.scenario_path {
        match ScenarioConfig::from_toml_file(Path::new(path)) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("{e}");
                process::exit(1);
            }
        }
    } else if let Some(ref name) = cli.preset {
        match ScenarioConfig::from_preset(name) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("{e}");
                process::exit(1);
            }
        }
    } else {
        ScenarioConfig::baseline()
    };

    if let Some(seed) = cli.seed_override {
        scenario.set_seed(seed);
    }
    if let Some(tag) = cli.strategy {
        scenario.simulation.strategy = tag;
    }
    if cli.verbose {
        scenario.battery.verbose = true;
    }

    let errors = scenario.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }

    info!(
        strategy = %scenario.simulation.strategy,
        power_mw = scenario.battery.power_mw,
        duration_h = scenario.battery.duration_h,
        "running scenario"
    );

    let result = match scenario.simulate() {
        Ok(result) => result,
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    };

    print_steps(&result);
    println!("\n{}", result.metrics);
    println!("Verdict: {}", result.verdict);

    if let Some(ref path) = cli.telemetry_out {
        if let Err(e) = export_csv(&result, Path::new(path)) {
            eprintln!("error: failed to write CSV: {e}");
            process::exit(1);
        }
        eprintln!("Telemetry written to {path}");
    }

    // An invalid run is fatal even after its telemetry has been written.
    if let Err(e) = result.ensure_valid() {
        eprintln!("error: {e}");
        process::exit(1);
    }
}
