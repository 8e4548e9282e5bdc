use std::path::PathBuf;
use std::process;

use terravox_bench::report;
use terravox_bench::runner::BenchmarkRunner;
use terravox_bench::scenes;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();

    let mut baseline_path: Option<PathBuf> = None;
    let mut output_path: Option<PathBuf> = None;
    let mut regression_threshold = 10.0f64;
    let mut iterations = 50_000u32;
    let mut grid_size = 256usize;
    let mut samples = 5u32;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--baseline" => {
                i += 1;
                baseline_path = Some(PathBuf::from(arg_value(&args, i)));
            }
            "--output" => {
                i += 1;
                output_path = Some(PathBuf::from(arg_value(&args, i)));
            }
            "--regression-threshold" => {
                i += 1;
                regression_threshold = arg_value(&args, i)
                    .parse()
                    .expect("invalid --regression-threshold value");
            }
            "--iterations" => {
                i += 1;
                iterations = arg_value(&args, i).parse().expect("invalid --iterations value");
            }
            "--size" => {
                i += 1;
                grid_size = arg_value(&args, i).parse().expect("invalid --size value");
            }
            "--samples" => {
                i += 1;
                samples = arg_value(&args, i).parse().expect("invalid --samples value");
            }
            "--help" | "-h" => {
                eprintln!("Usage: bench-runner [OPTIONS]");
                eprintln!("  --baseline <path>              Load baseline JSON for comparison");
                eprintln!("  --output <path>                Save current results as JSON baseline");
                eprintln!(
                    "  --regression-threshold <pct>   Regression threshold percentage (default: 10)"
                );
                eprintln!("  --iterations <n>               Erosion droplets per run (default: 50000)");
                eprintln!("  --size <n>                     Heightfield edge length (default: 256)");
                eprintln!("  --samples <n>                  Timed samples per scenario (default: 5)");
                process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                process::exit(1);
            }
        }
        i += 1;
    }

    let runner = BenchmarkRunner::new(samples);
    let results: Vec<_> = scenes::standard_scenarios(grid_size, iterations)
        .iter()
        .filter_map(|scenario| runner.run_scenario(scenario))
        .collect();

    println!("\n## Benchmark Results\n");
    println!("{}", report::format_markdown(&results));

    if let Some(ref path) = output_path {
        let baseline = report::Baseline {
            timestamp: timestamp(),
            results: results.clone(),
        };
        report::save_baseline(path, &baseline).expect("failed to save baseline");
        log::info!("Saved baseline to {}", path.display());
    }

    if let Some(ref path) = baseline_path {
        if let Some(baseline) = report::load_baseline(path) {
            let regressions = report::compare(&results, &baseline, regression_threshold);
            println!(
                "{}",
                report::format_comparison(&regressions, regression_threshold)
            );
            if !regressions.is_empty() {
                eprintln!(
                    "ERROR: {} regressions detected, exiting with code 1",
                    regressions.len()
                );
                process::exit(1);
            }
        } else {
            log::warn!("Baseline file not found: {}", path.display());
        }
    }

    log::info!("Benchmark complete.");
}

/// The value following a flag; exits when it is missing.
fn arg_value(args: &[String], i: usize) -> &str {
    args.get(i).map(String::as_str).unwrap_or_else(|| {
        eprintln!("Missing value for {}", args[i - 1]);
        process::exit(1);
    })
}

/// Seconds since the Unix epoch.
fn timestamp() -> String {
    let secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("unix-{secs}")
}
