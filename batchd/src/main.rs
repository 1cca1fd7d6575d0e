//! # Batch Simulation Host
//!
//! Main entry point for the partition scheduler simulation.

use batchd::{HostConfig, HostError, HostRuntime};
use services_logger::{FnLogSink, LogEntry};
use std::env;
use std::path::PathBuf;
use std::process;

/// Flags given on the command line; unset ones leave the config untouched
#[derive(Debug, Default)]
struct CliArgs {
    config: Option<PathBuf>,
    packet: Option<PathBuf>,
    partitions: Option<usize>,
    max_ticks: Option<u64>,
    ram_gb: Option<u32>,
    script: Option<PathBuf>,
    history: Option<PathBuf>,
    verbose: u8,
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("batchd");

    let config = parse_args(&args).and_then(build_config).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        print_usage(program);
        process::exit(1);
    });

    init_logging(config.verbose);

    let sink = FnLogSink::new(|entry: &LogEntry| println!("{}", entry));
    let mut runtime = HostRuntime::new(config, sink).unwrap_or_else(|e| {
        eprintln!("Failed to create runtime: {}", e);
        process::exit(1);
    });

    if let Err(e) = runtime.run() {
        eprintln!("Runtime error: {}", e);
        process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let llv = match verbose {
        0 => simplelog::LevelFilter::Warn,
        1 => simplelog::LevelFilter::Info,
        2 => simplelog::LevelFilter::Debug,
        _ => simplelog::LevelFilter::Trace,
    };
    let mut lcfg = simplelog::ConfigBuilder::new();
    lcfg.set_time_level(simplelog::LevelFilter::Error)
        .set_location_level(simplelog::LevelFilter::Off)
        .set_target_level(simplelog::LevelFilter::Off)
        .set_thread_level(simplelog::LevelFilter::Off);
    if let Err(e) = simplelog::TermLogger::init(
        llv,
        lcfg.build(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    ) {
        eprintln!("Failed to initialize logging: {}", e);
    }
}

fn parse_args(args: &[String]) -> Result<CliArgs, HostError> {
    let mut cli = CliArgs::default();
    let mut i = 1;

    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--config" | "-c" => cli.config = Some(value(args, &mut i, flag)?.into()),
            "--packet" | "-p" => cli.packet = Some(value(args, &mut i, flag)?.into()),
            "--partitions" | "-n" => {
                cli.partitions = Some(parse_number(value(args, &mut i, flag)?, flag)?)
            }
            "--max-ticks" | "-t" => {
                cli.max_ticks = Some(parse_number(value(args, &mut i, flag)?, flag)?)
            }
            "--ram" => cli.ram_gb = Some(parse_number(value(args, &mut i, flag)?, flag)?),
            "--script" | "-s" => cli.script = Some(value(args, &mut i, flag)?.into()),
            "--history" => cli.history = Some(value(args, &mut i, flag)?.into()),
            "-v" | "--verbose" => cli.verbose = cli.verbose.saturating_add(1),
            "-vv" => cli.verbose = cli.verbose.saturating_add(2),
            "--help" | "-h" => {
                print_usage(&args[0]);
                process::exit(0);
            }
            other => {
                return Err(HostError::Usage(format!("Unknown option: {}", other)));
            }
        }
        i += 1;
    }

    Ok(cli)
}

fn value<'a>(args: &'a [String], i: &mut usize, flag: &str) -> Result<&'a str, HostError> {
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .ok_or_else(|| HostError::Usage(format!("Missing value for {}", flag)))
}

fn parse_number<T: std::str::FromStr>(text: &str, flag: &str) -> Result<T, HostError> {
    text.parse()
        .map_err(|_| HostError::Usage(format!("Invalid {} value: {}", flag, text)))
}

/// Defaults, then the config file, then flags
fn build_config(cli: CliArgs) -> Result<HostConfig, HostError> {
    let mut config = match &cli.config {
        Some(path) => HostConfig::from_file(path)?,
        None => HostConfig::default(),
    };

    if let Some(packet) = cli.packet {
        config.packet = Some(packet);
    }
    if let Some(partitions) = cli.partitions {
        config.simulation.partitions = partitions;
    }
    if let Some(max_ticks) = cli.max_ticks {
        config.simulation.max_ticks = max_ticks;
    }
    if let Some(ram_gb) = cli.ram_gb {
        config.simulation.ram_gb = ram_gb;
    }
    if let Some(script) = cli.script {
        config.script = Some(script);
    }
    if let Some(history) = cli.history {
        config.history = Some(history);
    }
    config.verbose = config.verbose.max(cli.verbose);

    Ok(config)
}

fn print_usage(program: &str) {
    eprintln!("Usage: {} --packet <FILE> [OPTIONS]", program);
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -p, --packet <FILE>      Job descriptor (JSON)");
    eprintln!("  -n, --partitions <N>     Initial partition count (default 1)");
    eprintln!("  -t, --max-ticks <N>      Tick budget (default 1)");
    eprintln!("  --ram <GB>               Installed RAM, reported only (default 1)");
    eprintln!("  -c, --config <FILE>      JSON config file; flags override it");
    eprintln!("  -s, --script <FILE>      Control script (at <tick> resize <n> | reset)");
    eprintln!("  --history <FILE>         Write the run history as JSON");
    eprintln!("  -v, --verbose            Increase log verbosity (repeatable)");
    eprintln!("  -h, --help               Show this help message");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  {} --packet jobs.json --partitions 4 --max-ticks 100", program);
    eprintln!(
        "  {} -p jobs.json -t 50 --script resize.ctl --history run.json",
        program
    );
}
