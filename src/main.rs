//! DROUGHTSIM - CLI Entry Point
//!
//! Predator-prey ecosystem simulator with stochastic drought.

use clap::{Parser, Subcommand, ValueEnum};
use droughtsim::memory_monitor::format_bytes;
use droughtsim::{benchmark, Config, CsvRecordSink, RunManager, SimulationMode};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "droughtsim")]
#[command(version)]
#[command(about = "Predator-prey ecosystem simulator with stochastic drought")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Grid,
    Aggregate,
}

impl From<ModeArg> for SimulationMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Grid => SimulationMode::Grid,
            ModeArg::Aggregate => SimulationMode::Aggregate,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run a new simulation
    Run {
        /// Configuration file (YAML)
        #[arg(short, long, default_value = "config.yaml")]
        config: PathBuf,

        /// Engine variant (overrides the config file)
        #[arg(short, long, value_enum)]
        mode: Option<ModeArg>,

        /// Maximum number of steps (overrides the config file)
        #[arg(short, long)]
        steps: Option<u64>,

        /// Output directory for run records
        #[arg(short, long, default_value = "output")]
        output: PathBuf,

        /// Random seed for reproducibility
        #[arg(long)]
        seed: Option<u64>,

        /// Run identifier, used as the output folder name
        #[arg(long)]
        run_id: Option<String>,

        /// Quiet mode (minimal output)
        #[arg(short, long)]
        quiet: bool,

        /// Pace steps against the real clock instead of running flat out
        #[arg(long)]
        realtime: bool,
    },

    /// Generate default configuration file
    Init {
        /// Output path
        #[arg(short, long, default_value = "config.yaml")]
        output: PathBuf,
    },

    /// Check a configuration file and report the first problem
    Validate {
        /// Configuration file (YAML)
        #[arg(short, long, default_value = "config.yaml")]
        config: PathBuf,
    },

    /// Run performance benchmark
    Benchmark {
        /// Number of steps
        #[arg(short, long, default_value = "1000")]
        steps: u64,

        /// Engine variant
        #[arg(short, long, value_enum, default_value = "grid")]
        mode: ModeArg,

        /// Initial prey agents (grid mode)
        #[arg(short, long, default_value = "500")]
        population: usize,
    },
}

fn init_logging(default_level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            mode,
            steps,
            output,
            seed,
            run_id,
            quiet,
            realtime,
        } => {
            let overrides = RunOverrides {
                mode: mode.map(SimulationMode::from),
                steps,
                seed,
                run_id,
            };
            run_simulation(config, overrides, output, quiet, realtime)
        }

        Commands::Init { output } => {
            init_logging("info");
            generate_config(output)
        }

        Commands::Validate { config } => {
            init_logging("info");
            validate_config(config)
        }

        Commands::Benchmark {
            steps,
            mode,
            population,
        } => {
            init_logging("warn");
            run_benchmark(steps, mode.into(), population)
        }
    }
}

/// Command-line values that win over the config file
struct RunOverrides {
    mode: Option<SimulationMode>,
    steps: Option<u64>,
    seed: Option<u64>,
    run_id: Option<String>,
}

fn load_config(path: &Path) -> Result<(Config, bool), Box<dyn std::error::Error>> {
    if path.exists() {
        Ok((Config::from_file(path)?, true))
    } else {
        Ok((Config::default(), false))
    }
}

fn run_simulation(
    config_path: PathBuf,
    overrides: RunOverrides,
    output: PathBuf,
    quiet: bool,
    realtime: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let (mut config, from_file) = load_config(&config_path)?;
    init_logging(&config.logging.log_level);

    if from_file {
        log::info!("Loaded config from {:?}", config_path);
    } else {
        log::info!("Using default configuration");
    }

    if let Some(mode) = overrides.mode {
        config.run.mode = mode;
    }
    if let Some(steps) = overrides.steps {
        config.run.max_steps = steps;
    }
    if let Some(seed) = overrides.seed {
        config.run.seed = seed;
    }
    match overrides.run_id {
        Some(id) => config.run.run_id = id,
        // Default runs must not overwrite each other's folders
        None if !from_file => {
            let uuid = uuid::Uuid::new_v4().simple().to_string();
            config.run.run_id = format!("run-{}", &uuid[..8]);
        }
        None => {}
    }

    let stats_interval = config.logging.stats_interval.max(1);
    let dt = config.dt();

    println!("Starting simulation");
    println!("  Run: {}", config.run.run_id);
    println!("  Mode: {}", config.run.mode.name());
    println!("  Seed: {}", config.run.seed);
    println!("  Max steps: {}", config.run.max_steps);
    if config.run.mode == SimulationMode::Grid {
        println!("  Grid size: {}x{}", config.grid.width, config.grid.height);
    }
    println!();

    let mut run = RunManager::new(config, CsvRecordSink::new(&output));
    run.start()?;

    let start = Instant::now();
    let mut last_tick = start;
    let mut last_printed = 0;

    while run.is_running() {
        if realtime {
            std::thread::sleep(Duration::from_secs_f64(dt.min(0.05)));
            let now = Instant::now();
            run.tick(now.duration_since(last_tick).as_secs_f64())?;
            last_tick = now;
        } else {
            run.tick(dt)?;
        }

        let steps = run.steps();
        if !quiet && steps != last_printed && steps % stats_interval == 0 {
            last_printed = steps;
            if let Some(world) = run.world() {
                println!("{}", world.census().summary(steps));
            }
        }
    }

    let elapsed = start.elapsed();
    let steps_per_sec = run.steps() as f64 / elapsed.as_secs_f64().max(f64::EPSILON);

    println!();
    println!("=== Simulation Complete ===");
    println!("Time: {:.2}s", elapsed.as_secs_f64());
    println!("Steps: {}", run.steps());
    println!("Speed: {:.1} steps/s", steps_per_sec);
    if let Some(summary) = run.summary() {
        println!("Ended: {:?}", summary.end_reason);
        println!(
            "Prey: {:.2} | Predators: {:.2} | Resources: {:.2} | Drought: {:.2}",
            summary.prey, summary.predators, summary.resources, summary.drought
        );
        if let Some(bytes) = summary.memory_bytes {
            println!("Peak memory: {}", format_bytes(bytes));
        }
    }
    println!("Records: {:?}", output.join(&run.config().run.run_id));

    Ok(())
}

fn generate_config(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    config.save(&output)?;
    println!("Configuration saved to: {:?}", output);
    Ok(())
}

fn validate_config(path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_file(&path)?;
    match config.validate() {
        Ok(()) => {
            println!("{:?}: configuration OK", path);
            Ok(())
        }
        Err(e) => {
            eprintln!("{:?}: {}", path, e);
            Err(e.into())
        }
    }
}

fn run_benchmark(
    steps: u64,
    mode: SimulationMode,
    population: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== DROUGHTSIM Benchmark ===");
    println!("Mode: {}", mode.name());
    println!("Steps: {}", steps);
    if mode == SimulationMode::Grid {
        println!("Population: {}", population);
    }
    println!();

    let result = benchmark(steps, mode, population)?;
    println!("{}", result);

    Ok(())
}
