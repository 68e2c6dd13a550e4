use clap::{Parser, Subcommand};
use kodo_bindings::app_config::AppConfig;
use kodo_bindings::bindings::{self, FamilyId, Module, Role};
use kodo_bindings::demo::{self, DemoConfig, TransferReport};
use kodo_bindings::error::{Error, Result};
use kodo_bindings::field::FieldTag;
use kodo_bindings::logger;
use log::{error, info, warn};
use rayon::prelude::*;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    /// TOML configuration file with [bindings] and [demo] sections
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[clap(short, long, global = true)]
    verbose: bool,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Lists every registered surface name
    List {
        /// Only surfaces of this family (e.g. sliding_window)
        #[clap(long)]
        family: Option<String>,

        /// Print names, roles and operations as JSON
        #[clap(long)]
        json: bool,
    },
    /// Prints the operations of one surface
    Describe {
        /// Registered name, e.g. SlidingWindowDecoderBinary8
        #[clap(required = true)]
        name: String,
    },
    /// Runs one encoder to decoder transfer through the registered surfaces
    Demo {
        #[clap(long, default_value = "full_vector")]
        family: String,

        #[clap(long, default_value = "binary8")]
        field: String,

        #[clap(long)]
        symbols: Option<usize>,

        #[clap(long)]
        symbol_size: Option<usize>,

        /// Probability of dropping a payload
        #[clap(long)]
        loss: Option<f64>,

        #[clap(long)]
        seed: Option<u64>,
    },
    /// Runs independent transfers in parallel, one instance pair per task
    Bench {
        #[clap(long, default_value_t = 64)]
        rounds: usize,

        #[clap(long, default_value = "full_vector")]
        family: String,

        #[clap(long, default_value = "binary8")]
        field: String,
    },
}

#[derive(Serialize)]
struct SurfaceInfo<'a> {
    name: &'a str,
    role: Role,
    operations: Vec<&'static str>,
}

fn main() {
    let cli = Cli::parse();
    logger::init_with_default(if cli.verbose { "debug" } else { "info" });

    if let Err(e) = run(cli) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };
    config.validate().map_err(Error::Config)?;
    let module = bindings::assemble(&config.bindings)?;
    info!(
        "kodo-bindings {}: {} surfaces registered",
        module.version(),
        module.len()
    );

    match cli.command {
        Commands::List { family, json } => list(&module, family.as_deref(), json),
        Commands::Describe { name } => describe(&module, &name),
        Commands::Demo {
            family,
            field,
            symbols,
            symbol_size,
            loss,
            seed,
        } => {
            let mut cfg = config.demo.clone();
            cfg.symbols = symbols.unwrap_or(cfg.symbols);
            cfg.symbol_size = symbol_size.unwrap_or(cfg.symbol_size);
            cfg.loss = loss.unwrap_or(cfg.loss);
            cfg.seed = seed.unwrap_or(cfg.seed);
            let report = demo::transfer(&module, family.parse()?, field.parse()?, &cfg)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.verified {
                warn!("decoded block does not match the source block");
            }
            Ok(())
        }
        Commands::Bench {
            rounds,
            family,
            field,
        } => bench(&module, family.parse()?, field.parse()?, &config.demo, rounds),
    }
}

fn list(module: &Module, family: Option<&str>, json: bool) -> Result<()> {
    let prefix = match family {
        Some(f) => Some(f.parse::<FamilyId>()?.stack_name()),
        None => None,
    };
    let selected: Vec<SurfaceInfo<'_>> = module
        .names()
        .into_iter()
        .filter(|name| prefix.map_or(true, |p| name.starts_with(p)))
        .filter_map(|name| module.surface(name))
        .map(|s| SurfaceInfo {
            name: s.name(),
            role: s.role(),
            operations: s.operations(),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&selected)?);
    } else {
        for s in &selected {
            println!("{}", s.name);
        }
    }
    Ok(())
}

fn describe(module: &Module, name: &str) -> Result<()> {
    let surface = module.surface(name).ok_or_else(|| Error::NoSuchOperation {
        surface: "module".into(),
        operation: name.to_string(),
    })?;
    println!("{} ({})", surface.name(), surface.role());
    for op in surface.operations() {
        println!("  {}", op);
    }
    Ok(())
}

fn bench(module: &Module, family: FamilyId, field: FieldTag, base: &DemoConfig, rounds: usize) -> Result<()> {
    let start = Instant::now();
    let reports: Vec<TransferReport> = (0..rounds)
        .into_par_iter()
        .map(|round| {
            let cfg = DemoConfig {
                seed: base.seed.wrapping_add(round as u64),
                ..base.clone()
            };
            demo::transfer(module, family, field, &cfg)
        })
        .collect::<Result<Vec<_>>>()?;
    let elapsed = start.elapsed();

    let verified = reports.iter().filter(|r| r.verified).count();
    let sent: usize = reports.iter().map(|r| r.sent).sum();
    let bytes = verified * base.symbols * base.symbol_size;
    println!(
        "{} rounds of {} over {} in {:.2?}: {} verified, {:.2} payloads/round, {:.1} MB/s",
        rounds,
        family,
        field,
        elapsed,
        verified,
        sent as f64 / rounds.max(1) as f64,
        bytes as f64 / elapsed.as_secs_f64().max(f64::EPSILON) / 1e6
    );
    if verified != rounds {
        warn!("{} rounds did not decode", rounds - verified);
    }
    Ok(())
}
