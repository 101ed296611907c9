//! pipeline-runner: headless warehouse pipeline runner.
//!
//! Usage:
//!   pipeline-runner --seed 12345 --db warehouse.db
//!   pipeline-runner --seed 12345 --population 5000 --data-dir ./data

use std::env;
use std::path::PathBuf;

use anyhow::Result;

use gta_core::config::WarehouseConfig;
use gta_core::pipeline::PipelineContext;
use gta_core::rng::RngBank;
use gta_core::store::WarehouseStore;
use gta_core::summary::WarehouseSummary;
use gta_core::tasks::build_pipeline;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let db = arg_str(&args, "--db", "warehouse.db");
    let data_dir = arg_str(&args, "--data-dir", "./data");
    let artifacts_dir = arg_str(&args, "--artifacts-dir", "./artifacts");
    let model_path = arg_str(&args, "--model", "./artifacts/fraud_model.json");

    let mut config = WarehouseConfig::load(&data_dir)?;
    if let Some(population) = args
        .windows(2)
        .find(|w| w[0] == "--population")
        .and_then(|w| w[1].parse().ok())
    {
        config.generator.population = population;
        config.validate()?;
    }

    println!("GTA warehouse pipeline-runner");
    println!("  seed:        {seed}");
    println!("  db:          {db}");
    println!("  data_dir:    {data_dir}");
    println!("  population:  {}", config.generator.population);
    println!();

    let store = WarehouseStore::open(&db)?;
    store.migrate()?;

    let run_id = format!("run-{seed}-{}", unix_seconds());
    store.insert_run(&run_id, seed, gta_core::VERSION, config.generator.end_date)?;

    // Derived tables are stamped with the generation window's end so
    // reruns with the same seed produce identical rows.
    let as_of = config.generator.end_date;
    let mut ctx = PipelineContext {
        store,
        config,
        rng_bank: RngBank::new(seed),
        run_id: run_id.clone(),
        artifacts_dir: PathBuf::from(artifacts_dir),
        model_path: PathBuf::from(model_path),
        as_of,
    };

    build_pipeline().run(&mut ctx)?;

    let summary = WarehouseSummary::collect(&ctx.store);
    println!("run_id: {run_id}");
    print!("{}", summary.render());
    Ok(())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

fn arg_str(args: &[String], flag: &str, default: &str) -> String {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].clone())
        .unwrap_or_else(|| default.to_string())
}

fn unix_seconds() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
