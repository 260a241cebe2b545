//! PagePulse - batch page-performance auditor
//!
//! A CLI tool that runs a performance audit engine over every
//! configured URL in Mobile/Desktop and Normal/Incognito modes,
//! escalates through rendering fallback tiers for pages that refuse to
//! paint headlessly, and aggregates every result into a spreadsheet
//! report.
//!
//! Exit codes:
//!   0 - Success (all audits resolved, workbook written)
//!   1 - Runtime error (config, template, engine failure, etc.)

mod aggregate;
mod cli;
mod config;
mod extract;
mod matrix;
mod models;
mod paths;
mod runlog;
mod runner;
mod scheduler;

use anyhow::{bail, Context, Result};
use cli::Args;
use config::Config;
use extract::{DiagnosticExtractor, NullExtractor, ScraperProcessExtractor};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("PagePulse v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    // Run the audits
    match run(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Run failed: {}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .pagepulse.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(".pagepulse.toml");

    if path.exists() {
        eprintln!("⚠️  .pagepulse.toml already exists. Remove it first or edit it manually.");
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).context("Failed to write .pagepulse.toml")?;

    println!("✅ Created .pagepulse.toml with default settings.");
    println!("   Edit it to set the audit URLs, template, and engine binary.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run the complete audit workflow. Returns exit code.
async fn run(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    if config.targets.urls.is_empty() {
        bail!("No URLs configured. Pass --urls or set [targets] urls in .pagepulse.toml");
    }

    // CLI screenshot choice overrides the config-file option code.
    let policy = match args.screenshot {
        Some(choice) => choice.policy(),
        None => config.screenshot_policy()?,
    };

    // Step 1: Build the task matrix
    let tasks = matrix::build_matrix(&config.targets.urls);
    println!(
        "🗺️  Task matrix: {} URLs × {} combinations = {} audits",
        config.targets.urls.len(),
        models::ALL_DEVICES.len() * models::ALL_MODES.len(),
        tasks.len()
    );

    // Handle --dry-run: print the matrix and exit
    if args.dry_run {
        return handle_dry_run(&tasks);
    }

    // Step 2: Validate the template and coordinate mapping up front, so
    // a bad configuration fails before any audit has run.
    let template = Path::new(&config.run.template);
    let surfaces = aggregate::detail_surface_count(template)
        .with_context(|| format!("Failed to inspect template: {}", config.run.template))?;
    let map = aggregate::coords::CoordinateMap::new(&config.targets.urls, surfaces)?;
    info!(
        "Coordinate map ready: {} segments over {} detail surfaces",
        map.segments().len(),
        surfaces
    );

    // Step 3: Prepare the per-run output folder
    let timestamp = paths::folder_timestamp();
    let run_paths =
        paths::RunPaths::prepare(Path::new(&config.run.output_root), template, &timestamp)?;
    println!("📁 Output folder: {}", run_paths.root.display());

    // Step 4: Assemble the shared run context
    let extractor: Box<dyn DiagnosticExtractor> = if config.engine.scraper.is_empty() {
        info!("No scraper configured; diagnostic extraction disabled");
        Box::new(NullExtractor)
    } else {
        Box::new(ScraperProcessExtractor::new(config.engine.scraper.clone()))
    };

    let log = runlog::RunLogWriter::new(run_paths.log_path.clone());
    let workbook_path = run_paths.workbook_path.clone();
    let ctx = Arc::new(runner::RunContext {
        paths: run_paths,
        invoker: runner::AuditInvoker {
            engine_bin: config.engine.binary.clone(),
            browser_bin: config.engine.browser.clone(),
            debug_port: config.engine.debug_port,
            tier_timeout: Duration::from_secs(config.engine.timeout_seconds),
            max_wait_ms: config.engine.max_wait_ms,
            browser_warmup: Duration::from_secs(3),
        },
        extractor,
        log,
        policy,
    });

    // Step 5: Run the matrix in batches
    println!(
        "\n🚦 Running {} audits, {} at a time (engine: {})\n",
        tasks.len(),
        config.run.batch_size,
        config.engine.binary
    );

    let scheduler = scheduler::BatchScheduler::new(config.run.batch_size);
    let summary = {
        let ctx = ctx.clone();
        scheduler
            .run_all(tasks, move |task| {
                let ctx = ctx.clone();
                async move { runner::run_task(&ctx, &task).await }
            })
            .await
    };

    // Step 6: One-time finalization. The scheduler only returns after
    // every task has resolved, so this runs exactly once per process.
    ctx.paths.arrange_files()?;

    println!("\n📊 Aggregating results into the workbook...");
    let stats = aggregate::aggregate(&ctx.paths.log_path, &workbook_path, &map)?;
    if stats.skipped > 0 {
        warn!("{} log records could not be applied", stats.skipped);
    }

    // Print summary
    let duration = start_time.elapsed().as_secs_f64();
    println!("\n📊 Run Summary:");
    println!("   Audits succeeded: {}", summary.succeeded);
    println!("   Audits failed: {}", summary.failed);
    println!("   Workbook cells applied: {}", stats.applied);
    println!("   Duration: {:.1}s", duration);
    println!(
        "\n✅ Run complete! Workbook saved to: {}",
        workbook_path.display()
    );

    Ok(if summary.failed > 0 { 1 } else { 0 })
}

/// Handle --dry-run: print every task that would run, then exit.
fn handle_dry_run(tasks: &[models::Task]) -> Result<i32> {
    println!("\n🔍 Dry run: listing audits (no engine calls)...\n");

    for task in tasks {
        println!(
            "     📄 [{}] {} ({}/{})",
            task.label(),
            task.url,
            task.sequence_index + 1,
            task.total_count
        );
    }

    println!("\n   Total: {} audits", tasks.len());
    println!("\n✅ Dry run complete. No engine calls were made.");
    Ok(0)
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from .pagepulse.toml");
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
