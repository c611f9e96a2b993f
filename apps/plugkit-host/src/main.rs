use anyhow::Result;
use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use plugkit::{
    ActivationConfig, ActivationSource, FactoryCatalog, InventorySource, LoaderOptions,
    ManifestDirSource, ModuleHost, Plan, RunOptions, ShutdownOptions,
};
use plugkit_bootstrap::{AppConfig, AppConfigProvider, CliArgs, ConfigProvider};

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod registered_modules;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Adapter to make `AppConfigProvider` implement `plugkit::ConfigProvider`.
struct PlugkitConfigAdapter(Arc<AppConfigProvider>);

impl plugkit::ConfigProvider for PlugkitConfigAdapter {
    fn get_module_config(&self, module_id: &str) -> Option<&serde_json::Value> {
        self.0.get_module_config(module_id)
    }
}

/// Plugkit Host - discovers, resolves and runs plugin modules
#[derive(Parser)]
#[command(name = "plugkit-host")]
#[command(about = "Plugkit Host - discovers, resolves and runs plugin modules")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory with module manifests (overrides config)
    #[arg(long)]
    modules_dir: Option<PathBuf>,

    /// Activation (exclude) list file (overrides config)
    #[arg(long)]
    activation_file: Option<PathBuf>,

    /// Print effective configuration (YAML) and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the host and run until a shutdown signal
    Run,
    /// Validate configuration and the activation file, then exit
    Check,
    /// Discover and resolve modules, print the plan without initializing
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let args = CliArgs {
        config: cli.config.as_ref().map(|p| p.to_string_lossy().to_string()),
        modules_dir: cli.modules_dir.as_ref().map(|p| p.to_string_lossy().to_string()),
        activation_file: cli
            .activation_file
            .as_ref()
            .map(|p| p.to_string_lossy().to_string()),
        print_config: cli.print_config,
        verbose: cli.verbose,
    };

    // 1) defaults -> 2) YAML (if provided) -> 3) env (APP__*) -> 4) CLI overrides
    // Also normalizes + creates host.home_dir.
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    config.apply_cli_overrides(&args);

    let logging_config = config.logging.clone().unwrap_or_default();
    plugkit_bootstrap::init_logging(&logging_config, Path::new(&config.host.home_dir));

    tracing::info!(
        home_dir = %config.host.home_dir,
        modules_dir = %config.host.modules_path().display(),
        "Plugkit Host starting"
    );

    if args.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_host(config).await,
        Commands::Check => check_config(&config),
        Commands::List => list_modules(&config),
    }
}

fn build_host(config: &AppConfig) -> ModuleHost {
    let config_provider = Arc::new(PlugkitConfigAdapter(Arc::new(AppConfigProvider::new(
        config.clone(),
    ))));

    ModuleHost::builder()
        .source(Arc::new(InventorySource))
        .source(Arc::new(ManifestDirSource::new(config.host.modules_path())))
        .activation(ActivationSource::File(config.host.activation_path()))
        .factories(FactoryCatalog::from_inventory())
        .config_provider(config_provider)
        .options(LoaderOptions {
            init_timeout: config.host.init_timeout,
            shutdown_timeout: config.host.shutdown_timeout,
            parallel: config.host.parallel_init,
        })
        .build()
}

async fn run_host(config: AppConfig) -> Result<()> {
    tracing::info!("Initializing modules…");
    let host = Arc::new(build_host(&config));
    plugkit::run(RunOptions {
        host,
        shutdown: ShutdownOptions::Signals,
    })
    .await
}

fn check_config(config: &AppConfig) -> Result<()> {
    tracing::info!("Checking configuration…");
    let path = config.host.activation_path();
    match ActivationConfig::read(&path)? {
        Some(activation) => println!(
            "Activation file {}: {:?}, {} listed",
            path.display(),
            activation.mode,
            activation.list.len()
        ),
        None => println!("Activation file {} not found; all modules are included", path.display()),
    }
    println!("Configuration is valid");
    println!("{}", config.to_yaml()?);
    Ok(())
}

fn list_modules(config: &AppConfig) -> Result<()> {
    let plan = build_host(config).plan()?;
    print!("{}", render_plan(&plan));
    Ok(())
}

/// Human-readable report of a plan: load order, rejects, warnings.
fn render_plan(plan: &Plan) -> String {
    let mut out = String::new();
    let registry = &plan.registry;
    let resolved = &plan.resolved;

    let _ = writeln!(out, "Activation mode: {:?}", plan.config.mode);
    let _ = writeln!(out, "Load order ({}):", resolved.ordered.len());
    for (i, id) in resolved.ordered.iter().enumerate() {
        match registry.get(id) {
            Some(d) => {
                let caps: Vec<&str> = d.capabilities.iter().map(|c| c.interface_name()).collect();
                let _ = writeln!(out, "  {:>2}. {id} {} [{}]", i + 1, d.version, caps.join(", "));
            }
            None => {
                let _ = writeln!(out, "  {:>2}. {id}", i + 1);
            }
        }
    }

    if !resolved.rejected.is_empty() {
        let _ = writeln!(out, "Rejected ({}):", resolved.rejected.len());
        for (id, reason) in &resolved.rejected {
            let _ = writeln!(out, "  {id}: {reason}");
        }
    }
    if !resolved.warnings.is_empty() {
        let _ = writeln!(out, "Warnings:");
        for w in &resolved.warnings {
            let _ = writeln!(out, "  {w}");
        }
    }
    if !registry.issues().is_empty() {
        let _ = writeln!(out, "Discovery issues:");
        for issue in registry.issues() {
            let _ = writeln!(out, "  {issue}");
        }
    }
    let env = registry.environment_vars();
    if !env.is_empty() {
        let _ = writeln!(out, "Environment:");
        for (name, value) in &env {
            let _ = writeln!(out, "  {name}={value}");
        }
    }
    out
}
