use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use modkit::{run, run_phases, ClientHub, ModuleRegistry, RunOptions, ShutdownOptions};
use modkit_docstore::{ConnectOpts, DocumentStore};
use registrations::contract::identity::IdentityProvider;
use registrations::contract::model::{Principal, RegisterOutcome, Registration, Role};
use registrations::module::MODULE_NAME;
use registrations::{client, Registrations, SessionIdentityProvider};
use runtime::{AppConfig, AppConfigProvider, CliArgs};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

// Adapter to make AppConfigProvider implement modkit::ConfigProvider
struct ModkitConfigAdapter(Arc<AppConfigProvider>);

impl modkit::ConfigProvider for ModkitConfigAdapter {
    fn get_module_config(&self, module_name: &str) -> Option<&serde_json::Value> {
        self.0.get_module_config(module_name)
    }
}

/// Attendance Server - event registration and check-in
#[derive(Parser)]
#[command(name = "attendance-server")]
#[command(about = "Attendance Server - event registration and check-in")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print current configuration and exit
    #[arg(long, global = true)]
    print_config: bool,

    /// Log verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use an in-memory document store
    #[arg(long, global = true)]
    mock: bool,

    /// Signed-in user id (anonymous when omitted)
    #[arg(long, global = true)]
    user: Option<String>,

    /// Role of the signed-in user (organizer, student, ...)
    #[arg(long, global = true, requires = "user")]
    role: Option<Role>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the store and keep it in sync with the session until interrupted
    Run,
    /// Check configuration
    Check,
    /// List the registrations visible to the current user
    List,
    /// Register the current user for an event
    Register {
        #[arg(long)]
        event: String,
    },
    /// Mark a registration as checked in
    CheckIn {
        #[arg(long)]
        registration: String,
    },
    /// Show registered and checked-in counts for an event
    Summary {
        #[arg(long)]
        event: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // CLI args passed down to config/app
    let args = CliArgs {
        config: cli.config.as_ref().map(|p| p.to_string_lossy().to_string()),
        print_config: cli.print_config,
        verbose: cli.verbose,
        mock: cli.mock,
    };

    // Load configuration (normalized home_dir is applied inside)
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;

    // Apply CLI overrides (mock store / verbosity)
    config.apply_cli_overrides(&args);

    // Initialize logging
    let logging_config = config.logging.as_ref().cloned().unwrap_or_default();
    runtime::logging::init_logging_from_config(&logging_config, Path::new(&config.runtime.home_dir));
    tracing::info!("Attendance Server starting");

    // Print config and exit if requested
    if cli.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    let identity = Arc::new(match cli.user {
        Some(user) => SessionIdentityProvider::signed_in(Principal::new(user, cli.role)),
        None => SessionIdentityProvider::anonymous(),
    });

    // Execute command
    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_server(config, identity).await,
        Commands::Check => check_config(config),
        Commands::List => run_command(config, identity, Action::List).await,
        Commands::Register { event } => {
            run_command(config, identity, Action::Register(event)).await
        }
        Commands::CheckIn { registration } => {
            run_command(config, identity, Action::CheckIn(registration)).await
        }
        Commands::Summary { event } => {
            run_command(config, identity, Action::Summary(event)).await
        }
    }
}

/// One-shot store operations run between module start and stop.
enum Action {
    List,
    Register(String),
    CheckIn(String),
    Summary(String),
}

async fn connect_store(config: &AppConfig) -> Result<Arc<dyn DocumentStore>> {
    let db = config
        .database
        .as_ref()
        .context("database section is required")?;
    let url = db.url.trim();
    if url.is_empty() {
        anyhow::bail!("Database URL not configured");
    }

    let opts = ConnectOpts {
        max_conns: db.max_conns,
        busy_timeout: db.busy_timeout_ms.map(|ms| Duration::from_millis(ms.into())),
        base_dir: Some(PathBuf::from(&config.runtime.home_dir)),
        create_sqlite_dirs: true,
        ..ConnectOpts::default()
    };

    tracing::info!("Connecting to document store: {}", url);
    let store = modkit_docstore::connect(url, opts)
        .await
        .with_context(|| format!("failed to open document store '{url}'"))?;
    Ok(store)
}

async fn build_options(
    config: &AppConfig,
    identity: Arc<SessionIdentityProvider>,
) -> Result<RunOptions> {
    let docstore = connect_store(config).await?;

    // Provide module configs to modkit
    let modules_cfg = Arc::new(ModkitConfigAdapter(Arc::new(AppConfigProvider::new(
        config.clone(),
    ))));

    // The identity provider must be in the hub before modules init
    let client_hub = Arc::new(ClientHub::new());
    client_hub.register::<dyn IdentityProvider>(identity);

    let module = Arc::new(Registrations::default());
    let registry = ModuleRegistry::builder()
        .stateful(MODULE_NAME, module.clone(), module)
        .build()?;

    let stop_timeout = match config.runtime.shutdown_timeout_sec {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    };

    Ok(RunOptions {
        registry,
        modules_cfg,
        docstore: Some(docstore),
        client_hub,
        stop_timeout,
    })
}

async fn run_server(config: AppConfig, identity: Arc<SessionIdentityProvider>) -> Result<()> {
    tracing::info!("Initializing modules...");
    let opts = build_options(&config, identity).await?;
    run(opts, ShutdownOptions::Signals).await
}

async fn run_command(
    config: AppConfig,
    identity: Arc<SessionIdentityProvider>,
    action: Action,
) -> Result<()> {
    let opts = build_options(&config, identity).await?;

    run_phases(opts, |hub| async move {
        let api = client(&hub)?;
        match action {
            Action::List => {
                api.refresh().await?;
                let snapshot = api.snapshot();
                let rows = if snapshot.viewer.is_organizer() {
                    snapshot.all_registrations()
                } else {
                    snapshot.user_registrations()
                };
                if rows.is_empty() {
                    println!("No registrations");
                }
                for r in &rows {
                    println!("{}", format_registration(r));
                }
            }
            Action::Register(event) => {
                // Load first so an existing registration is recognized
                api.refresh().await?;
                let outcome = api.register_for_event(&event).await?;
                match outcome {
                    RegisterOutcome::Registered { registration_id } => {
                        println!("Registered: {registration_id}")
                    }
                    RegisterOutcome::AlreadyRegistered { registration_id } => {
                        println!("Already registered: {registration_id}")
                    }
                }
            }
            Action::CheckIn(registration) => {
                let outcome = api.mark_attendance(&registration).await?;
                println!(
                    "Checked in: {} at {}",
                    outcome.registration_id,
                    outcome.checked_in_at.to_rfc3339()
                );
            }
            Action::Summary(event) => {
                api.refresh().await?;
                let summary = api.attendance_summary(&event);
                println!(
                    "Event {event}: {} registered, {} checked in",
                    summary.registered, summary.checked_in
                );
            }
        }
        Ok(())
    })
    .await
}

fn format_registration(r: &Registration) -> String {
    let checked_in = match r.checked_in_at {
        Some(at) => format!("checked in {}", at.to_rfc3339()),
        None => "not checked in".to_string(),
    };
    format!(
        "{}\tuser={}\tevent={}\tregistered={}\t{}",
        r.id,
        r.user_id,
        r.event_id,
        r.registration_date.to_rfc3339(),
        checked_in
    )
}

fn check_config(config: AppConfig) -> Result<()> {
    tracing::info!("Checking configuration...");

    // AppConfig::load_* already normalized & created home_dir
    tracing::info!("Configuration is valid");
    println!("Configuration check passed");
    println!("Attendance config:");
    println!("{}", config.to_yaml()?);

    Ok(())
}
