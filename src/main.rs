//! Job-Harvest main entry point
//!
//! This is the command-line interface for the Job-Harvest listing harvester.

use clap::{Parser, Subcommand};
use job_harvest::browser::ChromiumLauncher;
use job_harvest::config::{load_config_with_hash, Config};
use job_harvest::credentials::CredentialStore;
use job_harvest::crawler::{StopFlag, Supervisor};
use job_harvest::secrets::{generate_key, AesCipher};
use job_harvest::session::ConsoleCaptchaSignal;
use job_harvest::storage::{open_storage, share, StorageError};
use job_harvest::url::{build_search_url, SearchFilters};
use job_harvest::HarvestError;
use secrecy::SecretString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Job-Harvest: an unattended harvester for paginated job listings
///
/// Job-Harvest logs into a listing site with a stored identity, walks the
/// search results page by page, and stores every distinct listing exactly
/// once. Failed sessions are discarded and restarted.
#[derive(Parser, Debug)]
#[command(name = "job-harvest")]
#[command(version = "0.1.0")]
#[command(about = "An unattended harvester for paginated job listings", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Harvest listings until interrupted (default)
    Run {
        /// Location filter, overrides [search] location
        #[arg(long)]
        location: Option<String>,

        /// Keyword filter, overrides [search] keywords
        #[arg(long)]
        keywords: Option<String>,

        /// Stop after this many sessions
        #[arg(long)]
        max_iterations: Option<u64>,
    },

    /// Validate config and show what would be harvested without opening a browser
    DryRun,

    /// Show statistics from the database and exit
    Stats,

    /// Store a new identity with an encrypted password
    AddIdentity {
        #[arg(long)]
        name: String,

        #[arg(long)]
        email: String,

        /// Profile data as a JSON object
        #[arg(long)]
        profile: Option<String>,
    },

    /// Print a fresh credential encryption key
    Keygen {
        /// Append the key to this dotenv file instead of printing it
        #[arg(long)]
        env_file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            cfg
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    match cli.command {
        None => handle_run(config, None, None, None).await?,
        Some(Command::Run {
            location,
            keywords,
            max_iterations,
        }) => handle_run(config, location, keywords, max_iterations).await?,
        Some(Command::DryRun) => handle_dry_run(&config)?,
        Some(Command::Stats) => handle_stats(&config)?,
        Some(Command::AddIdentity {
            name,
            email,
            profile,
        }) => handle_add_identity(&config, &name, &email, profile.as_deref())?,
        Some(Command::Keygen { env_file }) => handle_keygen(&config, env_file.as_deref())?,
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("job_harvest=info,warn"),
            1 => EnvFilter::new("job_harvest=debug,info"),
            2 => EnvFilter::new("job_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn load_cipher(config: &Config) -> Result<AesCipher, HarvestError> {
    let env_file = config.secrets.env_file.as_deref().map(Path::new);
    Ok(AesCipher::from_env(&config.secrets.key_env, env_file)?)
}

fn search_filters(
    config: &Config,
    location: Option<String>,
    keywords: Option<String>,
) -> SearchFilters {
    SearchFilters::new(
        keywords.or_else(|| config.search.keywords.clone()),
        location.or_else(|| config.search.location.clone()),
    )
}

/// Handles the dry-run mode: validates config and shows what would be harvested
fn handle_dry_run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Job-Harvest Dry Run ===\n");

    println!("Site:");
    println!("  Platform: {}", config.site.platform);
    println!("  Base URL: {}", config.site.base_url);
    println!("  Login URL: {}", config.site.login_url);

    let filters = search_filters(config, None, None);
    let search_url = build_search_url(&config.site.search_url, &filters)?;
    println!("\nSearch:");
    println!("  Keywords: {}", filters.keywords.as_deref().unwrap_or("-"));
    println!("  Location: {}", filters.location.as_deref().unwrap_or("-"));
    println!("  URL: {}", search_url);

    println!("\nBrowser:");
    match &config.browser.remote_url {
        Some(remote) => println!("  Remote DevTools: {}", remote),
        None => println!(
            "  Local Chrome ({})",
            if config.browser.headless {
                "headless"
            } else {
                "headed"
            }
        ),
    }
    println!("  Timeout: {}s", config.browser.timeout_secs);
    println!("  Scroll attempts: {}", config.browser.scroll_attempts);

    println!("\nStorage:");
    println!("  Database: {}", config.storage.database_path);

    let storage = share(open_storage(Path::new(&config.storage.database_path))?);
    let cipher = load_cipher(config)?;
    let credentials = CredentialStore::new(storage, Arc::new(cipher));
    let identity = credentials.identity_by_email(&config.identity.email)?;

    println!("\n✓ Configuration is valid");
    println!("✓ Encryption key loaded from {}", config.secrets.key_env);
    println!(
        "✓ Would authenticate as {} ({})",
        identity.name, identity.email
    );

    Ok(())
}

/// Handles the stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    use job_harvest::output::{load_statistics, print_statistics};

    println!("Database: {}\n", config.storage.database_path);

    let storage = open_storage(Path::new(&config.storage.database_path))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the add-identity mode: prompts for the password and stores it encrypted
fn handle_add_identity(
    config: &Config,
    name: &str,
    email: &str,
    profile: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let profile = profile
        .map(serde_json::from_str::<serde_json::Value>)
        .transpose()?;

    let storage = share(open_storage(Path::new(&config.storage.database_path))?);
    let credentials = CredentialStore::new(storage, Arc::new(load_cipher(config)?));

    let password = dialoguer::Password::new()
        .with_prompt(format!("Password for {}", email))
        .with_confirmation("Repeat password", "Passwords do not match")
        .interact()?;

    match credentials.create_identity(name, email, &SecretString::from(password), profile) {
        Ok(id) => {
            println!("✓ Identity {} stored for {}", id, email);
            Ok(())
        }
        Err(HarvestError::Storage(StorageError::ConstraintViolation(_))) => {
            tracing::warn!("An identity with email {} already exists", email);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Handles the keygen mode: prints a key or appends it to a dotenv file
fn handle_keygen(config: &Config, env_file: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let key = generate_key();

    match env_file {
        Some(path) => {
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            writeln!(file, "{}={}", config.secrets.key_env, key)?;
            println!(
                "✓ {} written to {}",
                config.secrets.key_env,
                path.display()
            );
        }
        None => println!("{}={}", config.secrets.key_env, key),
    }

    Ok(())
}

/// Handles the main harvest loop
async fn handle_run(
    config: Config,
    location: Option<String>,
    keywords: Option<String>,
    max_iterations: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let filters = search_filters(&config, location, keywords);
    tracing::info!(
        "Harvesting {} (keywords: {}, location: {})",
        config.site.platform,
        filters.keywords.as_deref().unwrap_or("-"),
        filters.location.as_deref().unwrap_or("-")
    );

    let storage = share(open_storage(Path::new(&config.storage.database_path))?);
    let credentials = CredentialStore::new(Arc::clone(&storage), Arc::new(load_cipher(&config)?));
    let launcher = ChromiumLauncher::new(config.browser.clone());

    let stop = StopFlag::new();
    let on_interrupt = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing the current page");
            on_interrupt.raise();
        }
    });

    let mut supervisor = Supervisor::new(
        launcher,
        credentials,
        storage,
        Arc::new(ConsoleCaptchaSignal),
        Arc::new(config),
        filters,
        stop,
    );
    if let Some(max) = max_iterations {
        supervisor = supervisor.with_max_iterations(max);
    }

    match supervisor.run().await {
        Ok(report) => {
            tracing::info!(
                "Harvest stopped after {} sessions ({} restarts), {} new listings",
                report.iterations,
                report.restarts,
                report.inserted
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            Err(e.into())
        }
    }
}
