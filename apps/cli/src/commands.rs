//! CLI command definitions, routing, and tracing setup.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use leadsync_core::{ProgressReporter, SyncOrchestrator, SyncScheduler};
use leadsync_crm::ZohoClient;
use leadsync_mailer::{MailRequest, MailService};
use leadsync_server::AppState;
use leadsync_shared::{
    AppConfig, PassReport, SyncConfig, SyncStatus, init_config, load_config, load_config_from,
};
use leadsync_storage::Storage;
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// LeadSync: mirror CRM leads and keep the team informed.
#[derive(Parser)]
#[command(
    name = "leadsync",
    version,
    about = "Synchronize Zoho CRM leads into a local store and send templated notifications.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.leadsync/leadsync.toml).
    #[arg(long, env = "LEADSYNC_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the HTTP control surface and the daily scheduler.
    Serve {
        /// Listen address (overrides `[server].bind`).
        #[arg(long)]
        bind: Option<String>,
    },

    /// Run one synchronization pass in the foreground.
    Sync,

    /// Query a running instance's health and schedule.
    Health {
        /// Base URL of the running service.
        #[arg(long, default_value = "http://127.0.0.1:8000")]
        url: String,
    },

    /// Send a single templated email.
    SendEmail {
        /// Recipient address.
        #[arg(long)]
        to: String,

        /// Template name: default, lead_notification, sync_report or cold_email.
        #[arg(long, default_value = "default")]
        template: String,

        /// Template fields as a JSON object.
        #[arg(long)]
        data: Option<String>,

        /// Subject override.
        #[arg(long)]
        subject: Option<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "leadsync=info,tower_http=info",
        1 => "leadsync=debug,tower_http=debug",
        _ => "leadsync=trace,tower_http=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Serve { bind } => cmd_serve(config_path, bind.as_deref()).await,
        Command::Sync => cmd_sync(config_path).await,
        Command::Health { url } => cmd_health(&url).await,
        Command::SendEmail {
            to,
            template,
            data,
            subject,
        } => cmd_send_email(config_path, &to, &template, data.as_deref(), subject).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(config_path).await,
        },
    }
}

/// Load the config file and apply environment overrides.
fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let mut config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    config.apply_env_overrides();
    Ok(config)
}

/// Wire the CRM client, database and mailer into an orchestrator.
async fn build_orchestrator(config: &AppConfig) -> Result<Arc<SyncOrchestrator>> {
    let source = ZohoClient::from_config(&config.zoho).wrap_err("Zoho CRM client not configured")?;

    let db_path = Path::new(&config.database.path);
    let storage = Storage::open(db_path)
        .await
        .wrap_err_with(|| format!("cannot open lead database at {}", db_path.display()))?;

    let mail = Arc::new(MailService::from_config(config));
    let sync_config = SyncConfig::from(config);
    if sync_config.recipients.is_empty() {
        tracing::warn!("no notification recipients configured, summaries will be skipped");
    }

    Ok(Arc::new(SyncOrchestrator::new(
        Arc::new(source),
        Arc::new(storage),
        mail,
        sync_config,
    )))
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_serve(config_path: Option<&Path>, bind: Option<&str>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let bind = bind.unwrap_or(config.server.bind.as_str());
    let addr: SocketAddr = bind
        .parse()
        .map_err(|e| eyre!("invalid listen address '{bind}': {e}"))?;

    let orchestrator = build_orchestrator(&config).await?;
    let scheduler = Arc::new(SyncScheduler::new(&config.schedule)?);

    info!(%addr, schedule = %config.schedule.cron, "starting lead sync service");

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for shutdown signal");
        }
        info!("shutdown requested");
    };

    leadsync_server::serve(addr, AppState::new(orchestrator, scheduler), shutdown).await?;
    Ok(())
}

async fn cmd_sync(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let orchestrator = build_orchestrator(&config).await?;

    let reporter = CliProgress::new();
    let report = orchestrator.run_pass(&reporter).await;

    print_report(&report);

    if report.status == SyncStatus::Failed {
        return Err(eyre!("synchronization pass failed"));
    }
    Ok(())
}

fn print_report(report: &PassReport) {
    let elapsed = report.finished_at - report.started_at;
    println!();
    println!("  Pass:     {}", report.pass_id);
    println!("  Status:   {}", report.status);
    println!("  Total:    {}", report.total_leads);
    println!("  New:      {}", report.new_leads);
    println!("  Updated:  {}", report.updated_leads);
    println!(
        "  Emails:   {} alerts, {} cold, {} summaries sent ({} failed)",
        report.lead_alerts.sent,
        report.cold_emails.sent,
        report.summaries.sent,
        report.lead_alerts.failed + report.cold_emails.failed + report.summaries.failed,
    );
    println!(
        "  Time:     {:.1}s",
        elapsed.num_milliseconds() as f64 / 1000.0
    );
    if !report.errors.is_empty() {
        println!("  Errors:");
        for error in &report.errors {
            println!("    - {error}");
        }
    }
    println!();
}

async fn cmd_health(url: &str) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;
    let base = url.trim_end_matches('/');

    let health: serde_json::Value = client
        .get(format!("{base}/health"))
        .send()
        .await
        .wrap_err_with(|| format!("cannot connect to {base} (is the service running?)"))?
        .error_for_status()?
        .json()
        .await?;

    println!("Application is healthy");
    println!("  Status:    {}", health["status"].as_str().unwrap_or("unknown"));
    println!("  Timestamp: {}", health["timestamp"].as_str().unwrap_or("-"));
    println!("  Scheduler: {}", running_label(&health["scheduler_running"]));

    let status: serde_json::Value = client
        .get(format!("{base}/sync-status"))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    println!();
    println!("Sync status");
    println!("  Scheduler:    {}", running_label(&status["scheduler_running"]));
    println!("  Current time: {}", status["current_time"].as_str().unwrap_or("-"));
    println!("  Pass running: {}", status["pass_running"].as_bool().unwrap_or(false));

    match status["jobs"].as_array() {
        Some(jobs) if !jobs.is_empty() => {
            println!("  Jobs:");
            for job in jobs {
                println!(
                    "    - {} (next run: {})",
                    job["name"].as_str().unwrap_or("?"),
                    job["next_run_time"].as_str().unwrap_or("not scheduled")
                );
            }
        }
        _ => println!("  No scheduled jobs found"),
    }

    if let Some(last) = status["last_pass"].as_object() {
        println!(
            "  Last pass:    {} at {}",
            last.get("status").and_then(|s| s.as_str()).unwrap_or("?"),
            last.get("finished_at").and_then(|s| s.as_str()).unwrap_or("?")
        );
    }

    Ok(())
}

fn running_label(value: &serde_json::Value) -> &'static str {
    if value.as_bool().unwrap_or(false) {
        "running"
    } else {
        "stopped"
    }
}

async fn cmd_send_email(
    config_path: Option<&Path>,
    to: &str,
    template: &str,
    data: Option<&str>,
    subject: Option<String>,
) -> Result<()> {
    let config = resolve_config(config_path)?;

    let template_data = match data {
        Some(raw) => {
            let value: serde_json::Value =
                serde_json::from_str(raw).wrap_err("--data must be a JSON object")?;
            if !value.is_object() {
                return Err(eyre!("--data must be a JSON object"));
            }
            Some(value)
        }
        None => None,
    };

    let mail = MailService::from_config(&config);
    let request = MailRequest {
        to: to.to_string(),
        template_name: Some(template.to_string()),
        template_data,
        subject,
        ..MailRequest::default()
    };
    mail.send_mail(&request).await?;

    println!("Email sent successfully to {to}");
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

const SPINNER_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(style.tick_strings(SPINNER_FRAMES));
        }
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn lead_processed(&self, lead_id: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Persisting [{current}/{total}] {lead_id}"));
    }

    fn done(&self, _report: &PassReport) {
        self.spinner.finish_and_clear();
    }
}
