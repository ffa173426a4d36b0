//! CLI command definitions, routing, and tracing setup.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::info;

use intake_core::{
    EventReport, ProgressReporter, SearchIndexer, Service, UploadRequest, parse_event,
    parse_s3_uri, spawn_watcher,
};
use intake_shared::{
    AppConfig, ContactForm, MAX_WATCH_SECS, SearchRequest, ServiceConfig, WatcherConfig,
    init_config, load_config, load_config_from, validate_config,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Intake: contact forms and document processing from the command line.
#[derive(Parser)]
#[command(
    name = "intake",
    version,
    about = "Record contact submissions, upload documents, and process them into a searchable index.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(flatten)]
    pub overrides: Overrides,

    #[command(subcommand)]
    pub command: Command,
}

/// Flags that override the config file.
#[derive(Args, Default)]
pub(crate) struct Overrides {
    /// Config file (defaults to ~/.intake/intake.toml).
    #[arg(long, global = true, env = "INTAKE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding the database and object store.
    #[arg(long, global = true, env = "INTAKE_DATA_DIR")]
    pub data_dir: Option<String>,

    /// Bucket for uploaded documents.
    #[arg(long, global = true, env = "INTAKE_BUCKET")]
    pub bucket: Option<String>,

    /// Sender address on outgoing email.
    #[arg(long, global = true, env = "INTAKE_FROM_EMAIL")]
    pub from_email: Option<String>,

    /// Recipient of contact notifications.
    #[arg(long, global = true, env = "INTAKE_ADMIN_EMAIL")]
    pub admin_email: Option<String>,
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
    /// Contact submissions.
    Contact {
        #[command(subcommand)]
        action: ContactAction,
    },

    /// Document uploads.
    Document {
        #[command(subcommand)]
        action: DocumentAction,
    },

    /// Process one stored object (s3://bucket/key).
    Process {
        /// Object location.
        uri: String,
    },

    /// Process an object-created event notification (JSON file, or - for stdin).
    ProcessEvent {
        /// Event file path.
        file: String,
    },

    /// Search processed documents.
    Search {
        /// Free-text query.
        query: String,

        /// Exact-match filter as key=value (contact_id, document_type, status).
        #[arg(short, long = "filter", value_parser = parse_filter)]
        filters: Vec<(String, String)>,

        /// Maximum number of results (1-100).
        #[arg(short, long, default_value = "10")]
        limit: u32,
    },

    /// Contact and document analytics.
    Analytics,

    /// Visitor statistics.
    Stats,

    /// Service health.
    Health,

    /// Watch for recently stored objects and process them.
    Watch {
        /// Run a single pass and exit.
        #[arg(long)]
        once: bool,

        /// Seconds between passes (overrides config).
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Search index maintenance.
    Index {
        #[command(subcommand)]
        action: IndexAction,
    },

    /// Queued outgoing email.
    Outbox {
        #[command(subcommand)]
        action: OutboxAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Contact subcommands.
#[derive(Subcommand)]
pub(crate) enum ContactAction {
    /// Submit a contact form.
    Submit {
        #[command(flatten)]
        form: ContactArgs,

        /// Use the document-enabled form.
        #[arg(long)]
        enhanced: bool,
    },
    /// List a contact's documents.
    Documents {
        /// Contact ID.
        contact_id: String,
    },
}

/// Contact form fields.
#[derive(Args)]
pub(crate) struct ContactArgs {
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub email: String,
    #[arg(long)]
    pub message: String,
    #[arg(long)]
    pub company: Option<String>,
    #[arg(long)]
    pub service: Option<String>,
    #[arg(long)]
    pub budget: Option<String>,
    #[arg(long)]
    pub source: Option<String>,
    #[arg(long)]
    pub user_agent: Option<String>,
    #[arg(long)]
    pub page_url: Option<String>,
}

impl From<ContactArgs> for ContactForm {
    fn from(args: ContactArgs) -> Self {
        Self {
            name: args.name,
            email: args.email,
            message: args.message,
            company: args.company,
            service: args.service,
            budget: args.budget,
            source: args.source,
            user_agent: args.user_agent,
            page_url: args.page_url,
        }
    }
}

/// Document subcommands.
#[derive(Subcommand)]
pub(crate) enum DocumentAction {
    /// Upload a file for a contact.
    Upload {
        /// File to upload.
        path: PathBuf,

        /// Owning contact ID.
        #[arg(long)]
        contact_id: String,

        /// Document type (proposal, contract, ...).
        #[arg(long)]
        document_type: String,

        #[arg(long)]
        description: Option<String>,

        /// Comma-separated tags.
        #[arg(long)]
        tags: Option<String>,

        /// Leave the document pending instead of processing it now.
        #[arg(long)]
        defer: bool,
    },
}

/// Index subcommands.
#[derive(Subcommand)]
pub(crate) enum IndexAction {
    /// Document count and size of the configured index.
    Stats,
}

/// Outbox subcommands.
#[derive(Subcommand)]
pub(crate) enum OutboxAction {
    /// Show the most recent queued messages.
    List {
        #[arg(short, long, default_value = "20")]
        limit: u32,
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

fn parse_filter(raw: &str) -> std::result::Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "intake=info",
        1 => "intake=debug",
        _ => "intake=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Load the config file and apply flag/env overrides.
fn resolve_config(overrides: &Overrides) -> Result<AppConfig> {
    let mut config = match &overrides.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };

    if let Some(dir) = &overrides.data_dir {
        config.storage.data_dir = dir.clone();
    }
    if let Some(bucket) = &overrides.bucket {
        config.storage.bucket = bucket.clone();
    }
    if let Some(from) = &overrides.from_email {
        config.email.from_address = from.clone();
    }
    if let Some(admin) = &overrides.admin_email {
        config.email.admin_address = admin.clone();
    }

    validate_config(&config)?;
    Ok(config)
}

async fn open_service(config: &AppConfig) -> Result<Service> {
    let service_config = ServiceConfig::from(config);
    let path = service_config.database_path();
    Service::open(service_config)
        .await
        .wrap_err_with(|| format!("failed to open database at {}", path.display()))
}

/// Open for reporting commands; never creates the database.
async fn open_service_readonly(config: &AppConfig) -> Result<Service> {
    let service_config = ServiceConfig::from(config);
    let path = service_config.database_path();
    Service::open_readonly(service_config).await.wrap_err_with(|| {
        format!(
            "no readable database at {} (submit a contact or upload a document first)",
            path.display()
        )
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let Cli {
        overrides, command, ..
    } = cli;

    match command {
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(&overrides).await,
        },
        command => {
            let config = resolve_config(&overrides)?;
            run_service_command(&config, command).await
        }
    }
}

async fn run_service_command(config: &AppConfig, command: Command) -> Result<()> {
    match command {
        Command::Contact { action } => match action {
            ContactAction::Submit { form, enhanced } => {
                cmd_contact_submit(config, form.into(), enhanced).await
            }
            ContactAction::Documents { contact_id } => {
                cmd_contact_documents(config, &contact_id).await
            }
        },
        Command::Document { action } => match action {
            DocumentAction::Upload {
                path,
                contact_id,
                document_type,
                description,
                tags,
                defer,
            } => {
                let request = read_upload(&path, contact_id, document_type, description, tags)?;
                cmd_document_upload(config, request, defer).await
            }
        },
        Command::Process { uri } => cmd_process(config, &uri).await,
        Command::ProcessEvent { file } => cmd_process_event(config, &file).await,
        Command::Search {
            query,
            filters,
            limit,
        } => cmd_search(config, query, filters, limit).await,
        Command::Analytics => cmd_analytics(config).await,
        Command::Stats => cmd_stats(config).await,
        Command::Health => cmd_health(config).await,
        Command::Watch { once, interval } => cmd_watch(config, once, interval).await,
        Command::Index { action } => match action {
            IndexAction::Stats => cmd_index_stats(config).await,
        },
        Command::Outbox { action } => match action {
            OutboxAction::List { limit } => cmd_outbox_list(config, limit).await,
        },
        Command::Config { .. } => Err(eyre!("config commands do not open the service")),
    }
}

// ---------------------------------------------------------------------------
// Contacts and documents
// ---------------------------------------------------------------------------

async fn cmd_contact_submit(config: &AppConfig, form: ContactForm, enhanced: bool) -> Result<()> {
    let service = open_service(config).await?;
    let response = if enhanced {
        service.submit_enhanced_contact(&form).await?
    } else {
        service.submit_contact(&form).await?
    };
    print_json(&response)
}

async fn cmd_contact_documents(config: &AppConfig, contact_id: &str) -> Result<()> {
    let service = open_service_readonly(config).await?;
    print_json(&service.contact_documents(contact_id).await?)
}

fn read_upload(
    path: &Path,
    contact_id: String,
    document_type: String,
    description: Option<String>,
    tags: Option<String>,
) -> Result<UploadRequest> {
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| eyre!("'{}' has no usable file name", path.display()))?
        .to_string();
    let body = std::fs::read(path).wrap_err_with(|| format!("cannot read {}", path.display()))?;

    Ok(UploadRequest {
        contact_id,
        filename,
        body,
        document_type,
        description,
        tags,
    })
}

async fn cmd_document_upload(config: &AppConfig, request: UploadRequest, defer: bool) -> Result<()> {
    let service = open_service(config).await?;
    let response = service.upload_document(request).await?;
    print_json(&response)?;

    if defer {
        return Ok(());
    }

    let (bucket, key) = parse_s3_uri(&response.s3_path)?;
    let outcome = service.process_object(&bucket, &key).await?;
    print_json(&outcome)
}

// ---------------------------------------------------------------------------
// Processing
// ---------------------------------------------------------------------------

async fn cmd_process(config: &AppConfig, uri: &str) -> Result<()> {
    let (bucket, key) = parse_s3_uri(uri)?;
    let service = open_service(config).await?;
    let outcome = service.process_object(&bucket, &key).await?;
    print_json(&outcome)
}

async fn cmd_process_event(config: &AppConfig, file: &str) -> Result<()> {
    let json = if file == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .wrap_err("cannot read event from stdin")?;
        buf
    } else {
        std::fs::read_to_string(file).wrap_err_with(|| format!("cannot read {file}"))?
    };
    let event = parse_event(&json)?;

    info!(records = event.records.len(), "processing event");

    let service = open_service(config).await?;
    let reporter = CliProgress::new();
    let report = service.process_event(&event, &reporter).await;

    println!();
    println!("  Event processed");
    println!("  Processed: {}", report.processed.len());
    println!("  Skipped:   {}", report.skipped);
    println!("  Failed:    {}", report.failures.len());
    for failure in &report.failures {
        println!("    s3://{}/{}: {}", failure.bucket, failure.key, failure.error);
    }
    println!();

    if report.is_success() {
        Ok(())
    } else {
        Err(eyre!("{} record(s) failed", report.failures.len()))
    }
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif bar.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} [{pos}/{len}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        bar.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { bar }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.bar.set_message(name.to_string());
    }

    fn object_started(&self, key: &str, current: usize, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_position(current.saturating_sub(1) as u64);
        self.bar.set_message(key.to_string());
    }

    fn object_finished(&self, key: &str, ok: bool) {
        self.bar.inc(1);
        if !ok {
            self.bar.println(format!("  failed: {key}"));
        }
    }

    fn done(&self, _report: &EventReport) {
        self.bar.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// Search and reporting
// ---------------------------------------------------------------------------

async fn cmd_search(
    config: &AppConfig,
    query: String,
    filters: Vec<(String, String)>,
    limit: u32,
) -> Result<()> {
    let mut request = SearchRequest::new(query);
    request.filters = filters.into_iter().collect();
    request.limit = limit;

    let service = open_service_readonly(config).await?;
    print_json(&service.search_documents(&request).await?)
}

async fn cmd_analytics(config: &AppConfig) -> Result<()> {
    let service = open_service_readonly(config).await?;
    print_json(&service.analytics().await?)
}

async fn cmd_stats(config: &AppConfig) -> Result<()> {
    let service = open_service_readonly(config).await?;
    print_json(&service.stats().await?)
}

async fn cmd_health(config: &AppConfig) -> Result<()> {
    let service = open_service(config).await?;
    let health = service.health(None).await;
    print_json(&health)?;
    if health.status == "healthy" {
        Ok(())
    } else {
        Err(eyre!("service is {}", health.status))
    }
}

async fn cmd_index_stats(config: &AppConfig) -> Result<()> {
    let service = open_service_readonly(config).await?;
    print_json(&service.indexer().stats().await?)
}

async fn cmd_outbox_list(config: &AppConfig, limit: u32) -> Result<()> {
    let service = open_service_readonly(config).await?;
    let entries = service.storage().list_outbox(limit).await?;
    if entries.is_empty() {
        println!("No queued email.");
        return Ok(());
    }
    for entry in entries {
        println!("{}  {} -> {}", entry.created_at, entry.from_address, entry.to_address);
        println!("  Subject: {}", entry.subject);
        println!();
        for line in entry.body.lines() {
            println!("  {line}");
        }
        println!();
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Watcher
// ---------------------------------------------------------------------------

async fn cmd_watch(config: &AppConfig, once: bool, interval: Option<u64>) -> Result<()> {
    let mut watcher_config: WatcherConfig = config.watcher.clone();
    if let Some(secs) = interval {
        watcher_config.interval_secs = secs.clamp(1, MAX_WATCH_SECS);
    }

    let service = open_service(config).await?;
    if once {
        let pass = service.watch_once(&watcher_config).await?;
        return print_json(&pass);
    }

    let handle = spawn_watcher(Arc::new(service), watcher_config);
    println!("Watching for new documents (Ctrl-C to stop)...");
    tokio::signal::ctrl_c()
        .await
        .wrap_err("failed to listen for Ctrl-C")?;

    let status = handle.status();
    handle.stop().await;
    println!(
        "Stopped after {} pass(es): {} processed, {} failed.",
        status.passes, status.processed, status.failed
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(overrides: &Overrides) -> Result<()> {
    let config = resolve_config(overrides)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_filters() {
        assert_eq!(
            parse_filter("contact_id = c1").unwrap(),
            ("contact_id".to_string(), "c1".to_string())
        );
        assert!(parse_filter("novalue").is_err());
        assert!(parse_filter("=x").is_err());
    }

    #[test]
    fn search_command_collects_filters() {
        let cli = Cli::try_parse_from([
            "intake", "search", "roadmap", "-f", "status=completed", "--filter", "document_type=proposal",
            "--limit", "5",
        ])
        .expect("parse");
        match cli.command {
            Command::Search {
                query,
                filters,
                limit,
            } => {
                assert_eq!(query, "roadmap");
                assert_eq!(filters.len(), 2);
                assert_eq!(limit, 5);
            }
            _ => panic!("expected search command"),
        }
    }

    #[test]
    fn overrides_apply_over_file_values() {
        let dir = std::env::temp_dir().join(format!("intake_cli_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("intake.toml");
        std::fs::write(&path, "[storage]\nbucket = \"from-file\"\n").unwrap();

        let overrides = Overrides {
            config: Some(path),
            bucket: Some("from-flag".into()),
            admin_email: Some("ops@example.com".into()),
            ..Default::default()
        };
        let config = resolve_config(&overrides).unwrap();
        assert_eq!(config.storage.bucket, "from-flag");
        assert_eq!(config.email.admin_address, "ops@example.com");
        assert_eq!(config.email.from_address, "noreply@example.com");

        let bad = Overrides {
            config: overrides.config.clone(),
            admin_email: Some("not-an-address".into()),
            ..Default::default()
        };
        assert!(resolve_config(&bad).is_err());
    }
}
