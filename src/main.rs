//! CLI entry point for `unsubly`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{HumanDuration, ProgressBar, ProgressStyle};

use unsubly::config::{self, Config};
use unsubly::export::{self, report::ReviewRow};
use unsubly::model::link::LinkSource;
use unsubly::model::message::Folder;
use unsubly::provider::auth::AuthSession;
use unsubly::provider::gmail::GmailClient;
use unsubly::scan::{self, CancelToken, ScanEvent, ScanOutcome, ScanRequest, ScanSettings, ScanStatus};
use unsubly::timing::TimingTracker;

#[derive(Parser)]
#[command(
    name = "unsubly",
    version,
    about = "Scan a Gmail mailbox for unsubscribe links and review them per sender domain"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan the mailbox and list unsubscribe links per sender domain
    Scan {
        /// Maximum number of messages to process
        #[arg(short = 'n', long, value_name = "COUNT")]
        budget: Option<usize>,
        /// Include messages from the inbox
        #[arg(long)]
        inbox: bool,
        /// Include messages from spam
        #[arg(long)]
        spam: bool,
        /// Include messages from trash
        #[arg(long)]
        trash: bool,
        /// Only accept body links that mention "unsubscribe"
        #[arg(long)]
        strict: bool,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
        /// Also write the review list as CSV
        #[arg(long, value_name = "PATH")]
        csv: Option<PathBuf>,
        /// Do not overwrite the saved link files
        #[arg(long)]
        no_save: bool,
    },
    /// Estimate how long a scan of COUNT messages will take
    Estimate {
        count: usize,
    },
    /// Show the links saved by the last scan
    Show {
        #[arg(long)]
        json: bool,
    },
    /// Open a sender's saved opt-out link in the default browser
    Open {
        /// Sender domain as shown by `scan` or `show`
        domain: String,
        /// Use the List-Unsubscribe header link instead of the body link
        #[arg(long)]
        header: bool,
        /// Print the link instead of opening it
        #[arg(long)]
        print: bool,
    },
    /// Print the configuration file path, optionally writing the defaults
    Config {
        #[arg(long)]
        init: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = config::load_config();

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Scan {
            budget,
            inbox,
            spam,
            trash,
            strict,
            json,
            csv,
            no_save,
        } => {
            let mut folders = Vec::new();
            if inbox {
                folders.push(Folder::Inbox);
            }
            if spam {
                folders.push(Folder::Spam);
            }
            if trash {
                folders.push(Folder::Trash);
            }
            let opts = ScanOptions {
                budget: budget.unwrap_or(config.scan.default_budget),
                folders,
                strict,
                json,
                csv,
                save: !no_save,
            };
            cmd_scan(&config, opts)
        }
        Commands::Estimate { count } => cmd_estimate(&config, count),
        Commands::Show { json } => cmd_show(&config, json),
        Commands::Open {
            domain,
            header,
            print,
        } => cmd_open(&config, &domain, header, print),
        Commands::Config { init } => cmd_config(&config, init),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_path = config::log_file_path(config);
    let log_dir = log_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "unsubly.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

struct ScanOptions {
    budget: usize,
    folders: Vec<Folder>,
    strict: bool,
    json: bool,
    csv: Option<PathBuf>,
    save: bool,
}

/// Run a scan in the background, rendering progress until it ends.
fn cmd_scan(config: &Config, opts: ScanOptions) -> anyhow::Result<()> {
    let folders = if opts.folders.is_empty() {
        config.scan.folders.clone()
    } else {
        opts.folders
    };
    if folders.is_empty() {
        anyhow::bail!("No folders selected. Use --inbox, --spam or --trash.");
    }

    let session = AuthSession::resolve(config)?;
    let client = GmailClient::new(&session, &config.gmail)?;

    let tracker = TimingTracker::from_config(config);
    if let Ok(Some(estimate)) = tracker.estimate(opts.budget) {
        eprintln!("  Estimated processing time: {}", HumanDuration(estimate));
    }

    let mut settings = ScanSettings::from(&config.scan);
    if opts.strict {
        settings.phrases = unsubly::parser::links::PhraseSet::Strict;
    }

    let handle = scan::spawn_scan(
        client,
        ScanRequest {
            budget: opts.budget,
            folders,
        },
        settings,
        CancelToken::new(),
        Some(tracker),
    )
    .context("failed to start scan worker")?;

    let handler_token = handle.cancel_token();
    ctrlc::set_handler(move || {
        handler_token.cancel();
    })
    .context("failed to set ctrl-c handler")?;

    let pb = ProgressBar::new(opts.budget as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} Scanning [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .expect("valid template")
            .progress_chars("#>-"),
    );

    let mut outcome: Option<ScanOutcome> = None;
    for event in handle.events().iter() {
        match event {
            ScanEvent::Progress { processed, total } => {
                pb.set_length(total as u64);
                pb.set_position(processed as u64);
            }
            ScanEvent::Done(done) => outcome = Some(done),
            ScanEvent::Failed(e) => {
                pb.finish_and_clear();
                return Err(e).context("scan could not start");
            }
        }
    }
    pb.finish_and_clear();
    let outcome = outcome.ok_or_else(|| anyhow::anyhow!("scan worker stopped unexpectedly"))?;

    if opts.save {
        let body_path = config::artifact_path(config, &config.output.body_links_file);
        let header_path = config::artifact_path(config, &config.output.header_links_file);
        export::links::save_domain_links(&outcome.links, &body_path, &header_path)?;
    }

    let rows = export::report::review_rows(&outcome.links);
    if let Some(csv_path) = &opts.csv {
        if let Some(parent) = csv_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        export::csv::export_csv(&rows, csv_path)?;
        eprintln!("  Exported CSV to {}", csv_path.display());
    }

    if opts.json {
        print_outcome_json(&outcome, &rows)?;
    } else {
        print_summary(&outcome);
        print_review_table(&rows);
    }
    Ok(())
}

/// Print the projected duration for a scan of `count` messages.
fn cmd_estimate(config: &Config, count: usize) -> anyhow::Result<()> {
    let tracker = TimingTracker::from_config(config);
    match tracker.estimate(count)? {
        Some(estimate) => println!(
            "  Estimated processing time for {count} message(s): {:.2} seconds ({})",
            estimate.as_secs_f64(),
            HumanDuration(estimate)
        ),
        None => println!("  Estimated processing time: N/A (no scan recorded yet)"),
    }
    Ok(())
}

/// Reload the saved link files and print them.
fn cmd_show(config: &Config, json: bool) -> anyhow::Result<()> {
    let body_path = config::artifact_path(config, &config.output.body_links_file);
    let header_path = config::artifact_path(config, &config.output.header_links_file);
    let links = export::links::load_domain_links(&body_path, &header_path)?;
    let rows = export::report::review_rows(&links);

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else if rows.is_empty() {
        println!("  No saved links. Run `unsubly scan` first.");
    } else {
        print_review_table(&rows);
    }
    Ok(())
}

/// Launch the browser on one saved opt-out link.
fn cmd_open(config: &Config, domain: &str, header: bool, print: bool) -> anyhow::Result<()> {
    let body_path = config::artifact_path(config, &config.output.body_links_file);
    let header_path = config::artifact_path(config, &config.output.header_links_file);
    let links = export::links::load_domain_links(&body_path, &header_path)?;

    let (source, kind, other) = if header {
        (LinkSource::Header, "header", "body")
    } else {
        (LinkSource::Body, "body", "header")
    };
    let Some(url) = export::report::link_for(&links, domain, source) else {
        anyhow::bail!(
            "No saved {kind} link for '{domain}'. Try the {other} link, or run `unsubly show`."
        );
    };

    if print {
        println!("{url}");
        return Ok(());
    }
    tracing::info!(domain = %domain, url = %url, "Opening opt-out link");
    open_browser(url)?;
    println!("  Opened {url}");
    Ok(())
}

/// Open a URL in the system's default browser.
fn open_browser(url: &str) -> anyhow::Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open")
            .arg(url)
            .spawn()
            .context("failed to open browser")?;
    }
    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open")
            .arg(url)
            .spawn()
            .context("failed to open browser")?;
    }
    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", "", url])
            .spawn()
            .context("failed to open browser")?;
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        anyhow::bail!("Cannot open a browser on this platform; use --print: {url}");
    }
    Ok(())
}

fn cmd_config(config: &Config, init: bool) -> anyhow::Result<()> {
    let path = config::config_file_path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config file path"))?;
    if init {
        if path.exists() {
            anyhow::bail!("Config file already exists: {}", path.display());
        }
        config::save_config(config)?;
        println!("  Wrote default configuration to {}", path.display());
    } else {
        println!("  {:<12} {}", "Config", path.display());
        println!("  {:<12} {}", "Data dir", config::data_dir(config).display());
    }
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "unsubly", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

fn print_summary(outcome: &ScanOutcome) {
    println!();
    let status = match &outcome.status {
        ScanStatus::Completed => "completed".to_string(),
        ScanStatus::Cancelled => "cancelled (partial results)".to_string(),
        ScanStatus::Aborted(reason) => format!("aborted: {reason}"),
    };
    println!("  {:<20} {}", "Scan", status);
    println!(
        "  {:<20} {}/{}",
        "Messages processed", outcome.processed, outcome.budget
    );
    if outcome.skipped > 0 {
        println!("  {:<20} {}", "Messages skipped", outcome.skipped);
    }
    println!("  {:<20} {}", "Sender domains", outcome.links.body.len());
    println!("  {:<20} {:.2?}", "Elapsed", round_millis(outcome.elapsed));
}

fn round_millis(d: Duration) -> Duration {
    Duration::from_millis(d.as_millis() as u64)
}

/// Print the review list as a table: domain, body opt-out link, header link.
fn print_review_table(rows: &[ReviewRow]) {
    println!();
    if rows.is_empty() {
        println!("  No senders found.");
        println!();
        return;
    }

    println!("  {:<30} {:<50} {}", "Sender", "Opt-out via link", "List-Unsubscribe");
    println!("  {}", "-".repeat(110));
    for row in rows {
        let domain: String = row.domain.chars().take(29).collect();
        println!(
            "  {:<30} {:<50} {}",
            domain,
            row.body_link.as_deref().unwrap_or("No link"),
            row.header_link.as_deref().unwrap_or("No link"),
        );
    }
    println!();
    println!("  Open a link with `unsubly open <domain>` (add --header for List-Unsubscribe).");
    println!();
}

fn print_outcome_json(outcome: &ScanOutcome, rows: &[ReviewRow]) -> anyhow::Result<()> {
    let output = serde_json::json!({
        "generated_at": chrono::Utc::now().to_rfc3339(),
        "result": outcome.status,
        "processed": outcome.processed,
        "budget": outcome.budget,
        "skipped": outcome.skipped,
        "elapsed_secs": outcome.elapsed.as_secs_f64(),
        "domain_links": outcome.links.body,
        "domain_header_links": outcome.links.header,
        "rows": rows,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
