use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use console::Emoji;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;
use url::Url;

use rssb_mirror::upload::DEFAULT_REGION;
use rssb_mirror::{
    DEFAULT_BASE_URL, DEFAULT_BUCKET, NoopReporter, ObjectStore, ProgressEvent, ProgressReporter,
    ReqwestClient, RetryPolicy, S3Store, ScrapeOptions, SharedProgressReporter, StorageConfig,
    SyncOptions, SyncStats, TransferOptions, TransferOutcome, TransferStats, UploadDecision,
    scrape_all, sync_tree,
};

// Emoji with fallback for terminals without Unicode support
static HEADPHONES: Emoji<'_, '_> = Emoji("🎧 ", "");
static SEARCH: Emoji<'_, '_> = Emoji("🔍 ", "[~] ");
static BOOKS: Emoji<'_, '_> = Emoji("📚 ", "[i] ");
static DOWNLOAD: Emoji<'_, '_> = Emoji("📥 ", "[v] ");
static UPLOAD: Emoji<'_, '_> = Emoji("📤 ", "[^] ");
static SUCCESS: Emoji<'_, '_> = Emoji("✅ ", "[+] ");
static WARNING: Emoji<'_, '_> = Emoji("⚠️  ", "[?] ");
static FAILURE: Emoji<'_, '_> = Emoji("❌ ", "[!] ");
static PARTY: Emoji<'_, '_> = Emoji("🎉 ", "[*] ");
static FOLDER: Emoji<'_, '_> = Emoji("📁 ", "");

/// Mirror the RSSB audio library and sync it to S3-compatible storage
#[derive(Parser, Debug)]
#[command(name = "rssb-mirror")]
#[command(about = "Mirror the RSSB audio library and sync it to S3-compatible storage")]
#[command(version)]
struct Args {
    /// Local archive: download target and sync source
    #[arg(short, long, default_value = "./downloads")]
    output_dir: PathBuf,

    /// Origin site root
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: Url,

    /// Maximum number of items per category (0 = all)
    #[arg(short, long, default_value_t = 0)]
    limit: usize,

    /// Stop each download after this many bytes (0 = unlimited)
    #[arg(long, default_value_t = 0)]
    max_size: u64,

    /// Destination bucket
    #[arg(long, default_value = DEFAULT_BUCKET)]
    bucket: String,

    /// Decide and report, but neither download nor upload
    #[arg(long)]
    dry_run: bool,

    /// Run only the scrape phase
    #[arg(long, conflicts_with = "only_upload")]
    only_scrape: bool,

    /// Run only the upload phase
    #[arg(long)]
    only_upload: bool,

    /// Accept invalid TLS certificates from the object store
    #[arg(long)]
    no_ssl_verify: bool,

    /// S3-compatible endpoint URL
    #[arg(long, env = "R2_ENDPOINT_URL")]
    endpoint: Option<String>,

    /// Access key id
    #[arg(long, env = "R2_ACCESS_KEY_ID", hide_env_values = true)]
    access_key_id: Option<String>,

    /// Secret access key
    #[arg(long, env = "R2_SECRET_ACCESS_KEY", hide_env_values = true)]
    secret_access_key: Option<String>,

    /// Signing region
    #[arg(long, env = "R2_REGION", default_value = DEFAULT_REGION)]
    region: String,

    /// Attempts per download or upload
    #[arg(long, default_value_t = 3)]
    retries: u32,

    /// Pause between attempts, in milliseconds
    #[arg(long, default_value_t = 2000)]
    retry_delay_ms: u64,

    /// Quiet mode - suppress progress output
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    fn storage_config(&self) -> StorageConfig {
        StorageConfig {
            endpoint: self.endpoint.clone(),
            access_key_id: self.access_key_id.clone(),
            secret_access_key: self.secret_access_key.clone(),
            region: Some(self.region.clone()),
            bucket: self.bucket.clone(),
            insecure: self.no_ssl_verify,
        }
    }
}

/// Progress reporter using indicatif for terminal output
///
/// Work is sequential, so there is at most one transfer bar at a time.
struct IndicatifReporter {
    multi: MultiProgress,
    main_bar: ProgressBar,
    transfer_bar: Mutex<Option<ProgressBar>>,
}

impl IndicatifReporter {
    fn new() -> Self {
        let multi = MultiProgress::new();

        let main_style = ProgressStyle::default_bar()
            .template("{spinner:.green} {wide_msg}")
            .expect("valid spinner template");

        let main_bar = multi.add(ProgressBar::new_spinner());
        main_bar.set_style(main_style);
        main_bar.enable_steady_tick(Duration::from_millis(100));

        Self {
            multi,
            main_bar,
            transfer_bar: Mutex::new(None),
        }
    }

    fn println(&self, line: String) {
        let _ = self.multi.println(line);
    }

    fn start_transfer_bar(&self, path: &Path, total: Option<u64>) {
        let style = ProgressStyle::default_bar()
            .template(&format!(
                "  {DOWNLOAD}[{{bar:30.cyan/blue}}] {{bytes}}/{{total_bytes}} {{wide_msg}}"
            ))
            .expect("valid transfer template")
            .progress_chars("█▓░");

        let bar = self.multi.add(ProgressBar::new(total.unwrap_or(0)));
        bar.set_style(style);
        bar.set_message(file_label(path));

        if let Ok(mut current) = self.transfer_bar.lock()
            && let Some(previous) = current.replace(bar)
        {
            previous.finish_and_clear();
        }
    }

    fn update_transfer_bar(&self, position: u64, total: Option<u64>) {
        if let Ok(current) = self.transfer_bar.lock()
            && let Some(bar) = current.as_ref()
        {
            if let Some(total) = total {
                bar.set_length(total);
            }
            bar.set_position(position);
        }
    }

    fn finish_transfer_bar(&self) {
        if let Ok(mut current) = self.transfer_bar.lock()
            && let Some(bar) = current.take()
        {
            bar.finish_and_clear();
        }
    }
}

impl ProgressReporter for IndicatifReporter {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::CategoryStarted { category } => {
                self.main_bar
                    .set_message(format!("{SEARCH}Scraping {}", category.to_string().cyan()));
            }

            ProgressEvent::PageFetchFailed { url, error } => {
                self.println(format!(
                    "{WARNING}{} {} - {}",
                    "Could not fetch".yellow(),
                    url,
                    error.dimmed()
                ));
            }

            ProgressEvent::ItemsFound { category, count } => {
                self.main_bar.set_message(format!(
                    "{BOOKS}{} • {} items",
                    category.to_string().bold().green(),
                    count.to_string().cyan()
                ));
            }

            ProgressEvent::ItemSkipped { title, reason } => {
                self.println(format!(
                    "{WARNING}Skipped {} - {}",
                    truncate_title(&title, 40).yellow(),
                    reason.dimmed()
                ));
            }

            ProgressEvent::DuplicateId { category, id } => {
                self.println(format!(
                    "{WARNING}Duplicate id {} in {} catalog",
                    id.yellow(),
                    category
                ));
            }

            ProgressEvent::TransferStarting {
                path,
                content_length,
                ..
            } => {
                self.start_transfer_bar(&path, content_length);
            }

            ProgressEvent::TransferProgress {
                bytes_written,
                total_bytes,
                ..
            } => {
                self.update_transfer_bar(bytes_written, total_bytes);
            }

            ProgressEvent::TransferRetrying {
                url,
                attempt,
                max_attempts,
                error,
            } => {
                self.finish_transfer_bar();
                self.println(format!(
                    "{WARNING}Attempt {}/{} failed for {} - {}",
                    attempt,
                    max_attempts,
                    url,
                    error.dimmed()
                ));
            }

            ProgressEvent::TransferFinished { url, path, outcome } => {
                self.finish_transfer_bar();
                match outcome {
                    TransferOutcome::Downloaded { truncated, .. } => {
                        let note = if truncated { " (truncated)" } else { "" };
                        self.main_bar
                            .set_message(format!("{SUCCESS}{}{note}", file_label(&path).green()));
                    }
                    TransferOutcome::DryRun => {
                        self.println(format!(
                            "  {} {} -> {}",
                            "[dry run] would download".dimmed(),
                            url,
                            path.display()
                        ));
                    }
                    TransferOutcome::Skipped => {}
                    TransferOutcome::Failed { error } => {
                        self.println(format!(
                            "{FAILURE}{} - {}",
                            truncate_title(&url, 60).red(),
                            error.red()
                        ));
                    }
                }
            }

            ProgressEvent::CatalogWritten {
                category,
                path,
                items,
            } => {
                self.println(format!(
                    "{SUCCESS}{} catalog: {} items -> {}",
                    category.to_string().bold(),
                    items.to_string().cyan(),
                    path.display()
                ));
            }

            ProgressEvent::CatalogFailed { category, error } => {
                self.println(format!(
                    "{FAILURE}{} catalog not written - {}",
                    category.to_string().bold(),
                    error.red()
                ));
            }

            ProgressEvent::ScrapeCompleted { .. } => {
                self.finish_transfer_bar();
                self.main_bar.set_message("");
            }

            ProgressEvent::SyncStarting {
                source,
                bucket,
                dry_run,
                remote_checks,
            } => {
                if dry_run {
                    self.println(format!("{}", "=== DRY RUN MODE ===".yellow().bold()));
                }
                if !remote_checks {
                    self.println(format!(
                        "{WARNING}{}",
                        "No storage credentials, remote state is not checked".yellow()
                    ));
                }
                self.main_bar.set_message(format!(
                    "{UPLOAD}Syncing {} -> {}",
                    source.display().to_string().cyan(),
                    bucket.cyan()
                ));
            }

            ProgressEvent::UploadDecided {
                key,
                decision,
                dry_run,
            } => match decision {
                UploadDecision::Unchanged => {
                    self.main_bar.set_message(format!("{UPLOAD}In sync: {key}"));
                }
                UploadDecision::Changed { local, remote } if dry_run => {
                    self.println(format!(
                        "  {} {} (local {} bytes, remote {} bytes)",
                        "[dry run] would update".dimmed(),
                        key,
                        local,
                        remote
                    ));
                }
                _ if dry_run => {
                    self.println(format!("  {} {}", "[dry run] would upload".dimmed(), key));
                }
                _ => {
                    self.main_bar
                        .set_message(format!("{UPLOAD}Uploading {}", key.cyan()));
                }
            },

            ProgressEvent::UploadRetrying {
                key,
                attempt,
                max_attempts,
                error,
            } => {
                self.println(format!(
                    "{WARNING}Upload attempt {}/{} failed for {} - {}",
                    attempt,
                    max_attempts,
                    key,
                    error.dimmed()
                ));
            }

            ProgressEvent::UploadCompleted { key, .. } => {
                self.main_bar.set_message(format!("{SUCCESS}{}", key.green()));
            }

            ProgressEvent::UploadFailed { key, error } => {
                self.println(format!("{FAILURE}{} - {}", key.red(), error.red()));
            }

            ProgressEvent::SyncCompleted { .. } => {
                self.main_bar.set_message("");
            }
        }
    }
}

impl Drop for IndicatifReporter {
    fn drop(&mut self) {
        self.main_bar.finish_and_clear();
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| truncate_title(&name.to_string_lossy(), 40))
        .unwrap_or_default()
}

fn truncate_title(title: &str, max_len: usize) -> String {
    if title.chars().count() <= max_len {
        title.to_string()
    } else {
        let head: String = title.chars().take(max_len.saturating_sub(3)).collect();
        format!("{head}...")
    }
}

fn failed_count(failed: usize) -> colored::ColoredString {
    if failed > 0 {
        failed.to_string().red().bold()
    } else {
        failed.to_string().green()
    }
}

fn print_scrape_summary(stats: &TransferStats) {
    println!(
        "\n{PARTY}{} {} files: {} downloaded, {} skipped, {} failed",
        "Scrape complete:".bold().green(),
        stats.total,
        stats.downloaded.to_string().green().bold(),
        stats.skipped.to_string().yellow(),
        failed_count(stats.failed)
    );
    if stats.pages_failed > 0 {
        println!(
            "{WARNING}{} pages could not be fetched",
            stats.pages_failed.to_string().red().bold()
        );
    }
}

fn print_sync_summary(stats: &SyncStats, dry_run: bool) {
    let uploaded = if dry_run { "would upload" } else { "uploaded" };
    println!(
        "\n{PARTY}{} {} files: {} {uploaded}, {} skipped, {} failed",
        "Sync complete:".bold().green(),
        stats.total,
        stats.uploaded.to_string().green().bold(),
        stats.skipped.to_string().yellow(),
        failed_count(stats.failed)
    );
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing();

    if !args.quiet {
        println!(
            "\n{}{} {}\n",
            HEADPHONES,
            "rssb-mirror".bold().magenta(),
            "- Audio Library Mirror".dimmed()
        );
    }

    let reporter: SharedProgressReporter = if args.quiet {
        NoopReporter::shared()
    } else {
        Arc::new(IndicatifReporter::new())
    };
    let retry = RetryPolicy::new(args.retries, Duration::from_millis(args.retry_delay_ms));

    if !args.only_upload {
        let client = ReqwestClient::new();

        let mut options = ScrapeOptions::new(args.base_url.clone(), &args.output_dir);
        options.limit = args.limit;
        options.transfer = TransferOptions {
            dry_run: args.dry_run,
            max_size: args.max_size,
        };
        options.retry = retry;

        let mut stats = TransferStats::default();
        scrape_all(&client, &options, reporter.clone(), &mut stats).await;
        print_scrape_summary(&stats);
    }

    if !args.only_scrape {
        let config = args.storage_config();

        // A dry run works without credentials; it just cannot look at the bucket
        let store = if args.dry_run && !config.has_credentials() {
            None
        } else {
            Some(S3Store::new(&config).context("Object storage is not configured")?)
        };

        let options = SyncOptions {
            bucket: args.bucket.clone(),
            dry_run: args.dry_run,
            retry,
        };

        let mut stats = SyncStats::default();
        sync_tree(
            store.as_ref().map(|store| store as &dyn ObjectStore),
            &args.output_dir,
            &options,
            reporter.clone(),
            &mut stats,
        )
        .await
        .context("Failed to sync archive")?;
        print_sync_summary(&stats, args.dry_run);
    }

    if !args.quiet {
        println!(
            "\n{FOLDER}Archive: {}\n",
            args.output_dir.display().to_string().cyan()
        );
    }

    Ok(())
}
